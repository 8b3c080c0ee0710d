//! `pveshaper run`: schedule until interrupted.

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use pveshaper_core::{Orchestrator, ScheduleConfig};

use crate::cli::RunArgs;
use crate::error::CliError;

pub async fn handle(args: &RunArgs, config: ScheduleConfig) -> Result<(), CliError> {
    let mut orchestrator = Orchestrator::new(config)?;
    if orchestrator.scheduled().is_empty() {
        warn!("no schedule entries configured; waiting for shutdown anyway");
    }

    // The clock loop starts first so a slow server during catch-up cannot
    // swallow a boundary minute.
    orchestrator.start();
    if args.catch_up {
        let handles = orchestrator.catch_up(Utc::now())?;
        tokio::spawn(report_catch_up(handles));
    }

    shutdown_signal().await;
    info!("shutdown requested");
    orchestrator.stop().await?;
    info!("scheduler stopped");
    Ok(())
}

/// Wait for every catch-up update and log the tally.
async fn report_catch_up(handles: Vec<JoinHandle<bool>>) {
    let total = handles.len();
    let mut applied = 0_usize;
    for handle in handles {
        match handle.await {
            Ok(true) => applied += 1,
            Ok(false) => {}
            Err(e) => error!(error = %e, "catch-up task aborted"),
        }
    }
    info!(applied, failed = total - applied, "catch-up finished");
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
