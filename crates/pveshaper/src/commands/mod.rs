//! Command handlers.

pub mod check;
pub mod run;

use std::path::Path;

use tracing::info;

use pveshaper_core::ScheduleConfig;

use crate::cli::{Cli, Command};
use crate::error::CliError;

/// Load and validate the schedule file.
fn load(path: &Path) -> Result<ScheduleConfig, CliError> {
    let config = pveshaper_config::load_config(path)?;
    info!(path = %path.display(), timezone = %config.timezone, "configuration loaded");
    Ok(config)
}

pub async fn dispatch(cli: Cli) -> Result<(), CliError> {
    let config = load(&cli.global.config)?;
    match cli.command.unwrap_or_default() {
        Command::Run(args) => run::handle(&args, config).await,
        Command::Check(args) => check::handle(&args, config),
    }
}
