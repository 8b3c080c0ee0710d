//! `pveshaper check`: validate the configuration and list its triggers.

use tabled::{Table, Tabled, settings::Style};

use pveshaper_core::{Orchestrator, ScheduleConfig, ScheduledAction};

use crate::cli::{CheckArgs, OutputFormat};
use crate::error::CliError;

#[derive(Tabled)]
struct TriggerRow {
    #[tabled(rename = "Time")]
    at: String,
    #[tabled(rename = "Server")]
    server: String,
    #[tabled(rename = "Guest")]
    guest: String,
    #[tabled(rename = "Interface")]
    interface: String,
    #[tabled(rename = "Rate")]
    rate: String,
}

impl From<&ScheduledAction> for TriggerRow {
    fn from(action: &ScheduledAction) -> Self {
        Self {
            at: action.at.to_string(),
            server: action.server.host_str().unwrap_or_default().to_owned(),
            guest: action.guest.to_string(),
            interface: action.interface.clone(),
            rate: action.rate.to_string(),
        }
    }
}

/// Render the compiled actions, sorted by time of day.
pub fn render(actions: &[ScheduledAction], format: OutputFormat) -> Result<String, CliError> {
    let mut sorted: Vec<&ScheduledAction> = actions.iter().collect();
    sorted.sort_by_key(|action| action.at);

    match format {
        OutputFormat::Table => {
            let rows: Vec<TriggerRow> = sorted.into_iter().map(TriggerRow::from).collect();
            Ok(Table::new(rows).with(Style::rounded()).to_string())
        }
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&sorted)?),
    }
}

pub fn handle(args: &CheckArgs, config: ScheduleConfig) -> Result<(), CliError> {
    let timezone = config.timezone;
    let servers = config.servers.len();

    // Builds every client too, so TLS settings are checked.
    let orchestrator = Orchestrator::new(config)?;
    let actions = orchestrator.scheduled();

    println!("{}", render(actions, args.output)?);
    if matches!(args.output, OutputFormat::Table) {
        println!(
            "{} trigger(s) across {servers} server(s), times in {timezone}",
            actions.len()
        );
    }
    Ok(())
}
