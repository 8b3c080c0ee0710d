//! Clap derive structures for the `pveshaper` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use pveshaper_config::DEFAULT_CONFIG_PATH;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// pveshaper -- time-of-day bandwidth limits for Proxmox VE guests
#[derive(Debug, Parser)]
#[command(
    name = "pveshaper",
    version,
    about = "Throttle and restore Proxmox VE guest bandwidth on a daily schedule",
    long_about = "Reads a per-guest, per-interface timetable and rewrites the `rate` of\n\
        each guest network interface through the Proxmox VE API at the\n\
        configured local times.",
    propagate_version = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    /// Defaults to `run`
    #[command(subcommand)]
    pub command: Option<Command>,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Path to the schedule file (JSON, or TOML by extension)
    #[arg(
        long,
        short = 'c',
        env = "PVESHAPER_CONFIG",
        default_value = DEFAULT_CONFIG_PATH,
        global = true
    )]
    pub config: PathBuf,

    /// Increase verbosity (-v, -vv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the scheduler until interrupted
    Run(RunArgs),

    /// Validate the configuration and list the compiled triggers
    Check(CheckArgs),
}

impl Default for Command {
    fn default() -> Self {
        Self::Run(RunArgs::default())
    }
}

#[derive(Debug, Default, Args)]
pub struct RunArgs {
    /// Apply the rate currently in effect for every interface before
    /// waiting for the next trigger
    #[arg(long)]
    pub catch_up: bool,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Output format
    #[arg(long, short = 'o', default_value = "table")]
    pub output: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table
    Table,
    /// Pretty-printed JSON
    Json,
}
