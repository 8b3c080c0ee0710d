//! CLI error types with miette diagnostics.
//!
//! Maps configuration and core errors into user-facing errors with
//! actionable help text and a process exit code.

use miette::Diagnostic;
use thiserror::Error;

use pveshaper_config::ConfigError;
use pveshaper_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const CONFIG: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration file not found: {path}")]
    #[diagnostic(
        code(pveshaper::no_config),
        help("Pass --config <PATH> or set PVESHAPER_CONFIG.")
    )]
    NoConfig { path: String },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(pveshaper::validation))]
    Validation { field: String, reason: String },

    #[error("No API token secret for server '{server}'")]
    #[diagnostic(
        code(pveshaper::no_credentials),
        help("Set \"secret\", or name an environment variable in \"secret_env\".")
    )]
    NoCredentials { server: String },

    #[error("Invalid schedule: {message}")]
    #[diagnostic(
        code(pveshaper::schedule),
        help("Times are 24-hour HH:MM and the time zone an IANA name such as Europe/Berlin.")
    )]
    Schedule { message: String },

    #[error(transparent)]
    #[diagnostic(code(pveshaper::config))]
    Config(Box<figment::Error>),

    // ── Connection ───────────────────────────────────────────────────
    #[error("Cannot set up the connection to {url}: {reason}")]
    #[diagnostic(
        code(pveshaper::connection),
        help("Check ca_cert, or set \"insecure\": true for self-signed certificates.")
    )]
    ConnectionFailed { url: String, reason: String },

    // ── Runtime ──────────────────────────────────────────────────────
    #[error("{0}")]
    #[diagnostic(code(pveshaper::core))]
    Core(CoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render output: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoConfig { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. }
            | Self::NoCredentials { .. }
            | Self::Schedule { .. }
            | Self::Config(_) => exit_code::CONFIG,
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Core(_) | Self::Io(_) | Self::Json(_) => exit_code::GENERAL,
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NotFound { path } => CliError::NoConfig {
                path: path.display().to_string(),
            },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { server } => CliError::NoCredentials { server },
            ConfigError::Schedule(core) => core.into(),
            ConfigError::Figment(err) => CliError::Config(err),
            ConfigError::Io(err) => CliError::Io(err),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::MalformedSchedule { .. } | CoreError::UnknownTimeZone { .. } => {
                CliError::Schedule {
                    message: err.to_string(),
                }
            }
            CoreError::Config { message } => CliError::Validation {
                field: "server".into(),
                reason: message,
            },
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },
            other => CliError::Core(other),
        }
    }
}
