// ── Core error types ──
//
// Errors surfaced by the scheduling engine. Transport-level failures from
// `pveshaper-api` are translated by the `From` impl below so callers match
// on domain variants rather than on HTTP details.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Schedule errors (fatal at startup) ───────────────────────────
    #[error("Malformed schedule time '{input}': {reason}")]
    MalformedSchedule { input: String, reason: String },

    #[error("Unknown time zone '{name}'")]
    UnknownTimeZone { name: String },

    // ── Action errors (recovered per trigger) ────────────────────────
    #[error("Interface {interface} not present in config of guest {guest}")]
    InterfaceMissing { guest: String, interface: String },

    #[error("Guest {guest} did not acknowledge the update of {interface}")]
    Rejected { guest: String, interface: String },

    #[error("No client registered for server {url}")]
    UnknownServer { url: String },

    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Request timed out")]
    Timeout,

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("Remote API error: {message}")]
    Remote {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<pveshaper_api::Error> for CoreError {
    fn from(err: pveshaper_api::Error) -> Self {
        // A rejected token is reported as such, whatever the status code.
        if err.is_auth_failure() {
            return CoreError::AuthenticationFailed {
                message: err.to_string(),
            };
        }
        let status = err.status();
        match err {
            pveshaper_api::Error::Transport(ref e) if e.is_timeout() => CoreError::Timeout,
            pveshaper_api::Error::Transport(ref e) if e.is_connect() => {
                CoreError::ConnectionFailed {
                    url: e
                        .url()
                        .map_or_else(|| "<unknown>".into(), ToString::to_string),
                    reason: e.to_string(),
                }
            }
            pveshaper_api::Error::Transport(e) => CoreError::Remote {
                message: e.to_string(),
                status,
            },
            pveshaper_api::Error::Remote { status: code, message } => CoreError::Remote {
                message: format!("HTTP {code}: {message}"),
                status,
            },
            pveshaper_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            pveshaper_api::Error::InvalidBaseUrl(url) => CoreError::Config {
                message: format!("Server URL cannot be a base: {url}"),
            },
            pveshaper_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            pveshaper_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
