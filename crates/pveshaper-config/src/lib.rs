//! Configuration for the pveshaper scheduler.
//!
//! Loads the JSON (or TOML) schedule file with figment, resolves API token
//! secrets and validates every entry once, producing the immutable
//! `pveshaper_core::ScheduleConfig` the orchestrator runs from.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use figment::{
    Figment,
    providers::{Env, Format, Json, Toml},
};
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use pveshaper_core::{
    ApiToken, CoreError, Guest, GuestKind, Node, Rate, RateSet, Schedule, ScheduleConfig, Server,
    TimeOfDay, TlsMode, TransportConfig,
};

/// Config file used when neither `--config` nor `PVESHAPER_CONFIG` is given.
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Environment variables with this prefix override top-level settings.
pub const ENV_PREFIX: &str = "PVESHAPER_";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no API token secret configured for server '{server}'")]
    NoCredentials { server: String },

    #[error(transparent)]
    Schedule(#[from] CoreError),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── File structs ────────────────────────────────────────────────────

/// Configuration file as written on disk.
#[derive(Debug, Deserialize)]
pub struct RawConfig {
    /// IANA time zone name all schedule times are interpreted in.
    pub timezone: String,

    /// Servers keyed by base URL.
    #[serde(default)]
    pub servers: BTreeMap<String, RawServer>,
}

#[derive(Debug, Deserialize)]
pub struct RawServer {
    /// API token id, e.g. `root@pam!shaper`.
    pub id: String,

    /// API token secret (plaintext -- prefer `secret_env`).
    pub secret: Option<String>,

    /// Environment variable holding the token secret. Wins over `secret`.
    pub secret_env: Option<String>,

    /// Accept self-signed certificates.
    #[serde(default)]
    pub insecure: bool,

    /// Path to a custom CA certificate (PEM).
    pub ca_cert: Option<PathBuf>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Guests keyed by node name.
    #[serde(default)]
    pub nodes: BTreeMap<String, Vec<RawGuest>>,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

#[derive(Debug, Deserialize)]
pub struct RawGuest {
    #[serde(rename = "type")]
    pub kind: GuestKind,

    pub id: u32,

    /// `HH:MM` -> interface -> MB/s (0 = unlimited).
    #[serde(default)]
    pub sched: BTreeMap<String, BTreeMap<String, u32>>,
}

// ── Loading ─────────────────────────────────────────────────────────

/// Build the figment for `path`: the file (TOML when the extension is
/// `.toml`, JSON otherwise) merged with `PVESHAPER_TIMEZONE`.
pub fn figment_for(path: &Path) -> Figment {
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    let figment = if is_toml {
        Figment::new().merge(Toml::file(path))
    } else {
        Figment::new().merge(Json::file(path))
    };
    figment.merge(Env::prefixed(ENV_PREFIX).only(&["timezone"]))
}

/// Read the file at `path` without validating it.
pub fn load_raw(path: &Path) -> Result<RawConfig, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let raw: RawConfig = figment_for(path).extract()?;
    Ok(raw)
}

/// Load and validate the configuration at `path`.
pub fn load_config(path: &Path) -> Result<ScheduleConfig, ConfigError> {
    let config = load_raw(path)?.validate()?;
    debug!(path = %path.display(), servers = config.servers.len(), "configuration loaded");
    Ok(config)
}

// ── Validation ──────────────────────────────────────────────────────

impl RawConfig {
    /// Validate every entry and build the typed model. Any bad entry fails
    /// the whole configuration.
    pub fn validate(self) -> Result<ScheduleConfig, ConfigError> {
        let timezone: Tz = self
            .timezone
            .trim()
            .parse()
            .map_err(|_| CoreError::UnknownTimeZone {
                name: self.timezone.clone(),
            })?;

        if self.servers.is_empty() {
            warn!("configuration has no servers; nothing will be scheduled");
        }

        let mut servers: Vec<Server> = Vec::with_capacity(self.servers.len());
        for (raw_url, raw) in self.servers {
            let server = raw.validate(&raw_url)?;
            // `https://h:8006` and `https://h:8006/` are the same server.
            if let Some(first) = servers.iter().find(|s| s.url == server.url) {
                return Err(invalid(
                    format!("servers.\"{raw_url}\""),
                    format!("same server as {}; merge the two entries", first.url),
                ));
            }
            servers.push(server);
        }

        Ok(ScheduleConfig { timezone, servers })
    }
}

impl RawServer {
    fn validate(self, raw_url: &str) -> Result<Server, ConfigError> {
        let url = parse_base_url(raw_url)?;

        if self.id.trim().is_empty() {
            return Err(invalid(format!("servers.\"{raw_url}\".id"), "token id is empty"));
        }
        let secret = resolve_secret(self.secret_env.as_deref(), self.secret, raw_url)?;

        if self.timeout_secs == 0 {
            return Err(invalid(
                format!("servers.\"{raw_url}\".timeout_secs"),
                "must be at least 1 second",
            ));
        }
        let tls = if self.insecure {
            if self.ca_cert.is_some() {
                warn!(server = raw_url, "both insecure and ca_cert set; certificates will not be verified");
            }
            TlsMode::DangerAcceptInvalid
        } else if let Some(path) = self.ca_cert {
            TlsMode::CustomCa(path)
        } else {
            TlsMode::System
        };
        let transport = TransportConfig {
            tls,
            ..TransportConfig::default()
        }
        .with_timeout(Duration::from_secs(self.timeout_secs));

        let nodes = self
            .nodes
            .into_iter()
            .map(|(name, guests)| {
                let guests = guests
                    .into_iter()
                    .map(|guest| guest.validate(raw_url, &name))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Node { name, guests })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Server {
            url,
            token: ApiToken::new(self.id.trim(), secret),
            transport,
            nodes,
        })
    }
}

impl RawGuest {
    fn validate(self, server: &str, node: &str) -> Result<Guest, ConfigError> {
        let mut entries: BTreeMap<TimeOfDay, RateSet> = BTreeMap::new();
        for (time, rates) in self.sched {
            let at: TimeOfDay = time.parse()?;
            let slot = entries.entry(at).or_default();
            for (interface, mbps) in rates {
                if interface.trim().is_empty() {
                    return Err(invalid(
                        format!("servers.\"{server}\".nodes.{node}[{}].sched.\"{time}\"", self.id),
                        "empty interface name",
                    ));
                }
                // "7:00" and "07:00" land on the same slot.
                if slot.insert(interface.clone(), Rate::mbps(mbps)).is_some() {
                    return Err(invalid(
                        format!("servers.\"{server}\".nodes.{node}[{}].sched", self.id),
                        format!("interface {interface} scheduled twice at {at}"),
                    ));
                }
            }
        }

        Ok(Guest {
            kind: self.kind,
            vmid: self.id,
            schedule: Schedule::new(entries),
        })
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let field = || format!("servers.\"{raw}\"");
    let url = Url::parse(raw).map_err(|e| invalid(field(), format!("invalid URL: {e}")))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(field(), format!("unsupported scheme '{other}'"))),
    }
    if url.host_str().is_none() {
        return Err(invalid(field(), "URL has no host"));
    }
    Ok(url)
}

/// Resolve a token secret: the named environment variable first, then the
/// inline value.
pub fn resolve_secret(
    env_name: Option<&str>,
    inline: Option<String>,
    server: &str,
) -> Result<SecretString, ConfigError> {
    if let Some(name) = env_name {
        match std::env::var(name) {
            Ok(val) if !val.is_empty() => return Ok(SecretString::from(val)),
            _ => debug!(server, env = name, "secret variable not set; falling back to inline secret"),
        }
    }

    if let Some(secret) = inline.filter(|s| !s.is_empty()) {
        return Ok(SecretString::from(secret));
    }

    Err(ConfigError::NoCredentials {
        server: server.into(),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::io::Write;

    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    fn write_file(suffix: &str, body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    const SAMPLE: &str = r#"{
        "timezone": "Asia/Seoul",
        "servers": {
            "https://pve.lan:8006": {
                "id": "root@pam!shaper",
                "secret": "0b8f-secret",
                "insecure": true,
                "nodes": {
                    "pve1": [
                        { "type": "lxc", "id": 101, "sched": {
                            "07:00": { "net0": 5 },
                            "22:00": { "net0": 0, "net1": 2 }
                        } },
                        { "type": "qemu", "id": 200, "sched": { "9:30": { "net0": 10 } } }
                    ]
                }
            }
        }
    }"#;

    #[test]
    fn loads_sample_json() {
        let file = write_file(".json", SAMPLE);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.timezone, chrono_tz::Asia::Seoul);
        assert_eq!(config.servers.len(), 1);

        let server = &config.servers[0];
        assert_eq!(server.url.as_str(), "https://pve.lan:8006/");
        assert_eq!(server.token.id(), "root@pam!shaper");
        assert_eq!(server.transport.tls, TlsMode::DangerAcceptInvalid);
        assert_eq!(server.transport.timeout, Duration::from_secs(30));

        let node = &server.nodes[0];
        assert_eq!(node.name, "pve1");
        assert_eq!(node.guests.len(), 2);
        assert_eq!(node.guests[0].kind, GuestKind::Lxc);
        assert_eq!(node.guests[1].vmid, 200);

        let times: Vec<String> = node.guests[0]
            .schedule
            .entries()
            .map(|(at, _)| at.to_string())
            .collect();
        assert_eq!(times, vec!["07:00", "22:00"]);

        let (at, _) = node.guests[1].schedule.entries().next().unwrap();
        assert_eq!(at.to_string(), "09:30");
    }

    #[test]
    fn loads_toml_by_extension() {
        let file = write_file(
            ".toml",
            r#"
timezone = "UTC"

[servers."https://10.0.0.2:8006"]
id = "shaper@pve!cron"
secret = "s3cret"
timeout_secs = 5
ca_cert = "/etc/pve/pve-root-ca.pem"

[[servers."https://10.0.0.2:8006".nodes.alpha]]
type = "qemu"
id = 300

[servers."https://10.0.0.2:8006".nodes.alpha.sched."18:00"]
net0 = 1
"#,
        );
        let config = load_config(file.path()).unwrap();
        let server = &config.servers[0];

        assert_eq!(config.timezone, chrono_tz::UTC);
        assert_eq!(server.transport.timeout, Duration::from_secs(5));
        assert_eq!(
            server.transport.tls,
            TlsMode::CustomCa(PathBuf::from("/etc/pve/pve-root-ca.pem"))
        );
        assert_eq!(server.nodes[0].guests[0].kind, GuestKind::Qemu);
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }), "got {err:?}");
    }

    #[test]
    fn malformed_time_fails_the_whole_config() {
        let file = write_file(".json", &SAMPLE.replace("\"22:00\"", "\"25:00\""));
        let err = load_config(file.path()).unwrap_err();
        assert!(
            matches!(err, ConfigError::Schedule(CoreError::MalformedSchedule { .. })),
            "got {err:?}"
        );
    }

    #[test]
    fn unknown_time_zone_is_rejected() {
        let file = write_file(".json", &SAMPLE.replace("Asia/Seoul", "Mars/Olympus"));
        let err = load_config(file.path()).unwrap_err();
        assert!(
            matches!(err, ConfigError::Schedule(CoreError::UnknownTimeZone { .. })),
            "got {err:?}"
        );
    }

    #[test]
    fn unknown_guest_type_is_rejected() {
        let file = write_file(".json", &SAMPLE.replace("\"qemu\"", "\"vm\""));
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Figment(_)), "got {err:?}");
    }

    #[test]
    fn bad_url_is_rejected() {
        let file = write_file(".json", &SAMPLE.replace("https://pve.lan:8006", "ftp://pve.lan"));
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }), "got {err:?}");
    }

    #[test]
    fn equivalent_server_urls_are_rejected() {
        let file = write_file(
            ".json",
            r#"{
                "timezone": "UTC",
                "servers": {
                    "https://pve.lan:8006": { "id": "a@pam!t", "secret": "a" },
                    "https://pve.lan:8006/": { "id": "b@pam!t", "secret": "b" }
                }
            }"#,
        );
        let err = load_config(file.path()).unwrap_err();
        match err {
            ConfigError::Validation { field, reason } => {
                assert!(field.contains("https://pve.lan:8006"), "{field}");
                assert!(reason.contains("same server"), "{reason}");
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let file = write_file(
            ".json",
            &SAMPLE.replace("\"insecure\": true", "\"timeout_secs\": 0"),
        );
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }), "got {err:?}");
    }

    #[test]
    fn same_slot_written_two_ways_is_rejected() {
        let file = write_file(
            ".json",
            &SAMPLE.replace("\"9:30\": { \"net0\": 10 }", "\"9:30\": { \"net0\": 10 }, \"09:30\": { \"net0\": 1 }"),
        );
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }), "got {err:?}");
    }

    #[test]
    fn secret_env_falls_back_to_inline() {
        let secret = resolve_secret(
            Some("PVESHAPER_TEST_SECRET_THAT_IS_NEVER_SET"),
            Some("inline".into()),
            "https://pve.lan:8006",
        )
        .unwrap();
        assert_eq!(secret.expose_secret(), "inline");
    }

    #[test]
    fn secret_env_is_read_when_set() {
        // PATH is set in every test environment.
        let expected = std::env::var("PATH").unwrap();
        let secret = resolve_secret(Some("PATH"), Some("inline".into()), "srv").unwrap();
        assert_eq!(secret.expose_secret(), expected);
    }

    #[test]
    fn missing_secret_is_no_credentials() {
        let err = resolve_secret(None, Some(String::new()), "srv").unwrap_err();
        assert!(matches!(err, ConfigError::NoCredentials { .. }), "got {err:?}");
    }
}
