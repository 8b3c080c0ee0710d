use std::fmt;

use reqwest::header::HeaderValue;
use secrecy::{ExposeSecret, SecretString};

use crate::error::Error;

/// A Proxmox VE API token (`user@realm!tokenname` plus its UUID secret).
///
/// The secret is held in a [`SecretString`] so it is redacted from `Debug`
/// output and zeroed on drop. Only [`header_value`](Self::header_value)
/// ever exposes it, and the resulting header is marked sensitive.
#[derive(Clone)]
pub struct ApiToken {
    id: String,
    secret: SecretString,
}

impl ApiToken {
    pub fn new(id: impl Into<String>, secret: SecretString) -> Self {
        Self {
            id: id.into(),
            secret,
        }
    }

    /// The token id, e.g. `root@pam!shaper`. Safe to log.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Build the `Authorization` header: `PVEAPIToken={id}={secret}`.
    pub fn header_value(&self) -> Result<HeaderValue, Error> {
        let raw = format!("PVEAPIToken={}={}", self.id, self.secret.expose_secret());
        let mut value = HeaderValue::from_str(&raw).map_err(|e| Error::Authentication {
            message: format!("invalid API token header value for '{}': {e}", self.id),
        })?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiToken")
            .field("id", &self.id)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// The kind of guest, which selects the API resource path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GuestKind {
    /// LXC container -- `/nodes/{node}/lxc/{vmid}`.
    Lxc,
    /// QEMU virtual machine -- `/nodes/{node}/qemu/{vmid}`.
    Qemu,
}

impl GuestKind {
    /// The path segment used by the API.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lxc => "lxc",
            Self::Qemu => "qemu",
        }
    }
}

impl fmt::Display for GuestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
