// Proxmox VE HTTP client
//
// Wraps `reqwest::Client` with PVE-specific URL construction, API token
// authentication and `{ data }` envelope unwrapping. One instance is bound
// to one server for its whole lifetime.

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::auth::{ApiToken, GuestKind};
use crate::error::Error;
use crate::models::{ApiResponse, ConfigPatch, GuestConfig};
use crate::transport::TransportConfig;

/// Longest slice of an error body carried into [`Error::Remote`].
const BODY_PREVIEW_CHARS: usize = 200;

/// Raw HTTP client for one Proxmox VE server.
///
/// Every request carries `Authorization: PVEAPIToken=...`. Methods return
/// the unwrapped `data` payload; the envelope is stripped before the caller
/// sees it.
#[derive(Debug)]
pub struct PveClient {
    http: reqwest::Client,
    base_url: Url,
    token: ApiToken,
}

impl PveClient {
    /// Create a client for `base_url` (e.g. `https://pve1.lan:8006`).
    pub fn new(base_url: Url, token: ApiToken, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, token))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, token: ApiToken) -> Self {
        Self {
            http,
            base_url,
            token,
        }
    }

    /// The API token id (never the secret).
    pub fn token_id(&self) -> &str {
        self.token.id()
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// `{base}/api2/json/nodes/{node}/{kind}/{vmid}/config`
    ///
    /// Segments are pushed individually so node names are percent-encoded.
    pub(crate) fn guest_config_url(
        &self,
        node: &str,
        kind: GuestKind,
        vmid: u32,
    ) -> Result<Url, Error> {
        let vmid = vmid.to_string();
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend([
                "api2",
                "json",
                "nodes",
                node,
                kind.as_str(),
                vmid.as_str(),
                "config",
            ]);
        Ok(url)
    }

    // ── Guest config endpoints ───────────────────────────────────────

    /// Read a guest's current configuration.
    ///
    /// `GET /api2/json/nodes/{node}/{kind}/{vmid}/config`
    pub async fn get_guest_config(
        &self,
        node: &str,
        kind: GuestKind,
        vmid: u32,
    ) -> Result<GuestConfig, Error> {
        let url = self.guest_config_url(node, kind, vmid)?;
        debug!("GET {url}");

        let resp = self
            .http
            .get(url)
            .header(AUTHORIZATION, self.token.header_value()?)
            .send()
            .await?;

        let envelope: ApiResponse<GuestConfig> = parse_envelope(resp).await?;
        envelope.data.ok_or_else(|| Error::Deserialization {
            message: format!("guest {kind}/{vmid} on {node}: response carried no data"),
            body: String::new(),
        })
    }

    /// Write a partial configuration update.
    ///
    /// `PUT /api2/json/nodes/{node}/{kind}/{vmid}/config` with `patch` as
    /// the JSON body. Returns `true` when the server acknowledges with
    /// `{ "data": null }`, `false` for any other successful payload.
    pub async fn update_guest_config(
        &self,
        node: &str,
        kind: GuestKind,
        vmid: u32,
        patch: &ConfigPatch,
    ) -> Result<bool, Error> {
        let url = self.guest_config_url(node, kind, vmid)?;
        debug!(keys = ?patch.keys().collect::<Vec<_>>(), "PUT {url}");

        let resp = self
            .http
            .put(url)
            .header(AUTHORIZATION, self.token.header_value()?)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .json(patch)
            .send()
            .await?;

        let envelope: ApiResponse<serde_json::Value> = parse_envelope(resp).await?;
        match envelope.data {
            None | Some(serde_json::Value::Null) => Ok(true),
            Some(other) => {
                trace!(payload = %other, "write answered with non-null data");
                Ok(false)
            }
        }
    }
}

// ── Response handling ────────────────────────────────────────────────

/// Check the HTTP status and decode the `{ data }` envelope.
async fn parse_envelope<T: DeserializeOwned>(resp: reqwest::Response) -> Result<ApiResponse<T>, Error> {
    let status = resp.status();

    if !status.is_success() {
        // PVE puts the reason in the status line, the body is often empty.
        let reason = status.canonical_reason().unwrap_or_default().to_owned();
        let body = resp.text().await.unwrap_or_default();
        let preview: String = body.chars().take(BODY_PREVIEW_CHARS).collect();
        let message = if preview.trim().is_empty() {
            reason
        } else {
            preview
        };
        return Err(Error::Remote {
            status: status.as_u16(),
            message,
        });
    }

    let body = resp.text().await?;
    serde_json::from_str(&body).map_err(|e| {
        let preview: String = body.chars().take(BODY_PREVIEW_CHARS).collect();
        Error::Deserialization {
            message: format!("{e} (body preview: {preview:?})"),
            body: body.clone(),
        }
    })
}
