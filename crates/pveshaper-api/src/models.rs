// Wire types for the Proxmox VE JSON API.
//
// Every response is wrapped as `{ "data": ... }`. Guest configs are loosely
// typed on purpose: the field set depends on guest kind and PVE version, and
// only the `netN` entries matter to this crate.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The `{ "data": ... }` envelope around every API response.
///
/// `data` is optional because successful writes answer `{ "data": null }`.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse<T> {
    pub data: Option<T>,
}

/// Partial guest configuration sent with a PUT. Only the listed keys change.
pub type ConfigPatch = IndexMap<String, String>;

/// A guest's current configuration as returned by
/// `GET /nodes/{node}/{kind}/{vmid}/config`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct GuestConfig {
    fields: Map<String, Value>,
}

impl GuestConfig {
    /// Raw descriptor string for a network interface (`net0`, `net1`, ...).
    ///
    /// Returns `None` when the key is missing or not a string.
    pub fn interface(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Any passthrough field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

}

impl From<Map<String, Value>> for GuestConfig {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}
