//! Schedule-to-action engine for time-of-day guest bandwidth shaping.
//!
//! Turns a per-guest, per-interface daily timetable into recurring
//! time-zone-aware triggers that rewrite the `rate` of Proxmox VE network
//! interfaces:
//!
//! - **[`Descriptor`]** — ordered codec for interface strings such as
//!   `name=eth0,bridge=vmbr0,rate=5`, with [`Descriptor::with_rate`] applying
//!   a [`Rate`] (zero removes the ceiling).
//!
//! - **[`TriggerRegistry`]** — daily triggers keyed by [`TimeOfDay`] and
//!   time zone. Driven by an injectable [`Clock`]; each firing is spawned as
//!   its own task.
//!
//! - **[`compile`]** — flattens a [`ScheduleConfig`] into one
//!   [`ScheduledAction`] per (guest, time, interface).
//!
//! - **[`Orchestrator`]** — builds one `PveClient` per server, registers the
//!   compiled actions and owns the registry's start/stop lifecycle.

pub mod action;
pub mod compiler;
pub mod descriptor;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod trigger;

/// Log target for successful guest updates. Formatters render events on
/// this target with a `SUCCESS` tag instead of their level.
pub const SUCCESS_TARGET: &str = "pveshaper::success";

// ── Primary re-exports ──────────────────────────────────────────────
pub use action::{apply_scheduled_rate, run_scheduled_rate};
pub use compiler::{ScheduledAction, compile, in_effect_at};
pub use descriptor::Descriptor;
pub use error::CoreError;
pub use model::{Guest, GuestTarget, Node, Rate, RateSet, Schedule, ScheduleConfig, Server};
pub use orchestrator::Orchestrator;
pub use trigger::{
    Action, Clock, RegistryHandle, SystemClock, TimeOfDay, Trigger, TriggerId, TriggerRegistry,
};

pub use pveshaper_api::{ApiToken, GuestKind, TlsMode, TransportConfig};
