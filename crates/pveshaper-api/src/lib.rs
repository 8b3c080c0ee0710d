// pveshaper-api: Async Rust client for the Proxmox VE guest configuration API

pub mod auth;
pub mod client;
pub mod error;
pub mod models;
pub mod transport;

pub use auth::{ApiToken, GuestKind};
pub use client::PveClient;
pub use error::Error;
pub use models::{ConfigPatch, GuestConfig};
pub use transport::{TlsMode, TransportConfig};
