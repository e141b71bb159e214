//! osmcache-core: a lazily-populated, identity-preserving cache over the
//! Online Scout Manager web API.
//!
//! This crate provides:
//! - A pluggable transport with a reqwest implementation (`api`)
//! - Entity models whose attributes fill in on demand (`models`, `cache`)
//! - The `Connection` that runs populate recipes on first read
//! - Pure term, badge and patrol calculations (`calc`)
//! - Encrypted session persistence (`session`)

pub mod api;
pub mod cache;
pub mod calc;
pub mod config;
pub mod connection;
pub mod models;
mod resolver;
pub mod session;

pub use api::{HttpTransport, OsmError, RemoteError, Result, Transport, UsageStats};
pub use cache::{FieldState, Presence, Registry, Slot};
pub use config::ClientConfig;
pub use connection::{Connection, ConnectionState, Credentials};
pub use session::SessionStore;
