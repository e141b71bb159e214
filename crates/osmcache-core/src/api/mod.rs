//! Transport layer for the remote membership API.
//!
//! This module provides the `Transport` trait and its reqwest-backed
//! `HttpTransport`, the `OsmError` taxonomy, per-endpoint usage counters
//! and the tolerant wire decoding helpers shared by the resolver.
//!
//! Every call is a form POST to a relative endpoint; credentials are added
//! by the `Connection`, not here.

pub mod endpoints;
pub mod error;
pub mod transport;
pub mod usage;
pub mod wire;

pub use error::{OsmError, RemoteError, Result};
pub use transport::{FormParams, HttpTransport, Transport};
pub use usage::{EndpointUsage, UsageStats};
