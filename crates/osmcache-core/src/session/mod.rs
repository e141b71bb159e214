//! Saving a connection between process runs.

mod store;

pub use store::{SessionStore, DEFAULT_TTL_MINUTES};
