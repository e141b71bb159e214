//! In-memory entity cache: attribute slots and the identity-map registry.

mod registry;
mod slot;

pub use registry::Registry;
pub use slot::{Attempts, EntityRef, FieldState, Presence, Slot};
