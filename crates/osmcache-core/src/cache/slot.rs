//! Lazily-populated attribute slots and recipe bookkeeping.
//!
//! Every entity attribute that comes from the remote system is a `Slot`.
//! A slot starts `Unset`; a populate recipe either sets it or, when the
//! remote system will not supply it, marks it `Unavailable` so that reads
//! do not keep retrying. Which recipes an entity has already run is kept in
//! its `Attempts` set.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::api::{OsmError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Slot<T> {
    Unset,
    Unavailable,
    Set(T),
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Slot::Unset
    }
}

/// Observable state of one attribute, combining the slot with whether the
/// recipe responsible for it has already run.
#[derive(Debug, PartialEq, Eq)]
pub enum FieldState<'a, T> {
    /// Never populated and its recipe has not run yet.
    Unset,
    /// Its recipe ran but did not mention it.
    Attempted,
    /// The remote system explicitly withheld it (permissions, not found).
    Unavailable,
    Set(&'a T),
}

impl<T> Clone for FieldState<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for FieldState<'_, T> {}

impl<'a, T> FieldState<'a, T> {
    pub fn value(self) -> Option<&'a T> {
        match self {
            FieldState::Set(v) => Some(v),
            _ => None,
        }
    }

    /// True when reading again without new information is pointless.
    pub fn is_settled(&self) -> bool {
        !matches!(self, FieldState::Unset)
    }
}

/// `FieldState` without the value, for callers that only need to know
/// whether a read would trigger a remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Unset,
    Attempted,
    Unavailable,
    Set,
}

/// Identifies an entity in consistency errors and log events.
#[derive(Debug, Clone)]
pub struct EntityRef {
    pub kind: &'static str,
    pub id: String,
}

impl EntityRef {
    pub fn new(kind: &'static str, id: impl fmt::Display) -> Self {
        Self {
            kind,
            id: id.to_string(),
        }
    }
}

impl<T> Slot<T> {
    pub fn get(&self) -> Option<&T> {
        match self {
            Slot::Set(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_set(&self) -> bool {
        matches!(self, Slot::Set(_))
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Slot::Unset)
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Slot::Unavailable)
    }

    /// Record that the remote system will not supply this attribute.
    /// A value that is already known is kept.
    pub fn mark_unavailable(&mut self) {
        if self.is_unset() {
            *self = Slot::Unavailable;
        }
    }

    pub fn state(&self, attempted: bool) -> FieldState<'_, T> {
        match self {
            Slot::Set(v) => FieldState::Set(v),
            Slot::Unavailable => FieldState::Unavailable,
            Slot::Unset if attempted => FieldState::Attempted,
            Slot::Unset => FieldState::Unset,
        }
    }

    pub fn presence(&self, attempted: bool) -> Presence {
        match self.state(attempted) {
            FieldState::Set(_) => Presence::Set,
            FieldState::Unavailable => Presence::Unavailable,
            FieldState::Attempted => Presence::Attempted,
            FieldState::Unset => Presence::Unset,
        }
    }
}

impl<T: PartialEq + fmt::Debug> Slot<T> {
    /// Set the attribute. Re-asserting the same value is a no-op; a
    /// different value means two sources disagree about data that should
    /// be stable, which is reported as `OsmError::Inconsistent`.
    pub fn assign(&mut self, value: T, owner: &EntityRef, field: &'static str) -> Result<()> {
        match self {
            Slot::Set(existing) if *existing == value => Ok(()),
            Slot::Set(existing) => {
                error!(
                    entity = owner.kind,
                    id = %owner.id,
                    field,
                    existing = ?existing,
                    incoming = ?value,
                    "Remote data contradicts cached value"
                );
                Err(OsmError::Inconsistent {
                    entity: owner.kind,
                    id: owner.id.clone(),
                    field,
                    existing: format!("{:?}", existing),
                    incoming: format!("{:?}", value),
                })
            }
            _ => {
                *self = Slot::Set(value);
                Ok(())
            }
        }
    }

    /// Assign when present, otherwise mark unavailable.
    pub fn offer(
        &mut self,
        value: Option<T>,
        owner: &EntityRef,
        field: &'static str,
    ) -> Result<()> {
        match value {
            Some(v) => self.assign(v, owner, field),
            None => {
                self.mark_unavailable();
                Ok(())
            }
        }
    }

    /// Assign when present; absence says nothing (the source does not
    /// carry this attribute at all).
    pub fn merge(
        &mut self,
        value: Option<T>,
        owner: &EntityRef,
        field: &'static str,
    ) -> Result<()> {
        match value {
            Some(v) => self.assign(v, owner, field),
            None => Ok(()),
        }
    }
}

impl<T> Slot<T> {
    /// Overwrite with the latest value. Only for attributes that legitimately
    /// change over a member's lifetime (patrol, role), never for identity.
    pub fn refresh(&mut self, value: Option<T>) {
        if let Some(v) = value {
            *self = Slot::Set(v);
        }
    }
}

/// Set of populate recipes an entity has already run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "R: Serialize + Ord",
    deserialize = "R: Deserialize<'de> + Ord"
))]
pub struct Attempts<R> {
    tried: BTreeSet<R>,
}

impl<R: Ord> Default for Attempts<R> {
    fn default() -> Self {
        Self {
            tried: BTreeSet::new(),
        }
    }
}

impl<R: Ord> Attempts<R> {
    /// Claim a recipe. Returns `true` the first time only; the recipe is
    /// considered attempted from this point on, even if its call fails.
    pub fn begin(&mut self, recipe: R) -> bool {
        self.tried.insert(recipe)
    }

    pub fn contains(&self, recipe: &R) -> bool {
        self.tried.contains(recipe)
    }

    pub fn len(&self) -> usize {
        self.tried.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tried.is_empty()
    }
}
