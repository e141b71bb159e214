use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::cache::{EntityRef, Slot};

use super::ids::{SectionId, TermId};

/// A bounded date range scoping membership, badges and events for one section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Term {
    pub id: TermId,
    pub section_id: Slot<SectionId>,
    pub name: Slot<String>,
    /// First day, inclusive.
    pub start: Slot<NaiveDate>,
    /// Last day, inclusive.
    pub end: Slot<NaiveDate>,
}

impl Term {
    pub fn skeleton(id: TermId) -> Self {
        Self {
            id,
            section_id: Slot::Unset,
            name: Slot::Unset,
            start: Slot::Unset,
            end: Slot::Unset,
        }
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new("term", self.id)
    }

    /// Both dates, once known.
    pub fn span(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((*self.start.get()?, *self.end.get()?))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.span()
            .map(|(start, end)| start <= date && date <= end)
            .unwrap_or(false)
    }
}
