//! Events, their cost, and per-member attendance.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::cache::{Attempts, EntityRef, Slot};

use super::ids::{EventId, MemberId, SectionId};

/// Event cost. The remote system uses `-1` for "to be announced".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cost {
    /// Whole pence.
    Amount(i64),
    ToBeAnnounced,
}

impl Cost {
    /// Parse a wire cost such as `"12.50"`, `"0"` or `"-1.00"`.
    /// Blank, unparseable or out-of-range values are treated as absent.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim().trim_start_matches('£');
        if raw.is_empty() {
            return None;
        }
        let (pounds, pence) = match raw.split_once('.') {
            Some((p, f)) => (p, f),
            None => (raw, ""),
        };
        let negative = pounds.starts_with('-');
        let pounds: i64 = pounds.trim_start_matches('-').parse().ok()?;
        let pence: i64 = match pence.len() {
            0 => 0,
            1 => pence.parse::<i64>().ok()? * 10,
            _ => pence.get(..2)?.parse().ok()?,
        };
        let total = pounds.checked_mul(100)?.checked_add(pence)?;
        if negative {
            // Any negative amount is the sentinel
            return Some(Cost::ToBeAnnounced);
        }
        Some(Cost::Amount(total))
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cost::Amount(0) => write!(f, "Free"),
            Cost::Amount(pence) => write!(f, "£{}.{:02}", pence / 100, pence % 100),
            Cost::ToBeAnnounced => write!(f, "TBA"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Yes,
    No,
    Invited,
    Reserved,
    /// Shown the event but not yet replied.
    Shown,
    Unknown,
}

impl AttendanceStatus {
    pub fn from_api(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "yes" => AttendanceStatus::Yes,
            "no" => AttendanceStatus::No,
            "invited" => AttendanceStatus::Invited,
            "reserved" => AttendanceStatus::Reserved,
            "shown" => AttendanceStatus::Shown,
            _ => AttendanceStatus::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAttendance {
    pub status: AttendanceStatus,
    /// Custom column number -> value.
    pub columns: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventRecipe {
    Detail,
    Attendance,
    Sharing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub section_id: Slot<SectionId>,
    pub name: Slot<String>,
    pub start: Slot<NaiveDate>,
    pub end: Slot<NaiveDate>,
    pub location: Slot<String>,
    pub notes: Slot<String>,
    pub cost: Slot<Cost>,
    /// Equivalent events shared into other sections.
    pub links: Slot<Vec<EventId>>,
    pub attendance: Slot<BTreeMap<MemberId, EventAttendance>>,
    pub attempts: Attempts<EventRecipe>,
}

impl Event {
    pub fn skeleton(id: EventId) -> Self {
        Self {
            id,
            section_id: Slot::Unset,
            name: Slot::Unset,
            start: Slot::Unset,
            end: Slot::Unset,
            location: Slot::Unset,
            notes: Slot::Unset,
            cost: Slot::Unset,
            links: Slot::Unset,
            attendance: Slot::Unset,
            attempts: Attempts::default(),
        }
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new("event", self.id)
    }

    pub(crate) fn mark_unavailable(&mut self, recipe: EventRecipe) {
        match recipe {
            EventRecipe::Detail => {
                self.name.mark_unavailable();
                self.start.mark_unavailable();
                self.end.mark_unavailable();
                self.location.mark_unavailable();
                self.notes.mark_unavailable();
                self.cost.mark_unavailable();
            }
            EventRecipe::Attendance => self.attendance.mark_unavailable(),
            EventRecipe::Sharing => self.links.mark_unavailable(),
        }
    }

    /// Number of members answering yes, once attendance is known.
    pub fn attending_count(&self) -> Option<usize> {
        self.attendance.get().map(|a| {
            a.values()
                .filter(|e| e.status == AttendanceStatus::Yes)
                .count()
        })
    }

    pub fn date_range(&self) -> String {
        match (self.start.get(), self.end.get()) {
            (Some(s), Some(e)) if s != e => format!("{} - {}", s, e),
            (Some(s), _) => s.to_string(),
            _ => "-".to_string(),
        }
    }
}
