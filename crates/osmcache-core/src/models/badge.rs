//! Badge definitions, their requirements, and members' progress against them.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::cache::{Attempts, EntityRef, Slot};

use super::ids::BadgeIdv;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeType {
    Challenge,
    Activity,
    Staged,
    Core,
}

impl BadgeType {
    pub const ALL: [BadgeType; 4] = [
        BadgeType::Challenge,
        BadgeType::Activity,
        BadgeType::Staged,
        BadgeType::Core,
    ];

    pub fn from_type_id(id: i64) -> Option<Self> {
        match id {
            1 => Some(BadgeType::Challenge),
            2 => Some(BadgeType::Activity),
            3 => Some(BadgeType::Staged),
            4 => Some(BadgeType::Core),
            _ => None,
        }
    }

    pub fn type_id(&self) -> i64 {
        match self {
            BadgeType::Challenge => 1,
            BadgeType::Activity => 2,
            BadgeType::Staged => 3,
            BadgeType::Core => 4,
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "challenge" => Some(BadgeType::Challenge),
            "activity" => Some(BadgeType::Activity),
            "staged" => Some(BadgeType::Staged),
            "core" => Some(BadgeType::Core),
            _ => None,
        }
    }
}

impl fmt::Display for BadgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BadgeType::Challenge => "Challenge",
            BadgeType::Activity => "Activity",
            BadgeType::Staged => "Staged",
            BadgeType::Core => "Core",
        };
        write!(f, "{}", label)
    }
}

/// One user-facing requirement of a badge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    /// Remote column id; keys the progress map of `BadgeWork`.
    pub field_id: String,
    pub name: String,
    pub description: String,
    /// Grouping letter ("a", "b", ...) used by the skip rules.
    pub area: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BadgeRecipe {
    Structure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Badge {
    pub idv: BadgeIdv,
    pub name: Slot<String>,
    pub group_name: Slot<String>,
    pub badge_type: Slot<BadgeType>,
    pub requirements: Slot<Vec<Requirement>>,
    pub attempts: Attempts<BadgeRecipe>,
}

impl Badge {
    pub fn skeleton(idv: BadgeIdv) -> Self {
        Self {
            idv,
            name: Slot::Unset,
            group_name: Slot::Unset,
            badge_type: Slot::Unset,
            requirements: Slot::Unset,
            attempts: Attempts::default(),
        }
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new("badge", self.idv)
    }

    pub fn requirement(&self, field_id: &str) -> Option<&Requirement> {
        self.requirements
            .get()?
            .iter()
            .find(|r| r.field_id == field_id)
    }

    /// Requirements grouped by area, areas in alphabetical order.
    pub fn areas(&self) -> BTreeMap<&str, Vec<&Requirement>> {
        let mut areas: BTreeMap<&str, Vec<&Requirement>> = BTreeMap::new();
        for req in self.requirements.get().into_iter().flatten() {
            areas.entry(req.area.as_str()).or_default().push(req);
        }
        areas
    }
}

/// A member's progress against one badge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeWork {
    pub completed: bool,
    pub awarded: bool,
    pub awarded_date: Option<NaiveDate>,
    /// Requirement field id -> free text entered by a leader.
    pub progress: BTreeMap<String, String>,
}

impl BadgeWork {
    pub fn is_finished(&self) -> bool {
        self.completed || self.awarded
    }

    pub fn progress_for(&self, field_id: &str) -> Option<&str> {
        self.progress.get(field_id).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(field: &str, area: &str) -> Requirement {
        Requirement {
            field_id: field.to_string(),
            name: format!("Req {}", field),
            description: "Do something".to_string(),
            area: area.to_string(),
        }
    }

    #[test]
    fn test_badge_type_ids() {
        for t in BadgeType::ALL {
            assert_eq!(BadgeType::from_type_id(t.type_id()), Some(t));
        }
        assert_eq!(BadgeType::from_type_id(9), None);
        assert_eq!(BadgeType::from_name("Staged"), Some(BadgeType::Staged));
    }

    #[test]
    fn test_areas_grouping() {
        let mut badge = Badge::skeleton(BadgeIdv::new(93, 0));
        let owner = badge.entity_ref();
        badge
            .requirements
            .assign(vec![req("1", "a"), req("2", "b"), req("3", "a")], &owner, "requirements")
            .unwrap();
        let areas = badge.areas();
        assert_eq!(areas["a"].len(), 2);
        assert_eq!(areas["b"].len(), 1);
        assert_eq!(badge.requirement("3").map(|r| r.area.as_str()), Some("a"));
        assert!(badge.requirement("9").is_none());
    }

    #[test]
    fn test_badge_work_finished() {
        let mut work = BadgeWork::default();
        assert!(!work.is_finished());
        work.awarded = true;
        assert!(work.is_finished());
    }
}
