//! Sections (organizational units) and their permission sets.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::cache::{Attempts, EntityRef, Slot};

use super::badge::BadgeType;
use super::ids::{BadgeIdv, EventId, MemberId, PatrolId, SectionId, TermId};

/// Age band of a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionType {
    Waiting,
    Beavers,
    Cubs,
    Scouts,
    Adults,
}

impl SectionType {
    pub fn from_api(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "waiting" => Some(SectionType::Waiting),
            "beavers" => Some(SectionType::Beavers),
            "cubs" => Some(SectionType::Cubs),
            "scouts" => Some(SectionType::Scouts),
            "adults" => Some(SectionType::Adults),
            _ => None,
        }
    }

    /// Value of the `section` form parameter.
    pub fn as_api(&self) -> &'static str {
        match self {
            SectionType::Waiting => "waiting",
            SectionType::Beavers => "beavers",
            SectionType::Cubs => "cubs",
            SectionType::Scouts => "scouts",
            SectionType::Adults => "adults",
        }
    }
}

impl fmt::Display for SectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SectionType::Waiting => "Waiting List",
            SectionType::Beavers => "Beavers",
            SectionType::Cubs => "Cubs",
            SectionType::Scouts => "Scouts",
            SectionType::Adults => "Adults",
        };
        write!(f, "{}", label)
    }
}

/// Permission levels used by the remote system.
pub const PERMISSION_NONE: u8 = 0;
pub const PERMISSION_READ: u8 = 10;
pub const PERMISSION_WRITE: u8 = 20;
pub const PERMISSION_ADMIN: u8 = 100;

/// Capability area name -> level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    levels: BTreeMap<String, u8>,
}

impl Permissions {
    pub fn new(levels: BTreeMap<String, u8>) -> Self {
        Self { levels }
    }

    pub fn level(&self, area: &str) -> u8 {
        self.levels.get(area).copied().unwrap_or(PERMISSION_NONE)
    }

    pub fn can_read(&self, area: &str) -> bool {
        self.level(area) >= PERMISSION_READ
    }

    pub fn can_write(&self, area: &str) -> bool {
        self.level(area) >= PERMISSION_WRITE
    }

    pub fn is_admin(&self, area: &str) -> bool {
        self.level(area) >= PERMISSION_ADMIN
    }

    pub fn areas(&self) -> impl Iterator<Item = (&str, u8)> {
        self.levels.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub level: i64,
    pub expires: Option<NaiveDate>,
}

impl Subscription {
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.expires.map(|e| e >= date).unwrap_or(true)
    }
}

/// Populate recipes owned by a section. Recipes that cover every section
/// at once (roles, terms) live on the connection instead.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SectionRecipe {
    ApiAccess,
    Patrols,
    Members(TermId),
    Badges(TermId, BadgeType),
    BadgeRecords(TermId, BadgeIdv),
    Events(TermId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub name: Slot<String>,
    pub group_name: Slot<String>,
    pub group_id: Slot<i64>,
    pub section_type: Slot<SectionType>,
    /// What the logged-in user's role allows.
    pub user_permissions: Slot<Permissions>,
    /// What the section has granted this application.
    pub api_permissions: Slot<Permissions>,
    pub subscription: Slot<Subscription>,
    pub terms: Slot<Vec<TermId>>,
    pub patrols: Slot<Vec<PatrolId>>,
    /// Membership list per term.
    pub members: BTreeMap<TermId, Vec<MemberId>>,
    /// Badges seen per term, all types together.
    pub badges: BTreeMap<TermId, Vec<BadgeIdv>>,
    pub events: BTreeMap<TermId, Vec<EventId>>,
    pub attempts: Attempts<SectionRecipe>,
}

impl Section {
    pub fn skeleton(id: SectionId) -> Self {
        Self {
            id,
            name: Slot::Unset,
            group_name: Slot::Unset,
            group_id: Slot::Unset,
            section_type: Slot::Unset,
            user_permissions: Slot::Unset,
            api_permissions: Slot::Unset,
            subscription: Slot::Unset,
            terms: Slot::Unset,
            patrols: Slot::Unset,
            members: BTreeMap::new(),
            badges: BTreeMap::new(),
            events: BTreeMap::new(),
            attempts: Attempts::default(),
        }
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new("section", self.id)
    }

    /// Attributes the roles call supplies; marked unavailable together when
    /// the section is absent from it.
    pub(crate) fn mark_roles_unavailable(&mut self) {
        self.name.mark_unavailable();
        self.group_name.mark_unavailable();
        self.group_id.mark_unavailable();
        self.section_type.mark_unavailable();
        self.user_permissions.mark_unavailable();
        self.subscription.mark_unavailable();
    }

    /// Record badges for a term, keeping first-seen order.
    pub(crate) fn add_badges(&mut self, term: TermId, idvs: impl IntoIterator<Item = BadgeIdv>) {
        let list = self.badges.entry(term).or_default();
        for idv in idvs {
            if !list.contains(&idv) {
                list.push(idv);
            }
        }
    }

    pub fn display_name(&self) -> String {
        match (self.group_name.get(), self.name.get()) {
            (Some(group), Some(name)) => format!("{}: {}", group, name),
            (None, Some(name)) => name.clone(),
            _ => format!("Section {}", self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_type_parse() {
        assert_eq!(SectionType::from_api("Cubs"), Some(SectionType::Cubs));
        assert_eq!(SectionType::from_api(" waiting "), Some(SectionType::Waiting));
        assert_eq!(SectionType::from_api("explorers"), None);
        assert_eq!(SectionType::Beavers.as_api(), "beavers");
    }

    #[test]
    fn test_permission_levels() {
        let mut levels = BTreeMap::new();
        levels.insert("badge".to_string(), PERMISSION_WRITE);
        levels.insert("member".to_string(), PERMISSION_READ);
        let perms = Permissions::new(levels);
        assert!(perms.can_write("badge"));
        assert!(perms.can_read("member"));
        assert!(!perms.can_write("member"));
        assert!(!perms.can_read("events"));
        assert!(!perms.is_admin("badge"));
    }

    #[test]
    fn test_display_name_falls_back_to_id() {
        let mut section = Section::skeleton(100);
        assert_eq!(section.display_name(), "Section 100");
        let owner = section.entity_ref();
        section.name.assign("Red Cubs".to_string(), &owner, "name").unwrap();
        assert_eq!(section.display_name(), "Red Cubs");
        section
            .group_name
            .assign("1st Town".to_string(), &owner, "group_name")
            .unwrap();
        assert_eq!(section.display_name(), "1st Town: Red Cubs");
    }

    #[test]
    fn test_add_badges_dedupes() {
        let mut section = Section::skeleton(100);
        section.add_badges(1, [BadgeIdv::new(1, 0), BadgeIdv::new(2, 0)]);
        section.add_badges(1, [BadgeIdv::new(2, 0), BadgeIdv::new(3, 0)]);
        assert_eq!(section.badges[&1].len(), 3);
    }

    #[test]
    fn test_subscription_expiry() {
        let sub = Subscription {
            level: 3,
            expires: NaiveDate::from_ymd_opt(2026, 12, 31),
        };
        assert!(sub.is_active_on(NaiveDate::from_ymd_opt(2026, 12, 31).unwrap()));
        assert!(!sub.is_active_on(NaiveDate::from_ymd_opt(2027, 1, 1).unwrap()));
    }
}
