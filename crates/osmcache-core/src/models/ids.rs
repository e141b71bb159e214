//! Identifiers used to key the entity registry.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub type SectionId = i64;
pub type TermId = i64;
pub type MemberId = i64;
pub type PatrolId = i64;
pub type EventId = i64;

/// Patrol-equivalent holding a section's leaders. Present in every section.
pub const LEADERS_PATROL: PatrolId = -2;

/// Patrol-equivalent holding a section's young leaders. Present in every section.
pub const YOUNG_LEADERS_PATROL: PatrolId = -3;

/// Whether a patrol id is one of the reserved per-section ids.
pub fn is_reserved_patrol(id: PatrolId) -> bool {
    id == LEADERS_PATROL || id == YOUNG_LEADERS_PATROL
}

/// A member is only meaningful inside one section: the same person in two
/// sections is two distinct members sharing a member id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemberKey {
    pub section: SectionId,
    pub member: MemberId,
}

impl MemberKey {
    pub fn new(section: SectionId, member: MemberId) -> Self {
        Self { section, member }
    }
}

impl fmt::Display for MemberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.section, self.member)
    }
}

/// Badge id plus version; the remote system's "idv", written `"<id>_<version>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct BadgeIdv {
    pub id: i64,
    pub version: i64,
}

impl BadgeIdv {
    pub fn new(id: i64, version: i64) -> Self {
        Self { id, version }
    }
}

impl fmt::Display for BadgeIdv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.id, self.version)
    }
}

impl FromStr for BadgeIdv {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, version) = s
            .split_once('_')
            .ok_or_else(|| format!("badge idv '{}' has no version", s))?;
        let id = id
            .parse()
            .map_err(|e| format!("badge idv '{}': {}", s, e))?;
        let version = version
            .parse()
            .map_err(|e| format!("badge idv '{}': {}", s, e))?;
        Ok(Self { id, version })
    }
}

impl From<BadgeIdv> for String {
    fn from(idv: BadgeIdv) -> Self {
        idv.to_string()
    }
}

impl TryFrom<String> for BadgeIdv {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_badge_idv_text_form() {
        let idv = BadgeIdv::new(93, 0);
        assert_eq!(idv.to_string(), "93_0");
        assert_eq!("93_0".parse::<BadgeIdv>().unwrap(), idv);
        assert!("93".parse::<BadgeIdv>().is_err());
        assert!("a_b".parse::<BadgeIdv>().is_err());
    }

    #[test]
    fn test_badge_idv_usable_as_json_map_key() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(BadgeIdv::new(93, 1), 5);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"93_1":5}"#);
        let back: std::collections::BTreeMap<BadgeIdv, i32> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn test_reserved_patrols() {
        assert!(is_reserved_patrol(LEADERS_PATROL));
        assert!(is_reserved_patrol(YOUNG_LEADERS_PATROL));
        assert!(!is_reserved_patrol(12));
    }
}
