use serde::{Deserialize, Serialize};

use crate::cache::{EntityRef, Slot};

use super::ids::{is_reserved_patrol, PatrolId, SectionId, LEADERS_PATROL, YOUNG_LEADERS_PATROL};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patrol {
    pub id: PatrolId,
    pub section_id: SectionId,
    pub name: Slot<String>,
    pub points: Slot<i64>,
}

impl Patrol {
    pub fn skeleton(section_id: SectionId, id: PatrolId) -> Self {
        Self {
            id,
            section_id,
            name: Slot::Unset,
            points: Slot::Unset,
        }
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new("patrol", format!("{}/{}", self.section_id, self.id))
    }

    pub fn is_reserved(&self) -> bool {
        is_reserved_patrol(self.id)
    }

    /// Name the reserved patrols carry when the remote system omits them.
    pub fn reserved_name(id: PatrolId) -> Option<&'static str> {
        match id {
            LEADERS_PATROL => Some("Leaders"),
            YOUNG_LEADERS_PATROL => Some("Young Leaders"),
            _ => None,
        }
    }

    pub fn display_points(&self) -> String {
        match self.points.get() {
            Some(points) => format!("{} pts", points),
            None => "-".to_string(),
        }
    }
}
