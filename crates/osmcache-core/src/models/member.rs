//! Members (scouts, leaders) as seen from one section.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::cache::{Attempts, EntityRef, FieldState, Presence, Slot};

use super::badge::BadgeWork;
use super::custom_data::CustomData;
use super::ids::{BadgeIdv, MemberKey, PatrolId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MemberRecipe {
    /// The individual member record.
    Individual,
    CustomData,
}

/// Attributes whose population is driven by a member-owned recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberField {
    FirstName,
    LastName,
    DateOfBirth,
    Started,
    StartedSection,
    Patrol,
    PatrolRole,
    CustomData,
}

impl MemberField {
    pub fn recipe(&self) -> MemberRecipe {
        match self {
            MemberField::CustomData => MemberRecipe::CustomData,
            _ => MemberRecipe::Individual,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub key: MemberKey,
    pub first_name: Slot<String>,
    pub last_name: Slot<String>,
    pub date_of_birth: Slot<NaiveDate>,
    /// Joined the movement.
    pub started: Slot<NaiveDate>,
    /// Joined this section.
    pub started_section: Slot<NaiveDate>,
    pub patrol_id: Slot<PatrolId>,
    pub patrol_role_level: Slot<i64>,
    pub active: Slot<bool>,
    pub custom_data: Slot<CustomData>,
    pub badge_work: BTreeMap<BadgeIdv, BadgeWork>,
    pub attempts: Attempts<MemberRecipe>,
}

impl Member {
    pub fn skeleton(key: MemberKey) -> Self {
        Self {
            key,
            first_name: Slot::Unset,
            last_name: Slot::Unset,
            date_of_birth: Slot::Unset,
            started: Slot::Unset,
            started_section: Slot::Unset,
            patrol_id: Slot::Unset,
            patrol_role_level: Slot::Unset,
            active: Slot::Unset,
            custom_data: Slot::Unset,
            badge_work: BTreeMap::new(),
            attempts: Attempts::default(),
        }
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new("member", self.key)
    }

    /// Set both names from any source, enforcing that they never change.
    pub(crate) fn assign_names(
        &mut self,
        first: Option<String>,
        last: Option<String>,
    ) -> crate::api::Result<()> {
        let owner = self.entity_ref();
        self.first_name.merge(first, &owner, "first_name")?;
        self.last_name.merge(last, &owner, "last_name")
    }

    /// Observable state of an attribute without its value.
    pub fn presence(&self, field: MemberField) -> Presence {
        let attempted = self.attempts.contains(&field.recipe());
        match field {
            MemberField::FirstName => self.first_name.presence(attempted),
            MemberField::LastName => self.last_name.presence(attempted),
            MemberField::DateOfBirth => self.date_of_birth.presence(attempted),
            MemberField::Started => self.started.presence(attempted),
            MemberField::StartedSection => self.started_section.presence(attempted),
            MemberField::Patrol => self.patrol_id.presence(attempted),
            MemberField::PatrolRole => self.patrol_role_level.presence(attempted),
            MemberField::CustomData => self.custom_data.presence(attempted),
        }
    }

    /// Whether reading `field` would need a remote call.
    pub fn needs(&self, field: MemberField) -> bool {
        self.presence(field) == Presence::Unset
    }

    pub fn custom_data_state(&self) -> FieldState<'_, CustomData> {
        self.custom_data
            .state(self.attempts.contains(&MemberRecipe::CustomData))
    }

    /// Mark everything a recipe would have supplied as unavailable.
    pub(crate) fn mark_unavailable(&mut self, recipe: MemberRecipe) {
        match recipe {
            MemberRecipe::Individual => {
                self.first_name.mark_unavailable();
                self.last_name.mark_unavailable();
                self.date_of_birth.mark_unavailable();
                self.started.mark_unavailable();
                self.started_section.mark_unavailable();
                self.patrol_id.mark_unavailable();
                self.patrol_role_level.mark_unavailable();
            }
            MemberRecipe::CustomData => self.custom_data.mark_unavailable(),
        }
    }

    pub fn full_name(&self) -> String {
        match (self.first_name.get(), self.last_name.get()) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => format!("Member {}", self.key.member),
        }
    }

    pub fn display_name(&self) -> String {
        match (self.first_name.get(), self.last_name.get()) {
            (Some(first), Some(last)) => format!("{}, {}", last, first),
            _ => self.full_name(),
        }
    }

    /// Whole years on `today`, when the date of birth is known.
    pub fn age_on(&self, today: NaiveDate) -> Option<i32> {
        self.date_of_birth.get().map(|dob| {
            let mut age = today.year() - dob.year();
            if (today.month(), today.day()) < (dob.month(), dob.day()) {
                age -= 1;
            }
            age
        })
    }
}
