//! Connection-scoped identity maps.
//!
//! Every entity is reached through the registry, so there is exactly one
//! instance per remote identifier until the registry is cleared. Entities
//! refer to each other by id only; the registry is the sole owner.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{
    Badge, BadgeIdv, Event, EventId, Member, MemberId, MemberKey, Patrol, PatrolId, Section,
    SectionId, Term, TermId, LEADERS_PATROL, YOUNG_LEADERS_PATROL,
};

use super::slot::Slot;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registry {
    sections: BTreeMap<SectionId, Section>,
    terms: BTreeMap<TermId, Term>,
    /// Members are only unique within a section.
    members: BTreeMap<SectionId, BTreeMap<MemberId, Member>>,
    patrols: BTreeMap<SectionId, BTreeMap<PatrolId, Patrol>>,
    badges: BTreeMap<BadgeIdv, Badge>,
    events: BTreeMap<EventId, Event>,
    /// Bumped on every `clear()`.
    epoch: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Drop every cached entity and every record of attempted recipes.
    pub fn clear(&mut self) {
        let epoch = self.epoch + 1;
        *self = Self {
            epoch,
            ..Self::default()
        };
        debug!(epoch, "Entity registry cleared");
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
            && self.terms.is_empty()
            && self.members.is_empty()
            && self.patrols.is_empty()
            && self.badges.is_empty()
            && self.events.is_empty()
    }

    // ===== Sections =====

    pub fn section_mut(&mut self, id: SectionId) -> &mut Section {
        if !self.sections.contains_key(&id) {
            self.seed_reserved_patrols(id);
        }
        self.sections
            .entry(id)
            .or_insert_with(|| Section::skeleton(id))
    }

    pub fn section(&self, id: SectionId) -> Option<&Section> {
        self.sections.get(&id)
    }

    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.values()
    }

    pub fn section_ids(&self) -> Vec<SectionId> {
        self.sections.keys().copied().collect()
    }

    // ===== Terms =====

    pub fn term_mut(&mut self, id: TermId) -> &mut Term {
        self.terms.entry(id).or_insert_with(|| Term::skeleton(id))
    }

    pub fn term(&self, id: TermId) -> Option<&Term> {
        self.terms.get(&id)
    }

    // ===== Members =====

    pub fn member_mut(&mut self, key: MemberKey) -> &mut Member {
        self.members
            .entry(key.section)
            .or_default()
            .entry(key.member)
            .or_insert_with(|| Member::skeleton(key))
    }

    pub fn member(&self, key: MemberKey) -> Option<&Member> {
        self.members.get(&key.section)?.get(&key.member)
    }

    /// All members seen so far in one section, in id order.
    pub fn section_members(&self, section: SectionId) -> impl Iterator<Item = &Member> {
        self.members.get(&section).into_iter().flat_map(|m| m.values())
    }

    // ===== Patrols =====

    pub fn patrol_mut(&mut self, section: SectionId, id: PatrolId) -> &mut Patrol {
        self.section_mut(section);
        self.patrols
            .entry(section)
            .or_default()
            .entry(id)
            .or_insert_with(|| Patrol::skeleton(section, id))
    }

    pub fn patrol(&self, section: SectionId, id: PatrolId) -> Option<&Patrol> {
        self.patrols.get(&section)?.get(&id)
    }

    /// The leaders and young leaders patrols exist in every section and are
    /// never described by the remote patrol list.
    fn seed_reserved_patrols(&mut self, section: SectionId) {
        let patrols = self.patrols.entry(section).or_default();
        for id in [LEADERS_PATROL, YOUNG_LEADERS_PATROL] {
            let patrol = patrols
                .entry(id)
                .or_insert_with(|| Patrol::skeleton(section, id));
            if let Some(name) = Patrol::reserved_name(id) {
                patrol.name = Slot::Set(name.to_string());
            }
        }
    }

    // ===== Badges =====

    pub fn badge_mut(&mut self, idv: BadgeIdv) -> &mut Badge {
        self.badges
            .entry(idv)
            .or_insert_with(|| Badge::skeleton(idv))
    }

    pub fn badge(&self, idv: BadgeIdv) -> Option<&Badge> {
        self.badges.get(&idv)
    }

    // ===== Events =====

    pub fn event_mut(&mut self, id: EventId) -> &mut Event {
        self.events.entry(id).or_insert_with(|| Event::skeleton(id))
    }

    pub fn event(&self, id: EventId) -> Option<&Event> {
        self.events.get(&id)
    }
}
