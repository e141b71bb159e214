//! Which badge requirements are met, and which may be skipped.
//!
//! Some badges ask for "any N of" the requirements in an area. The remote
//! system does not say which, so those areas are listed in a fixed table.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::models::{Badge, BadgeWork, SectionType};

/// Global override table, built on first use.
static BUILTIN: OnceLock<SkipRules> = OnceLock::new();

/// (section type, badge name, area) -> number of met requirements in that
/// area that make the rest optional.
const BUILTIN_ENTRIES: &[(SectionType, &str, &str, usize)] = &[
    (SectionType::Beavers, "Outdoors", "a", 2),
    (SectionType::Beavers, "Personal Challenge", "a", 1),
    (SectionType::Cubs, "Outdoors", "b", 2),
    (SectionType::Cubs, "Personal Challenge", "a", 1),
    (SectionType::Scouts, "Outdoor Challenge", "a", 3),
    (SectionType::Scouts, "Adventure Challenge", "b", 2),
];

#[derive(Debug, Clone, Default)]
pub struct SkipRules {
    minimums: HashMap<SectionType, HashMap<String, HashMap<String, usize>>>,
}

impl SkipRules {
    pub fn builtin() -> &'static SkipRules {
        BUILTIN.get_or_init(|| {
            SkipRules::from_entries(
                BUILTIN_ENTRIES
                    .iter()
                    .map(|(t, badge, area, min)| (*t, *badge, *area, *min)),
            )
        })
    }

    pub fn from_entries<'a>(
        entries: impl IntoIterator<Item = (SectionType, &'a str, &'a str, usize)>,
    ) -> Self {
        let mut minimums: HashMap<SectionType, HashMap<String, HashMap<String, usize>>> =
            HashMap::new();
        for (section_type, badge, area, minimum) in entries {
            minimums
                .entry(section_type)
                .or_default()
                .entry(badge.to_string())
                .or_default()
                .insert(area.to_string(), minimum);
        }
        Self { minimums }
    }

    /// Lookup misses at any level mean there is no override.
    pub fn minimum(&self, section_type: SectionType, badge: &str, area: &str) -> Option<usize> {
        self.minimums
            .get(&section_type)?
            .get(badge)?
            .get(area)
            .copied()
    }
}

/// A requirement is met when the badge is already completed or awarded,
/// or a leader has entered progress that does not start with `x`.
pub fn requirement_met(work: Option<&BadgeWork>, field_id: &str) -> bool {
    let Some(work) = work else {
        return false;
    };
    if work.is_finished() {
        return true;
    }
    work.progress_for(field_id)
        .map(|text| !text.is_empty() && !text.starts_with('x'))
        .unwrap_or(false)
}

/// Whether enough other requirements in the same area are met for
/// `field_id` to be optional. An unknown section type has no overrides.
pub fn can_skip(
    rules: &SkipRules,
    section_type: Option<SectionType>,
    badge: &Badge,
    work: Option<&BadgeWork>,
    field_id: &str,
) -> bool {
    let (Some(name), Some(requirement)) = (badge.name.get(), badge.requirement(field_id)) else {
        return false;
    };
    let Some(minimum) =
        section_type.and_then(|t| rules.minimum(t, name, &requirement.area))
    else {
        return false;
    };
    let others_met = badge
        .requirements
        .get()
        .into_iter()
        .flatten()
        .filter(|r| r.area == requirement.area && r.field_id != field_id)
        .filter(|r| requirement_met(work, &r.field_id))
        .count();
    others_met >= minimum
}

/// Per-requirement outcome for one member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementStatus {
    pub field_id: String,
    pub area: String,
    pub met: bool,
    /// Not met, but optional given the rest of the area.
    pub skippable: bool,
}

impl RequirementStatus {
    pub fn is_satisfied(&self) -> bool {
        self.met || self.skippable
    }
}

/// Evaluate every requirement of a badge for one member, in badge order.
pub fn requirement_report(
    rules: &SkipRules,
    section_type: Option<SectionType>,
    badge: &Badge,
    work: Option<&BadgeWork>,
) -> Vec<RequirementStatus> {
    badge
        .requirements
        .get()
        .into_iter()
        .flatten()
        .map(|r| {
            let met = requirement_met(work, &r.field_id);
            RequirementStatus {
                field_id: r.field_id.clone(),
                area: r.area.clone(),
                met,
                skippable: !met && can_skip(rules, section_type, badge, work, &r.field_id),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BadgeIdv, Requirement};

    fn outdoors() -> Badge {
        let mut badge = Badge::skeleton(BadgeIdv::new(93, 0));
        let owner = badge.entity_ref();
        badge.name.assign("Outdoors".to_string(), &owner, "name").unwrap();
        let mut reqs = Vec::new();
        for i in 1..=7 {
            reqs.push(Requirement {
                field_id: format!("a{}", i),
                name: format!("A{}", i),
                description: "Do it".to_string(),
                area: "a".to_string(),
            });
        }
        reqs.push(Requirement {
            field_id: "b1".to_string(),
            name: "B1".to_string(),
            description: "Do it".to_string(),
            area: "b".to_string(),
        });
        badge.requirements.assign(reqs, &owner, "requirements").unwrap();
        badge
    }

    fn work(progress: &[(&str, &str)]) -> BadgeWork {
        BadgeWork {
            progress: progress
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..BadgeWork::default()
        }
    }

    #[test]
    fn test_requirement_met() {
        let w = work(&[("a1", "done"), ("a2", "x - missed"), ("a3", ""), ("a4", "X caps")]);
        assert!(requirement_met(Some(&w), "a1"));
        assert!(!requirement_met(Some(&w), "a2"));
        assert!(!requirement_met(Some(&w), "a3"));
        // Only a lowercase x marks an entry as not done
        assert!(requirement_met(Some(&w), "a4"));
        assert!(!requirement_met(Some(&w), "a5"));
        assert!(!requirement_met(None, "a1"));

        let finished = BadgeWork {
            awarded: true,
            ..BadgeWork::default()
        };
        assert!(requirement_met(Some(&finished), "a5"));
    }

    #[test]
    fn test_can_skip_with_enough_others_in_area() {
        let rules = SkipRules::from_entries([(SectionType::Beavers, "Outdoors", "a", 2)]);
        let badge = outdoors();
        let w = work(&[("a1", "yes"), ("a2", "yes")]);

        assert!(can_skip(&rules, Some(SectionType::Beavers), &badge, Some(&w), "a3"));
        assert!(!can_skip(&rules, Some(SectionType::Beavers), &badge, Some(&w), "b1"));
        // No entry for another section type
        assert!(!can_skip(&rules, Some(SectionType::Cubs), &badge, Some(&w), "a3"));

        let one = work(&[("a1", "yes")]);
        assert!(!can_skip(&rules, Some(SectionType::Beavers), &badge, Some(&one), "a3"));
    }

    #[test]
    fn test_builtin_table() {
        let rules = SkipRules::builtin();
        assert_eq!(rules.minimum(SectionType::Beavers, "Outdoors", "a"), Some(2));
        assert_eq!(rules.minimum(SectionType::Beavers, "Outdoors", "z"), None);
        assert_eq!(rules.minimum(SectionType::Adults, "Outdoors", "a"), None);
        assert!(std::ptr::eq(rules, SkipRules::builtin()));
    }

    #[test]
    fn test_requirement_report() {
        let badge = outdoors();
        let w = work(&[("a1", "yes"), ("a2", "yes")]);
        let report =
            requirement_report(SkipRules::builtin(), Some(SectionType::Beavers), &badge, Some(&w));
        assert_eq!(report.len(), 8);
        assert!(report[0].met && !report[0].skippable);
        assert!(!report[2].met && report[2].skippable);
        assert!(report[2].is_satisfied());
        assert!(!report[7].is_satisfied());
    }

    #[test]
    fn test_report_without_section_type_has_no_skips() {
        let badge = outdoors();
        let w = work(&[("a1", "yes"), ("a2", "yes")]);
        let report = requirement_report(SkipRules::builtin(), None, &badge, Some(&w));
        assert_eq!(report.len(), 8);
        assert!(report[0].met && report[1].met);
        assert!(report.iter().all(|status| !status.skippable));
        assert!(!can_skip(SkipRules::builtin(), None, &badge, Some(&w), "a3"));
    }
}
