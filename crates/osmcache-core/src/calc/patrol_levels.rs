//! Human labels for patrol role levels.

use crate::models::SectionType;

/// Short label for a patrol role level, `""` when the section type has no
/// such level.
pub fn patrol_level_abbr(section_type: SectionType, level: i64) -> &'static str {
    match (section_type, level) {
        (SectionType::Beavers, 1) => "ALL",
        (SectionType::Beavers, 2) => "LL",
        (SectionType::Cubs, 1) => "2nd",
        (SectionType::Cubs, 2) => "6er",
        (SectionType::Cubs, 3) => "S6er",
        (SectionType::Scouts, 1) => "APL",
        (SectionType::Scouts, 2) => "PL",
        (SectionType::Scouts, 3) => "SPL",
        _ => "",
    }
}

/// Full title for a patrol role level, `""` when unknown.
pub fn patrol_level_name(section_type: SectionType, level: i64) -> &'static str {
    match (section_type, level) {
        (SectionType::Beavers, 1) => "Assistant Lodge Leader",
        (SectionType::Beavers, 2) => "Lodge Leader",
        (SectionType::Cubs, 1) => "Seconder",
        (SectionType::Cubs, 2) => "Sixer",
        (SectionType::Cubs, 3) => "Senior Sixer",
        (SectionType::Scouts, 1) => "Assistant Patrol Leader",
        (SectionType::Scouts, 2) => "Patrol Leader",
        (SectionType::Scouts, 3) => "Senior Patrol Leader",
        _ => "",
    }
}
