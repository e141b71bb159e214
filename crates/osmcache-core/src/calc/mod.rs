//! Pure functions over already-populated entities. No caching, no I/O.

mod patrol_levels;
mod skip;
mod terms;

pub use patrol_levels::{patrol_level_abbr, patrol_level_name};
pub use skip::{can_skip, requirement_met, requirement_report, RequirementStatus, SkipRules};
pub use terms::{term_at, TermSpan};
