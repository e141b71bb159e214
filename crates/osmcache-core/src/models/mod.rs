pub mod badge;
pub mod custom_data;
pub mod event;
pub mod ids;
pub mod member;
pub mod patrol;
pub mod section;
pub mod term;

pub use badge::{Badge, BadgeRecipe, BadgeType, BadgeWork, Requirement};
pub use custom_data::{CustomData, CustomDataCategory, CustomDataGroup, FieldValue};
pub use event::{AttendanceStatus, Cost, Event, EventAttendance, EventRecipe};
pub use ids::{
    is_reserved_patrol, BadgeIdv, EventId, MemberId, MemberKey, PatrolId, SectionId, TermId,
    LEADERS_PATROL, YOUNG_LEADERS_PATROL,
};
pub use member::{Member, MemberField, MemberRecipe};
pub use patrol::Patrol;
pub use section::{
    Permissions, Section, SectionRecipe, SectionType, Subscription, PERMISSION_ADMIN,
    PERMISSION_NONE, PERMISSION_READ, PERMISSION_WRITE,
};
pub use term::Term;
