//! Relative endpoints of the remote API, one per populate recipe.

pub const AUTHORISE: &str = "users.php?action=authorise";
pub const LOGOUT: &str = "users.php?action=logout";

pub const ROLES: &str = "api.php?action=getUserRoles";
pub const TERMS: &str = "api.php?action=getTerms";

pub const API_ACCESS: &str = "ext/settings/access/?action=getAPIAccess";
pub const PATROLS: &str = "ext/settings/patrols/?action=get";

pub const MEMBER_LIST: &str = "ext/members/contact/?action=getListOfMembers";
pub const INDIVIDUAL: &str = "ext/members/contact/?action=getIndividual";
pub const CUSTOM_DATA: &str = "ext/customdata/?action=getData";

pub const BADGE_LIST: &str = "ext/badges/records/?action=getBadgeDetails";
pub const BADGE_STRUCTURE: &str = "ext/badges/records/?action=getBadgeStructure";
pub const BADGE_RECORDS: &str = "ext/badges/records/?action=getBadgeRecords";

pub const EVENT_SUMMARY: &str = "ext/events/summary/?action=get";
pub const EVENT_DETAIL: &str = "ext/events/event/?action=getEvent";
pub const ATTENDANCE: &str = "ext/events/event/?action=getAttendance";
pub const SHARING: &str = "ext/events/event/sharing/?action=getStatus";
