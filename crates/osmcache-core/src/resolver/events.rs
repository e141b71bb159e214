//! Event summaries, event detail, attendance and cross-section sharing.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::api::{wire, OsmError, Result};
use crate::cache::Registry;
use crate::models::{
    AttendanceStatus, Cost, Event, EventAttendance, EventId, MemberId, MemberKey, SectionId,
    TermId,
};

use super::{decode, decode_rows, scalar_text};

#[derive(Debug, Deserialize)]
struct ItemList {
    #[serde(default)]
    items: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct EventRow {
    #[serde(deserialize_with = "wire::id")]
    eventid: EventId,
    #[serde(default, deserialize_with = "wire::opt_id")]
    sectionid: Option<SectionId>,
    #[serde(default, deserialize_with = "wire::opt_text")]
    name: Option<String>,
    #[serde(default, deserialize_with = "wire::opt_date")]
    startdate: Option<NaiveDate>,
    #[serde(default, deserialize_with = "wire::opt_date")]
    enddate: Option<NaiveDate>,
    #[serde(default, deserialize_with = "wire::opt_text")]
    cost: Option<String>,
    #[serde(default, deserialize_with = "wire::opt_text")]
    location: Option<String>,
    #[serde(default, deserialize_with = "wire::opt_text")]
    notes: Option<String>,
}

impl EventRow {
    fn cost(&self) -> Option<Cost> {
        self.cost.as_deref().and_then(Cost::parse)
    }
}

/// Apply the event summary list of a section and term.
pub(crate) fn apply_event_summary(
    registry: &mut Registry,
    section_id: SectionId,
    term_id: TermId,
    endpoint: &str,
    payload: &Value,
) -> Result<Vec<EventId>> {
    let list: ItemList = decode(endpoint, payload)?;
    let rows: Vec<EventRow> = decode_rows(endpoint, &list.items);
    let mut ids = Vec::with_capacity(rows.len());

    for row in rows {
        let cost = row.cost();
        let event = registry.event_mut(row.eventid);
        let owner = event.entity_ref();
        event
            .section_id
            .assign(row.sectionid.unwrap_or(section_id), &owner, "section_id")?;
        event.name.merge(row.name, &owner, "name")?;
        event.start.merge(row.startdate, &owner, "start")?;
        event.end.merge(row.enddate, &owner, "end")?;
        event.location.merge(row.location, &owner, "location")?;
        event.cost.merge(cost, &owner, "cost")?;
        ids.push(row.eventid);
    }

    debug!(section = section_id, term = term_id, count = ids.len(), "Resolved event summary");
    registry.section_mut(section_id).events.insert(term_id, ids.clone());
    Ok(ids)
}

/// Apply the full record of one event.
pub(crate) fn apply_event_detail(
    registry: &mut Registry,
    event_id: EventId,
    endpoint: &str,
    payload: &Value,
) -> Result<()> {
    let row: EventRow = decode(endpoint, payload)?;
    if row.eventid != event_id {
        return Err(OsmError::invalid(
            endpoint,
            format!("asked for event {}, got {}", event_id, row.eventid),
        ));
    }

    let cost = row.cost();
    let event = registry.event_mut(event_id);
    let owner = event.entity_ref();
    event.section_id.merge(row.sectionid, &owner, "section_id")?;
    event.name.offer(row.name, &owner, "name")?;
    event.start.offer(row.startdate, &owner, "start")?;
    event.end.offer(row.enddate, &owner, "end")?;
    event.location.offer(row.location, &owner, "location")?;
    event.notes.offer(row.notes, &owner, "notes")?;
    event.cost.offer(cost, &owner, "cost")
}

#[derive(Debug, Deserialize)]
struct AttendanceRow {
    #[serde(deserialize_with = "wire::id")]
    scoutid: MemberId,
    #[serde(default, deserialize_with = "wire::opt_text")]
    firstname: Option<String>,
    #[serde(default, deserialize_with = "wire::opt_text")]
    lastname: Option<String>,
    #[serde(default, deserialize_with = "wire::opt_text")]
    attending: Option<String>,
    /// Custom columns arrive as `"f_<n>"` keys.
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

/// Apply the attendance of one event. Members are resolved in the event's
/// owning section.
pub(crate) fn apply_attendance(
    registry: &mut Registry,
    event_id: EventId,
    section_id: SectionId,
    endpoint: &str,
    payload: &Value,
) -> Result<()> {
    let list: ItemList = decode(endpoint, payload)?;
    let rows: Vec<AttendanceRow> = decode_rows(endpoint, &list.items);
    let mut attendance = BTreeMap::new();

    for row in rows {
        let member = registry.member_mut(MemberKey::new(section_id, row.scoutid));
        member.assign_names(row.firstname, row.lastname)?;

        let columns = row
            .extra
            .iter()
            .filter(|(key, _)| key.starts_with("f_"))
            .filter_map(|(key, value)| Some((key.clone(), scalar_text(value)?)))
            .collect();
        let status = row
            .attending
            .as_deref()
            .map(AttendanceStatus::from_api)
            .unwrap_or(AttendanceStatus::Unknown);
        attendance.insert(row.scoutid, EventAttendance { status, columns });
    }

    let event = registry.event_mut(event_id);
    let owner = event.entity_ref();
    event.attendance.assign(attendance, &owner, "attendance")
}

#[derive(Debug, Deserialize)]
struct SharingRow {
    #[serde(deserialize_with = "wire::id")]
    sectionid: SectionId,
    #[serde(default, deserialize_with = "wire::opt_text")]
    sectionname: Option<String>,
    #[serde(default, deserialize_with = "wire::opt_id")]
    eventid: Option<EventId>,
    #[serde(default, deserialize_with = "wire::opt_text")]
    status: Option<String>,
}

/// Apply the sharing status of an event: the equivalent events in other
/// sections are created (or found) and linked, and those sections named.
pub(crate) fn apply_sharing(
    registry: &mut Registry,
    event_id: EventId,
    endpoint: &str,
    payload: &Value,
) -> Result<Vec<EventId>> {
    let list: ItemList = decode(endpoint, payload)?;
    let rows: Vec<SharingRow> = decode_rows(endpoint, &list.items);
    let mut links = Vec::new();

    for row in rows {
        let section = registry.section_mut(row.sectionid);
        let owner = section.entity_ref();
        section.name.merge(row.sectionname, &owner, "name")?;

        let Some(linked_id) = row.eventid.filter(|id| *id != event_id) else {
            continue;
        };
        let linked: &mut Event = registry.event_mut(linked_id);
        let owner = linked.entity_ref();
        linked.section_id.assign(row.sectionid, &owner, "section_id")?;
        debug!(event = event_id, linked = linked_id, status = ?row.status, "Linked shared event");
        if !links.contains(&linked_id) {
            links.push(linked_id);
        }
    }

    let event = registry.event_mut(event_id);
    let owner = event.entity_ref();
    event.links.assign(links.clone(), &owner, "links")?;
    Ok(links)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_summary_then_detail() {
        let mut registry = Registry::new();
        let summary = json!({"items": [
            {"eventid": "55", "name": "Summer Camp", "startdate": "2027-07-01",
             "enddate": "2027-07-04",
             "cost": "-1.00", "location": "Gilwell"},
            {"eventid": "56", "name": "Hike", "startdate": "2027-03-01", "cost": "2.50"}
        ]});
        let ids = apply_event_summary(&mut registry, 100, 1, "summary", &summary).unwrap();
        assert_eq!(ids, vec![55, 56]);

        let camp = registry.event(55).unwrap();
        assert_eq!(camp.cost.get(), Some(&Cost::ToBeAnnounced));
        assert_eq!(camp.section_id.get(), Some(&100));
        assert!(camp.notes.is_unset());
        assert_eq!(registry.event(56).unwrap().cost.get(), Some(&Cost::Amount(250)));

        let detail = json!({"eventid": 55, "sectionid": "100", "name": "Summer Camp",
            "startdate": "2027-07-01", "enddate": "2027-07-04", "cost": "-1", "location": "Gilwell",
            "notes": "Bring a torch"});
        apply_event_detail(&mut registry, 55, "detail", &detail).unwrap();
        let camp = registry.event(55).unwrap();
        assert_eq!(camp.notes.get().map(String::as_str), Some("Bring a torch"));
    }

    #[test]
    fn test_attendance_names_members() {
        let mut registry = Registry::new();
        let payload = json!({"items": [
            {"scoutid": "7", "firstname": "Jo", "lastname": "Smith", "attending": "Yes",
             "f_1": "Veggie", "f_2": ""},
            {"scoutid": "8", "firstname": "Sam", "lastname": "Jones", "attending": ""}
        ]});
        apply_attendance(&mut registry, 55, 100, "attendance", &payload).unwrap();

        let event = registry.event(55).unwrap();
        let attendance = event.attendance.get().unwrap();
        assert_eq!(attendance[&7].status, AttendanceStatus::Yes);
        assert_eq!(attendance[&7].columns.get("f_1").map(String::as_str), Some("Veggie"));
        assert!(!attendance[&7].columns.contains_key("f_2"));
        assert_eq!(attendance[&8].status, AttendanceStatus::Unknown);
        assert_eq!(event.attending_count(), Some(1));
        assert_eq!(
            registry.member(MemberKey::new(100, 8)).map(|m| m.full_name()),
            Some("Sam Jones".to_string())
        );
    }

    #[test]
    fn test_sharing_links_other_sections() {
        let mut registry = Registry::new();
        let payload = json!({"items": [
            {"sectionid": "100", "sectionname": "Red Cubs", "eventid": "55", "status": "Owner"},
            {"sectionid": "200", "sectionname": "Blue Beavers", "eventid": "77",
             "status": "Accepted"},
            {"sectionid": "300", "sectionname": "Scouts", "eventid": "", "status": "Pending"}
        ]});
        let links = apply_sharing(&mut registry, 55, "sharing", &payload).unwrap();
        assert_eq!(links, vec![77]);

        assert_eq!(registry.event(77).unwrap().section_id.get(), Some(&200));
        assert_eq!(
            registry.section(300).unwrap().name.get().map(String::as_str),
            Some("Scouts")
        );
        assert_eq!(registry.event(55).unwrap().links.get(), Some(&vec![77]));
    }
}
