//! Member list, individual records and custom data.

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::api::{wire, OsmError, Result};
use crate::cache::Registry;
use crate::models::{
    is_reserved_patrol, CustomData, CustomDataCategory, CustomDataGroup, FieldValue, MemberId,
    MemberKey, PatrolId, SectionId, TermId,
};

use super::{decode, decode_rows};

#[derive(Debug, Deserialize)]
struct MemberList {
    #[serde(default)]
    items: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct MemberRow {
    #[serde(deserialize_with = "wire::id")]
    scoutid: MemberId,
    #[serde(default, deserialize_with = "wire::opt_text")]
    firstname: Option<String>,
    #[serde(default, deserialize_with = "wire::opt_text")]
    lastname: Option<String>,
    #[serde(default, deserialize_with = "wire::opt_date")]
    dob: Option<NaiveDate>,
    #[serde(default, deserialize_with = "wire::opt_id")]
    patrolid: Option<PatrolId>,
    #[serde(default, deserialize_with = "wire::opt_text")]
    patrol: Option<String>,
    #[serde(default, deserialize_with = "wire::opt_id")]
    patrol_role_level: Option<i64>,
    #[serde(default, deserialize_with = "wire::opt_flag")]
    active: Option<bool>,
}

/// Apply the member list of one section and term. Besides the members
/// themselves this names every patrol a member belongs to.
pub(crate) fn apply_member_list(
    registry: &mut Registry,
    section_id: SectionId,
    term_id: TermId,
    endpoint: &str,
    payload: &Value,
) -> Result<Vec<MemberId>> {
    let list: MemberList = decode(endpoint, payload)?;
    let rows: Vec<MemberRow> = decode_rows(endpoint, &list.items);
    let mut ids = Vec::with_capacity(rows.len());

    for row in rows {
        let member = registry.member_mut(MemberKey::new(section_id, row.scoutid));
        let owner = member.entity_ref();
        member.assign_names(row.firstname, row.lastname)?;
        member.date_of_birth.merge(row.dob, &owner, "date_of_birth")?;
        // Patrol and role move between terms; the latest list wins
        member.patrol_id.refresh(row.patrolid);
        member.patrol_role_level.refresh(row.patrol_role_level);
        member.active.refresh(row.active);

        if let (Some(patrol_id), Some(name)) = (row.patrolid, row.patrol) {
            if !is_reserved_patrol(patrol_id) {
                let patrol = registry.patrol_mut(section_id, patrol_id);
                let owner = patrol.entity_ref();
                patrol.name.merge(Some(name), &owner, "name")?;
            }
        }
        ids.push(row.scoutid);
    }

    debug!(section = section_id, term = term_id, count = ids.len(), "Resolved member list");
    registry
        .section_mut(section_id)
        .members
        .insert(term_id, ids.clone());
    Ok(ids)
}

#[derive(Debug, Deserialize)]
struct Individual {
    #[serde(default, deserialize_with = "wire::flag")]
    ok: bool,
    #[serde(default)]
    data: Option<IndividualData>,
}

#[derive(Debug, Deserialize)]
struct IndividualData {
    #[serde(deserialize_with = "wire::id")]
    scoutid: MemberId,
    #[serde(default, deserialize_with = "wire::opt_text")]
    firstname: Option<String>,
    #[serde(default, deserialize_with = "wire::opt_text")]
    lastname: Option<String>,
    #[serde(default, deserialize_with = "wire::opt_date")]
    dob: Option<NaiveDate>,
    #[serde(default, deserialize_with = "wire::opt_date")]
    started: Option<NaiveDate>,
    #[serde(default, deserialize_with = "wire::opt_date")]
    startedsection: Option<NaiveDate>,
    #[serde(default, deserialize_with = "wire::opt_id")]
    patrolid: Option<PatrolId>,
    #[serde(default, deserialize_with = "wire::opt_id")]
    patrol_role_level: Option<i64>,
}

/// Apply an individual member record. Returns `false` when the remote
/// system answered without a record.
pub(crate) fn apply_individual(
    registry: &mut Registry,
    key: MemberKey,
    endpoint: &str,
    payload: &Value,
) -> Result<bool> {
    let record: Individual = decode(endpoint, payload)?;
    let data = match record.data {
        Some(data) if record.ok => data,
        _ => return Ok(false),
    };
    if data.scoutid != key.member {
        return Err(OsmError::invalid(
            endpoint,
            format!("asked for member {}, got {}", key, data.scoutid),
        ));
    }

    let member = registry.member_mut(key);
    let owner = member.entity_ref();
    member.assign_names(data.firstname, data.lastname)?;
    member.date_of_birth.offer(data.dob, &owner, "date_of_birth")?;
    member.started.offer(data.started, &owner, "started")?;
    member
        .started_section
        .offer(data.startedsection, &owner, "started_section")?;
    member.patrol_id.refresh(data.patrolid);
    member.patrol_role_level.refresh(data.patrol_role_level);
    // Fields a record lacks will not appear by asking again
    member.patrol_id.mark_unavailable();
    member.patrol_role_level.mark_unavailable();
    Ok(true)
}

#[derive(Debug, Deserialize)]
struct CustomDataPayload {
    #[serde(default)]
    data: Vec<CustomGroupRow>,
}

#[derive(Debug, Deserialize)]
struct CustomGroupRow {
    #[serde(default)]
    identifier: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    columns: Vec<CustomColumn>,
}

#[derive(Debug, Deserialize)]
struct CustomColumn {
    #[serde(default)]
    varname: String,
    #[serde(default, rename = "type")]
    column_type: String,
    #[serde(default, deserialize_with = "wire::opt_text")]
    value: Option<String>,
}

/// Build a member's custom data. Every listed column is enabled for the
/// section, blank or not; groups of unknown categories are ignored.
pub(crate) fn apply_custom_data(
    registry: &mut Registry,
    key: MemberKey,
    endpoint: &str,
    payload: &Value,
) -> Result<()> {
    let payload: CustomDataPayload = decode(endpoint, payload)?;
    let mut data = CustomData::default();

    for row in payload.data {
        let Some(category) = CustomDataCategory::from_identifier(&row.identifier) else {
            debug!(identifier = %row.identifier, "Ignoring unknown custom data group");
            continue;
        };
        let mut group = CustomDataGroup::new(row.name);
        for column in row.columns.into_iter().filter(|c| !c.varname.is_empty()) {
            match column.value {
                Some(raw) => {
                    let value = FieldValue::from_column(&column.column_type, &raw);
                    group.insert(column.varname, value);
                }
                None => group.enable(column.varname),
            }
        }
        data.insert_group(category, group);
    }

    let member = registry.member_mut(key);
    let owner = member.entity_ref();
    member.custom_data.assign(data, &owner, "custom_data")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MemberField, LEADERS_PATROL};
    use serde_json::json;

    fn list_payload() -> Value {
        json!({"items": [
            {"scoutid": "7", "firstname": "Jo", "lastname": "Smith", "dob": "2016-05-01",
             "patrolid": "12", "patrol": "Red Six", "patrol_role_level": "2", "active": true},
            {"scoutid": 8, "firstname": "Sam", "lastname": "Jones", "patrolid": "-2",
             "patrol": "Leaders", "active": "1"},
            {"total": 2}
        ]})
    }

    #[test]
    fn test_member_list_cross_populates() {
        let mut registry = Registry::new();
        let ids = apply_member_list(&mut registry, 100, 1, "list", &list_payload()).unwrap();
        assert_eq!(ids, vec![7, 8]);
        assert_eq!(registry.section(100).unwrap().members.get(&1), Some(&vec![7, 8]));

        let jo = registry.member(MemberKey::new(100, 7)).unwrap();
        assert_eq!(jo.full_name(), "Jo Smith");
        assert_eq!(jo.patrol_role_level.get(), Some(&2));
        // The individual recipe is still needed for the join dates
        assert!(jo.needs(MemberField::Started));
        assert!(!jo.needs(MemberField::FirstName));

        let patrol = registry.patrol(100, 12).unwrap();
        assert_eq!(patrol.name.get().map(String::as_str), Some("Red Six"));
        let leaders = registry.patrol(100, LEADERS_PATROL).unwrap();
        assert_eq!(leaders.name.get().map(String::as_str), Some("Leaders"));
    }

    #[test]
    fn test_individual_name_conflict_is_fatal() {
        let mut registry = Registry::new();
        apply_member_list(&mut registry, 100, 1, "list", &list_payload()).unwrap();

        let same = json!({"ok": true, "data": {
            "scoutid": 7, "firstname": "Jo ", "lastname": "Smith",
            "started": "2020-01-01", "startedsection": "2024-09-01"
        }});
        assert!(apply_individual(&mut registry, MemberKey::new(100, 7), "ind", &same).unwrap());
        let jo = registry.member(MemberKey::new(100, 7)).unwrap();
        assert_eq!(jo.started.get(), NaiveDate::from_ymd_opt(2020, 1, 1).as_ref());

        let renamed = json!({"ok": true, "data": {
            "scoutid": 7, "firstname": "Jon", "lastname": "Smith"
        }});
        let err =
            apply_individual(&mut registry, MemberKey::new(100, 7), "ind", &renamed).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_individual_for_wrong_member() {
        let mut registry = Registry::new();
        let other = json!({"ok": true, "data": {"scoutid": 9}});
        let err =
            apply_individual(&mut registry, MemberKey::new(100, 7), "ind", &other).unwrap_err();
        assert!(matches!(err, OsmError::InvalidResponse { .. }));

        let empty = json!({"ok": false});
        assert!(!apply_individual(&mut registry, MemberKey::new(100, 7), "ind", &empty).unwrap());
    }

    #[test]
    fn test_custom_data_groups() {
        let mut registry = Registry::new();
        let key = MemberKey::new(100, 7);
        let payload = json!({"data": [
            {"identifier": "doctor", "name": "Doctor's Surgery", "columns": [
                {"varname": "surgery", "label": "Surgery", "type": "text", "value": ""},
                {"varname": "phone1", "label": "Phone", "type": "text", "value": "0123"}
            ]},
            {"identifier": "consents", "name": "Consents", "columns": [
                {"varname": "photographs", "type": "checkbox", "value": "yes"}
            ]},
            {"identifier": "floor_plan", "name": "?", "columns": []}
        ]});
        apply_custom_data(&mut registry, key, "custom", &payload).unwrap();

        let data = registry.member(key).unwrap().custom_data.get().unwrap();
        assert!(data.is_field_enabled(CustomDataCategory::Doctor, "surgery"));
        let doctor = data.group(CustomDataCategory::Doctor).unwrap();
        assert_eq!(doctor.label, "Doctor's Surgery");
        assert_eq!(doctor.text("phone1"), Some("0123"));
        assert!(doctor.get("surgery").is_none());
        let consents = data.group(CustomDataCategory::Consents).unwrap();
        assert_eq!(consents.get("photographs").and_then(FieldValue::as_bool), Some(true));
        assert_eq!(data.categories().count(), 2);
    }
}
