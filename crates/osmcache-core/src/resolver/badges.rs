//! Badge lists, badge structure and per-member badge records.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::{wire, Result};
use crate::cache::Registry;
use crate::models::{
    Badge, BadgeIdv, BadgeType, BadgeWork, MemberId, MemberKey, Requirement, SectionId, TermId,
};

use super::{decode, decode_rows, scalar_text};

#[derive(Debug, Deserialize)]
struct BadgeList {
    #[serde(default)]
    data: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct BadgeRow {
    #[serde(deserialize_with = "wire::id")]
    badge_id: i64,
    #[serde(default, deserialize_with = "wire::opt_id")]
    badge_version: Option<i64>,
    #[serde(default, deserialize_with = "wire::opt_text")]
    name: Option<String>,
    #[serde(default, deserialize_with = "wire::opt_text")]
    group_name: Option<String>,
    #[serde(default, deserialize_with = "wire::opt_id")]
    type_id: Option<i64>,
}

impl BadgeRow {
    fn idv(&self) -> BadgeIdv {
        BadgeIdv::new(self.badge_id, self.badge_version.unwrap_or(0))
    }
}

fn apply_badge_row(
    badge: &mut Badge,
    row: BadgeRow,
    fallback_type: Option<BadgeType>,
) -> Result<()> {
    let owner = badge.entity_ref();
    badge.name.merge(row.name, &owner, "name")?;
    badge.group_name.merge(row.group_name, &owner, "group_name")?;
    let badge_type = row.type_id.and_then(BadgeType::from_type_id).or(fallback_type);
    badge.badge_type.merge(badge_type, &owner, "badge_type")
}

/// Apply the badges of one type available to a section in a term.
pub(crate) fn apply_badge_list(
    registry: &mut Registry,
    section_id: SectionId,
    term_id: TermId,
    badge_type: BadgeType,
    endpoint: &str,
    payload: &Value,
) -> Result<Vec<BadgeIdv>> {
    let list: BadgeList = decode(endpoint, payload)?;
    let rows: Vec<BadgeRow> = decode_rows(endpoint, &list.data);
    let mut idvs = Vec::with_capacity(rows.len());

    for row in rows {
        let idv = row.idv();
        apply_badge_row(registry.badge_mut(idv), row, Some(badge_type))?;
        idvs.push(idv);
    }

    debug!(
        section = section_id,
        term = term_id,
        %badge_type,
        count = idvs.len(),
        "Resolved badge list"
    );
    registry
        .section_mut(section_id)
        .add_badges(term_id, idvs.iter().copied());
    Ok(idvs)
}

#[derive(Debug, Deserialize)]
struct Structure {
    #[serde(default)]
    details: Option<BadgeRow>,
    #[serde(default)]
    requirements: Vec<RequirementRow>,
}

#[derive(Debug, Deserialize)]
struct RequirementRow {
    #[serde(default, deserialize_with = "wire::opt_text")]
    field: Option<String>,
    #[serde(default, deserialize_with = "wire::opt_text")]
    name: Option<String>,
    #[serde(default, deserialize_with = "wire::opt_text")]
    tooltip: Option<String>,
    #[serde(default, deserialize_with = "wire::opt_text")]
    module: Option<String>,
}

impl RequirementRow {
    /// Rows without a description are layout columns, not requirements.
    fn into_requirement(self) -> Option<Requirement> {
        let description = self.tooltip?;
        let field_id = self.field?;
        Some(Requirement {
            name: self.name.unwrap_or_else(|| field_id.clone()),
            field_id,
            description,
            area: self.module.unwrap_or_default(),
        })
    }
}

/// Apply a badge's metadata and requirement list.
pub(crate) fn apply_badge_structure(
    registry: &mut Registry,
    idv: BadgeIdv,
    endpoint: &str,
    payload: &Value,
) -> Result<()> {
    let structure: Structure = decode(endpoint, payload)?;
    let badge = registry.badge_mut(idv);

    if let Some(details) = structure.details {
        if details.idv() != idv {
            warn!(
                requested = %idv,
                returned = %details.idv(),
                "Badge structure for a different version"
            );
        } else {
            apply_badge_row(badge, details, None)?;
        }
    }

    let requirements: Vec<Requirement> = structure
        .requirements
        .into_iter()
        .filter_map(RequirementRow::into_requirement)
        .collect();
    let owner = badge.entity_ref();
    badge.requirements.assign(requirements, &owner, "requirements")
}

#[derive(Debug, Deserialize)]
struct RecordList {
    #[serde(default)]
    items: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RecordRow {
    #[serde(deserialize_with = "wire::id")]
    scoutid: MemberId,
    #[serde(default, deserialize_with = "wire::opt_text")]
    firstname: Option<String>,
    #[serde(default, deserialize_with = "wire::opt_text")]
    lastname: Option<String>,
    #[serde(default, deserialize_with = "wire::flag")]
    completed: bool,
    #[serde(default, deserialize_with = "wire::flag")]
    awarded: bool,
    #[serde(default, deserialize_with = "wire::opt_date")]
    awardeddate: Option<NaiveDate>,
    /// Requirement progress arrives as `"_<field id>"` keys.
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

impl RecordRow {
    fn progress(&self) -> BTreeMap<String, String> {
        self.extra
            .iter()
            .filter_map(|(key, value)| {
                let field_id = key.strip_prefix('_')?;
                Some((field_id.to_string(), scalar_text(value)?))
            })
            .collect()
    }
}

/// Apply every member's work on one badge. Names on the rows are checked
/// against what is already cached.
pub(crate) fn apply_badge_records(
    registry: &mut Registry,
    section_id: SectionId,
    idv: BadgeIdv,
    endpoint: &str,
    payload: &Value,
) -> Result<Vec<MemberId>> {
    let list: RecordList = decode(endpoint, payload)?;
    let rows: Vec<RecordRow> = decode_rows(endpoint, &list.items);
    let mut ids = Vec::with_capacity(rows.len());

    for row in rows {
        let work = BadgeWork {
            completed: row.completed,
            awarded: row.awarded,
            awarded_date: row.awardeddate,
            progress: row.progress(),
        };
        let member = registry.member_mut(MemberKey::new(section_id, row.scoutid));
        member.assign_names(row.firstname, row.lastname)?;
        member.badge_work.insert(idv, work);
        ids.push(row.scoutid);
    }

    debug!(section = section_id, badge = %idv, count = ids.len(), "Resolved badge records");
    Ok(ids)
}
