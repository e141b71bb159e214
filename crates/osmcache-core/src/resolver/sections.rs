//! Roles, terms, API access and patrols: the section-level payloads.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::api::{wire, OsmError, Result};
use crate::cache::Registry;
use crate::models::{
    is_reserved_patrol, Permissions, SectionId, SectionType, Subscription, TermId,
    LEADERS_PATROL, YOUNG_LEADERS_PATROL,
};

use super::{decode, decode_rows, permission_levels, rows_of};

#[derive(Debug, Deserialize)]
struct RoleRow {
    #[serde(deserialize_with = "wire::id")]
    sectionid: SectionId,
    #[serde(default, deserialize_with = "wire::opt_text")]
    sectionname: Option<String>,
    #[serde(default, deserialize_with = "wire::opt_text")]
    section: Option<String>,
    #[serde(default, deserialize_with = "wire::opt_text")]
    groupname: Option<String>,
    #[serde(default, deserialize_with = "wire::opt_id")]
    groupid: Option<i64>,
    #[serde(default, rename = "isDefault", deserialize_with = "wire::flag")]
    is_default: bool,
    #[serde(default)]
    permissions: Value,
    /// Either an object or a JSON document embedded in a string.
    #[serde(default, rename = "sectionConfig")]
    section_config: Value,
}

#[derive(Debug, Default, Deserialize)]
struct SectionConfig {
    #[serde(default, deserialize_with = "wire::opt_id")]
    subscription_level: Option<i64>,
    #[serde(default, deserialize_with = "wire::opt_date")]
    subscription_expires: Option<NaiveDate>,
}

fn subscription(raw: &Value) -> Option<Subscription> {
    let config: SectionConfig = match raw {
        Value::String(s) => serde_json::from_str(s).ok()?,
        Value::Object(_) => SectionConfig::deserialize(raw).ok()?,
        _ => return None,
    };
    Some(Subscription {
        level: config.subscription_level?,
        expires: config.subscription_expires,
    })
}

/// What the roles call says about the connection as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Roles {
    pub sections: Vec<SectionId>,
    pub default: Option<SectionId>,
}

/// Populate every section the user holds a role in. Sections cached from
/// other payloads but missing here get their role attributes marked
/// unavailable.
pub(crate) fn apply_roles(
    registry: &mut Registry,
    endpoint: &str,
    payload: &Value,
) -> Result<Roles> {
    let rows: Vec<RoleRow> = decode_rows(endpoint, rows_of(payload));
    let mut roles = Roles::default();

    for row in rows {
        let section = registry.section_mut(row.sectionid);
        let owner = section.entity_ref();
        section.name.offer(row.sectionname, &owner, "name")?;
        section.group_name.offer(row.groupname, &owner, "group_name")?;
        section.group_id.offer(row.groupid, &owner, "group_id")?;
        let section_type = row.section.as_deref().and_then(SectionType::from_api);
        section.section_type.offer(section_type, &owner, "section_type")?;
        section.user_permissions.offer(
            permission_levels(&row.permissions).map(Permissions::new),
            &owner,
            "user_permissions",
        )?;
        section
            .subscription
            .offer(subscription(&row.section_config), &owner, "subscription")?;

        if row.is_default && roles.default.is_none() {
            roles.default = Some(row.sectionid);
        }
        roles.sections.push(row.sectionid);
    }

    for id in registry.section_ids() {
        if !roles.sections.contains(&id) {
            registry.section_mut(id).mark_roles_unavailable();
        }
    }

    debug!(count = roles.sections.len(), default = ?roles.default, "Resolved roles");
    Ok(roles)
}

#[derive(Debug, Deserialize)]
struct TermRow {
    #[serde(deserialize_with = "wire::id")]
    termid: TermId,
    #[serde(default, deserialize_with = "wire::opt_id")]
    sectionid: Option<SectionId>,
    #[serde(default, deserialize_with = "wire::opt_text")]
    name: Option<String>,
    #[serde(default, deserialize_with = "wire::opt_date")]
    startdate: Option<NaiveDate>,
    #[serde(default, deserialize_with = "wire::opt_date")]
    enddate: Option<NaiveDate>,
}

/// One call returns the terms of every section, keyed by section id.
pub(crate) fn apply_terms(registry: &mut Registry, endpoint: &str, payload: &Value) -> Result<()> {
    let by_section = match payload {
        Value::Object(map) => map,
        // No sections at all comes back as an empty list
        Value::Array(items) if items.is_empty() => {
            mark_terms_unavailable(registry, &BTreeSet::new());
            return Ok(());
        }
        other => return Err(OsmError::invalid(endpoint, format!("expected object, got {}", other))),
    };

    let mut seen = BTreeSet::new();
    for (key, rows) in by_section {
        let section_id: SectionId = key
            .trim()
            .parse()
            .map_err(|e| OsmError::invalid(endpoint, format!("section key '{}': {}", key, e)))?;
        let rows: Vec<TermRow> = match rows {
            Value::Array(items) => decode_rows(endpoint, items),
            _ => Vec::new(),
        };

        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            let term = registry.term_mut(row.termid);
            let owner = term.entity_ref();
            term.section_id
                .assign(row.sectionid.unwrap_or(section_id), &owner, "section_id")?;
            term.name.offer(row.name, &owner, "name")?;
            term.start.offer(row.startdate, &owner, "start")?;
            term.end.offer(row.enddate, &owner, "end")?;
            ids.push(row.termid);
        }

        let section = registry.section_mut(section_id);
        let owner = section.entity_ref();
        section.terms.assign(ids, &owner, "terms")?;
        seen.insert(section_id);
    }

    mark_terms_unavailable(registry, &seen);
    Ok(())
}

fn mark_terms_unavailable(registry: &mut Registry, seen: &BTreeSet<SectionId>) {
    for id in registry.section_ids() {
        if !seen.contains(&id) {
            registry.section_mut(id).terms.mark_unavailable();
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiAccess {
    #[serde(default)]
    apis: Vec<ApiGrant>,
}

#[derive(Debug, Deserialize)]
struct ApiGrant {
    #[serde(default, deserialize_with = "wire::opt_text")]
    apiid: Option<String>,
    #[serde(default)]
    permissions: Value,
}

/// Record what the section has granted this application. A section that
/// has not granted anything leaves the permissions unavailable.
pub(crate) fn apply_api_access(
    registry: &mut Registry,
    section_id: SectionId,
    app_id: &str,
    endpoint: &str,
    payload: &Value,
) -> Result<()> {
    let access: ApiAccess = decode(endpoint, payload)?;
    let grant = access
        .apis
        .iter()
        .find(|g| g.apiid.as_deref() == Some(app_id))
        .and_then(|g| permission_levels(&g.permissions))
        .map(Permissions::new);

    let section = registry.section_mut(section_id);
    let owner = section.entity_ref();
    section.api_permissions.offer(grant, &owner, "api_permissions")
}

#[derive(Debug, Deserialize)]
struct PatrolRow {
    #[serde(deserialize_with = "wire::id")]
    patrolid: i64,
    #[serde(default, deserialize_with = "wire::opt_text")]
    name: Option<String>,
    #[serde(default, deserialize_with = "wire::opt_id")]
    points: Option<i64>,
}

/// Populate a section's patrols. The reserved leaders patrols are always
/// listed; their names are fixed locally and never taken from the payload.
pub(crate) fn apply_patrols(
    registry: &mut Registry,
    section_id: SectionId,
    endpoint: &str,
    payload: &Value,
) -> Result<()> {
    let rows: Vec<PatrolRow> = decode_rows(endpoint, rows_of(payload));
    let mut ids = vec![LEADERS_PATROL, YOUNG_LEADERS_PATROL];

    for row in rows {
        let patrol = registry.patrol_mut(section_id, row.patrolid);
        let owner = patrol.entity_ref();
        if !is_reserved_patrol(row.patrolid) {
            patrol.name.offer(row.name, &owner, "name")?;
            ids.push(row.patrolid);
        }
        patrol.points.offer(row.points, &owner, "points")?;
    }

    let section = registry.section_mut(section_id);
    let owner = section.entity_ref();
    section.patrols.assign(ids, &owner, "patrols")
}
