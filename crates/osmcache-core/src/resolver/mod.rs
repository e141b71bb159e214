//! Cross-population: fan one decoded payload out into the registry.
//!
//! Each function here takes the JSON returned by one endpoint and applies
//! it to every entity it mentions, always through the registry's
//! get-or-create path. None of them perform I/O; the `Connection` decides
//! when to call and hands the payload over.

pub(crate) mod badges;
pub(crate) mod events;
pub(crate) mod members;
pub(crate) mod sections;

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::api::{OsmError, Result};

/// Decode a payload into its wire struct, reporting failures against the
/// endpoint that produced it.
pub(crate) fn decode<T: DeserializeOwned>(endpoint: &str, payload: &Value) -> Result<T> {
    T::deserialize(payload).map_err(|e| OsmError::invalid(endpoint, e))
}

/// Decode a list of rows, skipping (and logging) the ones that do not fit.
/// The remote system mixes summary rows into some lists.
pub(crate) fn decode_rows<'a, T, I>(endpoint: &str, rows: I) -> Vec<T>
where
    T: DeserializeOwned,
    I: IntoIterator<Item = &'a Value>,
{
    rows.into_iter()
        .filter_map(|row| match T::deserialize(row) {
            Ok(row) => Some(row),
            Err(e) => {
                warn!(endpoint, error = %e, "Skipping undecodable row");
                None
            }
        })
        .collect()
}

/// Permission levels arrive as numbers or numeric strings. An empty set is
/// sometimes sent as `[]`.
pub(crate) fn permission_levels(raw: &Value) -> Option<BTreeMap<String, u8>> {
    match raw {
        Value::Object(map) => Some(
            map.iter()
                .filter_map(|(area, level)| {
                    let level = match level {
                        Value::Number(n) => n.as_u64(),
                        Value::String(s) => s.trim().parse().ok(),
                        _ => None,
                    }?;
                    Some((area.clone(), u8::try_from(level).ok()?))
                })
                .collect(),
        ),
        Value::Array(items) if items.is_empty() => Some(BTreeMap::new()),
        _ => None,
    }
}

/// Rows of a payload that may be a list or an object keyed by id.
pub(crate) fn rows_of(payload: &Value) -> Vec<&Value> {
    match payload {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => map.values().collect(),
        _ => Vec::new(),
    }
}

/// Plain text of a scalar JSON value; blank and null are absent.
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
