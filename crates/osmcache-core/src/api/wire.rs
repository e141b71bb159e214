//! Tolerant decoding of the remote system's loosely-typed JSON.
//!
//! The remote API returns ids as strings or numbers, booleans as `"0"`/`"1"`,
//! `"yes"`, or real booleans, and uses `""`/`"0000-00-00"` for absent dates.
//! These helpers are meant for `#[serde(deserialize_with = ...)]`.

use std::fmt;

use chrono::NaiveDate;
use serde::de::{self, Deserializer, Visitor};

/// Date format used by every endpoint.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a wire date, treating empty and zero dates as absent.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() || s.starts_with("0000-00-00") {
        return None;
    }
    // Some endpoints append a time component
    let date_part = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(date_part, DATE_FORMAT).ok()
}

/// Interpret the remote system's many spellings of a boolean.
pub fn parse_flag(s: &str) -> bool {
    matches!(
        s.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

struct OptIdVisitor;

impl<'de> Visitor<'de> for OptIdVisitor {
    type Value = Option<i64>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an integer id as number or string")
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Some(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        i64::try_from(v).map(Some).map_err(E::custom)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        if v.fract() == 0.0 {
            Ok(Some(v as i64))
        } else {
            Err(E::custom(format!("non-integral id {v}")))
        }
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        let v = v.trim();
        if v.is_empty() {
            return Ok(None);
        }
        v.parse::<i64>().map(Some).map_err(E::custom)
    }

    fn visit_none<E>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E> {
        Ok(None)
    }
}

/// Optional id; `""` and `null` decode to `None`.
pub fn opt_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(OptIdVisitor)
}

/// Mandatory id.
pub fn id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    opt_id(deserializer)?.ok_or_else(|| de::Error::custom("missing id"))
}

struct OptTextVisitor;

impl<'de> Visitor<'de> for OptTextVisitor {
    type Value = Option<String>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a string or number")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E> {
        let v = v.trim();
        if v.is_empty() {
            Ok(None)
        } else {
            Ok(Some(v.to_string()))
        }
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Some(v.to_string()))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Some(v.to_string()))
    }

    fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E> {
        Ok(Some(v.to_string()))
    }

    fn visit_bool<E>(self, v: bool) -> Result<Self::Value, E> {
        Ok(Some(v.to_string()))
    }

    fn visit_none<E>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E> {
        Ok(None)
    }
}

/// Optional text, trimmed; empty strings decode to `None`.
pub fn opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(OptTextVisitor)
}

/// Optional `YYYY-MM-DD` date.
pub fn opt_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(opt_text(deserializer)?.as_deref().and_then(parse_date))
}

struct FlagVisitor;

impl<'de> Visitor<'de> for FlagVisitor {
    type Value = Option<bool>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a boolean, 0/1, or 'yes'/'no'")
    }

    fn visit_bool<E>(self, v: bool) -> Result<Self::Value, E> {
        Ok(Some(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Some(v != 0))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Some(v != 0))
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E> {
        if v.trim().is_empty() {
            Ok(None)
        } else {
            Ok(Some(parse_flag(v)))
        }
    }

    fn visit_none<E>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E> {
        Ok(None)
    }
}

/// Optional boolean in any of the remote spellings.
pub fn opt_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(FlagVisitor)
}

/// Boolean defaulting to `false` when absent or blank.
pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(opt_flag(deserializer)?.unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Row {
        #[serde(deserialize_with = "id")]
        scoutid: i64,
        #[serde(default, deserialize_with = "opt_id")]
        patrolid: Option<i64>,
        #[serde(default, deserialize_with = "opt_text")]
        firstname: Option<String>,
        #[serde(default, deserialize_with = "opt_date")]
        dob: Option<NaiveDate>,
        #[serde(default, deserialize_with = "flag")]
        active: bool,
    }

    #[test]
    fn test_ids_as_strings_or_numbers() {
        let a: Row = serde_json::from_str(r#"{"scoutid": "7", "patrolid": -2}"#).unwrap();
        assert_eq!(a.scoutid, 7);
        assert_eq!(a.patrolid, Some(-2));

        let b: Row = serde_json::from_str(r#"{"scoutid": 8, "patrolid": ""}"#).unwrap();
        assert_eq!(b.scoutid, 8);
        assert_eq!(b.patrolid, None);
    }

    #[test]
    fn test_missing_mandatory_id_fails() {
        assert!(serde_json::from_str::<Row>(r#"{"scoutid": ""}"#).is_err());
    }

    #[test]
    fn test_text_trimmed_and_blank_is_none() {
        let row: Row = serde_json::from_str(r#"{"scoutid": 1, "firstname": "  Jo "}"#).unwrap();
        assert_eq!(row.firstname.as_deref(), Some("Jo"));
        let row: Row = serde_json::from_str(r#"{"scoutid": 1, "firstname": "   "}"#).unwrap();
        assert_eq!(row.firstname, None);
    }

    #[test]
    fn test_dates() {
        let row: Row = serde_json::from_str(r#"{"scoutid": 1, "dob": "2016-05-01"}"#).unwrap();
        assert_eq!(row.dob, NaiveDate::from_ymd_opt(2016, 5, 1));
        let row: Row = serde_json::from_str(r#"{"scoutid": 1, "dob": "0000-00-00"}"#).unwrap();
        assert_eq!(row.dob, None);
        assert_eq!(
            parse_date("2026-09-01 18:30:00"),
            NaiveDate::from_ymd_opt(2026, 9, 1)
        );
    }

    #[test]
    fn test_flags() {
        for (json, expected) in [
            (r#"{"scoutid": 1, "active": true}"#, true),
            (r#"{"scoutid": 1, "active": "1"}"#, true),
            (r#"{"scoutid": 1, "active": "yes"}"#, true),
            (r#"{"scoutid": 1, "active": 0}"#, false),
            (r#"{"scoutid": 1, "active": ""}"#, false),
            (r#"{"scoutid": 1}"#, false),
        ] {
            let row: Row = serde_json::from_str(json).unwrap();
            assert_eq!(row.active, expected, "{json}");
        }
    }
}
