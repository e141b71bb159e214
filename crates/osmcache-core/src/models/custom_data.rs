//! Per-member contact and custom data.
//!
//! Which fields exist is configured per section on the remote system, so a
//! group is a property bag rather than a fixed struct. A field is enabled for
//! the section when the section's schema lists it, even if its value is blank.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::api::wire::{parse_date, parse_flag};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CustomDataCategory {
    PrimaryContact1,
    PrimaryContact2,
    Emergency,
    Doctor,
    Essential,
    Consents,
    /// User-defined extra fields.
    Customisable,
}

impl CustomDataCategory {
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        match identifier {
            "contact_primary_1" => Some(CustomDataCategory::PrimaryContact1),
            "contact_primary_2" => Some(CustomDataCategory::PrimaryContact2),
            "emergency" => Some(CustomDataCategory::Emergency),
            "doctor" => Some(CustomDataCategory::Doctor),
            "essential" | "medical" => Some(CustomDataCategory::Essential),
            "consents" => Some(CustomDataCategory::Consents),
            "customisable_data" => Some(CustomDataCategory::Customisable),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Boolean(bool),
    Date(NaiveDate),
}

impl FieldValue {
    /// Decode a column value according to its declared type. Dates that do
    /// not parse are kept as text rather than dropped.
    pub fn from_column(column_type: &str, raw: &str) -> Self {
        match column_type {
            "checkbox" | "boolean" => FieldValue::Boolean(parse_flag(raw)),
            "date" => match parse_date(raw) {
                Some(date) => FieldValue::Date(date),
                None => FieldValue::Text(raw.to_string()),
            },
            _ => FieldValue::Text(raw.to_string()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomDataGroup {
    pub label: String,
    enabled: BTreeSet<String>,
    values: BTreeMap<String, FieldValue>,
}

impl CustomDataGroup {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    /// Declare a column as part of this section's schema.
    pub fn enable(&mut self, name: impl Into<String>) {
        self.enabled.insert(name.into());
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        let name = name.into();
        self.enabled.insert(name.clone());
        self.values.insert(name, value);
    }

    pub fn is_field_enabled(&self, name: &str) -> bool {
        self.enabled.contains(name)
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_text)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// All custom data groups of one member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomData {
    groups: BTreeMap<CustomDataCategory, CustomDataGroup>,
}

impl CustomData {
    pub fn group(&self, category: CustomDataCategory) -> Option<&CustomDataGroup> {
        self.groups.get(&category)
    }

    pub fn insert_group(&mut self, category: CustomDataCategory, group: CustomDataGroup) {
        self.groups.insert(category, group);
    }

    pub fn is_field_enabled(&self, category: CustomDataCategory, name: &str) -> bool {
        self.group(category)
            .map(|g| g.is_field_enabled(name))
            .unwrap_or(false)
    }

    pub fn categories(&self) -> impl Iterator<Item = CustomDataCategory> + '_ {
        self.groups.keys().copied()
    }
}
