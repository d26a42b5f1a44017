//! Runtime field vocabulary.
//!
//! Which fields can be filtered on, which operators each accepts and which
//! values to suggest are configuration, not compiled enums. Custom fields
//! (`cf_<name>`) are accepted without being listed.

use crate::device::DeviceInfo;
use crate::tree::Operator;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("operator {operator} is not permitted on field {field}")]
    OperatorNotPermitted { field: String, operator: Operator },
}

fn all_operators() -> Vec<Operator> {
    Operator::ALL.to_vec()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default = "all_operators")]
    pub operators: Vec<Operator>,
    /// Suggested values; empty means free text.
    #[serde(default)]
    pub values: Vec<String>,
}

impl FieldSpec {
    pub fn new(name: &str, label: &str, operators: &[Operator]) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            operators: operators.to_vec(),
            values: Vec::new(),
        }
    }

    pub fn with_values(mut self, values: &[&str]) -> Self {
        self.values = values.iter().map(|v| v.to_string()).collect();
        self
    }

    pub fn display_label(&self) -> &str {
        if self.label.is_empty() {
            &self.name
        } else {
            &self.label
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSchema {
    pub fields: Vec<FieldSpec>,
}

impl Default for FieldSchema {
    fn default() -> Self {
        Self::standard()
    }
}

impl FieldSchema {
    /// The device fields the inventory builder offers out of the box.
    pub fn standard() -> Self {
        use Operator::*;
        let exact = [Equals, NotEquals];
        let text = [Equals, Contains, NotEquals, NotContains];
        Self {
            fields: vec![
                FieldSpec::new("name", "Device Name", &text),
                FieldSpec::new("location", "Location", &text),
                FieldSpec::new("role", "Role", &exact),
                FieldSpec::new("status", "Status", &exact),
                FieldSpec::new("tag", "Tag", &exact),
                FieldSpec::new("device_type", "Device Type", &exact),
                FieldSpec::new("manufacturer", "Manufacturer", &exact),
                FieldSpec::new("platform", "Platform", &exact),
                FieldSpec::new("has_primary", "Has Primary IP", &[Equals]).with_values(&["True", "False"]),
            ],
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|spec| spec.name == name)
    }

    /// Checks a field/operator pair against the vocabulary.
    pub fn check(&self, field: &str, operator: Operator) -> Result<(), SchemaError> {
        if field.starts_with("cf_") && field.len() > 3 {
            return Ok(());
        }
        let spec = self
            .field(field)
            .ok_or_else(|| SchemaError::UnknownField(field.to_string()))?;
        if spec.operators.contains(&operator) {
            Ok(())
        } else {
            Err(SchemaError::OperatorNotPermitted {
                field: field.to_string(),
                operator,
            })
        }
    }

    /// Suggested values for a field, including analysed custom fields.
    pub fn suggestions<'a>(&'a self, field: &str, analysis: Option<&'a InventoryAnalysis>) -> Vec<&'a str> {
        let mut values: BTreeSet<&str> = self
            .field(field)
            .map(|spec| spec.values.iter().map(String::as_str).collect())
            .unwrap_or_default();
        if let Some(analysis) = analysis {
            values.extend(analysis.values_for(field).iter().map(String::as_str));
        }
        values.into_iter().collect()
    }
}

/// Distinct values seen across a device set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryAnalysis {
    pub locations: Vec<String>,
    pub tags: Vec<String>,
    pub custom_fields: BTreeMap<String, Vec<String>>,
    pub statuses: Vec<String>,
    pub roles: Vec<String>,
    pub device_count: usize,
}

impl InventoryAnalysis {
    pub fn analyze(devices: &[DeviceInfo]) -> Self {
        let mut locations = BTreeSet::new();
        let mut tags = BTreeSet::new();
        let mut statuses = BTreeSet::new();
        let mut roles = BTreeSet::new();
        let mut custom: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for device in devices {
            locations.extend(device.location.clone());
            statuses.extend(device.status.clone());
            roles.extend(device.role.clone());
            tags.extend(device.tags.iter().cloned());
            for (name, value) in &device.custom_fields {
                if !value.is_empty() {
                    custom.entry(name.clone()).or_default().insert(value.clone());
                }
            }
        }

        Self {
            locations: locations.into_iter().collect(),
            tags: tags.into_iter().collect(),
            custom_fields: custom
                .into_iter()
                .map(|(name, values)| (name, values.into_iter().collect()))
                .collect(),
            statuses: statuses.into_iter().collect(),
            roles: roles.into_iter().collect(),
            device_count: devices.len(),
        }
    }

    pub fn values_for(&self, field: &str) -> &[String] {
        if let Some(custom) = field.strip_prefix("cf_") {
            return self.custom_fields.get(custom).map(Vec::as_slice).unwrap_or(&[]);
        }
        match field {
            "location" => &self.locations,
            "tag" | "tags" => &self.tags,
            "status" => &self.statuses,
            "role" => &self.roles,
            _ => &[],
        }
    }
}
