//! Device records and the sources that answer per-condition queries.

use crate::operations::LogicalCondition;
use crate::tree::Operator;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot read device file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse device file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Device information used for previews and value suggestions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub primary_ip4: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// Custom field values keyed without the `cf_` prefix.
    #[serde(default)]
    pub custom_fields: BTreeMap<String, String>,
}

/// Fields where `contains` is honoured; everything else matches exactly.
const CONTAINS_FIELDS: [&str; 2] = ["name", "location"];

impl DeviceInfo {
    /// Values of `field` on this device. `None` when the field is unknown.
    fn field_values(&self, field: &str) -> Option<Vec<&str>> {
        if let Some(custom) = field.strip_prefix("cf_") {
            return Some(self.custom_fields.get(custom).map(String::as_str).into_iter().collect());
        }
        let values = match field {
            "name" => single(&self.name),
            "serial" => single(&self.serial),
            "location" => single(&self.location),
            "role" => single(&self.role),
            "status" => single(&self.status),
            "device_type" => single(&self.device_type),
            "manufacturer" => single(&self.manufacturer),
            "platform" => single(&self.platform),
            "primary_ip4" => single(&self.primary_ip4),
            "tag" | "tags" => self.tags.iter().map(String::as_str).collect(),
            "has_primary" => vec![if self.primary_ip4.is_some() { "True" } else { "False" }],
            _ => return None,
        };
        Some(values)
    }

    /// Evaluates one condition against this device, case-insensitively.
    /// `None` when the field is not known.
    pub fn matches(&self, condition: &LogicalCondition) -> Option<bool> {
        let values = self.field_values(&condition.field)?;
        let wanted = condition.value.to_lowercase();
        let positive = condition.operator.positive();
        let substring = positive == Operator::Contains && supports_contains(&condition.field);

        let hit = values.iter().any(|value| {
            let value = value.to_lowercase();
            if substring {
                value.contains(&wanted)
            } else {
                value == wanted
            }
        });
        Some(if condition.operator.is_negative() { !hit } else { hit })
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

fn single(value: &Option<String>) -> Vec<&str> {
    value.as_deref().into_iter().collect()
}

pub fn supports_contains(field: &str) -> bool {
    field.starts_with("cf_") || CONTAINS_FIELDS.contains(&field)
}

/// Answers "which devices match this condition". The preview engine only
/// talks to this seam.
pub trait DeviceSource {
    fn query(&self, condition: &LogicalCondition) -> Result<Vec<DeviceInfo>, SourceError>;
}

/// A device set held in memory, typically loaded from a JSON export.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventory {
    devices: Vec<DeviceInfo>,
}

impl InMemoryInventory {
    pub fn new(devices: Vec<DeviceInfo>) -> Self {
        Self { devices }
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let path_ref = path.as_ref();
        let content = fs::read_to_string(path_ref).map_err(|source| SourceError::Io {
            path: path_ref.display().to_string(),
            source,
        })?;
        let devices = serde_json::from_str(&content).map_err(|source| SourceError::Parse {
            path: path_ref.display().to_string(),
            source,
        })?;
        Ok(Self::new(devices))
    }

    pub fn devices(&self) -> &[DeviceInfo] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl DeviceSource for InMemoryInventory {
    fn query(&self, condition: &LogicalCondition) -> Result<Vec<DeviceInfo>, SourceError> {
        if condition.operator.positive() == Operator::Contains && !supports_contains(&condition.field) {
            warn!(field = %condition.field, "field does not support contains, using exact match");
        }
        let mut matched = Vec::new();
        for device in &self.devices {
            match device.matches(condition) {
                Some(true) => matched.push(device.clone()),
                Some(false) => {}
                None => {
                    warn!(field = %condition.field, "no device attribute for field");
                    return Ok(Vec::new());
                }
            }
        }
        Ok(matched)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn device(id: &str, name: &str, role: &str, location: &str, status: &str) -> DeviceInfo {
        DeviceInfo {
            id: id.to_string(),
            name: Some(name.to_string()),
            role: Some(role.to_string()),
            location: Some(location.to_string()),
            status: Some(status.to_string()),
            ..Default::default()
        }
    }

    pub fn lab() -> InMemoryInventory {
        let mut core = device("1", "core-rtr-01", "router", "DC1", "Active");
        core.tags = vec!["core".to_string(), "bgp".to_string()];
        core.primary_ip4 = Some("10.0.0.1/32".to_string());
        core.platform = Some("ios".to_string());
        core.custom_fields.insert("net".to_string(), "prod".to_string());

        let mut edge = device("2", "edge-rtr-02", "router", "DC2", "Active");
        edge.tags = vec!["edge".to_string()];
        edge.platform = Some("junos".to_string());
        edge.custom_fields.insert("net".to_string(), "lab".to_string());

        let mut access = device("3", "acc-sw-03", "switch", "DC1", "Offline");
        access.tags = vec!["lab".to_string()];
        access.primary_ip4 = Some("10.0.1.3/32".to_string());

        let spare = device("4", "spare-sw-04", "switch", "Branch-DC1", "Planned");

        InMemoryInventory::new(vec![core, edge, access, spare])
    }
}
