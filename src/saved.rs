//! Saved inventories and their export/import documents.
//!
//! A saved record stores its conditions either as the legacy flat list or
//! wrapped in a version-2 envelope `[{"version": 2, "tree": {...}}]`.
//! Export documents always carry the nested tree.

use crate::flat::{flat_conditions_to_tree, FlatCondition};
use crate::tree::{ConditionItem, ConditionTree, Node, TreeError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Version tag of the nested-tree formats.
pub const TREE_FORMAT_VERSION: u32 = 2;

#[derive(Debug, Error)]
pub enum SavedError {
    #[error("cannot access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid inventory file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot serialize inventory: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("unsupported inventory format version {0}, expected 2")]
    UnsupportedVersion(u32),

    #[error("inventory file has no condition tree")]
    MissingTree,

    #[error("inventory file has no name in its metadata")]
    MissingName,

    #[error(transparent)]
    Tree(#[from] TreeError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Global,
    Private,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEnvelope {
    pub version: u32,
    pub tree: ConditionTree,
}

/// Persisted condition payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredConditions {
    Flat(Vec<FlatCondition>),
    Tree(Vec<TreeEnvelope>),
}

impl Default for StoredConditions {
    fn default() -> Self {
        StoredConditions::Flat(Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedInventory {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_name: Option<String>,
    #[serde(default)]
    pub conditions: StoredConditions,
}

impl SavedInventory {
    /// A record holding the flat wire list.
    pub fn from_flat(name: impl Into<String>, conditions: Vec<FlatCondition>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            scope: Scope::Global,
            template_category: None,
            template_name: None,
            conditions: StoredConditions::Flat(conditions),
        }
    }

    /// A record holding the nested tree in the version-2 envelope.
    pub fn from_tree(name: impl Into<String>, tree: ConditionTree) -> Self {
        Self {
            conditions: StoredConditions::Tree(vec![TreeEnvelope {
                version: TREE_FORMAT_VERSION,
                tree,
            }]),
            ..Self::from_flat(name, Vec::new())
        }
    }

    /// Hydrates the stored conditions into a tree capped at `max_depth`.
    pub fn to_tree(&self, max_depth: usize) -> Result<ConditionTree, SavedError> {
        let mut tree = match &self.conditions {
            StoredConditions::Flat(conditions) => flat_conditions_to_tree(conditions),
            StoredConditions::Tree(envelopes) => {
                let envelope = envelopes.first().ok_or(SavedError::MissingTree)?;
                if envelope.version != TREE_FORMAT_VERSION {
                    return Err(SavedError::UnsupportedVersion(envelope.version));
                }
                envelope.tree.clone()
            }
        };
        tree.set_max_depth(max_depth);
        tree.validate()?;
        Ok(tree)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), SavedError> {
        write_json(path.as_ref(), self)?;
        info!(name = %self.name, path = %path.as_ref().display(), "inventory saved");
        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, SavedError> {
        let record: SavedInventory = read_json(path.as_ref())?;
        debug!(name = %record.name, "inventory loaded");
        Ok(record)
    }

    /// Builds the export document. Flat records are wrapped into a root
    /// tree with positional item ids.
    pub fn export(&self, exported_by: &str, original_id: Option<String>) -> ExportDocument {
        let condition_tree = match &self.conditions {
            StoredConditions::Tree(envelopes) => envelopes
                .iter()
                .find(|envelope| envelope.version == TREE_FORMAT_VERSION)
                .map(|envelope| envelope.tree.clone()),
            StoredConditions::Flat(conditions) if conditions.is_empty() => None,
            StoredConditions::Flat(conditions) => {
                let mut tree = ConditionTree::new();
                tree.items = conditions
                    .iter()
                    .enumerate()
                    .map(|(index, condition)| {
                        let mut item = ConditionItem::new(
                            condition.field.clone(),
                            condition.operator,
                            condition.value.clone(),
                        );
                        item.id = format!("item-{index}").as_str().into();
                        Node::Item(item)
                    })
                    .collect();
                Some(tree)
            }
        };

        ExportDocument {
            version: TREE_FORMAT_VERSION,
            metadata: ExportMetadata {
                name: self.name.clone(),
                description: self.description.clone(),
                scope: self.scope,
                exported_at: Utc::now(),
                exported_by: exported_by.to_string(),
                original_id,
            },
            condition_tree,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default = "Utc::now")]
    pub exported_at: DateTime<Utc>,
    #[serde(default)]
    pub exported_by: String,
    #[serde(default)]
    pub original_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub version: u32,
    pub metadata: ExportMetadata,
    #[serde(default)]
    pub condition_tree: Option<ConditionTree>,
}

impl ExportDocument {
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), SavedError> {
        write_json(path.as_ref(), self)?;
        info!(name = %self.metadata.name, path = %path.as_ref().display(), "inventory exported");
        Ok(())
    }

    pub fn read_from_file<P: AsRef<Path>>(path: P) -> Result<Self, SavedError> {
        read_json(path.as_ref())
    }

    /// Validates the document and turns it into a new global record named
    /// `"<name> (imported)"`.
    pub fn import(self, max_depth: usize) -> Result<SavedInventory, SavedError> {
        if self.version != TREE_FORMAT_VERSION {
            return Err(SavedError::UnsupportedVersion(self.version));
        }
        let mut tree = self.condition_tree.ok_or(SavedError::MissingTree)?;
        if self.metadata.name.trim().is_empty() {
            return Err(SavedError::MissingName);
        }
        tree.set_max_depth(max_depth);
        tree.validate()?;

        let description = if self.metadata.description.is_empty() {
            "Imported inventory".to_string()
        } else {
            self.metadata.description
        };
        let mut record = SavedInventory::from_tree(format!("{} (imported)", self.metadata.name), tree);
        record.description = description;
        info!(name = %record.name, "inventory imported");
        Ok(record)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), SavedError> {
    let json = serde_json::to_string_pretty(value).map_err(SavedError::Serialize)?;
    fs::write(path, json).map_err(|source| SavedError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, SavedError> {
    let content = fs::read_to_string(path).map_err(|source| SavedError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| SavedError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
