//! Set-based evaluation of logical operations against a device source.
//!
//! Inside an operation, AND intersects and OR unions the condition results;
//! a NOT operation yields the union of its matches. At the top level the
//! first operation seeds the result (a leading NOT seeds nothing), later NOT
//! operations subtract and later AND/OR operations intersect.
//!
//! Seeding happens only once. A running result that becomes empty stays
//! empty; later operations are not used to re-seed it.

use crate::device::{DeviceInfo, DeviceSource, SourceError};
use crate::operations::{LogicalOperation, OperationType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("operation nesting deeper than {max}")]
    DepthExceeded { max: usize },

    #[error(transparent)]
    Source(#[from] SourceError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewResult {
    pub devices: Vec<DeviceInfo>,
    pub total_count: usize,
    /// Number of per-condition queries issued against the source.
    pub operations_executed: usize,
}

type IdSet = BTreeSet<String>;

pub struct Previewer<'a, S: DeviceSource> {
    source: &'a S,
    max_depth: usize,
}

impl<'a, S: DeviceSource> Previewer<'a, S> {
    pub fn new(source: &'a S, max_depth: usize) -> Self {
        Self { source, max_depth }
    }

    pub fn preview(&self, operations: &[LogicalOperation]) -> Result<PreviewResult, PreviewError> {
        info!(operations = operations.len(), "preview started");
        let mut result = IdSet::new();
        let mut seen: HashMap<String, DeviceInfo> = HashMap::new();
        let mut executed = 0;

        for (index, operation) in operations.iter().enumerate() {
            let matched = self.execute(operation, 0, &mut seen, &mut executed)?;
            let before = result.len();
            let matched_count = matched.len();
            result = match (index, operation.operation_type) {
                (0, OperationType::Not) => IdSet::new(),
                (0, _) => matched,
                (_, OperationType::Not) => result.difference(&matched).cloned().collect(),
                (_, _) => result.intersection(&matched).cloned().collect(),
            };
            debug!(
                index,
                kind = %operation.operation_type,
                before,
                matched = matched_count,
                after = result.len(),
                "applied operation"
            );
        }

        let mut devices: Vec<DeviceInfo> = result
            .iter()
            .filter_map(|id| seen.get(id).cloned())
            .collect();
        devices.sort_by(|a, b| a.display_name().cmp(b.display_name()).then_with(|| a.id.cmp(&b.id)));

        info!(devices = devices.len(), queries = executed, "preview completed");
        Ok(PreviewResult {
            total_count: devices.len(),
            devices,
            operations_executed: executed,
        })
    }

    fn execute(
        &self,
        operation: &LogicalOperation,
        depth: usize,
        seen: &mut HashMap<String, DeviceInfo>,
        executed: &mut usize,
    ) -> Result<IdSet, PreviewError> {
        if depth > self.max_depth {
            return Err(PreviewError::DepthExceeded { max: self.max_depth });
        }

        let mut results: Vec<IdSet> = Vec::with_capacity(operation.conditions.len());
        for condition in &operation.conditions {
            let devices = self.source.query(condition)?;
            *executed += 1;
            debug!(condition = %condition, matched = devices.len(), "condition executed");
            let ids = devices.iter().map(|d| d.id.clone()).collect();
            for device in devices {
                seen.entry(device.id.clone()).or_insert(device);
            }
            results.push(ids);
        }
        for nested in &operation.nested_operations {
            results.push(self.execute(nested, depth + 1, seen, executed)?);
        }

        Ok(match operation.operation_type {
            OperationType::And => intersect(results),
            OperationType::Or | OperationType::Not => union(results),
        })
    }
}

fn intersect(sets: Vec<IdSet>) -> IdSet {
    let mut iter = sets.into_iter();
    let Some(first) = iter.next() else {
        return IdSet::new();
    };
    iter.fold(first, |acc, set| acc.intersection(&set).cloned().collect())
}

fn union(sets: Vec<IdSet>) -> IdSet {
    sets.into_iter().flatten().collect()
}
