//! Conversion of the flat condition list into logical operations.
//!
//! Consecutive tuples sharing an AND/OR tag form one operation; a change of
//! tag closes the running operation. Every `NOT` tuple becomes its own
//! single-condition `NOT` operation so it can be subtracted on its own.

use crate::flat::{FlatCondition, WireLogic};
use crate::tree::Operator;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// A single condition inside an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalCondition {
    pub field: String,
    pub operator: Operator,
    pub value: String,
}

impl From<&FlatCondition> for LogicalCondition {
    fn from(condition: &FlatCondition) -> Self {
        Self {
            field: condition.field.clone(),
            operator: condition.operator,
            value: condition.value.clone(),
        }
    }
}

impl fmt::Display for LogicalCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} '{}'", self.field, self.operator, self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationType {
    And,
    Or,
    Not,
}

impl From<WireLogic> for OperationType {
    fn from(logic: WireLogic) -> Self {
        match logic {
            WireLogic::And => OperationType::And,
            WireLogic::Or => OperationType::Or,
            WireLogic::Not => OperationType::Not,
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationType::And => "AND",
            OperationType::Or => "OR",
            OperationType::Not => "NOT",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalOperation {
    pub operation_type: OperationType,
    #[serde(default)]
    pub conditions: Vec<LogicalCondition>,
    #[serde(default)]
    pub nested_operations: Vec<LogicalOperation>,
}

impl LogicalOperation {
    pub fn new(operation_type: OperationType, conditions: Vec<LogicalCondition>) -> Self {
        Self {
            operation_type,
            conditions,
            nested_operations: Vec::new(),
        }
    }
}

pub fn convert_conditions_to_operations(conditions: &[FlatCondition]) -> Vec<LogicalOperation> {
    let mut operations = Vec::new();
    let mut current_type = OperationType::And;
    let mut current: Vec<LogicalCondition> = Vec::new();

    for condition in conditions {
        let logical = LogicalCondition::from(condition);
        match condition.logic {
            WireLogic::Not => {
                if !current.is_empty() {
                    operations.push(LogicalOperation::new(current_type, std::mem::take(&mut current)));
                }
                operations.push(LogicalOperation::new(OperationType::Not, vec![logical]));
            }
            logic => {
                let op_type = OperationType::from(logic);
                if !current.is_empty() && op_type != current_type {
                    operations.push(LogicalOperation::new(current_type, std::mem::take(&mut current)));
                }
                current_type = op_type;
                current.push(logical);
            }
        }
    }

    if !current.is_empty() {
        operations.push(LogicalOperation::new(current_type, current));
    }

    debug!(conditions = conditions.len(), operations = operations.len(), "converted conditions");
    operations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(field: &str, logic: WireLogic) -> FlatCondition {
        FlatCondition::new(field, Operator::Equals, "x", logic)
    }

    fn shape(operations: &[LogicalOperation]) -> Vec<(OperationType, Vec<String>)> {
        operations
            .iter()
            .map(|op| {
                (
                    op.operation_type,
                    op.conditions.iter().map(|c| c.field.clone()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_empty_input() {
        assert!(convert_conditions_to_operations(&[]).is_empty());
    }

    #[test]
    fn test_and_run_is_one_operation() {
        let ops = convert_conditions_to_operations(&[
            flat("role", WireLogic::And),
            flat("location", WireLogic::And),
        ]);
        assert_eq!(
            shape(&ops),
            vec![(OperationType::And, vec!["role".into(), "location".into()])]
        );
    }

    #[test]
    fn test_logic_change_starts_new_operation() {
        let ops = convert_conditions_to_operations(&[
            flat("role", WireLogic::And),
            flat("status", WireLogic::Or),
            flat("tag", WireLogic::Or),
            flat("platform", WireLogic::And),
        ]);
        assert_eq!(
            shape(&ops),
            vec![
                (OperationType::And, vec!["role".into()]),
                (OperationType::Or, vec!["status".into(), "tag".into()]),
                (OperationType::And, vec!["platform".into()]),
            ]
        );
    }

    #[test]
    fn test_not_conditions_are_isolated() {
        let ops = convert_conditions_to_operations(&[
            flat("role", WireLogic::And),
            flat("status", WireLogic::Not),
            flat("tag", WireLogic::Not),
            flat("platform", WireLogic::And),
        ]);
        assert_eq!(
            shape(&ops),
            vec![
                (OperationType::And, vec!["role".into()]),
                (OperationType::Not, vec!["status".into()]),
                (OperationType::Not, vec!["tag".into()]),
                (OperationType::And, vec!["platform".into()]),
            ]
        );
    }

    #[test]
    fn test_first_logic_sets_operation_type() {
        let ops = convert_conditions_to_operations(&[
            flat("role", WireLogic::Or),
            flat("status", WireLogic::Or),
        ]);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].operation_type, OperationType::Or);
    }

    #[test]
    fn test_operation_json_shape() {
        let ops = convert_conditions_to_operations(&[flat("role", WireLogic::Not)]);
        let value = serde_json::to_value(&ops).unwrap();
        assert_eq!(value[0]["operation_type"], "NOT");
        assert_eq!(value[0]["conditions"][0]["operator"], "equals");
        assert_eq!(value[0]["nested_operations"], serde_json::json!([]));
    }
}
