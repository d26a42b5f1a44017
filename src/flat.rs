//! Flat condition list: the only shape that crosses the network.
//!
//! A tree is linearized depth-first in document order. Each tuple carries
//! the logic connecting it to the previous tuple; consumers ignore the first
//! tuple's logic. Group boundaries are lost, and members of `AND NOT` groups
//! are tagged `NOT`.

use crate::tree::{ConditionItem, ConditionTree, GroupLogic, Logic, Node, Operator};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlatError {
    #[error("unknown logic tag: {0}")]
    UnknownLogic(String),

    #[error("invalid condition list: {0}")]
    Json(#[from] serde_json::Error),
}

/// Logic tag of one flattened tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum WireLogic {
    #[default]
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "OR")]
    Or,
    #[serde(rename = "NOT")]
    Not,
}

impl WireLogic {
    pub fn as_str(self) -> &'static str {
        match self {
            WireLogic::And => "AND",
            WireLogic::Or => "OR",
            WireLogic::Not => "NOT",
        }
    }
}

impl From<Logic> for WireLogic {
    fn from(logic: Logic) -> Self {
        match logic {
            Logic::And => WireLogic::And,
            Logic::Or => WireLogic::Or,
        }
    }
}

impl From<GroupLogic> for WireLogic {
    fn from(logic: GroupLogic) -> Self {
        match logic {
            GroupLogic::And => WireLogic::And,
            GroupLogic::Or => WireLogic::Or,
            GroupLogic::AndNot => WireLogic::Not,
        }
    }
}

impl FromStr for WireLogic {
    type Err = FlatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AND" => Ok(WireLogic::And),
            "OR" => Ok(WireLogic::Or),
            "NOT" | "AND NOT" => Ok(WireLogic::Not),
            _ => Err(FlatError::UnknownLogic(s.to_string())),
        }
    }
}

impl TryFrom<String> for WireLogic {
    type Error = FlatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for WireLogic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One element of the wire list: `{field, operator, value, logic}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatCondition {
    pub field: String,
    pub operator: Operator,
    pub value: String,
    #[serde(default)]
    pub logic: WireLogic,
}

impl FlatCondition {
    pub fn new(
        field: impl Into<String>,
        operator: Operator,
        value: impl Into<String>,
        logic: WireLogic,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
            logic,
        }
    }
}

struct Frame<'a> {
    items: &'a [Node],
    next: usize,
    internal: Logic,
    negated: bool,
}

/// Linearizes `tree` into the wire list.
pub fn tree_to_flat_conditions(tree: &ConditionTree) -> Vec<FlatCondition> {
    let mut out = Vec::new();
    // connector of the outermost group entered since the last emitted leaf
    let mut pending: Option<WireLogic> = None;
    let mut stack = vec![Frame {
        items: &tree.items,
        next: 0,
        internal: tree.internal_logic,
        negated: false,
    }];

    while let Some(frame) = stack.last_mut() {
        let items = frame.items;
        let Some(node) = items.get(frame.next) else {
            stack.pop();
            continue;
        };
        frame.next += 1;
        let internal = frame.internal;
        let negated = frame.negated;

        match node {
            Node::Item(item) => {
                let connector = pending.take();
                let logic = if negated {
                    WireLogic::Not
                } else {
                    connector.unwrap_or_else(|| internal.into())
                };
                out.push(FlatCondition::new(
                    item.field.clone(),
                    item.operator,
                    item.value.clone(),
                    logic,
                ));
            }
            Node::Group(group) => {
                if !group.has_conditions() {
                    continue;
                }
                if pending.is_none() {
                    pending = Some(group.logic.into());
                }
                stack.push(Frame {
                    items: &group.items,
                    next: 0,
                    internal: group.internal_logic,
                    negated: negated || group.logic.is_negated(),
                });
            }
        }
    }
    out
}

/// Rebuilds a flat (ungrouped) tree from the wire list. The root logic is
/// taken from the first tuple after the first whose logic is not `AND`; a
/// single tuple decides on its own. `NOT` tags do not survive.
pub fn flat_conditions_to_tree(conditions: &[FlatCondition]) -> ConditionTree {
    let mut tree = ConditionTree::new();
    tree.internal_logic = infer_root_logic(conditions);
    tree.items = conditions
        .iter()
        .map(|condition| {
            Node::Item(ConditionItem::new(
                condition.field.clone(),
                condition.operator,
                condition.value.clone(),
            ))
        })
        .collect();
    tree
}

fn infer_root_logic(conditions: &[FlatCondition]) -> Logic {
    let decisive = match conditions {
        [only] => Some(only.logic),
        [_, rest @ ..] => rest.iter().map(|c| c.logic).find(|logic| *logic != WireLogic::And),
        [] => None,
    };
    match decisive {
        Some(WireLogic::Or) => Logic::Or,
        _ => Logic::And,
    }
}

pub fn from_json(json: &str) -> Result<Vec<FlatCondition>, FlatError> {
    Ok(serde_json::from_str(json)?)
}

pub fn to_json(conditions: &[FlatCondition]) -> Result<String, FlatError> {
    Ok(serde_json::to_string_pretty(conditions)?)
}
