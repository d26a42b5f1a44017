//! Condition tree used to author device-selection queries.
//!
//! The tree is an authoring structure only: nested groups let the operator
//! express `(A OR B) AND NOT (C)` style selections, and the [`crate::flat`]
//! module linearizes it into the ordered condition list the query backend
//! consumes.
//!
//! ```text
//! root (internalLogic)
//!   ├─ item  field operator value
//!   └─ group (logic, internalLogic)
//!        ├─ item
//!        └─ group ...
//! ```
//!
//! Every walk over the tree is iterative, and group nesting is capped by the
//! tree's `max_depth`.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Default cap on group nesting.
pub const DEFAULT_MAX_DEPTH: usize = 8;

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("group not found: {0}")]
    GroupNotFound(NodeId),

    #[error("group nesting limit of {max} exceeded")]
    DepthExceeded { max: usize },

    #[error("duplicate node id: {0}")]
    DuplicateId(NodeId),

    #[error("unknown logic: {0}")]
    UnknownLogic(String),

    #[error("unknown operator: {0}")]
    UnknownOperator(String),
}

/// Identifier of an item or group, unique within one tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn fresh_item() -> Self {
        Self(format!("item-{}", Uuid::new_v4()))
    }

    pub fn fresh_group() -> Self {
        Self(format!("group-{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// How the children of a container combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum Logic {
    #[default]
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "OR")]
    Or,
}

impl Logic {
    pub fn as_str(self) -> &'static str {
        match self {
            Logic::And => "AND",
            Logic::Or => "OR",
        }
    }
}

impl FromStr for Logic {
    type Err = TreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AND" => Ok(Logic::And),
            "OR" => Ok(Logic::Or),
            _ => Err(TreeError::UnknownLogic(s.to_string())),
        }
    }
}

impl TryFrom<String> for Logic {
    type Error = TreeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Logic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a group relates to its preceding siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum GroupLogic {
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "OR")]
    Or,
    #[serde(rename = "AND NOT")]
    AndNot,
}

impl GroupLogic {
    /// Creation-time choice: a negated group is always `AND NOT`.
    pub fn from_choice(logic: Logic, negate: bool) -> Self {
        match (logic, negate) {
            (_, true) => GroupLogic::AndNot,
            (Logic::And, false) => GroupLogic::And,
            (Logic::Or, false) => GroupLogic::Or,
        }
    }

    pub fn is_negated(self) -> bool {
        matches!(self, GroupLogic::AndNot)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GroupLogic::And => "AND",
            GroupLogic::Or => "OR",
            GroupLogic::AndNot => "AND NOT",
        }
    }
}

impl FromStr for GroupLogic {
    type Err = TreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_uppercase();
        match normalized.as_str() {
            "AND" => Ok(GroupLogic::And),
            "OR" => Ok(GroupLogic::Or),
            "AND NOT" | "NOT" => Ok(GroupLogic::AndNot),
            _ => Err(TreeError::UnknownLogic(s.to_string())),
        }
    }
}

impl TryFrom<String> for GroupLogic {
    type Error = TreeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for GroupLogic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison applied by a leaf condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    Contains,
    NotEquals,
    NotContains,
}

impl Operator {
    pub const ALL: [Operator; 4] = [
        Operator::Equals,
        Operator::Contains,
        Operator::NotEquals,
        Operator::NotContains,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Equals => "equals",
            Operator::Contains => "contains",
            Operator::NotEquals => "not_equals",
            Operator::NotContains => "not_contains",
        }
    }

    pub fn is_negative(self) -> bool {
        matches!(self, Operator::NotEquals | Operator::NotContains)
    }

    /// The positive form of a negative operator.
    pub fn positive(self) -> Self {
        match self {
            Operator::NotEquals => Operator::Equals,
            Operator::NotContains => Operator::Contains,
            other => other,
        }
    }
}

impl FromStr for Operator {
    type Err = TreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "equals" | "eq" | "=" => Ok(Operator::Equals),
            "contains" | "~" => Ok(Operator::Contains),
            "not_equals" | "ne" | "!=" => Ok(Operator::NotEquals),
            "not_contains" | "!~" => Ok(Operator::NotContains),
            _ => Err(TreeError::UnknownOperator(s.to_string())),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A leaf predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionItem {
    pub id: NodeId,
    pub field: String,
    pub operator: Operator,
    pub value: String,
}

impl ConditionItem {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<String>) -> Self {
        Self {
            id: NodeId::fresh_item(),
            field: field.into(),
            operator,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GroupTag {
    #[default]
    #[serde(rename = "group")]
    Group,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RootTag {
    #[default]
    #[serde(rename = "root")]
    Root,
}

/// A nested container with its own combinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionGroup {
    pub id: NodeId,
    #[serde(rename = "type", default)]
    pub tag: GroupTag,
    pub logic: GroupLogic,
    #[serde(rename = "internalLogic", default)]
    pub internal_logic: Logic,
    #[serde(default)]
    pub items: Vec<Node>,
}

impl ConditionGroup {
    pub fn new(logic: GroupLogic) -> Self {
        Self {
            id: NodeId::fresh_group(),
            tag: GroupTag::Group,
            logic,
            internal_logic: Logic::And,
            items: Vec::new(),
        }
    }

    /// True when at least one leaf sits somewhere under this group.
    pub fn has_conditions(&self) -> bool {
        Walk::over(&self.items).any(|(_, node)| matches!(node, Node::Item(_)))
    }
}

/// Either kind of tree node. Groups are recognised by their `logic` and
/// `items` keys, so the leaf shape needs no type tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Group(ConditionGroup),
    Item(ConditionItem),
}

impl Node {
    pub fn id(&self) -> &NodeId {
        match self {
            Node::Group(group) => &group.id,
            Node::Item(item) => &item.id,
        }
    }

    pub fn as_group(&self) -> Option<&ConditionGroup> {
        match self {
            Node::Group(group) => Some(group),
            Node::Item(_) => None,
        }
    }

    pub fn as_item(&self) -> Option<&ConditionItem> {
        match self {
            Node::Item(item) => Some(item),
            Node::Group(_) => None,
        }
    }
}

/// Which logic slot of a group to rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicSlot {
    /// The connector to preceding siblings (`logic`).
    Logic,
    /// The combinator of the group's own children (`internalLogic`).
    Internal,
}

/// Depth-first, document-order walk yielding `(depth, node)`; root-level
/// nodes have depth 0.
pub struct Walk<'a> {
    stack: Vec<std::slice::Iter<'a, Node>>,
}

impl<'a> Walk<'a> {
    pub fn over(items: &'a [Node]) -> Self {
        Self {
            stack: vec![items.iter()],
        }
    }
}

impl<'a> Iterator for Walk<'a> {
    type Item = (usize, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let depth = self.stack.len().checked_sub(1)?;
            match self.stack.last_mut()?.next() {
                Some(node) => {
                    if let Node::Group(group) = node {
                        self.stack.push(group.items.iter());
                    }
                    return Some((depth, node));
                }
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

/// The root container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionTree {
    #[serde(rename = "type", default)]
    pub tag: RootTag,
    #[serde(rename = "internalLogic", default)]
    pub internal_logic: Logic,
    #[serde(default)]
    pub items: Vec<Node>,
    #[serde(skip, default = "default_max_depth")]
    max_depth: usize,
}

impl Default for ConditionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ConditionTree {
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            tag: RootTag::Root,
            internal_logic: Logic::And,
            items: Vec::new(),
            max_depth,
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn set_max_depth(&mut self, max_depth: usize) {
        self.max_depth = max_depth;
    }

    pub fn walk(&self) -> Walk<'_> {
        Walk::over(&self.items)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of leaf conditions anywhere in the tree.
    pub fn condition_count(&self) -> usize {
        self.walk().filter(|(_, node)| matches!(node, Node::Item(_))).count()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.walk().any(|(_, node)| node.id() == id)
    }

    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.walk().map(|(_, node)| node).find(|node| node.id() == id)
    }

    pub fn group(&self, id: &NodeId) -> Option<&ConditionGroup> {
        self.get(id).and_then(Node::as_group)
    }

    /// Items of the group addressed by `path` (empty path is the root).
    pub fn items_at(&self, path: &[NodeId]) -> Option<&[Node]> {
        let mut items: &[Node] = &self.items;
        for id in path {
            let group = items.iter().find_map(|node| match node {
                Node::Group(group) if &group.id == id => Some(group),
                _ => None,
            })?;
            items = &group.items;
        }
        Some(items)
    }

    fn items_at_mut(&mut self, path: &[NodeId]) -> Result<&mut Vec<Node>, TreeError> {
        let mut items: &mut Vec<Node> = &mut self.items;
        for id in path {
            let group = items
                .iter_mut()
                .find_map(|node| match node {
                    Node::Group(group) if &group.id == id => Some(group),
                    _ => None,
                })
                .ok_or_else(|| TreeError::GroupNotFound(id.clone()))?;
            items = &mut group.items;
        }
        Ok(items)
    }

    /// Appends a new leaf to the group at `path` and returns its id.
    pub fn add_condition(
        &mut self,
        path: &[NodeId],
        field: impl Into<String>,
        operator: Operator,
        value: impl Into<String>,
    ) -> Result<NodeId, TreeError> {
        let item = ConditionItem::new(field, operator, value);
        let id = item.id.clone();
        debug!(id = %id, field = %item.field, operator = %item.operator, depth = path.len(), "adding condition");
        self.items_at_mut(path)?.push(Node::Item(item));
        Ok(id)
    }

    /// Appends a new empty group to the group at `path`. The caller decides
    /// whether to retarget into it.
    pub fn add_group(
        &mut self,
        path: &[NodeId],
        logic: Logic,
        negate: bool,
    ) -> Result<NodeId, TreeError> {
        if path.len() + 1 > self.max_depth {
            return Err(TreeError::DepthExceeded { max: self.max_depth });
        }
        let group = ConditionGroup::new(GroupLogic::from_choice(logic, negate));
        let id = group.id.clone();
        debug!(id = %id, logic = %group.logic, depth = path.len() + 1, "adding group");
        self.items_at_mut(path)?.push(Node::Group(group));
        Ok(id)
    }

    /// Index trail from the root to the node with `id`.
    fn locate(&self, id: &NodeId) -> Option<Vec<usize>> {
        let mut stack: Vec<(&[Node], usize)> = vec![(&self.items, 0)];
        let mut trail: Vec<usize> = Vec::new();
        while let Some(frame) = stack.last_mut() {
            let items = frame.0;
            let index = frame.1;
            let Some(node) = items.get(index) else {
                stack.pop();
                trail.pop();
                continue;
            };
            frame.1 += 1;
            trail.push(index);
            if node.id() == id {
                return Some(trail);
            }
            match node {
                Node::Group(group) => stack.push((&group.items, 0)),
                Node::Item(_) => {
                    trail.pop();
                }
            }
        }
        None
    }

    fn items_by_trail_mut(&mut self, trail: &[usize]) -> Option<&mut Vec<Node>> {
        let mut items: &mut Vec<Node> = &mut self.items;
        for &index in trail {
            let Some(Node::Group(group)) = items.get_mut(index) else {
                return None;
            };
            items = &mut group.items;
        }
        Some(items)
    }

    /// Removes the node with `id` together with its subtree. Unknown ids
    /// leave the tree unchanged and return `false`.
    pub fn remove_item(&mut self, id: &NodeId) -> bool {
        let Some(trail) = self.locate(id) else {
            return false;
        };
        let Some((&last, parents)) = trail.split_last() else {
            return false;
        };
        match self.items_by_trail_mut(parents) {
            Some(items) if last < items.len() => {
                let removed = items.remove(last);
                debug!(id = %removed.id(), "removed node");
                true
            }
            _ => false,
        }
    }

    /// Rewrites one logic slot of a group. The `logic` slot only toggles
    /// between AND and OR; `AND NOT` groups keep their connector.
    pub fn update_group_logic(&mut self, id: &NodeId, slot: LogicSlot, logic: Logic) -> bool {
        let Some(trail) = self.locate(id) else {
            return false;
        };
        let Some((&last, parents)) = trail.split_last() else {
            return false;
        };
        let Some(Node::Group(group)) = self
            .items_by_trail_mut(parents)
            .and_then(|items| items.get_mut(last))
        else {
            return false;
        };
        match slot {
            LogicSlot::Internal => group.internal_logic = logic,
            LogicSlot::Logic => {
                if group.logic.is_negated() {
                    return false;
                }
                group.logic = GroupLogic::from_choice(logic, false);
            }
        }
        debug!(id = %id, ?slot, logic = %logic, "updated group logic");
        true
    }

    pub fn set_internal_logic(&mut self, logic: Logic) {
        self.internal_logic = logic;
    }

    /// Ancestor group ids (outermost first) of the group `id`. `None` when
    /// the id is unknown or names a leaf.
    pub fn find_group_path(&self, id: &NodeId) -> Option<Vec<NodeId>> {
        let trail = self.locate(id)?;
        let mut path = Vec::with_capacity(trail.len().saturating_sub(1));
        let mut items: &[Node] = &self.items;
        let (&last, parents) = trail.split_last()?;
        for &index in parents {
            let group = items.get(index)?.as_group()?;
            path.push(group.id.clone());
            items = &group.items;
        }
        items.get(last)?.as_group()?;
        Some(path)
    }

    /// Checks id uniqueness and the nesting cap. Used on trees that arrive
    /// from outside the mutator API.
    pub fn validate(&self) -> Result<(), TreeError> {
        let mut seen = HashSet::new();
        for (depth, node) in self.walk() {
            if !seen.insert(node.id()) {
                return Err(TreeError::DuplicateId(node.id().clone()));
            }
            if matches!(node, Node::Group(_)) && depth + 1 > self.max_depth {
                return Err(TreeError::DepthExceeded { max: self.max_depth });
            }
        }
        Ok(())
    }
}

impl fmt::Display for ConditionTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "root [{}]", self.internal_logic)?;
        for (depth, node) in self.walk() {
            let indent = "  ".repeat(depth + 1);
            match node {
                Node::Item(item) => writeln!(
                    f,
                    "{indent}{} {} {:?}  ({})",
                    item.field, item.operator, item.value, item.id
                )?,
                Node::Group(group) => writeln!(
                    f,
                    "{indent}{} group [{}]  ({})",
                    group.logic, group.internal_logic, group.id
                )?,
            }
        }
        Ok(())
    }
}
