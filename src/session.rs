//! Authoring session: one condition tree plus the current target group.
//!
//! New conditions and groups land in the group the target path points at.
//! Creating a group never moves the target; callers retarget explicitly.

use crate::flat::{flat_conditions_to_tree, tree_to_flat_conditions, FlatCondition};
use crate::operations::{convert_conditions_to_operations, LogicalOperation};
use crate::tree::{ConditionTree, Logic, LogicSlot, NodeId, Operator, TreeError, DEFAULT_MAX_DEPTH};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("at least one condition is required")]
    NoConditions,

    #[error("not a group: {0}")]
    GroupNotFound(NodeId),

    #[error(transparent)]
    Tree(#[from] TreeError),
}

#[derive(Debug, Clone)]
pub struct Session {
    tree: ConditionTree,
    current_path: Vec<NodeId>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            tree: ConditionTree::with_max_depth(max_depth),
            current_path: Vec::new(),
        }
    }

    pub fn tree(&self) -> &ConditionTree {
        &self.tree
    }

    /// Group ids from the root to the current target; empty means root.
    pub fn current_path(&self) -> &[NodeId] {
        &self.current_path
    }

    pub fn current_group(&self) -> Option<&NodeId> {
        self.current_path.last()
    }

    /// Plain pointer assignment. A path that no longer resolves is reset to
    /// the root by the next mutation.
    pub fn set_current_group_path(&mut self, path: Vec<NodeId>) {
        debug!(depth = path.len(), "target path set");
        self.current_path = path;
    }

    /// Retargets to the group `id`, or to the root for `None`.
    pub fn set_target_group(&mut self, id: Option<&NodeId>) -> Result<(), SessionError> {
        match id {
            None => self.current_path.clear(),
            Some(id) => {
                let mut path = self
                    .tree
                    .find_group_path(id)
                    .ok_or_else(|| SessionError::GroupNotFound(id.clone()))?;
                path.push(id.clone());
                self.current_path = path;
            }
        }
        debug!(depth = self.current_path.len(), "target group set");
        Ok(())
    }

    fn resolved_path(&mut self) -> &[NodeId] {
        if self.tree.items_at(&self.current_path).is_none() {
            debug!("stale target path, resetting to root");
            self.current_path.clear();
        }
        &self.current_path
    }

    pub fn add_condition(
        &mut self,
        field: impl Into<String>,
        operator: Operator,
        value: impl Into<String>,
    ) -> Result<NodeId, SessionError> {
        let path = self.resolved_path().to_vec();
        Ok(self.tree.add_condition(&path, field, operator, value)?)
    }

    pub fn add_group(&mut self, logic: Logic, negate: bool) -> Result<NodeId, SessionError> {
        let path = self.resolved_path().to_vec();
        Ok(self.tree.add_group(&path, logic, negate)?)
    }

    /// Removes a node and its subtree. The target falls back to the root
    /// when it sat inside the removed group.
    pub fn remove_item(&mut self, id: &NodeId) -> bool {
        let removed = self.tree.remove_item(id);
        if removed && self.current_path.contains(id) {
            debug!(id = %id, "target group removed, resetting to root");
            self.current_path.clear();
        }
        removed
    }

    pub fn update_group_logic(&mut self, id: &NodeId, slot: LogicSlot, logic: Logic) -> bool {
        self.tree.update_group_logic(id, slot, logic)
    }

    pub fn set_root_logic(&mut self, logic: Logic) {
        self.tree.set_internal_logic(logic);
    }

    pub fn flat_conditions(&self) -> Vec<FlatCondition> {
        tree_to_flat_conditions(&self.tree)
    }

    /// Hydrates the session from a saved flat list.
    pub fn load_flat(&mut self, conditions: &[FlatCondition]) {
        let mut tree = flat_conditions_to_tree(conditions);
        tree.set_max_depth(self.tree.max_depth());
        self.tree = tree;
        self.current_path.clear();
        info!(conditions = conditions.len(), "loaded flat conditions");
    }

    /// Replaces the tree wholesale after checking ids and nesting.
    pub fn replace_tree(&mut self, mut tree: ConditionTree) -> Result<(), SessionError> {
        tree.set_max_depth(self.tree.max_depth());
        tree.validate()?;
        self.tree = tree;
        self.current_path.clear();
        Ok(())
    }

    pub fn clear(&mut self) {
        self.tree = ConditionTree::with_max_depth(self.tree.max_depth());
        self.current_path.clear();
    }

    /// Flat list ready for preview or export. Refuses an empty selection.
    pub fn preview_conditions(&self) -> Result<Vec<FlatCondition>, SessionError> {
        let conditions = self.flat_conditions();
        if conditions.is_empty() {
            return Err(SessionError::NoConditions);
        }
        Ok(conditions)
    }

    pub fn operations(&self) -> Result<Vec<LogicalOperation>, SessionError> {
        Ok(convert_conditions_to_operations(&self.preview_conditions()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flat::WireLogic;
    use crate::tree::Node;

    #[test]
    fn test_two_root_conditions() {
        let mut session = Session::new();
        session.add_condition("role", Operator::Equals, "router").unwrap();
        session.add_condition("location", Operator::Equals, "DC1").unwrap();

        assert_eq!(session.tree().items.len(), 2);
        assert_eq!(
            session.flat_conditions(),
            vec![
                FlatCondition::new("role", Operator::Equals, "router", WireLogic::And),
                FlatCondition::new("location", Operator::Equals, "DC1", WireLogic::And),
            ]
        );
    }

    #[test]
    fn test_group_then_enter() {
        let mut session = Session::new();
        let group = session.add_group(Logic::Or, false).unwrap();
        assert!(session.current_path().is_empty());

        session.set_target_group(Some(&group)).unwrap();
        session.add_condition("status", Operator::Equals, "down").unwrap();

        assert_eq!(session.tree().items.len(), 1);
        let Node::Group(inner) = &session.tree().items[0] else {
            panic!("expected group");
        };
        assert_eq!(inner.items.len(), 1);
    }

    #[test]
    fn test_nested_target_path() {
        let mut session = Session::new();
        let outer = session.add_group(Logic::And, false).unwrap();
        session.set_target_group(Some(&outer)).unwrap();
        let inner = session.add_group(Logic::Or, true).unwrap();
        session.set_target_group(Some(&inner)).unwrap();
        assert_eq!(session.current_path(), [outer.clone(), inner.clone()]);

        session.set_target_group(None).unwrap();
        assert!(session.current_path().is_empty());
    }

    #[test]
    fn test_target_must_be_group() {
        let mut session = Session::new();
        let group = session.add_group(Logic::And, false).unwrap();
        session.set_target_group(Some(&group)).unwrap();
        let item = session.add_condition("role", Operator::Equals, "router").unwrap();

        assert_eq!(
            session.set_target_group(Some(&item)),
            Err(SessionError::GroupNotFound(item))
        );
        assert_eq!(session.current_path(), [group]);
        assert!(session.set_target_group(Some(&NodeId::from("group-missing"))).is_err());
    }

    #[test]
    fn test_removing_target_resets_to_root() {
        let mut session = Session::new();
        let group = session.add_group(Logic::And, false).unwrap();
        session.set_target_group(Some(&group)).unwrap();
        session.add_condition("role", Operator::Equals, "router").unwrap();

        assert!(session.remove_item(&group));
        assert!(session.current_path().is_empty());
        assert!(!session.remove_item(&group));

        session.add_condition("status", Operator::Equals, "active").unwrap();
        assert_eq!(session.tree().items.len(), 1);
    }

    #[test]
    fn test_stale_path_falls_back_to_root() {
        let mut session = Session::new();
        session.set_current_group_path(vec![NodeId::from("group-gone")]);
        session.add_condition("role", Operator::Equals, "router").unwrap();
        assert_eq!(session.tree().items.len(), 1);
        assert!(session.current_path().is_empty());
    }

    #[test]
    fn test_preview_guard() {
        let mut session = Session::new();
        assert_eq!(session.preview_conditions(), Err(SessionError::NoConditions));

        session.add_group(Logic::And, false).unwrap();
        assert_eq!(session.operations(), Err(SessionError::NoConditions));

        session.add_condition("role", Operator::Equals, "router").unwrap();
        assert_eq!(session.operations().unwrap().len(), 1);
    }

    #[test]
    fn test_load_flat_resets_target() {
        let mut session = Session::with_max_depth(3);
        let group = session.add_group(Logic::And, false).unwrap();
        session.set_target_group(Some(&group)).unwrap();

        session.load_flat(&[
            FlatCondition::new("role", Operator::Equals, "router", WireLogic::And),
            FlatCondition::new("role", Operator::Equals, "switch", WireLogic::Or),
        ]);
        assert!(session.current_path().is_empty());
        assert_eq!(session.tree().internal_logic, Logic::Or);
        assert_eq!(session.tree().max_depth(), 3);
    }

    #[test]
    fn test_replace_tree_validates_depth() {
        let mut deep = ConditionTree::with_max_depth(4);
        let mut path = Vec::new();
        for _ in 0..3 {
            let id = deep.add_group(&path, Logic::And, false).unwrap();
            path.push(id);
        }
        let mut session = Session::with_max_depth(2);
        assert_eq!(
            session.replace_tree(deep),
            Err(SessionError::Tree(TreeError::DepthExceeded { max: 2 }))
        );
    }

    #[test]
    fn test_root_and_group_logic() {
        let mut session = Session::new();
        let group = session.add_group(Logic::And, false).unwrap();
        session.set_root_logic(Logic::Or);
        assert!(session.update_group_logic(&group, LogicSlot::Internal, Logic::Or));
        assert_eq!(session.tree().internal_logic, Logic::Or);
        assert_eq!(session.tree().group(&group).unwrap().internal_logic, Logic::Or);

        session.clear();
        assert!(session.tree().is_empty());
    }
}
