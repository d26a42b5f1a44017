use crate::tree::{Logic, NodeId, Operator};
use std::path::PathBuf;

/// 交互式命令行解析后的一条命令
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `add <field> <operator> <value>`：在当前目标分组中添加条件
    Add {
        field: String,
        operator: Operator,
        value: String,
    },
    /// `group <and|or> [not]`：在当前目标分组中新建分组
    Group { logic: Logic, negate: bool },
    /// `enter <group-id>`：切换目标分组
    Enter(NodeId),
    /// `root`：目标回到根节点
    Root,
    /// `rm <id>`：删除条件或分组（连同子树）
    Remove(NodeId),
    /// `logic <group-id> <and|or>`：分组与前面兄弟节点的连接逻辑
    Logic { group: NodeId, logic: Logic },
    /// `inner <group-id> <and|or>`：分组内部子节点的组合逻辑
    Inner { group: NodeId, logic: Logic },
    /// `combine <and|or>`：根节点的组合逻辑
    Combine(Logic),
    Show,
    Flat,
    Ops,
    Preview,
    Sql,
    Fields,
    /// `values <field>`：字段的候选值
    Values(String),
    /// `save <file> <name>`
    Save { path: PathBuf, name: String },
    Load(PathBuf),
    /// `export <file> <name>`
    Export { path: PathBuf, name: String },
    Import(PathBuf),
    Clear,
    Help,
    Quit,
}
