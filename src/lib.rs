//! Device-selection condition builder.
//!
//! A [`Session`] owns a nested [`ConditionTree`] that is linearized into the
//! flat condition list the inventory backend consumes. The flat list can be
//! turned into logical operations, previewed against a device set, compiled
//! to SQL, and persisted as a saved inventory.

pub mod ast;
pub mod config;
pub mod device;
pub mod flat;
pub mod lexer;
pub mod operations;
pub mod parser;
pub mod preview;
pub mod saved;
pub mod schema;
pub mod session;
pub mod sql_compiler;
pub mod token;
pub mod tree;

pub use config::InventoryConfig;
pub use device::{DeviceInfo, DeviceSource, InMemoryInventory};
pub use flat::{flat_conditions_to_tree, tree_to_flat_conditions, FlatCondition, WireLogic};
pub use operations::{convert_conditions_to_operations, LogicalCondition, LogicalOperation, OperationType};
pub use preview::{PreviewResult, Previewer};
pub use saved::{ExportDocument, SavedInventory, Scope};
pub use schema::{FieldSchema, InventoryAnalysis};
pub use session::{Session, SessionError};
pub use sql_compiler::SqlCompiler;
pub use tree::{ConditionGroup, ConditionItem, ConditionTree, GroupLogic, Logic, LogicSlot, Node, NodeId, Operator};
