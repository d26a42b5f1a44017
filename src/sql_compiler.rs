//! SQL compiler that turns logical operations into a device query using sea-query.
//!
//! The generated statement mirrors the preview semantics: the first
//! operation seeds the selection, later operations are ANDed in, and NOT
//! operations are ANDed in negated. Comparisons are case-insensitive.
//! Negative operators also match rows where the column is NULL, and a
//! subtracted NOT treats an unknown result as no match.

use crate::device::supports_contains;
use crate::operations::{LogicalCondition, LogicalOperation, OperationType};
use crate::tree::{Operator, DEFAULT_MAX_DEPTH};
use sea_query::{Asterisk, Expr, Func, Iden, LikeExpr, Order, PostgresQueryBuilder, SelectStatement, SimpleExpr};
use std::collections::HashMap;
use thiserror::Error;
use tracing::info;

/// Configuration for SQL optimization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizationConfig {
    /// Minimum number of equality conditions on one field inside an OR
    /// operation before they are folded into an IN clause
    pub max_or_conditions_for_in: usize,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            max_or_conditions_for_in: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerConfig {
    pub table: String,
    /// Maps field names to column names; unmapped fields use their own name
    pub column_mapping: HashMap<String, String>,
    pub optimization_config: OptimizationConfig,
    pub max_depth: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            table: "devices".to_string(),
            column_mapping: HashMap::new(),
            optimization_config: OptimizationConfig::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Table identifier for sea-query
#[derive(Debug, Clone)]
pub struct TableName(pub String);

impl Iden for TableName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        let _ = s.write_str(&self.0);
    }
}

/// Column identifier wrapper
#[derive(Debug, Clone)]
pub struct ColumnName(pub String);

impl Iden for ColumnName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        let _ = s.write_str(&self.0);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("no operations to compile")]
    Empty,

    #[error("operation nesting deeper than {max}")]
    DepthExceeded { max: usize },
}

/// Represents an optimization applied during compilation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Optimization {
    OrToIn { field: String, value_count: usize },
}

/// Result of SQL compilation with optimization information
#[derive(Debug)]
pub struct CompileResult {
    pub sql: String,
    pub optimizations: Vec<Optimization>,
}

/// SQL Compiler that converts logical operations to SQL queries
pub struct SqlCompiler {
    config: CompilerConfig,
}

impl Default for SqlCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlCompiler {
    pub fn new() -> Self {
        Self::from_config(CompilerConfig::default())
    }

    pub fn from_config(config: CompilerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    fn column_for(&self, field: &str) -> ColumnName {
        ColumnName(
            self.config
                .column_mapping
                .get(field)
                .cloned()
                .unwrap_or_else(|| field.to_string()),
        )
    }

    /// Compile operations into a SELECT over the device table
    pub fn compile(&self, operations: &[LogicalOperation]) -> Result<CompileResult, CompileError> {
        if operations.is_empty() {
            return Err(CompileError::Empty);
        }

        let mut optimizations = Vec::new();
        let mut selection: Option<SimpleExpr> = None;

        for operation in operations {
            let expr = self.compile_operation(operation, 0, &mut optimizations)?;
            selection = Some(match (selection, operation.operation_type) {
                (None, OperationType::Not) => Expr::val(false).into(),
                (None, _) => expr,
                (Some(acc), OperationType::Not) => {
                    acc.and(SimpleExpr::from(Func::coalesce([expr, Expr::val(false).into()])).not())
                }
                (Some(acc), _) => acc.and(expr),
            });
        }

        let mut select = SelectStatement::new();
        select
            .column(Asterisk)
            .from(TableName(self.config.table.clone()))
            .order_by(self.column_for("name"), Order::Asc);
        if let Some(selection) = selection {
            select.and_where(selection);
        }

        let sql = select.to_string(PostgresQueryBuilder);
        info!(operations = operations.len(), optimizations = optimizations.len(), "compiled selection to SQL");
        Ok(CompileResult { sql, optimizations })
    }

    fn compile_operation(
        &self,
        operation: &LogicalOperation,
        depth: usize,
        optimizations: &mut Vec<Optimization>,
    ) -> Result<SimpleExpr, CompileError> {
        if depth > self.config.max_depth {
            return Err(CompileError::DepthExceeded {
                max: self.config.max_depth,
            });
        }

        let mut parts = match operation.operation_type {
            OperationType::Or | OperationType::Not => {
                self.compile_or_conditions(&operation.conditions, optimizations)
            }
            OperationType::And => operation
                .conditions
                .iter()
                .map(|condition| self.compile_condition(condition))
                .collect(),
        };
        for nested in &operation.nested_operations {
            parts.push(self.compile_operation(nested, depth + 1, optimizations)?);
        }

        Ok(match operation.operation_type {
            OperationType::And => combine(parts, SimpleExpr::and, true),
            OperationType::Or | OperationType::Not => combine(parts, SimpleExpr::or, false),
        })
    }

    /// Compile OR'ed conditions, folding runs of equalities on one field into IN
    fn compile_or_conditions(
        &self,
        conditions: &[LogicalCondition],
        optimizations: &mut Vec<Optimization>,
    ) -> Vec<SimpleExpr> {
        let mut equality_values: HashMap<&str, Vec<String>> = HashMap::new();
        for condition in conditions {
            if condition.operator == Operator::Equals {
                equality_values
                    .entry(condition.field.as_str())
                    .or_default()
                    .push(condition.value.to_lowercase());
            }
        }

        let threshold = self.config.optimization_config.max_or_conditions_for_in;
        let mut folded: Vec<&str> = Vec::new();
        let mut parts = Vec::new();
        for condition in conditions {
            let field = condition.field.as_str();
            let values = equality_values.get(field).filter(|v| v.len() >= threshold);
            match (condition.operator, values) {
                (Operator::Equals, Some(values)) => {
                    if folded.contains(&field) {
                        continue;
                    }
                    folded.push(field);
                    optimizations.push(Optimization::OrToIn {
                        field: field.to_string(),
                        value_count: values.len(),
                    });
                    parts.push(self.lowered(field).is_in(values.iter().cloned()));
                }
                _ => parts.push(self.compile_condition(condition)),
            }
        }
        parts
    }

    fn lowered(&self, field: &str) -> Expr {
        Expr::expr(Func::lower(Expr::col(self.column_for(field))))
    }

    /// Compile a single condition. `contains` falls back to an exact match on
    /// fields without substring support.
    fn compile_condition(&self, condition: &LogicalCondition) -> SimpleExpr {
        let value = condition.value.to_lowercase();
        let column = self.lowered(&condition.field);
        let substring =
            condition.operator.positive() == Operator::Contains && supports_contains(&condition.field);
        let pattern = || LikeExpr::new(format!("%{}%", escape_like(&value))).escape('\\');

        let compared = match (condition.operator.is_negative(), substring) {
            (false, false) => column.eq(value.clone()),
            (false, true) => column.like(pattern()),
            (true, false) => column.ne(value.clone()),
            (true, true) => column.not_like(pattern()),
        };
        if condition.operator.is_negative() {
            Expr::col(self.column_for(&condition.field)).is_null().or(compared)
        } else {
            compared
        }
    }
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Combine expressions; an empty list yields `empty`
fn combine(parts: Vec<SimpleExpr>, op: fn(SimpleExpr, SimpleExpr) -> SimpleExpr, empty: bool) -> SimpleExpr {
    parts
        .into_iter()
        .reduce(op)
        .unwrap_or_else(|| Expr::val(empty).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn condition(field: &str, operator: Operator, value: &str) -> LogicalCondition {
        LogicalCondition {
            field: field.to_string(),
            operator,
            value: value.to_string(),
        }
    }

    #[test]
    fn test_simple_filter_compilation() {
        let compiler = SqlCompiler::new();
        let operations = vec![LogicalOperation::new(
            OperationType::And,
            vec![
                condition("role", Operator::Equals, "Router"),
                condition("location", Operator::Contains, "DC"),
            ],
        )];

        let result = compiler.compile(&operations).unwrap();
        assert!(result.sql.starts_with(r#"SELECT * FROM "devices" WHERE"#));
        assert!(result.sql.contains(r#"LOWER("role") = 'router'"#));
        assert!(result.sql.contains(r#"LOWER("location") LIKE '%dc%'"#));
        assert!(result.sql.contains(" AND "));
        assert!(result.sql.ends_with(r#"ORDER BY "name" ASC"#));
        assert!(result.optimizations.is_empty());
    }

    #[test]
    fn test_not_operation_is_negated() {
        let compiler = SqlCompiler::new();
        let operations = vec![
            LogicalOperation::new(OperationType::And, vec![condition("role", Operator::Equals, "router")]),
            LogicalOperation::new(OperationType::Not, vec![condition("status", Operator::Equals, "offline")]),
        ];
        let result = compiler.compile(&operations).unwrap();
        assert!(result.sql.contains("NOT"));
        assert!(result.sql.contains("'offline'"));
    }

    #[test]
    fn test_subtracted_not_treats_null_as_no_match() {
        let compiler = SqlCompiler::new();
        let operations = vec![
            LogicalOperation::new(OperationType::And, vec![condition("role", Operator::Equals, "router")]),
            LogicalOperation::new(OperationType::Not, vec![condition("platform", Operator::Equals, "ios")]),
        ];
        let result = compiler.compile(&operations).unwrap();
        assert!(result.sql.contains("NOT COALESCE("));
        assert!(result.sql.contains(r#"LOWER("platform") = 'ios', FALSE)"#));
    }

    #[test]
    fn test_negative_operators_match_null_columns() {
        let compiler = SqlCompiler::new();
        let result = compiler
            .compile(&[LogicalOperation::new(
                OperationType::And,
                vec![condition("platform", Operator::NotEquals, "IOS")],
            )])
            .unwrap();
        assert!(result.sql.contains(r#""platform" IS NULL OR LOWER("platform") <> 'ios'"#));

        let result = compiler
            .compile(&[LogicalOperation::new(
                OperationType::And,
                vec![condition("name", Operator::NotContains, "spare")],
            )])
            .unwrap();
        assert!(result.sql.contains(r#""name" IS NULL OR LOWER("name") NOT LIKE '%spare%'"#));
    }

    #[test]
    fn test_contains_falls_back_to_equality() {
        let compiler = SqlCompiler::new();
        let result = compiler
            .compile(&[LogicalOperation::new(
                OperationType::And,
                vec![condition("role", Operator::Contains, "rout")],
            )])
            .unwrap();
        assert!(result.sql.contains(r#"LOWER("role") = 'rout'"#));
        assert!(!result.sql.contains("LIKE"));

        let result = compiler
            .compile(&[LogicalOperation::new(
                OperationType::And,
                vec![condition("cf_rack", Operator::NotContains, "r1")],
            )])
            .unwrap();
        assert!(result.sql.contains(r#"LOWER("cf_rack") NOT LIKE '%r1%'"#));
    }

    #[test]
    fn test_leading_not_selects_nothing() {
        let compiler = SqlCompiler::new();
        let operations = vec![LogicalOperation::new(
            OperationType::Not,
            vec![condition("status", Operator::Equals, "offline")],
        )];
        let result = compiler.compile(&operations).unwrap();
        assert!(result.sql.contains("FALSE"));
        assert!(!result.sql.contains("offline"));
    }

    #[test]
    fn test_or_to_in_optimization() {
        let compiler = SqlCompiler::from_config(CompilerConfig {
            optimization_config: OptimizationConfig {
                max_or_conditions_for_in: 2,
            },
            ..Default::default()
        });
        let operations = vec![LogicalOperation::new(
            OperationType::Or,
            vec![
                condition("status", Operator::Equals, "Active"),
                condition("location", Operator::Equals, "DC1"),
                condition("status", Operator::Equals, "Planned"),
                condition("status", Operator::Equals, "Staged"),
            ],
        )];

        let result = compiler.compile(&operations).unwrap();
        assert_eq!(
            result.optimizations,
            vec![Optimization::OrToIn {
                field: "status".to_string(),
                value_count: 3
            }]
        );
        assert!(result.sql.contains(r#"LOWER("status") IN ('active', 'planned', 'staged')"#));
        assert!(result.sql.contains(r#"LOWER("location") = 'dc1'"#));
    }

    #[test]
    fn test_column_mapping_and_table() {
        let mut column_mapping = HashMap::new();
        column_mapping.insert("role".to_string(), "role_name".to_string());
        let compiler = SqlCompiler::from_config(CompilerConfig {
            table: "dcim_device".to_string(),
            column_mapping,
            ..Default::default()
        });
        let operations = vec![LogicalOperation::new(
            OperationType::And,
            vec![condition("role", Operator::NotEquals, "switch")],
        )];
        let result = compiler.compile(&operations).unwrap();
        assert!(result.sql.contains(r#"FROM "dcim_device""#));
        assert!(result.sql.contains(r#""role_name" IS NULL OR LOWER("role_name") <> 'switch'"#));
    }

    #[test]
    fn test_like_pattern_is_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[test]
    fn test_empty_operations() {
        assert_eq!(SqlCompiler::new().compile(&[]).unwrap_err(), CompileError::Empty);
    }

    #[test]
    fn test_nesting_limit() {
        let compiler = SqlCompiler::from_config(CompilerConfig {
            max_depth: 1,
            ..Default::default()
        });
        let mut operation = LogicalOperation::new(OperationType::And, vec![]);
        for _ in 0..2 {
            let mut parent = LogicalOperation::new(OperationType::And, vec![]);
            parent.nested_operations.push(operation);
            operation = parent;
        }
        assert_eq!(
            compiler.compile(&[operation]).unwrap_err(),
            CompileError::DepthExceeded { max: 1 }
        );
    }
}
