//! 配置模块，负责加载JSON配置文件
//!
//! 配置内容包括：分组嵌套深度上限、可过滤字段列表、SQL 导出的表名与列映射。

use crate::schema::FieldSchema;
use crate::sql_compiler::{CompilerConfig, OptimizationConfig};
use crate::tree::DEFAULT_MAX_DEPTH;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("配置文件不存在: {}", .0.display())]
    NotFound(PathBuf),

    #[error("无法读取配置文件 {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("无法解析JSON配置文件 {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("配置无效: {0}")]
    Invalid(String),
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_table() -> String {
    "devices".to_string()
}

fn default_max_or_conditions_for_in() -> usize {
    OptimizationConfig::default().max_or_conditions_for_in
}

/// SQL 导出配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlConfig {
    #[serde(default = "default_table")]
    pub table: String,
    /// 字段名到数据库列名的映射
    #[serde(default)]
    pub column_mapping: HashMap<String, String>,
    #[serde(default = "default_max_or_conditions_for_in")]
    pub max_or_conditions_for_in: usize,
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            table: default_table(),
            column_mapping: HashMap::new(),
            max_or_conditions_for_in: default_max_or_conditions_for_in(),
        }
    }
}

/// 顶层配置结构
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryConfig {
    /// 分组最大嵌套深度
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// 可过滤字段
    #[serde(default)]
    pub fields: FieldSchema,
    #[serde(default)]
    pub sql: SqlConfig,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            fields: FieldSchema::standard(),
            sql: SqlConfig::default(),
        }
    }
}

impl InventoryConfig {
    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();

        // 检查文件是否存在
        if !path_ref.exists() {
            return Err(ConfigError::NotFound(path_ref.to_path_buf()));
        }

        let content = fs::read_to_string(path_ref).map_err(|source| ConfigError::Io {
            path: path_ref.to_path_buf(),
            source,
        })?;

        let config: InventoryConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path_ref.to_path_buf(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }

    /// 加载配置，失败时回退到默认配置
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::from_json_file(&path) {
            Ok(config) => {
                info!(path = %path.as_ref().display(), fields = config.fields.fields.len(), "配置已加载");
                config
            }
            Err(e) => {
                warn!("{e}, 使用默认配置");
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth == 0 {
            return Err(ConfigError::Invalid("max_depth 必须大于 0".to_string()));
        }
        if self.sql.table.trim().is_empty() {
            return Err(ConfigError::Invalid("sql.table 不能为空".to_string()));
        }
        if self.sql.max_or_conditions_for_in < 2 {
            return Err(ConfigError::Invalid(
                "sql.max_or_conditions_for_in 至少为 2".to_string(),
            ));
        }
        Ok(())
    }

    /// 生成 SQL 编译器配置
    pub fn compiler_config(&self) -> CompilerConfig {
        CompilerConfig {
            table: self.sql.table.clone(),
            column_mapping: self.sql.column_mapping.clone(),
            optimization_config: OptimizationConfig {
                max_or_conditions_for_in: self.sql.max_or_conditions_for_in,
            },
            max_depth: self.max_depth,
        }
    }
}
