//! Engine-agnostic schema records produced by the extractors.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::{AppError, AppResult};

/// Supported target engines.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// PostgreSQL database.
    Postgres,
}

impl Engine {
    /// Resolves a connection-string scheme.
    pub fn from_scheme(scheme: &str) -> AppResult<Self> {
        match scheme.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Engine::Postgres),
            other => Err(AppError::UnsupportedDatabaseType(other.to_string())),
        }
    }

    /// Returns the default port for this engine.
    pub fn default_port(&self) -> u16 {
        match self {
            Engine::Postgres => 5432,
        }
    }
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Engine::Postgres => write!(f, "postgres"),
        }
    }
}

/// A table or view reported by the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TableInfo {
    pub schema: String,
    pub name: String,
    /// Engine-specific kind, e.g. `BASE TABLE` or `VIEW`.
    pub table_type: String,
}

/// A column of a target table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ColumnInfo {
    pub name: String,
    /// Formatted engine type, e.g. `numeric(10,2)`.
    pub data_type: String,
    pub is_nullable: bool,
    /// 1-based position within the table.
    pub ordinal_position: i32,
    /// Default expression text.
    pub default: Option<String>,
}

/// A member column of a primary key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct KeyColumn {
    pub name: String,
    /// 1-based position within the key.
    pub ordinal_position: i32,
}

/// A primary key constraint with its columns in key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PrimaryKeyInfo {
    pub constraint_name: String,
    pub columns: Vec<KeyColumn>,
}

impl PrimaryKeyInfo {
    /// Column names in key order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Source/target column pair of a foreign key at one key position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ColumnPair {
    pub source: String,
    pub target: String,
    /// 1-based position within the key.
    pub ordinal_position: i32,
}

/// A foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ForeignKeyInfo {
    pub constraint_name: String,
    /// Source columns in key order.
    pub columns: Vec<String>,
    pub referenced_schema: String,
    pub referenced_table: String,
    /// Target columns in key order.
    pub referenced_columns: Vec<String>,
    /// Position-aligned source/target pairs.
    pub column_pairs: Vec<ColumnPair>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_aliases() {
        assert_eq!(Engine::from_scheme("postgres").unwrap(), Engine::Postgres);
        assert_eq!(Engine::from_scheme("PostgreSQL").unwrap(), Engine::Postgres);
        assert!(Engine::from_scheme("oracle").is_err());
    }
}
