//! Shared data models.

pub mod catalog;
pub mod extract;
pub mod metadata;

// Re-export commonly used types
pub use catalog::{
    Column, Credential, Database, ForeignKey, ForeignKeyColumn, PrimaryKey, PrimaryKeyColumn,
    RowId, SavedQuery, Table,
};
pub use extract::{ColumnInfo, ColumnPair, Engine, ForeignKeyInfo, KeyColumn, PrimaryKeyInfo, TableInfo};
pub use metadata::{
    DatabaseMetadataInfo, ExecuteQueryRequest, FillRequest, FillResponse, QueryResult,
    SavedQueryItem, TableSimpleView,
};
