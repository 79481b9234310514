//! Schema extractors.
//!
//! An extractor opens its own connection to a *target* database and reads the
//! engine's catalog views into engine-agnostic records. There is one
//! implementation per engine; [`connect`] picks it from the connection string.

pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use common::config::AppConfig;
use common::errors::AppResult;
use common::models::extract::{
    ColumnInfo, ColumnPair, Engine, ForeignKeyInfo, KeyColumn, PrimaryKeyInfo, TableInfo,
};
use common::utils::TargetDsn;

/// Limits applied to every target connection.
#[derive(Debug, Clone, Copy)]
pub struct ExtractorTimeouts {
    pub connect: Duration,
    pub statement: Duration,
}

impl ExtractorTimeouts {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            connect: config.connect_timeout(),
            statement: config.statement_timeout(),
        }
    }
}

/// Reads table, column and key metadata from a target database.
#[async_trait]
pub trait SchemaExtractor: Send {
    fn engine(&self) -> Engine;

    /// Tables ordered by (schema, name). `schemas` restricts the result;
    /// system schemas are left out unless `include_system_schemas` is set.
    async fn list_tables(
        &mut self,
        schemas: Option<&[String]>,
        include_system_schemas: bool,
    ) -> AppResult<Vec<TableInfo>>;

    /// Columns ordered by ascending ordinal position.
    async fn list_columns(&mut self, schema: &str, table: &str) -> AppResult<Vec<ColumnInfo>>;

    /// Primary key constraints with columns in key order.
    async fn list_primary_keys(&mut self, schema: &str, table: &str)
        -> AppResult<Vec<PrimaryKeyInfo>>;

    /// Foreign key constraints with position-aligned column pairs.
    async fn list_foreign_keys(&mut self, schema: &str, table: &str)
        -> AppResult<Vec<ForeignKeyInfo>>;

    /// Closes the target connection.
    async fn close(self: Box<Self>) -> AppResult<()>;
}

/// Opens an extractor for the engine named by `target`.
pub async fn connect(
    target: &TargetDsn,
    timeouts: &ExtractorTimeouts,
) -> AppResult<Box<dyn SchemaExtractor>> {
    match target.engine {
        Engine::Postgres => {
            let extractor = postgres::PostgresExtractor::connect(target, timeouts).await?;
            Ok(Box::new(extractor))
        }
    }
}

/// One member column of a key constraint as read from the engine.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct KeyColumnRow {
    pub constraint_name: String,
    pub column_name: String,
    pub ordinal_position: i32,
}

/// One source/target column pair of a foreign key as read from the engine.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct ForeignKeyColumnRow {
    pub constraint_name: String,
    pub referenced_schema: String,
    pub referenced_table: String,
    pub column_name: String,
    pub referenced_column_name: String,
    pub ordinal_position: i32,
}

/// Groups key rows by constraint name, keeping the order in which constraints
/// first appear and sorting members by ordinal position.
pub(crate) fn group_primary_keys(rows: Vec<KeyColumnRow>) -> Vec<PrimaryKeyInfo> {
    let mut keys: Vec<PrimaryKeyInfo> = Vec::new();
    for row in rows {
        let column = KeyColumn {
            name: row.column_name,
            ordinal_position: row.ordinal_position,
        };
        match keys.iter_mut().find(|k| k.constraint_name == row.constraint_name) {
            Some(key) => key.columns.push(column),
            None => keys.push(PrimaryKeyInfo {
                constraint_name: row.constraint_name,
                columns: vec![column],
            }),
        }
    }
    for key in &mut keys {
        key.columns.sort_by_key(|c| c.ordinal_position);
    }
    keys
}

/// Groups foreign key rows by constraint name. Each row already pairs the
/// source and target column at one key position, so pairs are kept as read
/// and only ordered by position.
pub(crate) fn group_foreign_keys(rows: Vec<ForeignKeyColumnRow>) -> Vec<ForeignKeyInfo> {
    let mut keys: Vec<ForeignKeyInfo> = Vec::new();
    for row in rows {
        let pair = ColumnPair {
            source: row.column_name,
            target: row.referenced_column_name,
            ordinal_position: row.ordinal_position,
        };
        match keys.iter_mut().find(|k| k.constraint_name == row.constraint_name) {
            Some(key) => key.column_pairs.push(pair),
            None => keys.push(ForeignKeyInfo {
                constraint_name: row.constraint_name,
                columns: Vec::new(),
                referenced_schema: row.referenced_schema,
                referenced_table: row.referenced_table,
                referenced_columns: Vec::new(),
                column_pairs: vec![pair],
            }),
        }
    }
    for key in &mut keys {
        key.column_pairs.sort_by_key(|p| p.ordinal_position);
        key.columns = key.column_pairs.iter().map(|p| p.source.clone()).collect();
        key.referenced_columns = key.column_pairs.iter().map(|p| p.target.clone()).collect();
    }
    keys
}
