//! Test helpers.
//!
//! Tests that need a live PostgreSQL read `CATALOG_TEST_DATABASE_URL` and
//! return early when it is unset. The same server doubles as catalog store and
//! as target: target tables live in a throwaway schema per test.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::errors::AppResult;
use common::models::catalog::{ForeignKey, RowId};
use common::models::extract::{
    ColumnInfo, ColumnPair, Engine, ForeignKeyInfo, KeyColumn, PrimaryKeyInfo, TableInfo,
};
use common::utils::TargetDsn;
use sqlx::{Connection, PgConnection};

use crate::extractor::SchemaExtractor;
use crate::pool::CatalogPool;
use crate::schema;

const TEST_URL_VAR: &str = "CATALOG_TEST_DATABASE_URL";

pub fn test_url() -> Option<String> {
    std::env::var(TEST_URL_VAR).ok().filter(|v| !v.is_empty())
}

/// An initialized catalog pool with the catalog tables in place.
pub async fn catalog_pool() -> Option<Arc<CatalogPool>> {
    let url = test_url()?;
    let pool = Arc::new(CatalogPool::new(Duration::from_secs(5)));
    pool.init(&url, 0, 5).await.expect("init catalog pool");
    schema::ensure_schema(&pool).await.expect("create catalog tables");
    Some(pool)
}

/// A name no other test run will produce.
pub fn unique_name(prefix: &str) -> String {
    format!("{}_{}", prefix, uuid::Uuid::new_v4().simple())
}

pub async fn count_databases(pool: &CatalogPool, name: &str) -> i64 {
    let mut conn = pool.acquire().await.unwrap();
    sqlx::query_scalar("SELECT COUNT(*) FROM databases WHERE name = $1")
        .bind(name)
        .fetch_one(&mut *conn)
        .await
        .unwrap()
}

pub async fn count_tables(pool: &CatalogPool, name: &str) -> i64 {
    let mut conn = pool.acquire().await.unwrap();
    sqlx::query_scalar("SELECT COUNT(*) FROM tables WHERE name = $1")
        .bind(name)
        .fetch_one(&mut *conn)
        .await
        .unwrap()
}

/// Removes databases by name; child rows cascade.
pub async fn delete_databases(pool: &CatalogPool, name: &str) {
    let mut conn = pool.acquire().await.unwrap();
    sqlx::query("DELETE FROM databases WHERE name = $1")
        .bind(name)
        .execute(&mut *conn)
        .await
        .unwrap();
}

/// `(ordinal, column name)` of a table's primary key, in key order.
pub async fn primary_key_columns(pool: &CatalogPool, table_id: RowId) -> Vec<(i32, String)> {
    let mut conn = pool.acquire().await.unwrap();
    sqlx::query_as(
        "SELECT pkc.ordinal_position, c.name
         FROM primary_keys pk
         JOIN primary_key_columns pkc ON pkc.pk_id = pk.id
         JOIN columns c ON c.id = pkc.column_id
         WHERE pk.table_id = $1
         ORDER BY pk.id, pkc.ordinal_position",
    )
    .bind(table_id)
    .fetch_all(&mut *conn)
    .await
    .unwrap()
}

pub async fn primary_key_column_ids(pool: &CatalogPool, table_id: RowId) -> Vec<RowId> {
    let mut conn = pool.acquire().await.unwrap();
    sqlx::query_scalar(
        "SELECT pkc.column_id
         FROM primary_keys pk
         JOIN primary_key_columns pkc ON pkc.pk_id = pk.id
         WHERE pk.table_id = $1
         ORDER BY pk.id, pkc.ordinal_position",
    )
    .bind(table_id)
    .fetch_all(&mut *conn)
    .await
    .unwrap()
}

pub async fn foreign_keys(pool: &CatalogPool, table_id: RowId) -> Vec<ForeignKey> {
    let mut conn = pool.acquire().await.unwrap();
    sqlx::query_as(
        "SELECT id, table_id, referenced_table_id FROM foreign_keys
         WHERE table_id = $1 ORDER BY id",
    )
    .bind(table_id)
    .fetch_all(&mut *conn)
    .await
    .unwrap()
}

/// `(ordinal, source column, target column)` of every foreign key on a table.
pub async fn foreign_key_columns(
    pool: &CatalogPool,
    table_id: RowId,
) -> Vec<(i32, String, String)> {
    let mut conn = pool.acquire().await.unwrap();
    sqlx::query_as(
        "SELECT fkc.ordinal_position, src.name, tgt.name
         FROM foreign_keys fk
         JOIN foreign_key_columns fkc ON fkc.fk_id = fk.id
         JOIN columns src ON src.id = fkc.column_id
         JOIN columns tgt ON tgt.id = fkc.referenced_column_id
         WHERE fk.table_id = $1
         ORDER BY fk.id, fkc.ordinal_position",
    )
    .bind(table_id)
    .fetch_all(&mut *conn)
    .await
    .unwrap()
}

/// A scratch schema on the test server holding target tables.
pub struct TargetSchema {
    pub schema: String,
    url: String,
}

impl TargetSchema {
    /// Creates a fresh schema and runs `ddl` inside it.
    pub async fn create(ddl: &str) -> Option<Self> {
        let url = test_url()?;
        let schema = unique_name("target");

        let mut conn = PgConnection::connect(&url).await.unwrap();
        sqlx::raw_sql(&format!(
            "CREATE SCHEMA {schema}; SET search_path TO {schema}; {ddl}"
        ))
        .execute(&mut conn)
        .await
        .unwrap();
        conn.close().await.unwrap();

        Some(Self { schema, url })
    }

    /// Connection string pointing at this schema.
    pub fn dsn(&self) -> TargetDsn {
        let mut dsn = TargetDsn::parse(&self.url).unwrap();
        dsn.schema = Some(self.schema.clone());
        dsn
    }

    /// Same as [`dsn`](Self::dsn), as a string.
    pub fn dsn_string(&self) -> String {
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{}schema={}", self.url, separator, self.schema)
    }

    pub async fn drop_schema(self) {
        let mut conn = PgConnection::connect(&self.url).await.unwrap();
        sqlx::raw_sql(&format!("DROP SCHEMA {} CASCADE", self.schema))
            .execute(&mut conn)
            .await
            .unwrap();
        conn.close().await.unwrap();
    }
}

/// In-memory extractor; everything lives in schema `public`.
#[derive(Default)]
pub struct FakeExtractor {
    pub tables: Vec<TableInfo>,
    pub columns: HashMap<String, Vec<ColumnInfo>>,
    pub primary_keys: HashMap<String, Vec<PrimaryKeyInfo>>,
    pub foreign_keys: HashMap<String, Vec<ForeignKeyInfo>>,
}

impl FakeExtractor {
    pub fn table(mut self, name: &str, columns: Vec<ColumnInfo>) -> Self {
        self.tables.push(TableInfo {
            schema: "public".into(),
            name: name.into(),
            table_type: "BASE TABLE".into(),
        });
        self.columns.insert(name.into(), columns);
        self
    }

    pub fn primary_key(mut self, table: &str, columns: &[(&str, i32)]) -> Self {
        self.primary_keys
            .entry(table.into())
            .or_default()
            .push(PrimaryKeyInfo {
                constraint_name: format!("{}_pkey", table),
                columns: columns
                    .iter()
                    .map(|(name, ordinal)| KeyColumn {
                        name: (*name).into(),
                        ordinal_position: *ordinal,
                    })
                    .collect(),
            });
        self
    }

    pub fn foreign_key(mut self, table: &str, referenced: &str, pairs: &[(&str, &str)]) -> Self {
        let column_pairs: Vec<ColumnPair> = pairs
            .iter()
            .enumerate()
            .map(|(i, (source, target))| ColumnPair {
                source: (*source).into(),
                target: (*target).into(),
                ordinal_position: i as i32 + 1,
            })
            .collect();
        self.foreign_keys
            .entry(table.into())
            .or_default()
            .push(ForeignKeyInfo {
                constraint_name: format!("{}_{}_fkey", table, referenced),
                columns: column_pairs.iter().map(|p| p.source.clone()).collect(),
                referenced_schema: "public".into(),
                referenced_table: referenced.into(),
                referenced_columns: column_pairs.iter().map(|p| p.target.clone()).collect(),
                column_pairs,
            });
        self
    }
}

#[async_trait]
impl SchemaExtractor for FakeExtractor {
    fn engine(&self) -> Engine {
        Engine::Postgres
    }

    async fn list_tables(
        &mut self,
        schemas: Option<&[String]>,
        _include_system_schemas: bool,
    ) -> AppResult<Vec<TableInfo>> {
        Ok(self
            .tables
            .iter()
            .filter(|t| schemas.map_or(true, |s| s.contains(&t.schema)))
            .cloned()
            .collect())
    }

    async fn list_columns(&mut self, _schema: &str, table: &str) -> AppResult<Vec<ColumnInfo>> {
        Ok(self.columns.get(table).cloned().unwrap_or_default())
    }

    async fn list_primary_keys(
        &mut self,
        _schema: &str,
        table: &str,
    ) -> AppResult<Vec<PrimaryKeyInfo>> {
        Ok(self.primary_keys.get(table).cloned().unwrap_or_default())
    }

    async fn list_foreign_keys(
        &mut self,
        _schema: &str,
        table: &str,
    ) -> AppResult<Vec<ForeignKeyInfo>> {
        Ok(self.foreign_keys.get(table).cloned().unwrap_or_default())
    }

    async fn close(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }
}
