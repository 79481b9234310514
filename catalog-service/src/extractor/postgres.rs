//! PostgreSQL extractor.
//!
//! Reads `information_schema` for tables and `pg_catalog` for columns and
//! keys. Key columns come from `conkey`/`confkey`, unnested together so that
//! source and target columns are paired by array position. Foreign keys cloned
//! onto partitions (`conparentid <> 0`) are skipped; only the declared
//! constraint is reported.

use async_trait::async_trait;
use common::errors::{AppError, AppResult};
use common::models::extract::{ColumnInfo, Engine, ForeignKeyInfo, PrimaryKeyInfo, TableInfo};
use common::utils::TargetDsn;
use sqlx::postgres::PgConnectOptions;
use sqlx::{Connection, PgConnection};

use super::{
    group_foreign_keys, group_primary_keys, ExtractorTimeouts, ForeignKeyColumnRow, KeyColumnRow,
    SchemaExtractor,
};

const LIST_TABLES_SQL: &str = r#"
SELECT
    t.table_schema::text AS table_schema,
    t.table_name::text   AS table_name,
    t.table_type::text   AS table_type
FROM information_schema.tables AS t
WHERE ($1 OR (t.table_schema NOT LIKE 'pg\_%' AND t.table_schema <> 'information_schema'))
  AND ($2::text[] IS NULL OR t.table_schema = ANY($2))
ORDER BY t.table_schema, t.table_name
"#;

const LIST_COLUMNS_SQL: &str = r#"
SELECT
    a.attname::text                               AS name,
    pg_catalog.format_type(a.atttypid, a.atttypmod) AS data_type,
    NOT a.attnotnull                              AS is_nullable,
    a.attnum::int4                                AS ordinal_position,
    pg_catalog.pg_get_expr(d.adbin, d.adrelid)    AS default_expr
FROM pg_catalog.pg_attribute AS a
JOIN pg_catalog.pg_class AS c ON c.oid = a.attrelid
JOIN pg_catalog.pg_namespace AS n ON n.oid = c.relnamespace
LEFT JOIN pg_catalog.pg_attrdef AS d ON d.adrelid = a.attrelid AND d.adnum = a.attnum
WHERE n.nspname = $1
  AND c.relname = $2
  AND a.attnum > 0
  AND NOT a.attisdropped
ORDER BY a.attnum
"#;

const LIST_PRIMARY_KEYS_SQL: &str = r#"
SELECT
    con.conname::text AS constraint_name,
    a.attname::text   AS column_name,
    k.ord::int4       AS ordinal_position
FROM pg_catalog.pg_constraint AS con
JOIN pg_catalog.pg_class AS c ON c.oid = con.conrelid
JOIN pg_catalog.pg_namespace AS n ON n.oid = c.relnamespace
CROSS JOIN LATERAL unnest(con.conkey) WITH ORDINALITY AS k(attnum, ord)
JOIN pg_catalog.pg_attribute AS a ON a.attrelid = con.conrelid AND a.attnum = k.attnum
WHERE con.contype = 'p'
  AND n.nspname = $1
  AND c.relname = $2
ORDER BY con.conname, k.ord
"#;

const LIST_FOREIGN_KEYS_SQL: &str = r#"
SELECT
    con.conname::text AS constraint_name,
    rn.nspname::text  AS referenced_schema,
    rc.relname::text  AS referenced_table,
    sa.attname::text  AS column_name,
    ta.attname::text  AS referenced_column_name,
    k.ord::int4       AS ordinal_position
FROM pg_catalog.pg_constraint AS con
JOIN pg_catalog.pg_class AS c ON c.oid = con.conrelid
JOIN pg_catalog.pg_namespace AS n ON n.oid = c.relnamespace
JOIN pg_catalog.pg_class AS rc ON rc.oid = con.confrelid
JOIN pg_catalog.pg_namespace AS rn ON rn.oid = rc.relnamespace
CROSS JOIN LATERAL unnest(con.conkey, con.confkey) WITH ORDINALITY AS k(src_attnum, tgt_attnum, ord)
JOIN pg_catalog.pg_attribute AS sa ON sa.attrelid = con.conrelid AND sa.attnum = k.src_attnum
JOIN pg_catalog.pg_attribute AS ta ON ta.attrelid = con.confrelid AND ta.attnum = k.tgt_attnum
WHERE con.contype = 'f'
  AND con.conparentid = 0
  AND n.nspname = $1
  AND c.relname = $2
ORDER BY con.conname, k.ord
"#;

#[derive(sqlx::FromRow)]
struct TableRow {
    table_schema: String,
    table_name: String,
    table_type: String,
}

#[derive(sqlx::FromRow)]
struct ColumnRow {
    name: String,
    data_type: String,
    is_nullable: bool,
    ordinal_position: i32,
    default_expr: Option<String>,
}

/// Builds connect options for a target, with the statement timeout applied
/// server-side.
pub fn connect_options(target: &TargetDsn, timeouts: &ExtractorTimeouts) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&target.host)
        .port(target.port)
        .username(&target.username)
        .password(&target.password)
        .database(&target.database)
        .options([("statement_timeout", timeouts.statement.as_millis().to_string())])
}

/// Opens a single direct connection to a target, bounded by the connect timeout.
pub async fn open_connection(
    target: &TargetDsn,
    timeouts: &ExtractorTimeouts,
) -> AppResult<PgConnection> {
    let options = connect_options(target, timeouts);
    let conn = tokio::time::timeout(timeouts.connect, PgConnection::connect_with(&options))
        .await
        .map_err(|_| {
            AppError::DatabaseConnection(format!(
                "connecting to {} timed out after {}s",
                target.address(),
                timeouts.connect.as_secs()
            ))
        })?
        .map_err(|e| AppError::DatabaseConnection(format!("{}: {}", target.address(), e)))?;

    tracing::debug!(address = %target.address(), database = %target.database, "Target connection opened");
    Ok(conn)
}

/// PostgreSQL implementation of [`SchemaExtractor`].
pub struct PostgresExtractor {
    conn: PgConnection,
}

impl PostgresExtractor {
    pub async fn connect(target: &TargetDsn, timeouts: &ExtractorTimeouts) -> AppResult<Self> {
        let conn = open_connection(target, timeouts).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl SchemaExtractor for PostgresExtractor {
    fn engine(&self) -> Engine {
        Engine::Postgres
    }

    async fn list_tables(
        &mut self,
        schemas: Option<&[String]>,
        include_system_schemas: bool,
    ) -> AppResult<Vec<TableInfo>> {
        let rows = sqlx::query_as::<_, TableRow>(LIST_TABLES_SQL)
            .bind(include_system_schemas)
            .bind(schemas.map(|s| s.to_vec()))
            .fetch_all(&mut self.conn)
            .await
            .map_err(AppError::target)?;

        Ok(rows
            .into_iter()
            .map(|r| TableInfo {
                schema: r.table_schema,
                name: r.table_name,
                table_type: r.table_type,
            })
            .collect())
    }

    async fn list_columns(&mut self, schema: &str, table: &str) -> AppResult<Vec<ColumnInfo>> {
        let rows = sqlx::query_as::<_, ColumnRow>(LIST_COLUMNS_SQL)
            .bind(schema)
            .bind(table)
            .fetch_all(&mut self.conn)
            .await
            .map_err(AppError::target)?;

        Ok(rows
            .into_iter()
            .map(|r| ColumnInfo {
                name: r.name,
                data_type: r.data_type,
                is_nullable: r.is_nullable,
                ordinal_position: r.ordinal_position,
                default: r.default_expr,
            })
            .collect())
    }

    async fn list_primary_keys(
        &mut self,
        schema: &str,
        table: &str,
    ) -> AppResult<Vec<PrimaryKeyInfo>> {
        let rows = sqlx::query_as::<_, KeyColumnRow>(LIST_PRIMARY_KEYS_SQL)
            .bind(schema)
            .bind(table)
            .fetch_all(&mut self.conn)
            .await
            .map_err(AppError::target)?;

        Ok(group_primary_keys(rows))
    }

    async fn list_foreign_keys(
        &mut self,
        schema: &str,
        table: &str,
    ) -> AppResult<Vec<ForeignKeyInfo>> {
        let rows = sqlx::query_as::<_, ForeignKeyColumnRow>(LIST_FOREIGN_KEYS_SQL)
            .bind(schema)
            .bind(table)
            .fetch_all(&mut self.conn)
            .await
            .map_err(AppError::target)?;

        Ok(group_foreign_keys(rows))
    }

    async fn close(self: Box<Self>) -> AppResult<()> {
        self.conn.close().await.map_err(AppError::target)
    }
}
