//! Catalog-store schema bootstrap.

use common::errors::{AppError, AppResult};

use crate::pool::CatalogPool;

/// Catalog tables; every child row cascades from its parent.
///
/// Runs as one implicit transaction under an advisory lock so concurrent
/// starts do not race on `CREATE TABLE IF NOT EXISTS`.
const CATALOG_DDL: &str = r#"
SELECT pg_advisory_xact_lock(717273);

CREATE TABLE IF NOT EXISTS databases (
    id   SERIAL PRIMARY KEY,
    name VARCHAR(255) NOT NULL
);

CREATE TABLE IF NOT EXISTS credentials (
    id          SERIAL PRIMARY KEY,
    database_id INT NOT NULL REFERENCES databases(id) ON DELETE CASCADE,
    host        VARCHAR(255) NOT NULL,
    port        INT NOT NULL CHECK (port > 0 AND port <= 65535),
    username    VARCHAR(255) NOT NULL,
    password    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tables (
    id          SERIAL PRIMARY KEY,
    database_id INT NOT NULL REFERENCES databases(id) ON DELETE CASCADE,
    name        VARCHAR(255) NOT NULL
);

CREATE TABLE IF NOT EXISTS columns (
    id        SERIAL PRIMARY KEY,
    table_id  INT NOT NULL REFERENCES tables(id) ON DELETE CASCADE,
    name      VARCHAR(255) NOT NULL,
    data_type TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS primary_keys (
    id       SERIAL PRIMARY KEY,
    table_id INT NOT NULL REFERENCES tables(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS primary_key_columns (
    pk_id            INT NOT NULL REFERENCES primary_keys(id) ON DELETE CASCADE,
    column_id        INT NOT NULL REFERENCES columns(id) ON DELETE CASCADE,
    ordinal_position INT NOT NULL CHECK (ordinal_position > 0),
    PRIMARY KEY (pk_id, ordinal_position),
    UNIQUE (pk_id, column_id)
);

CREATE TABLE IF NOT EXISTS foreign_keys (
    id                  SERIAL PRIMARY KEY,
    table_id            INT NOT NULL REFERENCES tables(id) ON DELETE CASCADE,
    referenced_table_id INT NOT NULL REFERENCES tables(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS foreign_key_columns (
    fk_id                INT NOT NULL REFERENCES foreign_keys(id) ON DELETE CASCADE,
    column_id            INT NOT NULL REFERENCES columns(id) ON DELETE CASCADE,
    referenced_column_id INT NOT NULL REFERENCES columns(id) ON DELETE CASCADE,
    ordinal_position     INT NOT NULL CHECK (ordinal_position > 0),
    PRIMARY KEY (fk_id, ordinal_position),
    UNIQUE (fk_id, column_id, referenced_column_id)
);

CREATE TABLE IF NOT EXISTS saved_queries (
    id          SERIAL PRIMARY KEY,
    database_id INT NOT NULL REFERENCES databases(id) ON DELETE CASCADE,
    sql_text    TEXT NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS idx_databases_name ON databases (name);
CREATE INDEX IF NOT EXISTS idx_tables_database_name ON tables (database_id, name);
CREATE INDEX IF NOT EXISTS idx_columns_table_name ON columns (table_id, name);
"#;

/// Creates the catalog tables if they do not exist.
pub async fn ensure_schema(pool: &CatalogPool) -> AppResult<()> {
    let mut conn = pool.acquire().await?;
    sqlx::raw_sql(CATALOG_DDL)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::Persistence(format!("Failed to create catalog tables: {}", e)))?;

    tracing::info!("Catalog tables ensured");
    Ok(())
}
