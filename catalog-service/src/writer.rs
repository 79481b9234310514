//! Catalog writer.
//!
//! A fill materializes one snapshot of a target schema inside a single
//! read-write [`TxScope`]. Rows are inserted parents first because later steps
//! need the ids of earlier ones:
//!
//! 1. `databases` and `credentials`
//! 2. `tables`, in the order the extractor reports them
//! 3. `columns`, per table in ordinal order
//! 4. `primary_keys` + `primary_key_columns`
//! 5. `foreign_keys` + `foreign_key_columns`
//!
//! Any error drops the scope, which rolls everything back.

use std::sync::Arc;

use common::errors::{AppError, AppResult};
use common::models::catalog::{
    Column, Credential, Database, ForeignKey, PrimaryKey, RowId, SavedQuery, Table,
};
use common::models::extract::{ColumnInfo, TableInfo};
use common::utils::TargetDsn;
use sqlx::PgConnection;

use crate::extractor::{self, ExtractorTimeouts, SchemaExtractor};
use crate::pool::CatalogPool;
use crate::secrets::SecretStore;
use crate::tx::TxScope;

/// Row counts of one fill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillSummary {
    pub database: Database,
    pub tables: usize,
    pub columns: usize,
    pub primary_keys: usize,
    pub foreign_keys: usize,
}

/// Writes schema snapshots and saved queries into the catalog store.
pub struct CatalogWriter {
    pool: Arc<CatalogPool>,
    secrets: Arc<dyn SecretStore>,
    timeouts: ExtractorTimeouts,
    default_schema: String,
}

impl CatalogWriter {
    pub fn new(
        pool: Arc<CatalogPool>,
        secrets: Arc<dyn SecretStore>,
        timeouts: ExtractorTimeouts,
        default_schema: impl Into<String>,
    ) -> Self {
        Self {
            pool,
            secrets,
            timeouts,
            default_schema: default_schema.into(),
        }
    }

    /// Extracts the schema of the database named by `dsn` and stores it.
    ///
    /// # Errors
    /// `Validation` if `dsn` does not parse, `DatabaseConnection` if the target
    /// is unreachable, `DatabaseQuery` if extraction fails and `Persistence`
    /// if a catalog write fails. Nothing is stored on error.
    pub async fn fill(&self, dsn: &str) -> AppResult<FillSummary> {
        let target = TargetDsn::parse(dsn)?;
        let mut extractor = extractor::connect(&target, &self.timeouts).await?;
        tracing::debug!(engine = %extractor.engine(), address = %target.address(), "Extracting schema");

        let result = self.fill_with(&target, extractor.as_mut()).await;

        if let Err(e) = extractor.close().await {
            tracing::debug!(error = %e, "Closing target connection failed");
        }
        result
    }

    /// Stores the snapshot read through `extractor` for `target`.
    pub async fn fill_with(
        &self,
        target: &TargetDsn,
        extractor: &mut dyn SchemaExtractor,
    ) -> AppResult<FillSummary> {
        let schema = target.schema_or(&self.default_schema).to_string();
        let mut tx = TxScope::read_write(&self.pool).await?;

        match self.write_snapshot(&mut tx, target, extractor, &schema).await {
            Ok(summary) => {
                tx.commit().await?;
                tracing::info!(
                    database = %summary.database.name,
                    database_id = summary.database.id,
                    schema = %schema,
                    tables = summary.tables,
                    columns = summary.columns,
                    primary_keys = summary.primary_keys,
                    foreign_keys = summary.foreign_keys,
                    "Catalog filled"
                );
                Ok(summary)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::debug!(error = %rollback_err, "Rollback failed; connection discarded");
                }
                tracing::warn!(database = %target.database, schema = %schema, error = %e, "Fill rolled back");
                Err(e)
            }
        }
    }

    async fn write_snapshot(
        &self,
        tx: &mut TxScope,
        target: &TargetDsn,
        extractor: &mut dyn SchemaExtractor,
        schema: &str,
    ) -> AppResult<FillSummary> {
        let database = insert_database(tx.conn(), &target.database).await?;
        let password = self.secrets.seal(&target.password)?;
        insert_credential(tx.conn(), database.id, target, &password).await?;

        let schemas = [schema.to_string()];
        let table_infos = extractor.list_tables(Some(&schemas[..]), false).await?;

        let mut tables: Vec<(&TableInfo, Table)> = Vec::with_capacity(table_infos.len());
        for info in &table_infos {
            let table = insert_table(tx.conn(), database.id, &info.name).await?;
            tables.push((info, table));
        }

        let mut column_count = 0;
        for (info, table) in &tables {
            let mut columns = extractor.list_columns(&info.schema, &info.name).await?;
            columns.sort_by_key(|c| c.ordinal_position);
            for column in &columns {
                insert_column(tx.conn(), table.id, column).await?;
            }
            column_count += columns.len();
        }

        let mut pk_count = 0;
        for (info, table) in &tables {
            for pk in extractor.list_primary_keys(&info.schema, &info.name).await? {
                if pk.columns.is_empty() {
                    continue;
                }
                let header = insert_primary_key(tx.conn(), table.id).await?;
                for key_column in &pk.columns {
                    let column_id = resolve_column_id(tx.conn(), table, &key_column.name).await?;
                    insert_primary_key_column(
                        tx.conn(),
                        header.id,
                        column_id,
                        key_column.ordinal_position,
                    )
                    .await?;
                }
                pk_count += 1;
            }
        }

        let mut fk_count = 0;
        for (info, table) in &tables {
            for fk in extractor.list_foreign_keys(&info.schema, &info.name).await? {
                if fk.column_pairs.is_empty() {
                    continue;
                }
                if fk.referenced_schema != info.schema {
                    return Err(AppError::Persistence(format!(
                        "foreign key '{}' on '{}' references '{}.{}' outside schema '{}'",
                        fk.constraint_name, info.name, fk.referenced_schema, fk.referenced_table, info.schema
                    )));
                }

                let referenced = resolve_table(tx.conn(), database.id, &fk.referenced_table).await?;
                let header = insert_foreign_key(tx.conn(), table.id, referenced.id).await?;
                for pair in &fk.column_pairs {
                    let column_id = resolve_column_id(tx.conn(), table, &pair.source).await?;
                    let referenced_column_id =
                        resolve_column_id(tx.conn(), &referenced, &pair.target).await?;
                    insert_foreign_key_column(
                        tx.conn(),
                        header.id,
                        column_id,
                        referenced_column_id,
                        pair.ordinal_position,
                    )
                    .await?;
                }
                fk_count += 1;
            }
        }

        Ok(FillSummary {
            database,
            tables: tables.len(),
            columns: column_count,
            primary_keys: pk_count,
            foreign_keys: fk_count,
        })
    }

    /// Records a query executed against a filled database.
    ///
    /// With several databases of the same name the most recent fill wins.
    pub async fn save_query(&self, database_name: &str, sql_text: &str) -> AppResult<SavedQuery> {
        let mut tx = TxScope::read_write(&self.pool).await?;

        let database_id: RowId = sqlx::query_scalar(
            "SELECT id FROM databases WHERE name = $1 ORDER BY id DESC LIMIT 1",
        )
        .bind(database_name)
        .fetch_optional(tx.conn())
        .await
        .map_err(AppError::catalog)?
        .ok_or_else(|| AppError::NotFound(format!("database '{}'", database_name)))?;

        let saved = sqlx::query_as::<_, SavedQuery>(
            "INSERT INTO saved_queries (database_id, sql_text) VALUES ($1, $2)
             RETURNING id, database_id, sql_text, created_at",
        )
        .bind(database_id)
        .bind(sql_text)
        .fetch_one(tx.conn())
        .await
        .map_err(AppError::catalog)?;

        tx.commit().await?;
        tracing::debug!(database = %database_name, query_id = saved.id, "Query saved");
        Ok(saved)
    }
}

async fn insert_database(conn: &mut PgConnection, name: &str) -> AppResult<Database> {
    sqlx::query_as::<_, Database>("INSERT INTO databases (name) VALUES ($1) RETURNING id, name")
        .bind(name)
        .fetch_one(conn)
        .await
        .map_err(AppError::catalog)
}

async fn insert_credential(
    conn: &mut PgConnection,
    database_id: RowId,
    target: &TargetDsn,
    stored_password: &str,
) -> AppResult<Credential> {
    sqlx::query_as::<_, Credential>(
        "INSERT INTO credentials (database_id, host, port, username, password)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING id, database_id, host, port, username, password",
    )
    .bind(database_id)
    .bind(&target.host)
    .bind(i32::from(target.port))
    .bind(&target.username)
    .bind(stored_password)
    .fetch_one(conn)
    .await
    .map_err(AppError::catalog)
}

async fn insert_table(conn: &mut PgConnection, database_id: RowId, name: &str) -> AppResult<Table> {
    sqlx::query_as::<_, Table>(
        "INSERT INTO tables (database_id, name) VALUES ($1, $2) RETURNING id, database_id, name",
    )
    .bind(database_id)
    .bind(name)
    .fetch_one(conn)
    .await
    .map_err(AppError::catalog)
}

async fn insert_column(conn: &mut PgConnection, table_id: RowId, column: &ColumnInfo) -> AppResult<Column> {
    sqlx::query_as::<_, Column>(
        "INSERT INTO columns (table_id, name, data_type) VALUES ($1, $2, $3)
         RETURNING id, table_id, name, data_type",
    )
    .bind(table_id)
    .bind(&column.name)
    .bind(&column.data_type)
    .fetch_one(conn)
    .await
    .map_err(AppError::catalog)
}

async fn insert_primary_key(conn: &mut PgConnection, table_id: RowId) -> AppResult<PrimaryKey> {
    sqlx::query_as::<_, PrimaryKey>(
        "INSERT INTO primary_keys (table_id) VALUES ($1) RETURNING id, table_id",
    )
    .bind(table_id)
    .fetch_one(conn)
    .await
    .map_err(AppError::catalog)
}

async fn insert_primary_key_column(
    conn: &mut PgConnection,
    pk_id: RowId,
    column_id: RowId,
    ordinal_position: i32,
) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO primary_key_columns (pk_id, column_id, ordinal_position) VALUES ($1, $2, $3)",
    )
    .bind(pk_id)
    .bind(column_id)
    .bind(ordinal_position)
    .execute(conn)
    .await
    .map_err(AppError::catalog)?;
    Ok(())
}

async fn insert_foreign_key(
    conn: &mut PgConnection,
    table_id: RowId,
    referenced_table_id: RowId,
) -> AppResult<ForeignKey> {
    sqlx::query_as::<_, ForeignKey>(
        "INSERT INTO foreign_keys (table_id, referenced_table_id) VALUES ($1, $2)
         RETURNING id, table_id, referenced_table_id",
    )
    .bind(table_id)
    .bind(referenced_table_id)
    .fetch_one(conn)
    .await
    .map_err(AppError::catalog)
}

async fn insert_foreign_key_column(
    conn: &mut PgConnection,
    fk_id: RowId,
    column_id: RowId,
    referenced_column_id: RowId,
    ordinal_position: i32,
) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO foreign_key_columns (fk_id, column_id, referenced_column_id, ordinal_position)
         VALUES ($1, $2, $3, $4)",
    )
    .bind(fk_id)
    .bind(column_id)
    .bind(referenced_column_id)
    .bind(ordinal_position)
    .execute(conn)
    .await
    .map_err(AppError::catalog)?;
    Ok(())
}

/// Finds a table of this snapshot by name.
async fn resolve_table(conn: &mut PgConnection, database_id: RowId, name: &str) -> AppResult<Table> {
    sqlx::query_as::<_, Table>(
        "SELECT id, database_id, name FROM tables WHERE database_id = $1 AND name = $2
         ORDER BY id LIMIT 1",
    )
    .bind(database_id)
    .bind(name)
    .fetch_optional(conn)
    .await
    .map_err(AppError::catalog)?
    .ok_or_else(|| {
        AppError::Persistence(format!(
            "referenced table '{}' is not part of database #{}",
            name, database_id
        ))
    })
}

/// Finds a column by name within its owning table.
async fn resolve_column_id(conn: &mut PgConnection, table: &Table, name: &str) -> AppResult<RowId> {
    sqlx::query_scalar("SELECT id FROM columns WHERE table_id = $1 AND name = $2 ORDER BY id LIMIT 1")
        .bind(table.id)
        .bind(name)
        .fetch_optional(conn)
        .await
        .map_err(AppError::catalog)?
        .ok_or_else(|| {
            AppError::Persistence(format!("column '{}' not found in table '{}'", name, table.name))
        })
}
