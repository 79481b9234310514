//! Catalog reader.
//!
//! Every query runs inside its own read-only [`TxScope`].

use std::sync::Arc;

use common::errors::{AppError, AppResult};
use common::models::catalog::{Column, Credential, Database, RowId, Table};
use common::models::metadata::{DatabaseMetadataInfo, SavedQueryItem, TableSimpleView};

use crate::pool::CatalogPool;
use crate::tx::TxScope;

/// Read access to the materialized catalog.
#[derive(Clone)]
pub struct CatalogReader {
    pool: Arc<CatalogPool>,
}

impl CatalogReader {
    pub fn new(pool: Arc<CatalogPool>) -> Self {
        Self { pool }
    }

    /// All databases, ordered by id.
    pub async fn list_databases(&self) -> AppResult<Vec<Database>> {
        let mut tx = TxScope::read_only(&self.pool).await?;
        let rows = sqlx::query_as::<_, Database>("SELECT id, name FROM databases ORDER BY id")
            .fetch_all(tx.conn())
            .await
            .map_err(AppError::catalog)?;
        tx.commit().await?;
        Ok(rows)
    }

    /// Tables of one database, in insertion order.
    pub async fn list_tables(&self, database_id: RowId) -> AppResult<Vec<Table>> {
        let mut tx = TxScope::read_only(&self.pool).await?;
        let rows = sqlx::query_as::<_, Table>(
            "SELECT id, database_id, name FROM tables WHERE database_id = $1 ORDER BY id",
        )
        .bind(database_id)
        .fetch_all(tx.conn())
        .await
        .map_err(AppError::catalog)?;
        tx.commit().await?;
        Ok(rows)
    }

    /// Columns of one table; id order is ordinal order.
    pub async fn list_columns(&self, table_id: RowId) -> AppResult<Vec<Column>> {
        let mut tx = TxScope::read_only(&self.pool).await?;
        let rows = sqlx::query_as::<_, Column>(
            "SELECT id, table_id, name, data_type FROM columns WHERE table_id = $1 ORDER BY id",
        )
        .bind(table_id)
        .fetch_all(tx.conn())
        .await
        .map_err(AppError::catalog)?;
        tx.commit().await?;
        Ok(rows)
    }

    /// Credential of the most recent database with this name.
    pub async fn credential_for(&self, database_name: &str) -> AppResult<Credential> {
        let mut tx = TxScope::read_only(&self.pool).await?;
        let credential = sqlx::query_as::<_, Credential>(
            "SELECT c.id, c.database_id, c.host, c.port, c.username, c.password
             FROM credentials c
             JOIN databases d ON d.id = c.database_id
             WHERE d.name = $1
             ORDER BY d.id DESC, c.id DESC
             LIMIT 1",
        )
        .bind(database_name)
        .fetch_optional(tx.conn())
        .await
        .map_err(AppError::catalog)?
        .ok_or_else(|| AppError::NotFound(format!("credential for database '{}'", database_name)))?;
        tx.commit().await?;
        Ok(credential)
    }

    /// `host:port` of a filled database.
    pub async fn get_address(&self, database_name: &str) -> AppResult<String> {
        Ok(self.credential_for(database_name).await?.address())
    }

    /// Saved queries with their database names, oldest first.
    pub async fn list_saved_queries(&self) -> AppResult<Vec<SavedQueryItem>> {
        let mut tx = TxScope::read_only(&self.pool).await?;
        let rows = sqlx::query_as::<_, SavedQueryItem>(
            "SELECT d.name AS database_name, q.sql_text AS sql_query, q.created_at
             FROM saved_queries q
             JOIN databases d ON d.id = q.database_id
             ORDER BY q.id",
        )
        .fetch_all(tx.conn())
        .await
        .map_err(AppError::catalog)?;
        tx.commit().await?;
        Ok(rows)
    }

    /// Every database with its tables and column names, built from the list
    /// operations above.
    pub async fn metadata_info(&self) -> AppResult<Vec<DatabaseMetadataInfo>> {
        let mut out = Vec::new();
        for database in self.list_databases().await? {
            let mut tables = Vec::new();
            for table in self.list_tables(database.id).await? {
                let columns = self
                    .list_columns(table.id)
                    .await?
                    .into_iter()
                    .map(|c| c.name)
                    .collect();
                tables.push(TableSimpleView {
                    table_name: table.name,
                    columns,
                });
            }
            out.push(DatabaseMetadataInfo {
                database_name: database.name,
                tables,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::ExtractorTimeouts;
    use crate::secrets::PlaintextSecretStore;
    use crate::testing;
    use crate::writer::CatalogWriter;
    use std::time::Duration;

    #[tokio::test]
    async fn test_unknown_name_is_not_found() {
        let Some(pool) = testing::catalog_pool().await else {
            return;
        };
        let reader = CatalogReader::new(pool);
        let err = reader
            .get_address(&testing::unique_name("ghost"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_round_trip_users_and_orders() {
        let Some(pool) = testing::catalog_pool().await else {
            return;
        };
        let Some(target) = testing::TargetSchema::create(
            r#"
            CREATE TABLE users (id SERIAL PRIMARY KEY, name TEXT NOT NULL);
            CREATE TABLE orders (
                id SERIAL PRIMARY KEY,
                user_id INT REFERENCES users(id),
                amount NUMERIC(10,2)
            );
            "#,
        )
        .await
        else {
            return;
        };

        let writer = CatalogWriter::new(
            pool.clone(),
            Arc::new(PlaintextSecretStore),
            ExtractorTimeouts {
                connect: Duration::from_secs(5),
                statement: Duration::from_secs(10),
            },
            "public",
        );
        let summary = writer.fill(&target.dsn_string()).await.unwrap();
        let database_name = summary.database.name.clone();

        let reader = CatalogReader::new(pool.clone());
        assert!(reader
            .list_databases()
            .await
            .unwrap()
            .iter()
            .any(|d| d.id == summary.database.id));

        let tables = reader.list_tables(summary.database.id).await.unwrap();
        let mut names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["orders", "users"]);

        let orders = tables.iter().find(|t| t.name == "orders").unwrap();
        let users = tables.iter().find(|t| t.name == "users").unwrap();
        let columns: Vec<String> = reader
            .list_columns(orders.id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(columns, vec!["id", "user_id", "amount"]);

        let fks = testing::foreign_keys(&pool, orders.id).await;
        assert_eq!(fks.len(), 1);
        assert_eq!(fks[0].referenced_table_id, users.id);
        assert_eq!(
            testing::foreign_key_columns(&pool, orders.id).await,
            vec![(1, "user_id".to_string(), "id".to_string())]
        );

        let info = reader.metadata_info().await.unwrap();
        let filled = info
            .iter()
            .rev()
            .find(|d| {
                d.database_name == database_name
                    && d.tables.iter().any(|t| t.table_name == "orders")
            })
            .unwrap();
        let orders_view = filled
            .tables
            .iter()
            .find(|t| t.table_name == "orders")
            .unwrap();
        assert_eq!(orders_view.columns, vec!["id", "user_id", "amount"]);

        let dsn = target.dsn();
        assert_eq!(reader.get_address(&database_name).await.unwrap(), dsn.address());

        testing::delete_databases(&pool, &database_name).await;
        target.drop_schema().await;
    }
}
