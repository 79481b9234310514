//! Passthrough query execution against a filled database.
//!
//! The statement runs as-is on a direct connection opened from the stored
//! credential. Only row-returning statements are accepted; each row comes back
//! as one JSON object.

use std::sync::Arc;
use std::time::Instant;

use common::errors::{AppError, AppResult};
use common::models::extract::Engine;
use common::models::metadata::QueryResult;
use common::utils::{SqlText, TargetDsn};
use sqlx::Connection;

use crate::extractor::{postgres, ExtractorTimeouts};
use crate::reader::CatalogReader;
use crate::secrets::SecretStore;

pub struct QueryExecutor {
    reader: CatalogReader,
    secrets: Arc<dyn SecretStore>,
    timeouts: ExtractorTimeouts,
}

impl QueryExecutor {
    pub fn new(
        reader: CatalogReader,
        secrets: Arc<dyn SecretStore>,
        timeouts: ExtractorTimeouts,
    ) -> Self {
        Self {
            reader,
            secrets,
            timeouts,
        }
    }

    /// Runs `sql` against the database last filled under `database_name`.
    ///
    /// # Errors
    /// `Validation` for statements that do not return rows, `NotFound` for an
    /// unknown name, `DatabaseConnection` if the target is unreachable and
    /// `DatabaseQuery` if the statement fails.
    pub async fn execute(&self, database_name: &str, sql: &str) -> AppResult<QueryResult> {
        let wrapped = SqlText::as_json_rows(sql)?;
        let target = self.target_for(database_name).await?;

        let mut conn = postgres::open_connection(&target, &self.timeouts).await?;
        let start = Instant::now();
        let rows = sqlx::query_scalar::<_, serde_json::Value>(&wrapped)
            .fetch_all(&mut conn)
            .await
            .map_err(AppError::target);
        let elapsed = start.elapsed().as_millis() as u64;

        if let Err(e) = conn.close().await {
            tracing::debug!(error = %e, "Closing target connection failed");
        }

        let rows = rows?;
        tracing::info!(
            database = %database_name,
            rows = rows.len(),
            elapsed_ms = elapsed,
            "Passthrough query executed"
        );
        Ok(QueryResult::new(rows, elapsed))
    }

    async fn target_for(&self, database_name: &str) -> AppResult<TargetDsn> {
        let credential = self.reader.credential_for(database_name).await?;
        let port = u16::try_from(credential.port).map_err(|_| {
            AppError::Persistence(format!("stored port {} is out of range", credential.port))
        })?;

        Ok(TargetDsn {
            engine: Engine::Postgres,
            host: credential.host,
            port,
            username: credential.username,
            password: self.secrets.open(&credential.password)?,
            database: database_name.to_string(),
            schema: None,
        })
    }
}
