//! Catalog-store connection pool.
//!
//! One pool per process, created by `main` and shared through `AppState`.
//! `init` is idempotent: once a pool exists, later calls keep the original
//! configuration.

use std::time::Duration;

use common::errors::{AppError, AppResult};
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Postgres};
use tokio::sync::OnceCell;

/// Lazily initialized pool of catalog-store connections.
pub struct CatalogPool {
    acquire_timeout: Duration,
    inner: OnceCell<PgPool>,
}

impl CatalogPool {
    /// Creates an uninitialized pool; `acquire` fails until `init` succeeds.
    pub fn new(acquire_timeout: Duration) -> Self {
        Self {
            acquire_timeout,
            inner: OnceCell::new(),
        }
    }

    /// Initializes the pool. A call after a successful initialization is a no-op.
    ///
    /// Connections are opened on demand, so an unreachable store surfaces on
    /// first use rather than here.
    pub async fn init(&self, dsn: &str, min_connections: u32, max_connections: u32) -> AppResult<()> {
        self.inner
            .get_or_try_init(|| async {
                let options: PgConnectOptions = dsn
                    .parse()
                    .map_err(|e: sqlx::Error| AppError::Config(format!("invalid catalog DSN: {}", e)))?;

                let pool = PgPoolOptions::new()
                    .min_connections(min_connections)
                    .max_connections(max_connections)
                    .acquire_timeout(self.acquire_timeout)
                    .connect_lazy_with(options);

                tracing::info!(
                    min_connections,
                    max_connections,
                    acquire_timeout_secs = self.acquire_timeout.as_secs(),
                    "Catalog connection pool created"
                );
                Ok::<_, AppError>(pool)
            })
            .await?;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.initialized()
    }

    /// The underlying pool.
    pub fn pool(&self) -> AppResult<&PgPool> {
        self.inner.get().ok_or(AppError::PoolNotInitialized)
    }

    /// Checks out a connection; it returns to the pool when dropped.
    ///
    /// # Errors
    /// `PoolNotInitialized` before `init`, `PoolExhausted` when no connection
    /// frees up within the acquire timeout.
    pub async fn acquire(&self) -> AppResult<PoolConnection<Postgres>> {
        self.pool()?.acquire().await.map_err(AppError::catalog)
    }

    /// Closes all connections; used on shutdown.
    pub async fn close(&self) {
        if let Some(pool) = self.inner.get() {
            pool.close().await;
        }
    }

    /// Whether the catalog store answers.
    pub async fn health_check(&self) -> bool {
        if !self.is_initialized() {
            return false;
        }
        match self.acquire().await {
            Ok(mut conn) => sqlx::query("SELECT 1").execute(&mut *conn).await.is_ok(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_before_init_fails() {
        let pool = CatalogPool::new(Duration::from_secs(1));
        assert!(!pool.is_initialized());
        assert!(matches!(pool.acquire().await, Err(AppError::PoolNotInitialized)));
    }

    #[tokio::test]
    async fn test_second_init_keeps_first_configuration() {
        let pool = CatalogPool::new(Duration::from_secs(1));
        pool.init("postgresql://first:pw@127.0.0.1:1/first", 0, 3)
            .await
            .unwrap();
        pool.init("postgresql://second:pw@127.0.0.1:2/second", 0, 7)
            .await
            .unwrap();

        let inner = pool.pool().unwrap();
        assert_eq!(inner.options().get_max_connections(), 3);
        assert_eq!(inner.connect_options().get_database(), Some("first"));
    }

    #[tokio::test]
    async fn test_failed_init_can_be_retried() {
        let pool = CatalogPool::new(Duration::from_secs(1));
        assert!(pool.init("::not a dsn::", 0, 1).await.is_err());
        assert!(!pool.is_initialized());
        pool.init("postgresql://u:p@127.0.0.1:1/db", 0, 1).await.unwrap();
        assert!(pool.is_initialized());
    }

    #[tokio::test]
    async fn test_held_connection_exhausts_single_slot_pool() {
        let Some(url) = crate::testing::test_url() else {
            return;
        };
        let pool = CatalogPool::new(Duration::from_millis(500));
        pool.init(&url, 0, 1).await.unwrap();

        let mut held = pool.acquire().await.unwrap();
        sqlx::query("SELECT 1").execute(&mut *held).await.unwrap();

        assert!(matches!(pool.acquire().await, Err(AppError::PoolExhausted)));
        let begin = crate::tx::TxScope::read_only(&pool).await;
        assert!(matches!(begin, Err(AppError::PoolExhausted)));

        drop(held);
        assert!(pool.acquire().await.is_ok());
        pool.close().await;
    }
}
