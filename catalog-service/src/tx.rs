//! Transaction scope over a pooled catalog connection.
//!
//! A [`TxScope`] owns the checked-out connection for its whole lifetime.
//! Dropping a read-write scope without calling [`TxScope::commit`] rolls the
//! transaction back, and the connection goes back to the pool on every exit
//! path, including `?` returns and panics.

use common::errors::{AppError, AppResult};
use sqlx::{PgConnection, Postgres, Transaction};

use crate::pool::CatalogPool;

/// Session mode of a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxMode {
    ReadOnly,
    ReadWrite,
}

/// An open catalog transaction.
pub struct TxScope {
    tx: Transaction<'static, Postgres>,
    mode: TxMode,
}

impl TxScope {
    /// Acquires a connection and opens a transaction in the given mode.
    pub async fn begin(pool: &CatalogPool, mode: TxMode) -> AppResult<Self> {
        let mut tx = pool.pool()?.begin().await.map_err(AppError::catalog)?;

        if mode == TxMode::ReadOnly {
            sqlx::query("SET TRANSACTION READ ONLY")
                .execute(&mut *tx)
                .await
                .map_err(AppError::catalog)?;
        }

        Ok(Self { tx, mode })
    }

    pub async fn read_only(pool: &CatalogPool) -> AppResult<Self> {
        Self::begin(pool, TxMode::ReadOnly).await
    }

    pub async fn read_write(pool: &CatalogPool) -> AppResult<Self> {
        Self::begin(pool, TxMode::ReadWrite).await
    }

    /// Connection to run statements on.
    pub fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }

    /// Ends the scope normally.
    ///
    /// Read-write scopes commit. Read-only scopes never mutate, so they are
    /// released without a COMMIT and the driver discards the transaction.
    pub async fn commit(self) -> AppResult<()> {
        match self.mode {
            TxMode::ReadWrite => self.tx.commit().await.map_err(AppError::catalog),
            TxMode::ReadOnly => Ok(()),
        }
    }

    /// Rolls back explicitly instead of waiting for drop.
    pub async fn rollback(self) -> AppResult<()> {
        self.tx.rollback().await.map_err(AppError::catalog)
    }
}
