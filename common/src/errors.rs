//! Error types shared by all catalog components.
//!
//! Every failure in the extraction and materialization pipeline is surfaced as
//! an [`AppError`]; the HTTP boundary translates it into an [`ApiResponse`]
//! envelope with a stable error code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::response::ApiResponse;

/// Result alias used across the workspace.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors.
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed input such as an unparsable connection string.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Target database or catalog store unreachable.
    #[error("Database connection error: {0}")]
    DatabaseConnection(String),

    /// A query against a target database failed.
    #[error("Database query error: {0}")]
    DatabaseQuery(String),

    /// A catalog-store write failed; the enclosing transaction is rolled back.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Unknown name on a read path.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The catalog pool was used before `init`.
    #[error("Catalog connection pool is not initialized")]
    PoolNotInitialized,

    /// No catalog connection became available within the acquire timeout.
    #[error("Catalog connection pool exhausted")]
    PoolExhausted,

    /// The connection string names an engine without an extractor.
    #[error("Unsupported database type: {0}")]
    UnsupportedDatabaseType(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Anything else.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable code rendered in the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::DatabaseConnection(_) => "CONNECTIVITY_ERROR",
            AppError::DatabaseQuery(_) => "QUERY_ERROR",
            AppError::Persistence(_) => "PERSISTENCE_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::PoolNotInitialized => "POOL_NOT_INITIALIZED",
            AppError::PoolExhausted => "POOL_EXHAUSTED",
            AppError::UnsupportedDatabaseType(_) => "UNSUPPORTED_DATABASE_TYPE",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status for the error.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::UnsupportedDatabaseType(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DatabaseConnection(_) | AppError::DatabaseQuery(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::PoolNotInitialized | AppError::PoolExhausted => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Persistence(_) | AppError::Config(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Maps a catalog-store driver error.
    ///
    /// Pool and I/O failures keep their own variants so that callers can tell
    /// an unreachable store apart from a rejected write.
    pub fn catalog(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => AppError::PoolExhausted,
            sqlx::Error::PoolClosed => AppError::DatabaseConnection("catalog pool is closed".into()),
            sqlx::Error::Io(e) => AppError::DatabaseConnection(e.to_string()),
            sqlx::Error::Tls(e) => AppError::DatabaseConnection(e.to_string()),
            other => AppError::Persistence(other.to_string()),
        }
    }

    /// Maps a target-database driver error.
    pub fn target(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(e) => AppError::DatabaseConnection(e.to_string()),
            sqlx::Error::Tls(e) => AppError::DatabaseConnection(e.to_string()),
            sqlx::Error::Configuration(e) => AppError::Validation(e.to_string()),
            other => AppError::DatabaseQuery(other.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        } else {
            tracing::warn!(code = self.code(), error = %self, "request rejected");
        }

        let body = ApiResponse::err(self.code(), self.to_string());
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_maps_to_exhausted() {
        let err = AppError::catalog(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, AppError::PoolExhausted));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_catalog_row_not_found_is_persistence() {
        let err = AppError::catalog(sqlx::Error::RowNotFound);
        assert!(matches!(err, AppError::Persistence(_)));
    }

    #[test]
    fn test_target_io_is_connectivity() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = AppError::target(sqlx::Error::Io(io));
        assert!(matches!(err, AppError::DatabaseConnection(_)));
        assert_eq!(err.code(), "CONNECTIVITY_ERROR");
    }

    #[test]
    fn test_not_found_status() {
        let err = AppError::NotFound("database 'x'".into());
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }
}
