//! Catalog entities.
//!
//! Rows of the catalog store. Ids are assigned by the store at insert time and
//! the values are immutable once read back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Surrogate key type of every catalog table.
pub type RowId = i32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Database {
    pub id: RowId,
    pub name: String,
}

/// Connection details of a filled database.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Credential {
    pub id: RowId,
    pub database_id: RowId,
    pub host: String,
    pub port: i32,
    pub username: String,
    /// Stored form of the password (not serialized in responses).
    #[serde(skip_serializing, default)]
    pub password: String,
}

impl Credential {
    /// `host:port`, with IPv6 hosts bracketed.
    pub fn address(&self) -> String {
        crate::utils::dsn::host_port(&self.host, self.port)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("database_id", &self.database_id)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Table {
    pub id: RowId,
    pub database_id: RowId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Column {
    pub id: RowId,
    pub table_id: RowId,
    pub name: String,
    pub data_type: String,
}

/// Primary key header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct PrimaryKey {
    pub id: RowId,
    pub table_id: RowId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct PrimaryKeyColumn {
    pub pk_id: RowId,
    pub column_id: RowId,
    pub ordinal_position: i32,
}

/// Foreign key header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct ForeignKey {
    pub id: RowId,
    /// Source table.
    pub table_id: RowId,
    /// Target table.
    pub referenced_table_id: RowId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct ForeignKeyColumn {
    pub fk_id: RowId,
    pub column_id: RowId,
    pub referenced_column_id: RowId,
    pub ordinal_position: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct SavedQuery {
    pub id: RowId,
    pub database_id: RowId,
    pub sql_text: String,
    pub created_at: DateTime<Utc>,
}
