//! Database models mapping to the metadata schema.

use crate::error::MetadataResult;
use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

/// A stored file. Its ordered chunk list lives in `file_chunks`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FileRow {
    /// Identity hash over the filename and ordered chunk list.
    pub file_hash: String,
    /// Unique across the whole store; "directories" are filename prefixes.
    pub filename: String,
    pub size_bytes: i64,
    pub chunk_count: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub update_time: OffsetDateTime,
}

/// A stored chunk, created once per unique content hash.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ChunkRow {
    pub chunk_hash: String,
    pub size_bytes: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub update_time: OffsetDateTime,
}

/// A registered storage backend.
#[derive(Debug, Clone, FromRow)]
pub struct StorageRow {
    pub storage_id: i64,
    pub name: String,
    pub driver: String,
    /// Selection weight, at least 1. Higher is picked more often.
    pub priority: i64,
    pub enabled: bool,
    /// JSON object handed to the driver factory.
    pub driver_settings: String,
    pub created_at: OffsetDateTime,
}

impl StorageRow {
    /// Decode the driver settings column.
    pub fn settings(&self) -> MetadataResult<serde_json::Map<String, serde_json::Value>> {
        Ok(serde_json::from_str(&self.driver_settings)?)
    }
}

/// Input for registering a storage backend.
#[derive(Debug, Clone)]
pub struct NewStorage {
    pub name: String,
    pub driver: String,
    pub priority: i64,
    pub enabled: bool,
    pub driver_settings: serde_json::Map<String, serde_json::Value>,
}

/// A user account.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub username: String,
    /// Hex SHA-256 of the password.
    pub password_hash: String,
    /// Permission string over `r`, `w`, `a`.
    pub permissions: String,
    pub created_at: OffsetDateTime,
}

/// A login session. Only the token digest is stored.
#[derive(Debug, Clone, FromRow)]
pub struct SessionRow {
    pub token_hash: String,
    pub username: String,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

impl SessionRow {
    /// Check if the session is still valid at `now`.
    pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
        now < self.expires_at
    }
}
