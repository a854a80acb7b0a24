//! Metadata store trait and the SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::repos::{ChunkRepo, ConfigRepo, FileRepo, SessionRepo, StorageRepo, UserRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore:
    FileRepo + ChunkRepo + StorageRepo + ConfigRepo + UserRepo + SessionRepo + Send + Sync
{
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and migrate it.
    ///
    /// `query_timeout_secs` bounds how long a query waits for the connection.
    pub async fn new(
        path: impl AsRef<Path>,
        query_timeout_secs: Option<u64>,
    ) -> MetadataResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        Self::connect(opts, query_timeout_secs).await
    }

    /// An in-memory database, for tests.
    pub async fn in_memory() -> MetadataResult<Self> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        Self::connect(opts, None).await
    }

    async fn connect(
        opts: SqliteConnectOptions,
        query_timeout_secs: Option<u64>,
    ) -> MetadataResult<Self> {
        let query_timeout = Duration::from_secs(query_timeout_secs.unwrap_or(30));

        let pool = SqlitePoolOptions::new()
            // A single connection serializes writers and keeps in-memory
            // databases alive for the pool's lifetime.
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .acquire_timeout(query_timeout)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        tracing::debug!(
            query_timeout_secs = query_timeout.as_secs(),
            "metadata store ready"
        );
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

// Implement all the repository traits for SqliteStore
mod sqlite_impl {
    use super::*;
    use crate::models::*;
    use serde_json::Value;
    use std::collections::BTreeSet;
    use time::OffsetDateTime;

    #[async_trait]
    impl FileRepo for SqliteStore {
        async fn create_file(&self, file: &FileRow, chunks: &[String]) -> MetadataResult<()> {
            // The file row and its chunk list are inserted together, or neither is.
            let mut tx = self.pool.begin().await?;

            let mut missing = Vec::new();
            for hash in chunks.iter().collect::<BTreeSet<_>>() {
                let present: Option<i64> =
                    sqlx::query_scalar("SELECT 1 FROM chunks WHERE chunk_hash = ?")
                        .bind(hash)
                        .fetch_optional(&mut *tx)
                        .await?;
                if present.is_none() {
                    missing.push(hash.clone());
                }
            }
            if !missing.is_empty() {
                return Err(MetadataError::MissingChunks {
                    filename: file.filename.clone(),
                    missing_chunks: missing,
                });
            }

            sqlx::query(
                r#"
                INSERT INTO files (file_hash, filename, size_bytes, chunk_count, update_time)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&file.file_hash)
            .bind(&file.filename)
            .bind(file.size_bytes)
            .bind(file.chunk_count)
            .bind(file.update_time)
            .execute(&mut *tx)
            .await
            .map_err(|e| MetadataError::unique(e, format!("file {}", file.filename)))?;

            for (position, hash) in chunks.iter().enumerate() {
                sqlx::query(
                    "INSERT INTO file_chunks (file_hash, position, chunk_hash) VALUES (?, ?, ?)",
                )
                .bind(&file.file_hash)
                .bind(position as i64)
                .bind(hash)
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await?;
            Ok(())
        }

        async fn get_file_by_hash(&self, file_hash: &str) -> MetadataResult<Option<FileRow>> {
            let row = sqlx::query_as::<_, FileRow>("SELECT * FROM files WHERE file_hash = ?")
                .bind(file_hash)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn get_file_by_name(&self, filename: &str) -> MetadataResult<Option<FileRow>> {
            let row = sqlx::query_as::<_, FileRow>("SELECT * FROM files WHERE filename = ?")
                .bind(filename)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn file_exists(&self, filename: &str) -> MetadataResult<bool> {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM files WHERE filename = ?)")
                    .bind(filename)
                    .fetch_one(&self.pool)
                    .await?;
            Ok(exists)
        }

        async fn get_file_chunks(&self, file_hash: &str) -> MetadataResult<Vec<String>> {
            let rows: Vec<(String,)> = sqlx::query_as(
                "SELECT chunk_hash FROM file_chunks WHERE file_hash = ? ORDER BY position",
            )
            .bind(file_hash)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows.into_iter().map(|r| r.0).collect())
        }

        async fn list_files(&self, offset: u64, limit: u64) -> MetadataResult<Vec<FileRow>> {
            let rows = sqlx::query_as::<_, FileRow>(
                "SELECT * FROM files ORDER BY filename LIMIT ? OFFSET ?",
            )
            .bind(to_i64(limit))
            .bind(to_i64(offset))
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn count_files(&self) -> MetadataResult<u64> {
            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files")
                .fetch_one(&self.pool)
                .await?;
            Ok(count as u64)
        }

        async fn delete_file_with_chunks(
            &self,
            file_hash: &str,
            chunks: &[String],
        ) -> MetadataResult<u64> {
            let mut tx = self.pool.begin().await?;

            // Removing the file first cascades to its file_chunks rows, so the
            // reference check below only sees other files.
            let result = sqlx::query("DELETE FROM files WHERE file_hash = ?")
                .bind(file_hash)
                .execute(&mut *tx)
                .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!("file {file_hash}")));
            }

            let mut removed = 0;
            for hash in chunks.iter().collect::<BTreeSet<_>>() {
                let result = sqlx::query(
                    r#"
                    DELETE FROM chunks WHERE chunk_hash = ?
                    AND NOT EXISTS (SELECT 1 FROM file_chunks WHERE chunk_hash = ?)
                    "#,
                )
                .bind(hash)
                .bind(hash)
                .execute(&mut *tx)
                .await?;
                removed += result.rows_affected();
            }

            tx.commit().await?;
            Ok(removed)
        }
    }

    #[async_trait]
    impl ChunkRepo for SqliteStore {
        async fn create_chunk(
            &self,
            chunk: &ChunkRow,
            storage_ids: &[i64],
        ) -> MetadataResult<bool> {
            let mut tx = self.pool.begin().await?;

            let result = sqlx::query(
                r#"
                INSERT INTO chunks (chunk_hash, size_bytes, update_time)
                VALUES (?, ?, ?)
                ON CONFLICT(chunk_hash) DO NOTHING
                "#,
            )
            .bind(&chunk.chunk_hash)
            .bind(chunk.size_bytes)
            .bind(chunk.update_time)
            .execute(&mut *tx)
            .await?;
            let inserted = result.rows_affected() > 0;

            for storage_id in storage_ids {
                sqlx::query(
                    "INSERT OR IGNORE INTO chunk_storages (chunk_hash, storage_id) VALUES (?, ?)",
                )
                .bind(&chunk.chunk_hash)
                .bind(storage_id)
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await?;
            Ok(inserted)
        }

        async fn get_chunk(&self, chunk_hash: &str) -> MetadataResult<Option<ChunkRow>> {
            let row = sqlx::query_as::<_, ChunkRow>("SELECT * FROM chunks WHERE chunk_hash = ?")
                .bind(chunk_hash)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn chunk_exists(&self, chunk_hash: &str) -> MetadataResult<bool> {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM chunks WHERE chunk_hash = ?)")
                    .bind(chunk_hash)
                    .fetch_one(&self.pool)
                    .await?;
            Ok(exists)
        }

        async fn add_chunk_storage(&self, chunk_hash: &str, storage_id: i64) -> MetadataResult<()> {
            sqlx::query(
                "INSERT OR IGNORE INTO chunk_storages (chunk_hash, storage_id) VALUES (?, ?)",
            )
            .bind(chunk_hash)
            .bind(storage_id)
            .execute(&self.pool)
            .await
            .map_err(|e| match e.as_database_error() {
                Some(db) if db.is_foreign_key_violation() => MetadataError::NotFound(format!(
                    "chunk {chunk_hash} or storage {storage_id}"
                )),
                _ => MetadataError::Database(e),
            })?;
            Ok(())
        }

        async fn remove_chunk_storage(
            &self,
            chunk_hash: &str,
            storage_id: i64,
        ) -> MetadataResult<bool> {
            let result =
                sqlx::query("DELETE FROM chunk_storages WHERE chunk_hash = ? AND storage_id = ?")
                    .bind(chunk_hash)
                    .bind(storage_id)
                    .execute(&self.pool)
                    .await?;
            Ok(result.rows_affected() > 0)
        }

        async fn chunk_storages(&self, chunk_hash: &str) -> MetadataResult<Vec<StorageRow>> {
            let rows = sqlx::query_as::<_, StorageRow>(
                r#"
                SELECT s.* FROM storages s
                JOIN chunk_storages cs ON cs.storage_id = s.storage_id
                WHERE cs.chunk_hash = ?
                ORDER BY s.storage_id
                "#,
            )
            .bind(chunk_hash)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn delete_chunk(&self, chunk_hash: &str) -> MetadataResult<bool> {
            let result = sqlx::query("DELETE FROM chunks WHERE chunk_hash = ?")
                .bind(chunk_hash)
                .execute(&self.pool)
                .await
                .map_err(|e| match e.as_database_error() {
                    Some(db) if db.is_foreign_key_violation() => MetadataError::Constraint(
                        format!("chunk {chunk_hash} is still referenced by a file"),
                    ),
                    _ => MetadataError::Database(e),
                })?;
            Ok(result.rows_affected() > 0)
        }

        async fn list_chunks(&self, offset: u64, limit: u64) -> MetadataResult<Vec<ChunkRow>> {
            let rows = sqlx::query_as::<_, ChunkRow>(
                "SELECT * FROM chunks ORDER BY chunk_hash LIMIT ? OFFSET ?",
            )
            .bind(to_i64(limit))
            .bind(to_i64(offset))
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn count_chunks(&self) -> MetadataResult<u64> {
            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
                .fetch_one(&self.pool)
                .await?;
            Ok(count as u64)
        }

        async fn chunk_reference_count(&self, chunk_hash: &str) -> MetadataResult<u64> {
            let count: i64 = sqlx::query_scalar(
                "SELECT COUNT(DISTINCT file_hash) FROM file_chunks WHERE chunk_hash = ?",
            )
            .bind(chunk_hash)
            .fetch_one(&self.pool)
            .await?;
            Ok(count as u64)
        }
    }

    #[async_trait]
    impl StorageRepo for SqliteStore {
        async fn create_storage(&self, storage: &NewStorage) -> MetadataResult<StorageRow> {
            if storage.priority < 1 {
                return Err(MetadataError::Constraint(format!(
                    "storage {}: priority must be at least 1",
                    storage.name
                )));
            }

            let settings = serde_json::to_string(&storage.driver_settings)?;
            let row = sqlx::query_as::<_, StorageRow>(
                r#"
                INSERT INTO storages (name, driver, priority, enabled, driver_settings, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                RETURNING *
                "#,
            )
            .bind(&storage.name)
            .bind(&storage.driver)
            .bind(storage.priority)
            .bind(storage.enabled)
            .bind(settings)
            .bind(OffsetDateTime::now_utc())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MetadataError::unique(e, format!("storage {}", storage.name)))?;
            Ok(row)
        }

        async fn get_storage(&self, name: &str) -> MetadataResult<Option<StorageRow>> {
            let row = sqlx::query_as::<_, StorageRow>("SELECT * FROM storages WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn list_storages(&self) -> MetadataResult<Vec<StorageRow>> {
            let rows = sqlx::query_as::<_, StorageRow>("SELECT * FROM storages ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
            Ok(rows)
        }

        async fn list_enabled_storages(&self) -> MetadataResult<Vec<StorageRow>> {
            let rows = sqlx::query_as::<_, StorageRow>(
                "SELECT * FROM storages WHERE enabled = 1 ORDER BY storage_id",
            )
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn set_storage_enabled(&self, name: &str, enabled: bool) -> MetadataResult<()> {
            let result = sqlx::query("UPDATE storages SET enabled = ? WHERE name = ?")
                .bind(enabled)
                .bind(name)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!("storage {name}")));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ConfigRepo for SqliteStore {
        async fn get_config(&self, key: &str) -> MetadataResult<Option<Value>> {
            let raw: Option<String> = sqlx::query_scalar("SELECT value FROM config WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
            raw.map(|s| serde_json::from_str(&s).map_err(MetadataError::from))
                .transpose()
        }

        async fn set_config(&self, key: &str, value: &Value) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO config (key, value, update_time) VALUES (?, ?, ?)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value, update_time = excluded.update_time
                "#,
            )
            .bind(key)
            .bind(value.to_string())
            .bind(OffsetDateTime::now_utc())
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn init_config(&self, key: &str, value: &Value) -> MetadataResult<bool> {
            let result = sqlx::query(
                "INSERT INTO config (key, value, update_time) VALUES (?, ?, ?) ON CONFLICT(key) DO NOTHING",
            )
            .bind(key)
            .bind(value.to_string())
            .bind(OffsetDateTime::now_utc())
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected() > 0)
        }
    }

    #[async_trait]
    impl UserRepo for SqliteStore {
        async fn create_user(&self, user: &UserRow) -> MetadataResult<()> {
            sqlx::query(
                "INSERT INTO users (username, password_hash, permissions, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(&user.permissions)
            .bind(user.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| MetadataError::unique(e, format!("user {}", user.username)))?;
            Ok(())
        }

        async fn get_user(&self, username: &str) -> MetadataResult<Option<UserRow>> {
            let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE username = ?")
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn set_user_password(
            &self,
            username: &str,
            password_hash: &str,
        ) -> MetadataResult<()> {
            let result = sqlx::query("UPDATE users SET password_hash = ? WHERE username = ?")
                .bind(password_hash)
                .bind(username)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!("user {username}")));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl SessionRepo for SqliteStore {
        async fn create_session(&self, session: &SessionRow) -> MetadataResult<()> {
            sqlx::query(
                "INSERT INTO sessions (token_hash, username, created_at, expires_at) VALUES (?, ?, ?, ?)",
            )
            .bind(&session.token_hash)
            .bind(&session.username)
            .bind(session.created_at)
            .bind(session.expires_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn get_session(&self, token_hash: &str) -> MetadataResult<Option<SessionRow>> {
            let row =
                sqlx::query_as::<_, SessionRow>("SELECT * FROM sessions WHERE token_hash = ?")
                    .bind(token_hash)
                    .fetch_optional(&self.pool)
                    .await?;
            Ok(row)
        }

        async fn delete_expired_sessions(&self, now: OffsetDateTime) -> MetadataResult<u64> {
            // Timestamps are compared in Rust; stored text forms are not
            // guaranteed to sort chronologically.
            let sessions = sqlx::query_as::<_, SessionRow>("SELECT * FROM sessions")
                .fetch_all(&self.pool)
                .await?;
            let mut removed = 0;
            for session in sessions.iter().filter(|s| !s.is_valid_at(now)) {
                removed += sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
                    .bind(&session.token_hash)
                    .execute(&self.pool)
                    .await?
                    .rows_affected();
            }
            Ok(removed)
        }
    }
}

/// SQL schema for SQLite.
const SCHEMA_SQL: &str = r#"
-- Storage backends
CREATE TABLE IF NOT EXISTS storages (
    storage_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    driver TEXT NOT NULL,
    priority INTEGER NOT NULL CHECK (priority >= 1),
    enabled INTEGER NOT NULL DEFAULT 1,
    driver_settings TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL
);

-- Chunks, one row per unique content hash
CREATE TABLE IF NOT EXISTS chunks (
    chunk_hash TEXT PRIMARY KEY,
    size_bytes INTEGER NOT NULL,
    update_time TEXT NOT NULL
);

-- Which storages hold which chunks
CREATE TABLE IF NOT EXISTS chunk_storages (
    chunk_hash TEXT NOT NULL REFERENCES chunks(chunk_hash) ON DELETE CASCADE,
    storage_id INTEGER NOT NULL REFERENCES storages(storage_id),
    PRIMARY KEY (chunk_hash, storage_id)
);
CREATE INDEX IF NOT EXISTS idx_chunk_storages_storage ON chunk_storages(storage_id);

-- Files
CREATE TABLE IF NOT EXISTS files (
    file_hash TEXT PRIMARY KEY,
    filename TEXT NOT NULL UNIQUE,
    size_bytes INTEGER NOT NULL,
    chunk_count INTEGER NOT NULL,
    update_time TEXT NOT NULL
);

-- Ordered chunk list per file. A chunk may repeat at several positions.
CREATE TABLE IF NOT EXISTS file_chunks (
    file_hash TEXT NOT NULL REFERENCES files(file_hash) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    chunk_hash TEXT NOT NULL REFERENCES chunks(chunk_hash),
    PRIMARY KEY (file_hash, position)
);
CREATE INDEX IF NOT EXISTS idx_file_chunks_chunk ON file_chunks(chunk_hash);

-- Runtime settings (JSON values)
CREATE TABLE IF NOT EXISTS config (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    update_time TEXT NOT NULL
);

-- Users and login sessions
CREATE TABLE IF NOT EXISTS users (
    username TEXT PRIMARY KEY,
    password_hash TEXT NOT NULL,
    permissions TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sessions (
    token_hash TEXT PRIMARY KEY,
    username TEXT NOT NULL REFERENCES users(username) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
);
"#;
