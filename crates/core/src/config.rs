//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Per-request timeout in seconds. Covers whole uploads and downloads.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Maximum accepted upload body in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    /// Lifetime of login sessions in seconds.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_request_timeout_secs() -> u64 {
    3600
}

fn default_max_upload_bytes() -> u64 {
    10 * 1024 * 1024 * 1024 // 10 GiB
}

fn default_session_ttl_secs() -> u64 {
    7 * 24 * 3600
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            request_timeout_secs: default_request_timeout_secs(),
            max_upload_bytes: default_max_upload_bytes(),
            session_ttl_secs: default_session_ttl_secs(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

impl ServerConfig {
    /// Get the request timeout as a Duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Get the session lifetime as a Duration.
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite database.
    Sqlite {
        /// Database file path.
        path: PathBuf,
        /// Seconds a query may wait for the database connection.
        #[serde(default = "default_sqlite_query_timeout_secs")]
        query_timeout_secs: Option<u64>,
    },
}

fn default_sqlite_query_timeout_secs() -> Option<u64> {
    Some(30)
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/metadata.db"),
            query_timeout_secs: default_sqlite_query_timeout_secs(),
        }
    }
}

impl MetadataConfig {
    /// Validate metadata configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            MetadataConfig::Sqlite { path, .. } if path.as_os_str().is_empty() => {
                Err("sqlite config requires a non-empty 'path'".to_string())
            }
            MetadataConfig::Sqlite { .. } => Ok(()),
        }
    }
}

/// Admin account configuration.
///
/// When `password_hash` is absent and no admin exists yet, a random
/// password is generated on first start and logged once.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Admin username.
    #[serde(default = "default_admin_username")]
    pub username: String,
    /// Pre-computed SHA-256 hex of the admin password (64 characters).
    /// Generate with: `echo -n "your-password" | sha256sum`
    pub password_hash: Option<String>,
}

fn default_admin_username() -> String {
    "admin".to_string()
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            username: default_admin_username(),
            password_hash: None,
        }
    }
}

impl AdminConfig {
    /// Create a test configuration with a known password.
    ///
    /// **For testing only.**
    pub fn for_testing() -> Self {
        Self {
            username: default_admin_username(),
            // SHA256 of "test-admin-password"
            password_hash: Some(crate::ContentHash::compute(b"test-admin-password").to_hex()),
        }
    }

    /// Validate admin configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.username.is_empty() {
            return Err("admin.username must not be empty".to_string());
        }
        if let Some(hash) = &self.password_hash
            && crate::ContentHash::from_hex(hash).is_err()
        {
            return Err("admin.password_hash must be 64 hex characters".to_string());
        }
        Ok(())
    }
}

/// Initial engine settings, written to the settings table on first start.
///
/// Values already persisted are never overwritten, so the API stays the
/// source of truth after bootstrap.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EngineSeed {
    /// Chunk size in bytes.
    pub chunk_size: Option<u64>,
    /// Replica target per chunk.
    pub num_storages: Option<u32>,
    /// Signing secret for session tokens.
    pub secret_key: Option<String>,
}

impl EngineSeed {
    /// Validate seeded settings.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(size) = self.chunk_size {
            crate::error::validate_chunk_size(size).map_err(|e| e.to_string())?;
        }
        if self.num_storages == Some(0) {
            return Err("num_storages must be at least 1".to_string());
        }
        if let Some(secret) = &self.secret_key
            && secret.is_empty()
        {
            return Err("secret_key must not be empty".to_string());
        }
        Ok(())
    }
}

/// A storage backend registered on first start if its name is unknown.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageSeed {
    /// Unique storage name.
    pub name: String,
    /// Driver tag (e.g. "local", "s3", "webdav").
    pub driver: String,
    /// Selection weight; higher is picked more often.
    #[serde(default = "default_priority")]
    pub priority: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Driver-specific settings.
    #[serde(default)]
    pub settings: serde_json::Map<String, serde_json::Value>,
}

fn default_priority() -> u32 {
    5
}

fn default_enabled() -> bool {
    true
}

impl StorageSeed {
    /// Validate the seed independent of driver availability.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("storage name must not be empty".to_string());
        }
        if self.priority == 0 {
            return Err(format!("storage {}: priority must be at least 1", self.name));
        }
        Ok(())
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Metadata store configuration.
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Admin account configuration.
    #[serde(default)]
    pub admin: AdminConfig,
    /// Initial engine settings.
    #[serde(default)]
    pub engine: EngineSeed,
    /// Storage backends registered at startup.
    #[serde(default)]
    pub storages: Vec<StorageSeed>,
}

impl AppConfig {
    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Uses SQLite metadata and a known admin password.
    pub fn for_testing() -> Self {
        Self {
            admin: AdminConfig::for_testing(),
            ..Self::default()
        }
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), String> {
        self.metadata.validate()?;
        self.admin.validate()?;
        self.engine.validate()?;
        let mut names = std::collections::HashSet::new();
        for storage in &self.storages {
            storage.validate()?;
            if !names.insert(storage.name.as_str()) {
                return Err(format!("duplicate storage name: {}", storage.name));
            }
        }
        Ok(())
    }
}
