//! The backend capability contract.

use crate::error::{BackendError, BackendResult};
use async_trait::async_trait;
use bytes::Bytes;

/// Uniform interface every storage backend implements.
///
/// Keys are chunk hashes (64 lowercase hex characters); each driver decides
/// how a hash maps onto its own namespace. Instances are built per session
/// by the [`DriverRegistry`](crate::DriverRegistry) and are not assumed to be
/// shareable across concurrent callers.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Establish session state (login, handshake, root creation).
    ///
    /// Must be idempotent.
    async fn connect(&self) -> BackendResult<()> {
        Ok(())
    }

    /// Store a chunk under its hash, overwriting any previous copy.
    async fn store(&self, hash: &str, data: Bytes) -> BackendResult<()>;

    /// Fetch a chunk. Returns [`BackendError::NotFound`] when absent.
    async fn fetch(&self, hash: &str) -> BackendResult<Bytes>;

    /// Delete a chunk. Returns [`BackendError::NotFound`] when absent.
    async fn delete(&self, hash: &str) -> BackendResult<()>;

    /// Tear down session state.
    async fn release(&self) -> BackendResult<()> {
        Ok(())
    }

    /// Get the driver tag of this backend (e.g. "local", "s3").
    ///
    /// Used for metrics and logging.
    fn driver_name(&self) -> &'static str;
}

/// Session helpers: connect, run one operation, release.
///
/// Release failures are logged and never mask the operation's own result.
/// Automatically implemented for every [`Backend`].
#[async_trait]
pub trait BackendSessionExt: Backend {
    async fn store_session(&self, hash: &str, data: Bytes) -> BackendResult<()> {
        self.connect().await?;
        let result = self.store(hash, data).await;
        self.release_quietly().await;
        result
    }

    async fn fetch_session(&self, hash: &str) -> BackendResult<Bytes> {
        self.connect().await?;
        let result = self.fetch(hash).await;
        self.release_quietly().await;
        result
    }

    async fn delete_session(&self, hash: &str) -> BackendResult<()> {
        self.connect().await?;
        let result = self.delete(hash).await;
        self.release_quietly().await;
        result
    }

    async fn release_quietly(&self) {
        if let Err(e) = self.release().await {
            tracing::warn!(driver = self.driver_name(), error = %e, "backend release failed");
        }
    }
}

impl<T: Backend + ?Sized> BackendSessionExt for T {}

/// Map a chunk hash onto a sharded relative key: `ab/cd/abcd...`.
///
/// Rejects anything that is not 64 hex characters, which also keeps keys
/// free of path separators and traversal components.
pub fn chunk_key(hash: &str) -> BackendResult<String> {
    validate_hash(hash)?;
    let hash = hash.to_ascii_lowercase();
    Ok(format!("{}/{}/{}", &hash[..2], &hash[2..4], hash))
}

/// Check that a key is a 64-character hex digest.
pub fn validate_hash(hash: &str) -> BackendResult<()> {
    if hash.len() != 64 || !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(BackendError::InvalidKey(format!(
            "expected 64 hex chars: {hash:?}"
        )));
    }
    Ok(())
}
