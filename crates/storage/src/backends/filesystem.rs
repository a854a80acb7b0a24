//! Local filesystem backend (driver tag `local`).

use crate::error::{BackendError, BackendResult, Operation};
use crate::traits::{Backend, chunk_key};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use uuid::Uuid;

const DRIVER: &str = "local";

/// Settings accepted by the `local` driver.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilesystemSettings {
    /// Root directory for chunk files.
    pub path: PathBuf,
}

/// Chunks stored as files under a root directory.
#[derive(Debug)]
pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    /// Create a backend rooted at `root`. No I/O happens until `connect`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn from_settings(settings: FilesystemSettings) -> BackendResult<Self> {
        if settings.path.as_os_str().is_empty() {
            return Err(BackendError::Config(
                "local driver requires a non-empty 'path'".to_string(),
            ));
        }
        Ok(Self::new(settings.path))
    }

    /// Get the full path for a chunk, with path traversal protection.
    ///
    /// Runs the symlink checks on the blocking pool.
    async fn chunk_path(&self, hash: &str) -> BackendResult<PathBuf> {
        let key = chunk_key(hash)?;
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || Self::resolve_sync(&root, &key))
            .await
            .map_err(|e| BackendError::failed(DRIVER, Operation::Fetch, e))?
    }

    /// Returns an error if the key would escape the storage root, including
    /// through a symlink planted inside it.
    fn resolve_sync(root: &Path, key: &str) -> BackendResult<PathBuf> {
        if Path::new(key)
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(BackendError::InvalidKey(format!(
                "contains unsafe path component: {key}"
            )));
        }

        let path = root.join(key);
        let Ok(root_canonical) = root.canonicalize() else {
            // Root not created yet: nothing below it can be a symlink.
            return Ok(path);
        };

        let mut probe = Some(path.as_path());
        while let Some(candidate) = probe {
            if candidate == root {
                break;
            }
            if std::fs::symlink_metadata(candidate).is_ok() {
                let resolved = candidate.canonicalize().map_err(|_| {
                    BackendError::InvalidKey(format!("symlink target missing or invalid: {key}"))
                })?;
                if !resolved.starts_with(&root_canonical) {
                    return Err(BackendError::InvalidKey(format!(
                        "resolved path escapes storage root: {key}"
                    )));
                }
                break;
            }
            probe = candidate.parent();
        }

        Ok(path)
    }
}

fn io_error(operation: Operation, hash: &str, err: std::io::Error) -> BackendError {
    if err.kind() == std::io::ErrorKind::NotFound {
        BackendError::NotFound(hash.to_string())
    } else {
        BackendError::failed(DRIVER, operation, err)
    }
}

#[async_trait]
impl Backend for FilesystemBackend {
    #[instrument(skip(self), fields(backend = DRIVER))]
    async fn connect(&self) -> BackendResult<()> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| BackendError::failed(DRIVER, Operation::Connect, e))
    }

    #[instrument(skip(self, data), fields(backend = DRIVER, size = data.len()))]
    async fn store(&self, hash: &str, data: Bytes) -> BackendResult<()> {
        let path = self.chunk_path(hash).await?;
        let fail = |e| BackendError::failed(DRIVER, Operation::Store, e);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(fail)?;
        }

        // Write to a uniquely named temp file, fsync, then rename into place
        let temp_path = path.with_file_name(format!("{hash}.tmp.{}", Uuid::new_v4()));
        let written = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
            fs::rename(&temp_path, &path).await
        }
        .await;

        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path).await;
            return Err(fail(e));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(backend = DRIVER))]
    async fn fetch(&self, hash: &str) -> BackendResult<Bytes> {
        let path = self.chunk_path(hash).await?;
        let data = fs::read(&path)
            .await
            .map_err(|e| io_error(Operation::Fetch, hash, e))?;
        Ok(Bytes::from(data))
    }

    #[instrument(skip(self), fields(backend = DRIVER))]
    async fn delete(&self, hash: &str) -> BackendResult<()> {
        let path = self.chunk_path(hash).await?;
        fs::remove_file(&path)
            .await
            .map_err(|e| io_error(Operation::Delete, hash, e))
    }

    fn driver_name(&self) -> &'static str {
        DRIVER
    }
}
