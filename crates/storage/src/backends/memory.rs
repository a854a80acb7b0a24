//! In-process backend (driver tag `memory`).
//!
//! Useful for tests and throwaway deployments. Every instance built from the
//! same [`MemorySpaces`] and namespace sees the same chunks, so per-session
//! instances behave like one store.

use crate::error::{BackendError, BackendResult};
use crate::traits::{Backend, validate_hash};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

const DRIVER: &str = "memory";

type Space = Arc<RwLock<HashMap<String, Bytes>>>;

/// Settings accepted by the `memory` driver.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemorySettings {
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_namespace() -> String {
    "default".to_string()
}

/// Named in-memory stores owned by one driver registry.
#[derive(Clone, Default)]
pub struct MemorySpaces {
    spaces: Arc<RwLock<HashMap<String, Space>>>,
}

impl MemorySpaces {
    /// Get a backend over the namespace, creating it on first use.
    pub fn backend(&self, namespace: &str) -> MemoryBackend {
        let mut spaces = self
            .spaces
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let space = spaces.entry(namespace.to_string()).or_default().clone();
        MemoryBackend { space }
    }
}

/// Chunks kept in a shared hash map.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    space: Space,
}

impl MemoryBackend {
    /// A standalone store not reachable through any registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of chunks held.
    pub fn len(&self) -> usize {
        self.space
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if a chunk is held, without a session.
    pub fn contains(&self, hash: &str) -> bool {
        self.space
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(&hash.to_ascii_lowercase())
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn store(&self, hash: &str, data: Bytes) -> BackendResult<()> {
        validate_hash(hash)?;
        self.space
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(hash.to_ascii_lowercase(), data);
        Ok(())
    }

    async fn fetch(&self, hash: &str) -> BackendResult<Bytes> {
        validate_hash(hash)?;
        self.space
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&hash.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| BackendError::NotFound(hash.to_string()))
    }

    async fn delete(&self, hash: &str) -> BackendResult<()> {
        validate_hash(hash)?;
        self.space
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&hash.to_ascii_lowercase())
            .map(|_| ())
            .ok_or_else(|| BackendError::NotFound(hash.to_string()))
    }

    fn driver_name(&self) -> &'static str {
        DRIVER
    }
}
