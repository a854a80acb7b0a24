//! Chunking, replication and retrieval engine for depot.
//!
//! The engine splits files into fixed-size chunks, deduplicates them by
//! content hash, writes each new chunk to a weighted-random subset of the
//! enabled storages and reassembles files by falling back across replicas.
//! It depends only on the [`Backend`] contract and the metadata repository
//! traits; both are handed in at construction.

pub mod assembler;
pub mod chunk_store;
pub mod deletion;
pub mod error;
mod locks;
pub mod metrics;
pub mod placement;
pub mod reader;
pub mod reconstructor;
pub mod settings;
pub mod storages;

pub use deletion::DeleteSummary;
pub use error::{EngineError, EngineResult};
pub use reconstructor::{ChunkStream, Download};
pub use settings::EngineSettings;

use depot_core::{Access, Permission};
use depot_metadata::MetadataStore;
use depot_metadata::models::StorageRow;
use depot_storage::{Backend, DriverRegistry};
use locks::HashLocks;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::sync::{Arc, Mutex, PoisonError};

/// The storage engine. Built once at startup and shared behind an `Arc`.
pub struct Engine {
    metadata: Arc<dyn MetadataStore>,
    registry: DriverRegistry,
    rng: Mutex<StdRng>,
    locks: HashLocks,
}

impl Engine {
    /// Create an engine seeded from the operating system.
    pub fn new(metadata: Arc<dyn MetadataStore>, registry: DriverRegistry) -> Self {
        Self::with_rng(metadata, registry, StdRng::from_os_rng())
    }

    /// Create an engine with a deterministic RNG.
    pub fn with_seed(metadata: Arc<dyn MetadataStore>, registry: DriverRegistry, seed: u64) -> Self {
        Self::with_rng(metadata, registry, StdRng::seed_from_u64(seed))
    }

    fn with_rng(metadata: Arc<dyn MetadataStore>, registry: DriverRegistry, rng: StdRng) -> Self {
        Self {
            metadata,
            registry,
            rng: Mutex::new(rng),
            locks: HashLocks::default(),
        }
    }

    pub fn metadata(&self) -> &Arc<dyn MetadataStore> {
        &self.metadata
    }

    pub fn registry(&self) -> &DriverRegistry {
        &self.registry
    }

    /// Build a fresh driver instance for one session against `storage`.
    pub(crate) fn backend_for(&self, storage: &StorageRow) -> EngineResult<Arc<dyn Backend>> {
        let settings = storage.settings()?;
        Ok(self.registry.build(&storage.driver, &settings)?)
    }

    /// Run `f` with the RNG locked. Never hold the lock across an await.
    pub(crate) fn with_rng_locked<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut rng)
    }

    pub(crate) fn shuffle<T>(&self, items: &mut [T]) {
        self.with_rng_locked(|rng| items.shuffle(rng));
    }
}

/// Fail with `Forbidden` unless `access` grants `permission`.
pub(crate) fn require(access: &dyn Access, permission: Permission) -> EngineResult<()> {
    if access.allows(permission) {
        Ok(())
    } else {
        Err(EngineError::Forbidden(format!(
            "'{}' permission required",
            permission.as_char()
        )))
    }
}
