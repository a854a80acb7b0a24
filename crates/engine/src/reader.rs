//! Chunk reads with fallback across replicas.

use crate::metrics::READ_FALLBACKS;
use crate::{Engine, EngineError, EngineResult};
use bytes::Bytes;
use depot_core::{Chunk, ChunkHash};
use depot_metadata::ChunkRepo;
use depot_metadata::models::StorageRow;
use depot_storage::BackendSessionExt;
use tracing::{instrument, warn};

impl Engine {
    /// Fetch a chunk from any storage that holds it.
    ///
    /// Storages are tried once each in random order, disabled ones included.
    /// Data that does not hash to `hash` counts as a failed fetch.
    #[instrument(skip(self), fields(chunk_hash = %hash))]
    pub async fn get(&self, hash: &str) -> EngineResult<Bytes> {
        let expected = ChunkHash::from_hex(hash)?;
        let hex = expected.to_hex();

        if self.metadata.get_chunk(&hex).await?.is_none() {
            return Err(EngineError::NotFound(format!("chunk {hex}")));
        }

        let mut storages = self.metadata.chunk_storages(&hex).await?;
        self.shuffle(&mut storages);

        for (attempt, storage) in storages.iter().enumerate() {
            if attempt > 0 {
                READ_FALLBACKS.inc();
            }
            match self.fetch_from(storage, &hex).await {
                Ok(data) => {
                    let chunk = Chunk::new(data);
                    match chunk.verify(&expected) {
                        Ok(()) => return Ok(chunk.data),
                        Err(e) => {
                            warn!(storage = %storage.name, error = %e, "chunk data corrupt, trying next storage");
                        }
                    }
                }
                Err(e) => {
                    warn!(storage = %storage.name, error = %e, "chunk fetch failed, trying next storage");
                }
            }
        }

        Err(EngineError::ChunkUnavailable { hash: hex })
    }

    async fn fetch_from(&self, storage: &StorageRow, hash: &str) -> EngineResult<Bytes> {
        let backend = self.backend_for(storage)?;
        Ok(backend.fetch_session(hash).await?)
    }
}
