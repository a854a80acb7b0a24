//! Deduplicating chunk writes.

use crate::metrics::{BYTES_STORED, CHUNKS_DEDUPLICATED, CHUNKS_STORED};
use crate::{Engine, EngineResult};
use bytes::Bytes;
use depot_core::ChunkHash;
use depot_metadata::models::ChunkRow;
use depot_metadata::{ChunkRepo, StorageRepo};
use time::OffsetDateTime;
use tracing::{debug, instrument};

impl Engine {
    /// Store one chunk, replicated to the configured number of storages.
    ///
    /// A chunk that already has a replica on record is not written again. A
    /// row left without replicas by an aborted delete is placed afresh.
    pub async fn put(&self, data: Bytes) -> EngineResult<ChunkHash> {
        let settings = self.settings().await?;
        self.put_replicated(data, settings.num_storages).await
    }

    #[instrument(skip(self, data), fields(size = data.len()))]
    pub(crate) async fn put_replicated(&self, data: Bytes, replicas: usize) -> EngineResult<ChunkHash> {
        let hash = ChunkHash::compute(&data);
        let hex = hash.to_hex();

        if self.is_placed(&hex).await? {
            CHUNKS_DEDUPLICATED.inc();
            debug!(chunk_hash = %hex, "chunk already stored");
            return Ok(hash);
        }

        let _guard = self.locks.lock(&hex).await;
        // Another writer may have finished while we waited.
        if self.is_placed(&hex).await? {
            CHUNKS_DEDUPLICATED.inc();
            debug!(chunk_hash = %hex, "chunk stored concurrently");
            return Ok(hash);
        }

        let candidates = self.metadata.list_enabled_storages().await?;
        let placed = self.place(&hex, &data, candidates, replicas).await?;

        let row = ChunkRow {
            chunk_hash: hex.clone(),
            size_bytes: data.len() as i64,
            update_time: OffsetDateTime::now_utc(),
        };
        if !self.metadata.create_chunk(&row, &placed).await? {
            // A row stripped of its replicas, or another process won the race.
            debug!(chunk_hash = %hex, "orphaned chunk row re-placed");
        }

        CHUNKS_STORED.inc();
        BYTES_STORED.inc_by(data.len() as u64);
        debug!(chunk_hash = %hex, replicas = placed.len(), "chunk stored");
        Ok(hash)
    }

    /// Whether a chunk has a row and at least one replica on record.
    async fn is_placed(&self, hash: &str) -> EngineResult<bool> {
        Ok(!self.metadata.chunk_storages(hash).await?.is_empty())
    }
}
