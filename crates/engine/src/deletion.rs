//! File deletion: backend copies first, rows second.

use crate::metrics::FILES_DELETED;
use crate::{Engine, EngineError, EngineResult, require};
use depot_core::{Access, Permission};
use depot_metadata::models::FileRow;
use depot_metadata::{ChunkRepo, FileRepo};
use depot_storage::BackendSessionExt;
use std::collections::BTreeSet;
use tracing::{debug, error, info, instrument};

/// Outcome of a successful delete.
#[derive(Debug)]
pub struct DeleteSummary {
    pub file: FileRow,
    /// Chunk rows removed; shared chunks are kept.
    pub chunks_removed: u64,
    /// Chunks kept because another file still references them.
    pub chunks_shared: u64,
}

impl Engine {
    /// Delete a file and every chunk no other file references.
    ///
    /// Backend copies go first. Any backend failure other than "not found"
    /// aborts with the file row and every chunk row in place; only the
    /// associations of replicas already deleted are gone. On success the file
    /// row and the unshared chunk rows are removed in one transaction.
    #[instrument(skip(self, access))]
    pub async fn delete(&self, key: &str, by_filename: bool, access: &dyn Access) -> EngineResult<DeleteSummary> {
        require(access, Permission::Write)?;
        let file = self.resolve(key, by_filename).await?;
        let chunks = self.metadata.get_file_chunks(&file.file_hash).await?;
        let unique: BTreeSet<&String> = chunks.iter().collect();

        let mut unshared = Vec::new();
        let mut shared = 0;
        for hash in unique {
            if self.metadata.chunk_reference_count(hash).await? > 1 {
                debug!(chunk_hash = %hash, "chunk shared with another file, keeping");
                shared += 1;
                continue;
            }
            self.delete_replicas(hash).await?;
            unshared.push(hash.clone());
        }

        let chunks_removed = self
            .metadata
            .delete_file_with_chunks(&file.file_hash, &unshared)
            .await?;

        FILES_DELETED.inc();
        info!(
            file_hash = %file.file_hash,
            filename = %file.filename,
            chunks_removed,
            chunks_shared = shared,
            "file deleted"
        );
        Ok(DeleteSummary {
            file,
            chunks_removed,
            chunks_shared: shared,
        })
    }

    /// Remove every replica of a chunk. Each association is dropped as soon
    /// as its copy is gone, so no row points at a deleted replica.
    async fn delete_replicas(&self, hash: &str) -> EngineResult<()> {
        let _guard = self.locks.lock(hash).await;
        // A chunk without a row has no associations, so this is a no-op.
        for storage in self.metadata.chunk_storages(hash).await? {
            let backend = self.backend_for(&storage)?;
            match backend.delete_session(hash).await {
                Ok(()) => debug!(chunk_hash = %hash, storage = %storage.name, "replica deleted"),
                Err(e) if e.is_not_found() => {
                    debug!(chunk_hash = %hash, storage = %storage.name, "replica already gone");
                }
                Err(e) => {
                    error!(chunk_hash = %hash, storage = %storage.name, error = %e, "replica delete failed");
                    return Err(EngineError::BackendOperationFailed(e));
                }
            }
            self.metadata
                .remove_chunk_storage(hash, storage.storage_id)
                .await?;
        }
        Ok(())
    }
}
