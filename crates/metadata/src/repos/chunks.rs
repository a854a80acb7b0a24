//! Chunk repository.

use crate::error::MetadataResult;
use crate::models::{ChunkRow, StorageRow};
use async_trait::async_trait;

/// Repository for chunk operations.
#[async_trait]
pub trait ChunkRepo: Send + Sync {
    /// Insert a chunk row and its backend associations in one transaction.
    ///
    /// The first writer wins: if the hash already has a row it is left
    /// untouched, the associations are still added, and `false` is returned.
    async fn create_chunk(&self, chunk: &ChunkRow, storage_ids: &[i64]) -> MetadataResult<bool>;

    /// Get a chunk by hash.
    async fn get_chunk(&self, chunk_hash: &str) -> MetadataResult<Option<ChunkRow>>;

    /// Check if a chunk exists.
    async fn chunk_exists(&self, chunk_hash: &str) -> MetadataResult<bool>;

    /// Associate an existing chunk with a storage. Idempotent.
    async fn add_chunk_storage(&self, chunk_hash: &str, storage_id: i64) -> MetadataResult<()>;

    /// Drop one chunk-to-storage association. Returns false if absent.
    async fn remove_chunk_storage(&self, chunk_hash: &str, storage_id: i64) -> MetadataResult<bool>;

    /// Storages holding a chunk, whether enabled or not.
    async fn chunk_storages(&self, chunk_hash: &str) -> MetadataResult<Vec<StorageRow>>;

    /// Delete a chunk row and its associations. Returns false if absent.
    async fn delete_chunk(&self, chunk_hash: &str) -> MetadataResult<bool>;

    /// List chunks ordered by hash.
    async fn list_chunks(&self, offset: u64, limit: u64) -> MetadataResult<Vec<ChunkRow>>;

    /// Count all chunks.
    async fn count_chunks(&self) -> MetadataResult<u64>;

    /// Number of distinct files referencing a chunk.
    async fn chunk_reference_count(&self, chunk_hash: &str) -> MetadataResult<u64>;
}
