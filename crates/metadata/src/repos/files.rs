//! File repository.

use crate::error::MetadataResult;
use crate::models::FileRow;
use async_trait::async_trait;

/// Repository for file operations.
#[async_trait]
pub trait FileRepo: Send + Sync {
    /// Create a file and its ordered chunk list in one transaction.
    ///
    /// Fails with `MissingChunks` if any referenced chunk has no row and with
    /// `AlreadyExists` if the filename or hash is taken.
    async fn create_file(&self, file: &FileRow, chunks: &[String]) -> MetadataResult<()>;

    /// Get a file by identity hash.
    async fn get_file_by_hash(&self, file_hash: &str) -> MetadataResult<Option<FileRow>>;

    /// Get a file by filename.
    async fn get_file_by_name(&self, filename: &str) -> MetadataResult<Option<FileRow>>;

    /// Check if a filename is taken.
    async fn file_exists(&self, filename: &str) -> MetadataResult<bool>;

    /// Get a file's chunk hashes in reconstruction order.
    async fn get_file_chunks(&self, file_hash: &str) -> MetadataResult<Vec<String>>;

    /// List files ordered by filename.
    async fn list_files(&self, offset: u64, limit: u64) -> MetadataResult<Vec<FileRow>>;

    /// Count all files.
    async fn count_files(&self) -> MetadataResult<u64>;

    /// Delete a file together with the given chunk rows, atomically.
    ///
    /// A listed chunk still referenced by another file is kept. Returns the
    /// number of chunk rows removed. Fails with `NotFound` if the file is gone.
    async fn delete_file_with_chunks(
        &self,
        file_hash: &str,
        chunks: &[String],
    ) -> MetadataResult<u64>;
}
