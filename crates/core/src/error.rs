//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid hash: {0}")]
    InvalidHash(String),

    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("invalid chunk size: {size} (must be between {min} and {max})")]
    InvalidChunkSize { size: u64, min: u64, max: u64 },

    #[error("invalid permissions: {0}")]
    InvalidPermissions(String),

    #[error("invalid setting {key}: {reason}")]
    InvalidSetting { key: String, reason: String },
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Check that a chunk size lies within the supported bounds.
pub fn validate_chunk_size(size: u64) -> Result<()> {
    if !(crate::MIN_CHUNK_SIZE..=crate::MAX_CHUNK_SIZE).contains(&size) {
        return Err(Error::InvalidChunkSize {
            size,
            min: crate::MIN_CHUNK_SIZE,
            max: crate::MAX_CHUNK_SIZE,
        });
    }
    Ok(())
}
