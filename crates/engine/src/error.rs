//! Engine error types.

use depot_metadata::MetadataError;
use depot_storage::BackendError;
use thiserror::Error;

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("insufficient replicas for chunk {hash}: required {required}, achieved {achieved}")]
    InsufficientReplicas {
        hash: String,
        required: usize,
        achieved: usize,
    },

    #[error("chunk {hash} is unavailable on every storage")]
    ChunkUnavailable { hash: String },

    #[error("backend operation failed: {0}")]
    BackendOperationFailed(#[from] BackendError),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("metadata error: {0}")]
    Metadata(MetadataError),
}

impl From<MetadataError> for EngineError {
    fn from(e: MetadataError) -> Self {
        match e {
            MetadataError::NotFound(what) => Self::NotFound(what),
            MetadataError::AlreadyExists(what) => Self::Conflict(format!("{what} already exists")),
            other => Self::Metadata(other),
        }
    }
}

impl From<depot_core::Error> for EngineError {
    fn from(e: depot_core::Error) -> Self {
        Self::InvalidInput(e.to_string())
    }
}

/// Result type alias for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
