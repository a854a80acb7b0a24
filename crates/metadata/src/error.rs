//! Metadata store error types.

use thiserror::Error;

/// Format missing chunks for display, capping at MAX_DISPLAYED to prevent log/response bloat.
fn format_missing_chunks(chunks: &[String]) -> String {
    const MAX_DISPLAYED: usize = 5;
    if chunks.len() <= MAX_DISPLAYED {
        format!("{:?}", chunks)
    } else {
        let sample: Vec<_> = chunks.iter().take(MAX_DISPLAYED).collect();
        format!("{:?} (and {} more)", sample, chunks.len() - MAX_DISPLAYED)
    }
}

/// Metadata store operation errors.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("missing {} chunks for file {filename}: {}", .missing_chunks.len(), format_missing_chunks(.missing_chunks))]
    MissingChunks {
        filename: String,
        missing_chunks: Vec<String>,
    },
}

impl MetadataError {
    /// Map a unique-constraint violation to `AlreadyExists(what)`, passing
    /// every other database error through.
    pub(crate) fn unique(err: sqlx::Error, what: impl Into<String>) -> Self {
        match err.as_database_error() {
            Some(db) if db.is_unique_violation() => Self::AlreadyExists(what.into()),
            _ => Self::Database(err),
        }
    }
}

impl From<serde_json::Error> for MetadataError {
    fn from(e: serde_json::Error) -> Self {
        MetadataError::Internal(format!("invalid JSON column: {e}"))
    }
}

impl From<std::io::Error> for MetadataError {
    fn from(e: std::io::Error) -> Self {
        MetadataError::Config(e.to_string())
    }
}

/// Result type for metadata operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;
