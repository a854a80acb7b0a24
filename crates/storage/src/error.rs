//! Backend error types.
//!
//! Drivers never let their own error types escape: everything is folded
//! into [`BackendError`], with the driver cause boxed for logging.

use std::fmt;
use thiserror::Error;

/// The contract operation that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Connect,
    Store,
    Fetch,
    Delete,
    Release,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connect => "connect",
            Self::Store => "store",
            Self::Fetch => "fetch",
            Self::Delete => "delete",
            Self::Release => "release",
        })
    }
}

/// Backend operation errors.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("chunk not found: {0}")]
    NotFound(String),

    #[error("{driver} backend {operation} failed: {source}")]
    OperationFailed {
        driver: &'static str,
        operation: Operation,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unknown driver: {0}")]
    UnknownDriver(String),
}

impl BackendError {
    /// Wrap a driver-specific failure.
    pub fn failed(
        driver: &'static str,
        operation: Operation,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::OperationFailed {
            driver,
            operation,
            source: source.into(),
        }
    }

    /// True when the backend reported the chunk as absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type for backend operations.
pub type BackendResult<T> = std::result::Result<T, BackendError>;
