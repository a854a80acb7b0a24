//! Storage backends for depot.
//!
//! This crate provides:
//! - The backend capability contract every driver implements
//! - Session helpers (connect, operation, release)
//! - Drivers: local filesystem, S3-compatible, FTP, WebDAV, in-memory
//! - A registry mapping driver tags to factories

pub mod backends;
pub mod error;
pub mod registry;
pub mod traits;

pub use backends::{
    filesystem::FilesystemBackend,
    ftp::FtpBackend,
    memory::{MemoryBackend, MemorySpaces},
    s3::S3Backend,
    webdav::WebDavBackend,
};
pub use error::{BackendError, BackendResult, Operation};
pub use registry::{DriverFactory, DriverRegistry, DriverSettings, parse_settings};
pub use traits::{Backend, BackendSessionExt, chunk_key, validate_hash};
