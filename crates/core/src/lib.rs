//! Core domain types shared by every depot crate.
//!
//! - Content hashes for chunks and files
//! - Chunk verification and size helpers
//! - Permission strings (`r`, `w`, `a`)
//! - Configuration types

pub mod chunk;
pub mod config;
pub mod error;
pub mod hash;
pub mod permission;

pub use chunk::{Chunk, ChunkHash, FileHash, size_kb};
pub use error::{Error, Result};
pub use hash::{ContentHash, ContentHasher};
pub use permission::{Access, Permission, PermissionSet};

/// Default chunk size: 1 MiB
pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;

/// Maximum chunk size: 64 MiB
pub const MAX_CHUNK_SIZE: u64 = 64 * 1024 * 1024;

/// Minimum chunk size: 1 KiB
pub const MIN_CHUNK_SIZE: u64 = 1024;

/// Default replica target per chunk.
pub const DEFAULT_NUM_STORAGES: u32 = 3;

/// Placeholder signing secret. Deployments must override it.
pub const DEFAULT_SECRET_KEY: &str = "change-me";

/// Keys of the persisted runtime settings.
pub mod keys {
    pub const CHUNK_SIZE: &str = "chunk_size";
    pub const NUM_STORAGES: &str = "num_storages";
    pub const SECRET_KEY: &str = "secret_key";
}
