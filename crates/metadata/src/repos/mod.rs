//! Repository traits for metadata operations.

pub mod chunks;
pub mod config;
pub mod files;
pub mod storages;
pub mod users;

pub use chunks::ChunkRepo;
pub use config::{ConfigRepo, ConfigRepoExt};
pub use files::FileRepo;
pub use storages::StorageRepo;
pub use users::{SessionRepo, UserRepo};
