//! Storage backend registry repository.

use crate::error::MetadataResult;
use crate::models::{NewStorage, StorageRow};
use async_trait::async_trait;

#[async_trait]
pub trait StorageRepo: Send + Sync {
    /// Register a storage. Fails with `AlreadyExists` on a duplicate name.
    async fn create_storage(&self, storage: &NewStorage) -> MetadataResult<StorageRow>;

    async fn get_storage(&self, name: &str) -> MetadataResult<Option<StorageRow>>;

    /// All storages ordered by name.
    async fn list_storages(&self) -> MetadataResult<Vec<StorageRow>>;

    /// Storages eligible for new writes.
    async fn list_enabled_storages(&self) -> MetadataResult<Vec<StorageRow>>;

    /// Enable or disable a storage. Fails with `NotFound` on an unknown name.
    async fn set_storage_enabled(&self, name: &str, enabled: bool) -> MetadataResult<()>;
}
