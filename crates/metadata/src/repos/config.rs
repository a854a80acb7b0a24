//! Runtime settings repository.

use crate::error::MetadataResult;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Key-value settings with JSON values.
#[async_trait]
pub trait ConfigRepo: Send + Sync {
    async fn get_config(&self, key: &str) -> MetadataResult<Option<Value>>;

    /// Insert or replace a setting.
    async fn set_config(&self, key: &str, value: &Value) -> MetadataResult<()>;

    /// Insert a setting only if the key is absent. Returns true if written.
    async fn init_config(&self, key: &str, value: &Value) -> MetadataResult<bool>;
}

/// Typed reads with a default fallback.
///
/// Automatically implemented for every [`ConfigRepo`].
#[async_trait]
pub trait ConfigRepoExt: ConfigRepo {
    /// Read `key` as `T`, returning `default` when the key is absent.
    async fn get_config_or<T>(&self, key: &str, default: T) -> MetadataResult<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        match self.get_config(key).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(default),
        }
    }
}

impl<T: ConfigRepo + ?Sized> ConfigRepoExt for T {}
