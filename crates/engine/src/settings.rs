//! Runtime settings read from the metadata store.

use crate::{Engine, EngineError, EngineResult, require};
use depot_core::error::validate_chunk_size;
use depot_core::{Access, DEFAULT_CHUNK_SIZE, DEFAULT_NUM_STORAGES, Permission, keys};
use depot_metadata::{ConfigRepo, ConfigRepoExt};
use serde_json::Value;
use tracing::info;

/// Settings that drive uploads. Re-read per operation so API changes apply
/// without a restart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineSettings {
    pub chunk_size: u64,
    pub num_storages: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            num_storages: DEFAULT_NUM_STORAGES as usize,
        }
    }
}

impl Engine {
    /// Load the current settings, falling back to defaults for absent keys.
    pub async fn settings(&self) -> EngineResult<EngineSettings> {
        let defaults = EngineSettings::default();
        let chunk_size: u64 = self
            .metadata
            .get_config_or(keys::CHUNK_SIZE, defaults.chunk_size)
            .await?;
        let num_storages: usize = self
            .metadata
            .get_config_or(keys::NUM_STORAGES, defaults.num_storages)
            .await?;

        validate_chunk_size(chunk_size)?;
        if num_storages == 0 {
            return Err(EngineError::InvalidInput(
                "num_storages must be at least 1".to_string(),
            ));
        }

        Ok(EngineSettings {
            chunk_size,
            num_storages,
        })
    }

    /// Validate and persist one runtime setting.
    pub async fn set_setting(&self, key: &str, value: Value, access: &dyn Access) -> EngineResult<()> {
        require(access, Permission::Admin)?;
        validate_setting(key, &value)?;
        self.metadata.set_config(key, &value).await?;
        info!(key, "setting updated");
        Ok(())
    }
}

/// Check that `value` is acceptable for `key`.
pub fn validate_setting(key: &str, value: &Value) -> EngineResult<()> {
    let invalid = |reason: &str| depot_core::Error::InvalidSetting {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    match key {
        keys::CHUNK_SIZE => {
            let size = value
                .as_u64()
                .ok_or_else(|| invalid("expected a positive integer"))?;
            validate_chunk_size(size)?;
        }
        keys::NUM_STORAGES => match value.as_u64() {
            Some(n) if n >= 1 => {}
            _ => return Err(invalid("expected an integer of at least 1").into()),
        },
        keys::SECRET_KEY => match value.as_str() {
            Some(s) if !s.is_empty() => {}
            _ => return Err(invalid("expected a non-empty string").into()),
        },
        _ => return Err(invalid("unknown setting").into()),
    }
    Ok(())
}
