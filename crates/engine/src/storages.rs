//! Storage administration.

use crate::{Engine, EngineError, EngineResult, require};
use depot_core::{Access, Permission};
use depot_metadata::StorageRepo;
use depot_metadata::models::{NewStorage, StorageRow};
use tracing::info;

impl Engine {
    /// Register a storage after checking its driver and settings.
    ///
    /// The driver must be known to the registry and must accept the
    /// settings. No connection is attempted.
    pub async fn register_storage(&self, storage: NewStorage, access: &dyn Access) -> EngineResult<StorageRow> {
        require(access, Permission::Admin)?;
        if storage.name.is_empty() {
            return Err(EngineError::InvalidInput("storage name must not be empty".to_string()));
        }
        if storage.priority < 1 {
            return Err(EngineError::InvalidInput(format!(
                "storage {}: priority must be at least 1",
                storage.name
            )));
        }
        if !self.registry.contains(&storage.driver) {
            return Err(EngineError::InvalidInput(format!(
                "unknown driver: {}",
                storage.driver
            )));
        }
        self.registry
            .build(&storage.driver, &storage.driver_settings)
            .map_err(|e| EngineError::InvalidInput(e.to_string()))?;

        let row = self.metadata.create_storage(&storage).await?;
        info!(
            storage = %row.name,
            driver = %row.driver,
            priority = row.priority,
            enabled = row.enabled,
            "storage registered"
        );
        Ok(row)
    }

    /// Enable or disable a storage. Disabled storages still serve reads.
    pub async fn set_storage_enabled(&self, name: &str, enabled: bool, access: &dyn Access) -> EngineResult<()> {
        require(access, Permission::Admin)?;
        self.metadata.set_storage_enabled(name, enabled).await?;
        info!(storage = %name, enabled, "storage state changed");
        Ok(())
    }
}
