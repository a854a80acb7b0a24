//! Driver registry: maps a driver tag to a backend factory.

use crate::backends::filesystem::{FilesystemBackend, FilesystemSettings};
use crate::backends::ftp::{FtpBackend, FtpSettings};
use crate::backends::memory::{MemorySettings, MemorySpaces};
use crate::backends::s3::{S3Backend, S3Settings};
use crate::backends::webdav::{WebDavBackend, WebDavSettings};
use crate::error::{BackendError, BackendResult};
use crate::traits::Backend;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Opaque driver settings as stored with a storage record.
pub type DriverSettings = serde_json::Map<String, serde_json::Value>;

/// Builds a backend instance from its settings.
pub type DriverFactory =
    Arc<dyn Fn(&DriverSettings) -> BackendResult<Arc<dyn Backend>> + Send + Sync>;

/// Registered drivers, populated at startup and read-only afterwards.
#[derive(Clone, Default)]
pub struct DriverRegistry {
    factories: BTreeMap<String, DriverFactory>,
}

impl DriverRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every driver shipped in this crate:
    /// `local`, `s3`, `ftp`, `webdav` and `memory`.
    pub fn builtin() -> Self {
        let memory = MemorySpaces::default();
        Self::new()
            .register("local", |settings| {
                let settings: FilesystemSettings = parse_settings("local", settings)?;
                Ok(Arc::new(FilesystemBackend::from_settings(settings)?) as Arc<dyn Backend>)
            })
            .register("s3", |settings| {
                let settings: S3Settings = parse_settings("s3", settings)?;
                Ok(Arc::new(S3Backend::from_settings(settings)?) as Arc<dyn Backend>)
            })
            .register("ftp", |settings| {
                let settings: FtpSettings = parse_settings("ftp", settings)?;
                Ok(Arc::new(FtpBackend::from_settings(settings)?) as Arc<dyn Backend>)
            })
            .register("webdav", |settings| {
                let settings: WebDavSettings = parse_settings("webdav", settings)?;
                Ok(Arc::new(WebDavBackend::from_settings(settings)?) as Arc<dyn Backend>)
            })
            .register("memory", move |settings| {
                let settings: MemorySettings = parse_settings("memory", settings)?;
                Ok(Arc::new(memory.backend(&settings.namespace)) as Arc<dyn Backend>)
            })
    }

    /// Register a driver, replacing any previous factory under the same tag.
    pub fn register<F>(mut self, driver: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&DriverSettings) -> BackendResult<Arc<dyn Backend>> + Send + Sync + 'static,
    {
        self.factories.insert(driver.into(), Arc::new(factory));
        self
    }

    /// Check if a driver tag is known.
    pub fn contains(&self, driver: &str) -> bool {
        self.factories.contains_key(driver)
    }

    /// Registered driver tags, sorted.
    pub fn drivers(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build a fresh backend instance.
    pub fn build(&self, driver: &str, settings: &DriverSettings) -> BackendResult<Arc<dyn Backend>> {
        let factory = self
            .factories
            .get(driver)
            .ok_or_else(|| BackendError::UnknownDriver(driver.to_string()))?;
        factory(settings)
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Deserialize a settings map into a driver's typed settings.
///
/// Error messages name the driver and the offending field, never the values.
pub fn parse_settings<T: DeserializeOwned>(
    driver: &str,
    settings: &DriverSettings,
) -> BackendResult<T> {
    serde_json::from_value(serde_json::Value::Object(settings.clone()))
        .map_err(|e| BackendError::Config(format!("invalid {driver} settings: {e}")))
}
