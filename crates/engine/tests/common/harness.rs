//! An engine wired to an in-memory metadata store and fake backends.

use super::fakes::{FakeBackend, Mode};
use depot_core::keys;
use depot_engine::Engine;
use depot_metadata::models::{NewStorage, StorageRow};
use depot_metadata::{ConfigRepo, MetadataStore, SqliteStore, StorageRepo};
use depot_storage::{Backend, BackendError, DriverRegistry};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type Fakes = Arc<Mutex<HashMap<String, Arc<FakeBackend>>>>;

pub struct Harness {
    pub engine: Arc<Engine>,
    pub store: Arc<dyn MetadataStore>,
    fakes: Fakes,
}

impl Harness {
    /// Engine with a fixed RNG seed and no storages.
    pub async fn new(seed: u64) -> Self {
        let store: Arc<dyn MetadataStore> = Arc::new(SqliteStore::in_memory().await.unwrap());
        let fakes: Fakes = Arc::default();

        let lookup = fakes.clone();
        let registry = DriverRegistry::builtin().register("fake", move |settings| {
            let id = settings
                .get("id")
                .and_then(|v| v.as_str())
                .ok_or_else(|| BackendError::Config("fake: missing id".to_string()))?;
            let fake = lookup
                .lock()
                .unwrap()
                .get(id)
                .cloned()
                .ok_or_else(|| BackendError::Config(format!("fake: unknown id {id}")))?;
            Ok(fake as Arc<dyn Backend>)
        });

        let engine = Arc::new(Engine::with_seed(store.clone(), registry, seed));
        Self {
            engine,
            store,
            fakes,
        }
    }

    /// Register a fake storage with priority 1.
    pub async fn add(&self, name: &str, mode: Mode) -> Arc<FakeBackend> {
        self.add_weighted(name, mode, 1).await.0
    }

    pub async fn add_weighted(
        &self,
        name: &str,
        mode: Mode,
        priority: i64,
    ) -> (Arc<FakeBackend>, StorageRow) {
        let fake = Arc::new(FakeBackend::new(mode));
        self.fakes
            .lock()
            .unwrap()
            .insert(name.to_string(), fake.clone());

        let mut driver_settings = serde_json::Map::new();
        driver_settings.insert("id".to_string(), json!(name));
        let row = self
            .store
            .create_storage(&NewStorage {
                name: name.to_string(),
                driver: "fake".to_string(),
                priority,
                enabled: true,
                driver_settings,
            })
            .await
            .unwrap();
        (fake, row)
    }

    pub async fn configure(&self, chunk_size: u64, num_storages: usize) {
        self.store
            .set_config(keys::CHUNK_SIZE, &json!(chunk_size))
            .await
            .unwrap();
        self.store
            .set_config(keys::NUM_STORAGES, &json!(num_storages))
            .await
            .unwrap();
    }

    pub async fn storage(&self, name: &str) -> StorageRow {
        self.store.get_storage(name).await.unwrap().unwrap()
    }
}
