//! Application state shared across handlers.

use depot_core::config::AppConfig;
use depot_engine::Engine;
use depot_metadata::MetadataStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Metadata store.
    pub metadata: Arc<dyn MetadataStore>,
    /// Storage engine.
    pub engine: Arc<Engine>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(config: AppConfig, engine: Arc<Engine>) -> Self {
        Self {
            config: Arc::new(config),
            metadata: engine.metadata().clone(),
            engine,
        }
    }
}
