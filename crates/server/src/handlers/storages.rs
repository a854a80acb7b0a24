//! Storage administration endpoints.

use crate::auth::Caller;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use depot_core::Permission;
use depot_metadata::StorageRepo;
use depot_metadata::models::{NewStorage, StorageRow};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;

/// A storage as shown to clients. Driver settings are never returned, as
/// they may carry credentials.
#[derive(Debug, Serialize)]
pub struct StorageInfo {
    pub storage_id: i64,
    pub name: String,
    pub driver: String,
    pub priority: i64,
    pub enabled: bool,
    pub created_at: String,
}

impl From<StorageRow> for StorageInfo {
    fn from(row: StorageRow) -> Self {
        Self {
            storage_id: row.storage_id,
            name: row.name,
            driver: row.driver,
            priority: row.priority,
            enabled: row.enabled,
            created_at: row.created_at.format(&Rfc3339).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterStorageRequest {
    pub name: String,
    pub driver: String,
    #[serde(default = "default_priority")]
    pub priority: i64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub settings: serde_json::Map<String, serde_json::Value>,
}

fn default_priority() -> i64 {
    5
}

fn default_enabled() -> bool {
    true
}

/// GET /v1/storages - List registered storages.
pub async fn list_storages(
    State(state): State<AppState>,
    Caller(user): Caller,
) -> ApiResult<Json<Vec<StorageInfo>>> {
    user.require(Permission::Read)?;
    let rows = state.metadata.list_storages().await?;
    Ok(Json(rows.into_iter().map(StorageInfo::from).collect()))
}

/// POST /v1/storages - Register a storage (admin).
pub async fn register_storage(
    State(state): State<AppState>,
    Caller(user): Caller,
    Json(req): Json<RegisterStorageRequest>,
) -> ApiResult<(StatusCode, Json<StorageInfo>)> {
    let storage = NewStorage {
        name: req.name,
        driver: req.driver,
        priority: req.priority,
        enabled: req.enabled,
        driver_settings: req.settings,
    };
    let row = state.engine.register_storage(storage, &user).await?;
    Ok((StatusCode::CREATED, Json(row.into())))
}

/// POST /v1/storages/{name}/enable
pub async fn enable_storage(
    State(state): State<AppState>,
    Caller(user): Caller,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    state.engine.set_storage_enabled(&name, true, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/storages/{name}/disable
pub async fn disable_storage(
    State(state): State<AppState>,
    Caller(user): Caller,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    state.engine.set_storage_enabled(&name, false, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}
