//! Runtime settings administration.

use crate::auth::Caller;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SetSettingRequest {
    pub value: serde_json::Value,
}

/// PUT /v1/config/{key} - Update `chunk_size`, `num_storages` or `secret_key` (admin).
///
/// Changing `secret_key` invalidates every issued token.
pub async fn set_setting(
    State(state): State<AppState>,
    Caller(user): Caller,
    Path(key): Path<String>,
    Json(req): Json<SetSettingRequest>,
) -> ApiResult<StatusCode> {
    state.engine.set_setting(&key, req.value, &user).await?;
    tracing::info!(username = %user.username, key = %key, "setting changed via API");
    Ok(StatusCode::NO_CONTENT)
}
