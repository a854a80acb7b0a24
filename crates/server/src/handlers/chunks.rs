//! Chunk inspection and single-chunk downloads.

use super::common::{Page, Pagination, download_response};
use crate::auth::Caller;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use depot_core::{ChunkHash, Permission, size_kb};
use depot_metadata::ChunkRepo;
use depot_metadata::models::ChunkRow;
use serde::Serialize;
use time::format_description::well_known::Rfc3339;

#[derive(Debug, Serialize)]
pub struct ChunkInfo {
    pub chunk_hash: String,
    pub size_bytes: u64,
    pub size_kb: u64,
    pub update_time: String,
    /// Names of storages holding a replica.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storages: Option<Vec<String>>,
    /// Number of files referencing the chunk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<u64>,
}

impl From<ChunkRow> for ChunkInfo {
    fn from(row: ChunkRow) -> Self {
        let size_bytes = row.size_bytes.max(0) as u64;
        Self {
            chunk_hash: row.chunk_hash,
            size_bytes,
            size_kb: size_kb(size_bytes),
            update_time: row.update_time.format(&Rfc3339).unwrap_or_default(),
            storages: None,
            references: None,
        }
    }
}

/// GET /v1/chunks - List chunks by hash.
pub async fn list_chunks(
    State(state): State<AppState>,
    Caller(user): Caller,
    Query(pagination): Query<Pagination>,
) -> ApiResult<Json<Page<ChunkInfo>>> {
    user.require(Permission::Read)?;
    let (page, page_size, offset) = pagination.resolve()?;

    let items = state.metadata.list_chunks(offset, page_size).await?;
    let total = state.metadata.count_chunks().await?;
    Ok(Json(Page {
        items: items.into_iter().map(ChunkInfo::from).collect(),
        page,
        page_size,
        total,
    }))
}

/// GET /v1/chunks/{hash} - Chunk metadata with its storages.
pub async fn get_chunk(
    State(state): State<AppState>,
    Caller(user): Caller,
    Path(hash): Path<String>,
) -> ApiResult<Json<ChunkInfo>> {
    user.require(Permission::Read)?;
    let hash = ChunkHash::from_hex(&hash)?.to_hex();

    let row = state
        .metadata
        .get_chunk(&hash)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("chunk {hash}")))?;
    let storages = state
        .metadata
        .chunk_storages(&hash)
        .await?
        .into_iter()
        .map(|s| s.name)
        .collect();
    let references = state.metadata.chunk_reference_count(&hash).await?;

    let mut info = ChunkInfo::from(row);
    info.storages = Some(storages);
    info.references = Some(references);
    Ok(Json(info))
}

/// GET /v1/chunks/{hash}/download - Fetch one chunk through the reader.
pub async fn download_chunk(
    State(state): State<AppState>,
    Caller(user): Caller,
    Path(hash): Path<String>,
) -> ApiResult<Response> {
    user.require(Permission::Read)?;
    let data = state.engine.get(&hash).await?;
    let size = data.len() as u64;
    let stream = futures::stream::once(async move { Ok::<_, std::io::Error>(data) });
    Ok(download_response(&hash, size, stream))
}
