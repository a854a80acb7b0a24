//! File upload, listing, download and deletion.

use super::common::{Page, Pagination, download_response};
use crate::auth::Caller;
use crate::error::ApiResult;
use crate::metrics::UPLOAD_DURATION;
use crate::state::AppState;
use axum::Json;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use depot_core::{Permission, size_kb};
use depot_engine::DeleteSummary;
use depot_metadata::FileRepo;
use depot_metadata::models::FileRow;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use time::format_description::well_known::Rfc3339;
use tokio_util::io::StreamReader;

/// File metadata as returned by the API.
#[derive(Debug, Serialize)]
pub struct FileInfo {
    pub file_hash: String,
    pub filename: String,
    pub size_bytes: u64,
    pub size_kb: u64,
    pub chunk_count: u64,
    pub update_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks: Option<Vec<String>>,
}

impl From<FileRow> for FileInfo {
    fn from(row: FileRow) -> Self {
        let size_bytes = row.size_bytes.max(0) as u64;
        Self {
            file_hash: row.file_hash,
            filename: row.filename,
            size_bytes,
            size_kb: size_kb(size_bytes),
            chunk_count: row.chunk_count.max(0) as u64,
            update_time: row.update_time.format(&Rfc3339).unwrap_or_default(),
            chunks: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub filename: String,
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub file_hash: String,
    pub filename: String,
    pub chunks_removed: u64,
    pub chunks_shared: u64,
}

impl From<DeleteSummary> for DeleteResponse {
    fn from(summary: DeleteSummary) -> Self {
        Self {
            file_hash: summary.file.file_hash,
            filename: summary.file.filename,
            chunks_removed: summary.chunks_removed,
            chunks_shared: summary.chunks_shared,
        }
    }
}

/// PUT /v1/files?filename=... - Upload a file from the raw request body.
pub async fn upload_file(
    State(state): State<AppState>,
    Caller(user): Caller,
    Query(query): Query<UploadQuery>,
    body: Body,
) -> ApiResult<(StatusCode, Json<FileInfo>)> {
    let start = Instant::now();
    let reader = StreamReader::new(body.into_data_stream().map_err(std::io::Error::other));

    let file = state.engine.upload(reader, &query.filename, &user).await?;
    UPLOAD_DURATION.observe(start.elapsed().as_secs_f64());
    tracing::info!(
        username = %user.username,
        filename = %file.filename,
        file_hash = %file.file_hash,
        "upload accepted"
    );
    Ok((StatusCode::CREATED, Json(file.into())))
}

/// GET /v1/files - List files by filename.
pub async fn list_files(
    State(state): State<AppState>,
    Caller(user): Caller,
    Query(pagination): Query<Pagination>,
) -> ApiResult<Json<Page<FileInfo>>> {
    user.require(Permission::Read)?;
    let (page, page_size, offset) = pagination.resolve()?;

    let items = state.metadata.list_files(offset, page_size).await?;
    let total = state.metadata.count_files().await?;
    Ok(Json(Page {
        items: items.into_iter().map(FileInfo::from).collect(),
        page,
        page_size,
        total,
    }))
}

/// GET /v1/files/{hash} - File metadata including its chunk list.
pub async fn get_file(
    State(state): State<AppState>,
    Caller(user): Caller,
    Path(hash): Path<String>,
) -> ApiResult<Json<FileInfo>> {
    user.require(Permission::Read)?;
    let file = state.engine.resolve(&hash, false).await?;
    let chunks = state.metadata.get_file_chunks(&file.file_hash).await?;

    let mut info = FileInfo::from(file);
    info.chunks = Some(chunks);
    Ok(Json(info))
}

/// GET /v1/files/{hash}/download - Stream a file by hash.
pub async fn download_file(
    State(state): State<AppState>,
    Caller(user): Caller,
    Path(hash): Path<String>,
) -> ApiResult<Response> {
    user.require(Permission::Read)?;
    stream_file(&state, &hash, false).await
}

/// GET /v1/download?path=... - Stream a file by filename.
pub async fn download_by_path(
    State(state): State<AppState>,
    Caller(user): Caller,
    Query(query): Query<DownloadQuery>,
) -> ApiResult<Response> {
    user.require(Permission::Read)?;
    stream_file(&state, &query.path, true).await
}

async fn stream_file(state: &AppState, key: &str, by_filename: bool) -> ApiResult<Response> {
    let download = state.engine.download(key, by_filename).await?;
    let size = download.file.size_bytes.max(0) as u64;
    Ok(download_response(
        &download.file.filename,
        size,
        download.stream,
    ))
}

/// DELETE /v1/files/{hash} - Delete a file and its unshared chunks.
pub async fn delete_file(
    State(state): State<AppState>,
    Caller(user): Caller,
    Path(hash): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let summary = state.engine.delete(&hash, false, &user).await?;
    tracing::info!(
        username = %user.username,
        file_hash = %summary.file.file_hash,
        "file deleted"
    );
    Ok(Json(summary.into()))
}
