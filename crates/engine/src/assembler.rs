//! File uploads: split, store each chunk, then record the file.

use crate::metrics::FILES_UPLOADED;
use crate::{Engine, EngineError, EngineResult, require};
use depot_core::{Access, ChunkHash, FileHash, Permission};
use depot_metadata::models::FileRow;
use depot_metadata::{FileRepo, MetadataError};
use time::OffsetDateTime;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{info, instrument, warn};

impl Engine {
    /// Upload a file from `reader` under `filename`.
    ///
    /// Chunks are stored one at a time in `chunk_size` windows. If a chunk
    /// fails, the chunks already stored stay in place and are logged.
    #[instrument(skip(self, reader, access), fields(filename = %filename))]
    pub async fn upload<R>(&self, mut reader: R, filename: &str, access: &dyn Access) -> EngineResult<FileRow>
    where
        R: AsyncRead + Unpin + Send,
    {
        require(access, Permission::Write)?;
        if filename.is_empty() {
            return Err(EngineError::InvalidInput("filename must not be empty".to_string()));
        }
        if self.metadata.file_exists(filename).await? {
            return Err(EngineError::Conflict(format!("file {filename} already exists")));
        }

        let settings = self.settings().await?;
        let mut chunks: Vec<ChunkHash> = Vec::new();
        let mut size_bytes: u64 = 0;

        loop {
            let window = read_window(&mut reader, settings.chunk_size).await?;
            if window.is_empty() {
                break;
            }
            let short = (window.len() as u64) < settings.chunk_size;
            size_bytes += window.len() as u64;

            match self.put_replicated(window.into(), settings.num_storages).await {
                Ok(hash) => chunks.push(hash),
                Err(e) => {
                    log_orphans(filename, &chunks);
                    return Err(e);
                }
            }
            if short {
                break;
            }
        }

        let chunk_hex: Vec<String> = chunks.iter().map(ChunkHash::to_hex).collect();
        let row = FileRow {
            file_hash: FileHash::compute(filename, &chunks).to_hex(),
            filename: filename.to_string(),
            size_bytes: size_bytes as i64,
            chunk_count: chunks.len() as i64,
            update_time: OffsetDateTime::now_utc(),
        };

        if let Err(e) = self.metadata.create_file(&row, &chunk_hex).await {
            log_orphans(filename, &chunks);
            return Err(match e {
                MetadataError::AlreadyExists(_) => {
                    EngineError::Conflict(format!("file {filename} already exists"))
                }
                other => other.into(),
            });
        }

        FILES_UPLOADED.inc();
        info!(
            file_hash = %row.file_hash,
            size_bytes,
            chunk_count = chunks.len(),
            "file uploaded"
        );
        Ok(row)
    }
}

/// Read up to `size` bytes, stopping early only at end of input.
async fn read_window<R>(reader: &mut R, size: u64) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(size as usize);
    (&mut *reader).take(size).read_to_end(&mut buf).await?;
    Ok(buf)
}

fn log_orphans(filename: &str, chunks: &[ChunkHash]) {
    if chunks.is_empty() {
        return;
    }
    let orphaned: Vec<String> = chunks.iter().map(ChunkHash::to_hex).collect();
    warn!(
        filename,
        orphaned_chunks = ?orphaned,
        "upload failed, chunks stored so far are left in place"
    );
}
