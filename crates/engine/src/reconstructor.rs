//! File downloads as lazy, ordered chunk streams.

use crate::{Engine, EngineError, EngineResult};
use bytes::Bytes;
use depot_core::FileHash;
use depot_metadata::FileRepo;
use depot_metadata::models::FileRow;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{error, instrument};

/// Chunk data in file order. The first error ends the stream.
pub type ChunkStream = Pin<Box<dyn Stream<Item = EngineResult<Bytes>> + Send>>;

/// A resolved file ready to be streamed.
pub struct Download {
    pub file: FileRow,
    /// Chunk hashes in file order.
    pub chunks: Vec<String>,
    pub stream: ChunkStream,
}

impl Engine {
    /// Look up a file by filename, or by hash when `by_filename` is false.
    ///
    /// A hash key is cut at the first `/`, so `"<hash>/name.txt"` resolves.
    /// A key that is not a well-formed hash names no file: `NotFound`.
    pub async fn resolve(&self, key: &str, by_filename: bool) -> EngineResult<FileRow> {
        let file = if by_filename {
            self.metadata.get_file_by_name(key).await?
        } else {
            match FileHash::from_hex(key.split('/').next().unwrap_or(key)) {
                Ok(hash) => self.metadata.get_file_by_hash(&hash.to_hex()).await?,
                Err(_) => None,
            }
        };
        file.ok_or_else(|| EngineError::NotFound(format!("file {key}")))
    }

    /// Resolve a file and stream its chunks through the chunk reader.
    ///
    /// Nothing is fetched until the stream is polled. Each call re-reads
    /// from the storages.
    #[instrument(skip(self))]
    pub async fn download(self: &Arc<Self>, key: &str, by_filename: bool) -> EngineResult<Download> {
        let file = self.resolve(key, by_filename).await?;
        let chunks = self.metadata.get_file_chunks(&file.file_hash).await?;

        let engine = Arc::clone(self);
        let hashes = chunks.clone();
        let file_hash = file.file_hash.clone();
        let stream = async_stream::stream! {
            for (position, hash) in hashes.into_iter().enumerate() {
                match engine.get(&hash).await {
                    Ok(data) => yield Ok(data),
                    Err(e) => {
                        error!(
                            file_hash = %file_hash,
                            chunk_hash = %hash,
                            position,
                            error = %e,
                            "download failed mid-stream"
                        );
                        yield Err(e);
                        break;
                    }
                }
            }
        };

        Ok(Download {
            file,
            chunks,
            stream: Box::pin(stream),
        })
    }
}
