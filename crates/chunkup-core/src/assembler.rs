//! Chunk assembler: concatenates a complete session into one staging file.
//!
//! Order comes from the index range `0..total`, never from directory listing
//! order. With equal-sized chunks a wrong order can't be told apart from the
//! right one by size, and only the final digest would notice.

use std::io;

use crate::chunk_store::ChunkStore;
use crate::error::{UploadError, UploadResult};
use crate::hash::ContentHash;
use crate::layout::StorageLayout;
use crate::storage::{StagedArtifact, StagingFile};

/// Assembles a session's chunks into `<root>/staging/<hash>.part`.
#[derive(Debug, Clone)]
pub struct Assembler {
    layout: StorageLayout,
    chunks: ChunkStore,
}

impl Assembler {
    pub fn new(layout: StorageLayout, chunks: ChunkStore) -> Self {
        Assembler { layout, chunks }
    }

    /// Concatenate chunks `0..total_chunks` in ascending index order.
    ///
    /// The caller has already checked that every index is present; a chunk
    /// that can't be read here is fatal for this attempt. The partial staging
    /// file is removed before the error is returned.
    pub async fn assemble(&self, hash: &ContentHash, total_chunks: u32) -> UploadResult<StagedArtifact> {
        let staging_path = self.layout.staging_path(hash);
        tracing::info!(%hash, total_chunks, staging = %staging_path.display(), "assembling chunks");

        let mut staging = StagingFile::create(&staging_path)
            .await
            .map_err(|e| UploadError::storage(format!("create {}", staging_path.display()), e))?;

        for index in 0..total_chunks {
            let chunk_path = self.chunks.chunk_path(hash, index);
            if let Err(e) = staging.append_file(&chunk_path).await {
                let _ = tokio::fs::remove_file(&staging_path).await;
                tracing::warn!(%hash, index, error = %e, "assembly aborted");
                return Err(match e.kind() {
                    io::ErrorKind::NotFound => UploadError::MissingChunk { index },
                    _ => UploadError::storage(format!("append chunk {index} of {hash}"), e),
                });
            }
        }

        let staged = match staging.finish().await {
            Ok(s) => s,
            Err(e) => {
                let _ = tokio::fs::remove_file(&staging_path).await;
                return Err(UploadError::storage(format!("sync {}", staging_path.display()), e));
            }
        };
        tracing::info!(%hash, bytes = staged.size(), "assembly complete");
        Ok(staged)
    }
}
