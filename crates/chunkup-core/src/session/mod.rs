//! Upload session controller.
//!
//! `UploadService` is the only writer to the chunk store and the hash index.
//! Each chunk is written under a shared hold on its session lock. Once every
//! index in `0..total` is present the session is assembled, verified and
//! committed under the exclusive lock.

mod locks;
mod recovery;
mod request;
mod state;

pub use locks::{SessionGuard, SessionLocks, SharedGuard};
pub use recovery::SessionSummary;
pub use request::{
    QueryParams, QueryRequest, QueryResponse, SubmitFields, SubmitOutcome, SubmitRequest,
    SubmitResponse,
};
pub use state::SessionState;

use std::path::Path;

use crate::assembler::Assembler;
use crate::checksum::HashAlgorithm;
use crate::chunk_store::{ChunkStore, ReceivedChunks};
use crate::config::ChunkupConfig;
use crate::error::{UploadError, UploadResult};
use crate::hash::{ContentHash, StoredFilename};
use crate::hash_index::HashIndex;
use crate::layout::StorageLayout;
use crate::verify::{verify, Verification};

/// Service knobs taken from [`ChunkupConfig`].
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub public_prefix: String,
    pub hash_algorithm: HashAlgorithm,
    pub max_total_chunks: u32,
    pub max_chunk_bytes: u64,
}

impl From<&ChunkupConfig> for ServiceSettings {
    fn from(cfg: &ChunkupConfig) -> Self {
        ServiceSettings {
            public_prefix: cfg.public_prefix.clone(),
            hash_algorithm: cfg.hash_algorithm,
            max_total_chunks: cfg.max_total_chunks,
            max_chunk_bytes: cfg.max_chunk_bytes,
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        ServiceSettings::from(&ChunkupConfig::default())
    }
}

pub struct UploadService {
    layout: StorageLayout,
    chunks: ChunkStore,
    assembler: Assembler,
    index: HashIndex,
    locks: SessionLocks,
    settings: ServiceSettings,
}

impl UploadService {
    /// Open the service over `root`, creating the layout and the index database.
    pub async fn open_at(root: impl AsRef<Path>, settings: ServiceSettings) -> UploadResult<Self> {
        let layout = StorageLayout::new(root.as_ref(), &settings.public_prefix);
        layout.ensure_dirs().await?;
        let index = HashIndex::open_at(layout.index_path()).await?;
        Ok(Self::with_index(layout, index, settings))
    }

    /// Assemble a service from an already opened index.
    pub fn with_index(layout: StorageLayout, index: HashIndex, settings: ServiceSettings) -> Self {
        let chunks = ChunkStore::new(layout.clone());
        let assembler = Assembler::new(layout.clone(), chunks.clone());
        UploadService {
            layout,
            chunks,
            assembler,
            index,
            locks: SessionLocks::new(),
            settings,
        }
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    pub fn index(&self) -> &HashIndex {
        &self.index
    }

    pub fn chunks(&self) -> &ChunkStore {
        &self.chunks
    }

    /// Public URL of the stored artifact for `hash`, if indexed.
    async fn stored_url(&self, hash: &ContentHash) -> Option<String> {
        self.index
            .lookup(hash)
            .await
            .map(|filename| self.layout.public_url(&filename))
    }

    /// Status check. The index is consulted before anything chunk-level.
    pub async fn query(&self, req: &QueryRequest) -> UploadResult<QueryResponse> {
        self.layout.ensure_dirs().await?;

        if let Some(url) = self.stored_url(&req.hash).await {
            tracing::debug!(hash = %req.hash, %url, "query hit hash index");
            return Ok(QueryResponse::stored(url));
        }

        match req.chunk_index {
            None => {
                let received = self.chunks.list_received(&req.hash).await?;
                Ok(QueryResponse::pending(received.indices()))
            }
            Some(index) => Ok(QueryResponse::chunk(
                self.chunks.has_chunk(&req.hash, index).await?,
            )),
        }
    }

    fn validate(&self, req: &SubmitRequest) -> UploadResult<()> {
        if req.total == 0 {
            return Err(UploadError::parameter("chunks must be positive"));
        }
        if req.total > self.settings.max_total_chunks {
            return Err(UploadError::parameter(format!(
                "chunks {} exceeds limit {}",
                req.total, self.settings.max_total_chunks
            )));
        }
        if req.index >= req.total {
            return Err(UploadError::parameter(format!(
                "chunkIndex {} out of range 0..{}",
                req.index, req.total
            )));
        }
        if req.bytes.is_empty() {
            return Err(UploadError::parameter("chunk payload is empty"));
        }
        if req.bytes.len() as u64 > self.settings.max_chunk_bytes {
            return Err(UploadError::parameter(format!(
                "chunk of {} bytes exceeds limit {}",
                req.bytes.len(),
                self.settings.max_chunk_bytes
            )));
        }
        Ok(())
    }

    /// Write path: store one chunk and, if that completes the session,
    /// assemble, verify and commit it.
    pub async fn submit_chunk(&self, req: SubmitRequest) -> UploadResult<SubmitOutcome> {
        self.validate(&req)?;

        let received = {
            // Shared hold: a commit can't remove the session between the
            // index check and the write.
            let _shared = self.locks.share(&req.hash).await;
            if let Some(url) = self.stored_url(&req.hash).await {
                tracing::debug!(hash = %req.hash, "chunk for already stored content; skipping write");
                return Ok(SubmitOutcome::Complete {
                    url,
                    deduplicated: true,
                });
            }
            self.layout.ensure_dirs().await?;
            self.chunks.write_chunk(&req.hash, req.index, &req.bytes).await?;
            self.chunks.list_received(&req.hash).await?
        };

        if !received.is_complete(req.total) {
            let outcome = partial(&received, req.total);
            tracing::debug!(hash = %req.hash, index = req.index, ?outcome, "chunk accepted");
            return Ok(outcome);
        }

        self.complete(&req.hash, &req.filename, req.total).await
    }

    /// Assembling → Committed | Accumulating, under the exclusive session lock.
    async fn complete(
        &self,
        hash: &ContentHash,
        filename: &StoredFilename,
        total: u32,
    ) -> UploadResult<SubmitOutcome> {
        let _guard = self.locks.lock(hash).await;

        // A concurrent submit may have committed while we waited.
        if let Some(url) = self.stored_url(hash).await {
            return Ok(SubmitOutcome::Complete {
                url,
                deduplicated: true,
            });
        }
        let received = self.chunks.list_received(hash).await?;
        if !received.is_complete(total) {
            return Ok(partial(&received, total));
        }
        let strays = received.strays(total);
        if !strays.is_empty() {
            tracing::debug!(%hash, total, ?strays, "ignoring chunks beyond the declared total");
        }

        let staged = self.assembler.assemble(hash, total).await?;
        let artifact = match verify(staged, hash, self.settings.hash_algorithm).await? {
            Verification::Verified(artifact) => artifact,
            Verification::Mismatch { actual } => {
                return Err(UploadError::Integrity {
                    claimed: hash.to_string(),
                    actual,
                });
            }
        };

        let final_path = self.layout.artifact_path(filename);
        if tokio::fs::try_exists(&final_path).await.unwrap_or(false) {
            tracing::warn!(%hash, path = %final_path.display(), "replacing existing artifact with the same filename");
        }
        if let Err(e) = artifact.promote(&final_path).await {
            let _ = tokio::fs::remove_file(self.layout.staging_path(hash)).await;
            return Err(UploadError::storage(
                format!("promote artifact to {}", final_path.display()),
                e,
            ));
        }

        self.index.record(hash, filename.as_str()).await?;

        if let Err(e) = self.chunks.remove_session(hash).await {
            // Committed already; the leftover directory is swept by recovery.
            tracing::warn!(%hash, error = %e, "session cleanup failed after commit");
        }

        let url = self.layout.public_url(filename.as_str());
        tracing::info!(%hash, %filename, %url, total, "upload committed");
        Ok(SubmitOutcome::Complete {
            url,
            deduplicated: false,
        })
    }

    /// Current lifecycle state of `hash`.
    pub async fn session_state(&self, hash: &ContentHash) -> UploadResult<SessionState> {
        if let Some(filename) = self.index.lookup(hash).await {
            return Ok(SessionState::Committed { filename });
        }
        if self.locks.is_locked(hash) {
            return Ok(SessionState::Assembling);
        }
        if self.chunks.session_exists(hash).await? {
            let received = self.chunks.list_received(hash).await?;
            return Ok(SessionState::Accumulating {
                received: received.indices(),
            });
        }
        Ok(SessionState::Empty)
    }
}

fn partial(received: &ReceivedChunks, total: u32) -> SubmitOutcome {
    let missing = received.missing(total).len() as u32;
    SubmitOutcome::Partial {
        received: total - missing,
        total,
    }
}
