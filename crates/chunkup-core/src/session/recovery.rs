//! Restart recovery and abandonment.
//!
//! Session state lives entirely in the chunk directories, so recovery is a
//! scan: report every in-flight session, finish cleanup a crash interrupted,
//! and drop staging files no assembly owns any more.

use serde::Serialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::{SessionState, UploadService};
use crate::error::{IoContext, UploadResult};
use crate::hash::ContentHash;
use crate::storage;

/// One session as seen by a storage scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub hash: String,
    #[serde(flatten)]
    pub state: SessionState,
    /// Unix seconds of the newest chunk write, if known.
    pub last_activity: Option<u64>,
}

fn unix_secs(t: SystemTime) -> Option<u64> {
    t.duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs())
}

impl UploadService {
    /// Rebuild the picture of in-flight uploads from disk.
    ///
    /// - removes orphaned staging files (no assembly holds their session lock)
    /// - removes chunk directories of hashes that are already committed
    /// - returns every remaining session with its received indices
    pub async fn recover(&self) -> UploadResult<Vec<SessionSummary>> {
        self.layout.ensure_dirs().await?;
        self.sweep_staging().await?;

        let mut out = Vec::new();
        for hash in self.chunks.list_sessions().await? {
            if self.locks.is_locked(&hash) {
                continue;
            }
            if self.index.lookup(&hash).await.is_some() {
                tracing::info!(%hash, "removing leftover chunks of committed upload");
                self.chunks.remove_session(&hash).await?;
                continue;
            }
            let received = self.chunks.list_received(&hash).await?;
            let last_activity = self.chunks.last_activity(&hash).await?.and_then(unix_secs);
            out.push(SessionSummary {
                hash: hash.to_string(),
                state: SessionState::Accumulating {
                    received: received.indices(),
                },
                last_activity,
            });
        }
        tracing::info!(sessions = out.len(), "session recovery scan complete");
        Ok(out)
    }

    async fn sweep_staging(&self) -> UploadResult<usize> {
        let dir = self.layout.staging_dir();
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .storage_context(|| format!("list {}", dir.display()))?;
        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .storage_context(|| format!("list {}", dir.display()))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !storage::is_temp_name(&name) {
                continue;
            }
            let stem = &name[..name.len() - storage::TEMP_SUFFIX.len()];
            if let Ok(hash) = ContentHash::parse(stem) {
                if self.locks.is_locked(&hash) {
                    continue;
                }
            }
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => {
                    tracing::warn!(path = %entry.path().display(), "removed orphaned staging file");
                    removed += 1;
                }
                Err(e) => tracing::warn!(path = %entry.path().display(), error = %e, "could not remove staging file"),
            }
        }
        Ok(removed)
    }

    /// Garbage-collect sessions idle for at least `max_age` (any state →
    /// Abandoned). Sessions being assembled right now are skipped.
    pub async fn collect_abandoned(&self, max_age: Duration) -> UploadResult<Vec<SessionSummary>> {
        let now = SystemTime::now();
        let mut out = Vec::new();
        for hash in self.chunks.list_sessions().await? {
            let Some(_guard) = self.locks.try_lock(&hash) else {
                continue;
            };
            let Some(last) = self.chunks.last_activity(&hash).await? else {
                continue;
            };
            let idle = now.duration_since(last).unwrap_or_default();
            if idle < max_age {
                continue;
            }
            self.chunks.remove_session(&hash).await?;
            let _ = tokio::fs::remove_file(self.layout.staging_path(&hash)).await;
            tracing::info!(%hash, idle_secs = idle.as_secs(), "abandoned session collected");
            out.push(SessionSummary {
                hash: hash.to_string(),
                state: SessionState::Abandoned,
                last_activity: unix_secs(last),
            });
        }
        Ok(out)
    }
}
