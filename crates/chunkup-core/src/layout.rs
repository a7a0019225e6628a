//! On-disk layout of the storage root and public addressing of artifacts.
//!
//! ```text
//! <root>/chunks/<hash>/<index>.chunk   in-flight sessions
//! <root>/staging/<hash>.part           assembled, not yet verified
//! <root>/complete/<filename>           committed artifacts
//! <root>/hashes.db                     hash index
//! ```

use std::fmt::Write;
use std::path::PathBuf;

use crate::error::{IoContext, UploadResult};
use crate::hash::{ContentHash, StoredFilename};
use crate::storage;

/// Resolved paths under one storage root.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
    public_prefix: String,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>, public_prefix: &str) -> Self {
        StorageLayout {
            root: root.into(),
            public_prefix: public_prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn chunks_dir(&self) -> PathBuf {
        self.root.join("chunks")
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.root.join("staging")
    }

    pub fn complete_dir(&self) -> PathBuf {
        self.root.join("complete")
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join("hashes.db")
    }

    pub fn session_dir(&self, hash: &ContentHash) -> PathBuf {
        self.chunks_dir().join(hash.as_str())
    }

    /// Staging file for one session's assembly attempt.
    pub fn staging_path(&self, hash: &ContentHash) -> PathBuf {
        storage::temp_path(&self.staging_dir().join(hash.as_str()))
    }

    pub fn artifact_path(&self, filename: &StoredFilename) -> PathBuf {
        self.complete_dir().join(filename.as_str())
    }

    /// Stable public address derived from the filename only.
    pub fn public_url(&self, filename: &str) -> String {
        format!("{}/{}", self.public_prefix, encode_path_segment(filename))
    }

    /// Lazy, idempotent creation of every directory in the layout.
    /// Called unconditionally before any session operation.
    pub async fn ensure_dirs(&self) -> UploadResult<()> {
        for dir in [self.chunks_dir(), self.staging_dir(), self.complete_dir()] {
            tokio::fs::create_dir_all(&dir)
                .await
                .storage_context(|| format!("create dir {}", dir.display()))?;
        }
        Ok(())
    }
}

/// Percent-encode every byte outside the RFC 3986 unreserved set, so `#`,
/// `?` and `%` in a filename can't change what the URL points at.
fn encode_path_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for b in segment.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
            out.push(b as char);
        } else {
            let _ = write!(out, "%{b:02X}");
        }
    }
    out
}
