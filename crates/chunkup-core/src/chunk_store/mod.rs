//! Per-session chunk storage.
//!
//! Each session is a directory named after its content hash; each chunk is
//! its own file `<index>.chunk`. Session state is whatever is on disk, so a
//! restart never loses in-flight uploads.

mod received;

pub use received::ReceivedChunks;

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use tokio::io::AsyncWriteExt;

use crate::error::{IoContext, UploadError, UploadResult};
use crate::hash::ContentHash;
use crate::layout::StorageLayout;

const CHUNK_SUFFIX: &str = ".chunk";

/// Distinguishes concurrent temp files for the same chunk index.
static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Parse `<index>.chunk`. Temp files and strays return None.
pub fn parse_chunk_name(name: &str) -> Option<u32> {
    name.strip_suffix(CHUNK_SUFFIX)?.parse().ok()
}

fn chunk_name(index: u32) -> String {
    format!("{index}{CHUNK_SUFFIX}")
}

/// Filesystem-backed chunk store rooted at `<root>/chunks`.
#[derive(Debug, Clone)]
pub struct ChunkStore {
    layout: StorageLayout,
}

impl ChunkStore {
    pub fn new(layout: StorageLayout) -> Self {
        ChunkStore { layout }
    }

    pub fn session_dir(&self, hash: &ContentHash) -> PathBuf {
        self.layout.session_dir(hash)
    }

    pub fn chunk_path(&self, hash: &ContentHash, index: u32) -> PathBuf {
        self.session_dir(hash).join(chunk_name(index))
    }

    /// Idempotent creation of the session directory.
    pub async fn ensure_session(&self, hash: &ContentHash) -> UploadResult<()> {
        let dir = self.session_dir(hash);
        tokio::fs::create_dir_all(&dir)
            .await
            .storage_context(|| format!("create session dir {}", dir.display()))
    }

    pub async fn session_exists(&self, hash: &ContentHash) -> UploadResult<bool> {
        let dir = self.session_dir(hash);
        match tokio::fs::metadata(&dir).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(UploadError::storage(format!("stat {}", dir.display()), e)),
        }
    }

    /// Durably persist one chunk, replacing any previous bytes at that index.
    ///
    /// Bytes go to a uniquely named temp file first and are renamed over
    /// `<index>.chunk`, so readers only ever see whole chunks.
    pub async fn write_chunk(&self, hash: &ContentHash, index: u32, bytes: &[u8]) -> UploadResult<()> {
        self.ensure_session(hash).await?;
        let final_path = self.chunk_path(hash, index);
        let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp_path = self
            .session_dir(hash)
            .join(format!("{}.{}-{}.tmp", chunk_name(index), std::process::id(), seq));

        let result = async {
            let mut f = tokio::fs::File::create(&tmp_path).await?;
            f.write_all(bytes).await?;
            f.sync_all().await?;
            drop(f);
            tokio::fs::rename(&tmp_path, &final_path).await
        }
        .await;

        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(UploadError::storage(
                format!("write chunk {} of {}", index, hash),
                e,
            ));
        }
        tracing::debug!(%hash, index, bytes = bytes.len(), "chunk stored");
        Ok(())
    }

    /// Indices currently stored. A session that was never created is empty.
    pub async fn list_received(&self, hash: &ContentHash) -> UploadResult<ReceivedChunks> {
        let dir = self.session_dir(hash);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ReceivedChunks::new()),
            Err(e) => return Err(UploadError::storage(format!("list {}", dir.display()), e)),
        };
        let mut received = ReceivedChunks::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .storage_context(|| format!("list {}", dir.display()))?
        {
            if let Some(index) = entry.file_name().to_str().and_then(parse_chunk_name) {
                received.insert(index);
            }
        }
        Ok(received)
    }

    pub async fn has_chunk(&self, hash: &ContentHash, index: u32) -> UploadResult<bool> {
        let path = self.chunk_path(hash, index);
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(UploadError::storage(format!("stat {}", path.display()), e)),
        }
    }

    /// Delete every blob and the session directory. Missing session is fine.
    pub async fn remove_session(&self, hash: &ContentHash) -> UploadResult<()> {
        let dir = self.session_dir(hash);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                tracing::debug!(%hash, "session directory removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(UploadError::storage(format!("remove {}", dir.display()), e)),
        }
    }

    /// Every session directory under the chunk root. Entries whose name is
    /// not a valid content hash are skipped.
    pub async fn list_sessions(&self) -> UploadResult<Vec<ContentHash>> {
        let root = self.layout.chunks_dir();
        let mut entries = match tokio::fs::read_dir(&root).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(UploadError::storage(format!("list {}", root.display()), e)),
        };
        let mut out = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .storage_context(|| format!("list {}", root.display()))?
        {
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }
            match entry.file_name().to_str().map(ContentHash::parse) {
                Some(Ok(hash)) => out.push(hash),
                _ => tracing::warn!(path = %entry.path().display(), "ignoring unexpected entry in chunk root"),
            }
        }
        out.sort();
        Ok(out)
    }

    /// Most recent modification time of the session directory or any file in it.
    pub async fn last_activity(&self, hash: &ContentHash) -> UploadResult<Option<SystemTime>> {
        let dir = self.session_dir(hash);
        let dir_meta = match tokio::fs::metadata(&dir).await {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(UploadError::storage(format!("stat {}", dir.display()), e)),
        };
        let mut latest = dir_meta.modified().ok();
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .storage_context(|| format!("list {}", dir.display()))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .storage_context(|| format!("list {}", dir.display()))?
        {
            if let Ok(modified) = entry.metadata().await.and_then(|m| m.modified()) {
                latest = Some(latest.map_or(modified, |l| l.max(modified)));
            }
        }
        Ok(latest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &std::path::Path) -> (ChunkStore, ContentHash) {
        let layout = StorageLayout::new(dir, "/files/complete");
        (ChunkStore::new(layout), ContentHash::parse("abc123").unwrap())
    }

    #[test]
    fn chunk_names_parse() {
        assert_eq!(parse_chunk_name("0.chunk"), Some(0));
        assert_eq!(parse_chunk_name("17.chunk"), Some(17));
        assert_eq!(parse_chunk_name("3.chunk.42-7.tmp"), None);
        assert_eq!(parse_chunk_name("x.chunk"), None);
        assert_eq!(parse_chunk_name("notes.txt"), None);
    }

    #[tokio::test]
    async fn never_created_session_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let (store, hash) = store(dir.path());
        assert!(store.list_received(&hash).await.unwrap().is_empty());
        assert!(!store.session_exists(&hash).await.unwrap());
        assert!(!store.has_chunk(&hash, 0).await.unwrap());
        assert!(store.last_activity(&hash).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn out_of_order_writes_are_listed_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let (store, hash) = store(dir.path());
        store.write_chunk(&hash, 2, b"cc").await.unwrap();
        store.write_chunk(&hash, 0, b"aa").await.unwrap();
        let received = store.list_received(&hash).await.unwrap();
        assert_eq!(received.indices(), vec![0, 2]);
        assert!(store.has_chunk(&hash, 2).await.unwrap());
        assert!(!store.has_chunk(&hash, 1).await.unwrap());
    }

    #[tokio::test]
    async fn rewrite_replaces_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let (store, hash) = store(dir.path());
        store.write_chunk(&hash, 1, b"first attempt").await.unwrap();
        store.write_chunk(&hash, 1, b"retry").await.unwrap();
        assert_eq!(std::fs::read(store.chunk_path(&hash, 1)).unwrap(), b"retry");
        assert_eq!(store.list_received(&hash).await.unwrap().count(), 1);
    }

    #[tokio::test]
    async fn stray_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let (store, hash) = store(dir.path());
        store.write_chunk(&hash, 0, b"a").await.unwrap();
        std::fs::write(store.session_dir(&hash).join("1.chunk.99-1.tmp"), b"half").unwrap();
        std::fs::write(store.session_dir(&hash).join(".DS_Store"), b"").unwrap();
        assert_eq!(store.list_received(&hash).await.unwrap().indices(), vec![0]);
    }

    #[tokio::test]
    async fn remove_session_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let (store, hash) = store(dir.path());
        store.write_chunk(&hash, 0, b"a").await.unwrap();
        store.remove_session(&hash).await.unwrap();
        assert!(!store.session_dir(&hash).exists());
        store.remove_session(&hash).await.unwrap();
    }

    #[tokio::test]
    async fn list_sessions_finds_hash_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let (store, hash) = store(dir.path());
        let other = ContentHash::parse("ffff").unwrap();
        store.write_chunk(&hash, 0, b"a").await.unwrap();
        store.write_chunk(&other, 0, b"b").await.unwrap();
        std::fs::write(dir.path().join("chunks").join("loose-file"), b"").unwrap();
        let sessions = store.list_sessions().await.unwrap();
        assert_eq!(sessions, vec![hash.clone(), other]);
        assert!(store.last_activity(&hash).await.unwrap().is_some());
    }
}
