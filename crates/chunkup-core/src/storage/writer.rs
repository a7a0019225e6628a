//! Sequential writer for staging files.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Open staging file receiving assembled bytes in order.
pub struct StagingFile {
    file: File,
    path: PathBuf,
    written: u64,
}

impl StagingFile {
    /// Create the staging file at `path`, truncating any leftover from a previous attempt.
    pub async fn create(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .await?;
        Ok(StagingFile {
            file,
            path: path.to_path_buf(),
            written: 0,
        })
    }

    /// Append `data` at the current end of the file.
    pub async fn append(&mut self, data: &[u8]) -> io::Result<()> {
        self.file.write_all(data).await?;
        self.written += data.len() as u64;
        Ok(())
    }

    /// Stream the whole of `src` onto the end of the file. Returns bytes copied.
    pub async fn append_file(&mut self, src: &Path) -> io::Result<u64> {
        let mut reader = File::open(src).await?;
        let n = tokio::io::copy(&mut reader, &mut self.file).await?;
        self.written += n;
        Ok(n)
    }

    /// Flush and fsync, then close. The result is ready for verification.
    pub async fn finish(mut self) -> io::Result<StagedArtifact> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        drop(self.file);
        Ok(StagedArtifact {
            path: self.path,
            len: self.written,
        })
    }
}

/// A closed, fully written staging file awaiting promote or discard.
#[derive(Debug)]
pub struct StagedArtifact {
    path: PathBuf,
    len: u64,
}

impl StagedArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.len
    }

    /// Atomically rename into `final_path`, replacing any existing file there.
    /// Fails if `final_path` is on a different filesystem.
    pub async fn promote(self, final_path: &Path) -> io::Result<()> {
        tokio::fs::rename(&self.path, final_path).await
    }

    /// Delete the staging file. Already gone counts as success.
    pub async fn discard(self) -> io::Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
