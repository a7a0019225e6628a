//! `chunkup checksum` – hash a file the way clients compute the content hash.

use anyhow::{Context, Result};
use chunkup_core::checksum::{self, HashAlgorithm};
use std::path::Path;

/// Compute and print the digest of the given file.
pub async fn run_checksum(path: &Path, algorithm: HashAlgorithm) -> Result<()> {
    let owned = path.to_path_buf();
    let digest = tokio::task::spawn_blocking(move || checksum::digest_path(&owned, algorithm))
        .await?
        .with_context(|| format!("read {}", path.display()))?;
    println!("{}  {}", digest, path.display());
    Ok(())
}
