//! Integrity verifier: recompute the content hash of a staged artifact.
//!
//! A mismatching artifact is deleted on the spot; a matching one is handed
//! back for promotion. Chunks are never touched here.

use std::io;

use crate::checksum::{self, HashAlgorithm};
use crate::error::{UploadError, UploadResult};
use crate::hash::ContentHash;
use crate::storage::StagedArtifact;

/// Outcome of [`verify`].
#[derive(Debug)]
pub enum Verification {
    /// Digest matches the claim; the artifact is ready to promote.
    Verified(StagedArtifact),
    /// Digest differs; the staged file has already been removed.
    Mismatch { actual: String },
}

impl Verification {
    #[cfg(test)]
    pub fn is_verified(&self) -> bool {
        matches!(self, Verification::Verified(_))
    }
}

/// Hash `staged` with `algorithm` and compare against `claimed`.
pub async fn verify(
    staged: StagedArtifact,
    claimed: &ContentHash,
    algorithm: HashAlgorithm,
) -> UploadResult<Verification> {
    let path = staged.path().to_path_buf();
    verify_with(staged, claimed, algorithm, move || {
        checksum::digest_path(&path, algorithm)
    })
    .await
}

/// [`verify`] with the blocking digest job supplied by the caller.
async fn verify_with<F>(
    staged: StagedArtifact,
    claimed: &ContentHash,
    algorithm: HashAlgorithm,
    job: F,
) -> UploadResult<Verification>
where
    F: FnOnce() -> io::Result<String> + Send + 'static,
{
    let path = staged.path().to_path_buf();
    // Join failure counts as a digest failure.
    let digest = match tokio::task::spawn_blocking(job).await {
        Ok(result) => result,
        Err(e) => Err(io::Error::other(format!("digest task failed: {e}"))),
    };

    let actual = match digest {
        Ok(d) => d,
        Err(e) => {
            let _ = staged.discard().await;
            return Err(UploadError::storage(format!("digest {}", path.display()), e));
        }
    };

    if claimed.matches_digest(&actual) {
        tracing::debug!(hash = %claimed, %algorithm, "artifact verified");
        return Ok(Verification::Verified(staged));
    }

    tracing::warn!(claimed = %claimed, %actual, %algorithm, "hash mismatch; discarding assembled artifact");
    staged
        .discard()
        .await
        .map_err(|e| UploadError::storage(format!("discard {}", path.display()), e))?;
    Ok(Verification::Mismatch { actual })
}
