//! Typed errors for the upload core.
//!
//! Every failure is reported to the caller as one of these variants; nothing
//! is retried internally. The external layer maps them to responses with
//! [`UploadError::status_code`] and [`ErrorBody`].

use serde::Serialize;
use std::io;

/// Result alias used across the core.
pub type UploadResult<T> = std::result::Result<T, UploadError>;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// Missing or malformed input. No side effects happened.
    #[error("invalid parameter: {0}")]
    Parameter(String),

    /// The assembled artifact does not hash to the claimed value.
    /// The staged artifact is gone; the session's chunks are kept.
    #[error("file hash mismatch, upload failed (claimed {claimed}, got {actual})")]
    Integrity { claimed: String, actual: String },

    /// Filesystem operation failed (disk full, permissions, ...).
    #[error("storage: {context}")]
    Storage {
        context: String,
        #[source]
        source: io::Error,
    },

    /// Assembly needed a chunk that is not on disk.
    #[error("chunk {index} missing during assembly")]
    MissingChunk { index: u32 },

    /// Hash index database failure on a write path.
    #[error("hash index: {0}")]
    Index(#[from] sqlx::Error),
}

impl UploadError {
    pub fn parameter(msg: impl Into<String>) -> Self {
        UploadError::Parameter(msg.into())
    }

    pub fn storage(context: impl Into<String>, source: io::Error) -> Self {
        UploadError::Storage {
            context: context.into(),
            source,
        }
    }

    /// HTTP-equivalent status for the external layer: client errors are 400,
    /// everything server-side is 500.
    pub fn status_code(&self) -> u16 {
        match self {
            UploadError::Parameter(_) | UploadError::Integrity { .. } => 400,
            UploadError::Storage { .. } | UploadError::MissingChunk { .. } | UploadError::Index(_) => {
                500
            }
        }
    }
}

/// JSON error body: `{"error": "..."}`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl From<&UploadError> for ErrorBody {
    fn from(e: &UploadError) -> Self {
        let error = match e {
            UploadError::Parameter(_) => "Missing required parameters".to_string(),
            UploadError::Integrity { .. } => "File hash mismatch, upload failed".to_string(),
            UploadError::Storage { .. } | UploadError::MissingChunk { .. } | UploadError::Index(_) => {
                "Server error".to_string()
            }
        };
        ErrorBody { error }
    }
}

/// Extension for attaching a context string to `io::Result`, in the spirit of
/// `anyhow::Context` but producing [`UploadError::Storage`].
pub(crate) trait IoContext<T> {
    fn storage_context<F, S>(self, f: F) -> UploadResult<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn storage_context<F, S>(self, f: F) -> UploadResult<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| UploadError::storage(f(), e))
    }
}
