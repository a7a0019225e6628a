//! Request and response shapes of the query/submit contract.
//!
//! `*Params` / `SubmitFields` carry raw client input exactly as the external
//! layer received it (query string or multipart fields). Parsing turns them
//! into typed requests or a `Parameter` error with no side effects.

use serde::{Deserialize, Serialize};

use crate::error::{UploadError, UploadResult};
use crate::hash::{ContentHash, StoredFilename};

fn required<'a>(v: &'a Option<String>, name: &str) -> UploadResult<&'a str> {
    match v.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(UploadError::parameter(format!("{name} is required"))),
    }
}

fn parse_u32(s: &str, name: &str) -> UploadResult<u32> {
    s.trim()
        .parse()
        .map_err(|_| UploadError::parameter(format!("{name} must be a non-negative integer, got {s:?}")))
}

/// Raw query parameters: `hash`, `filename`, optional `chunkIndex`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParams {
    pub hash: Option<String>,
    pub filename: Option<String>,
    pub chunk_index: Option<String>,
}

impl QueryParams {
    pub fn parse(&self) -> UploadResult<QueryRequest> {
        let hash = ContentHash::parse(required(&self.hash, "hash")?)?;
        let filename = StoredFilename::parse(required(&self.filename, "filename")?)?;
        let chunk_index = match self.chunk_index.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(s) => Some(parse_u32(s, "chunkIndex")?),
        };
        Ok(QueryRequest {
            hash,
            filename,
            chunk_index,
        })
    }
}

/// Typed status query.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub hash: ContentHash,
    pub filename: StoredFilename,
    pub chunk_index: Option<u32>,
}

/// Raw submit fields: `file` payload plus `hash`, `filename`, `chunkIndex`, `chunks`.
#[derive(Debug, Clone, Default)]
pub struct SubmitFields {
    pub file: Option<Vec<u8>>,
    pub hash: Option<String>,
    pub filename: Option<String>,
    pub chunk_index: Option<String>,
    pub chunks: Option<String>,
}

impl SubmitFields {
    pub fn parse(self) -> UploadResult<SubmitRequest> {
        let hash = ContentHash::parse(required(&self.hash, "hash")?)?;
        let filename = StoredFilename::parse(required(&self.filename, "filename")?)?;
        let index = parse_u32(required(&self.chunk_index, "chunkIndex")?, "chunkIndex")?;
        let total = parse_u32(required(&self.chunks, "chunks")?, "chunks")?;
        let bytes = self
            .file
            .ok_or_else(|| UploadError::parameter("file is required"))?;
        Ok(SubmitRequest {
            hash,
            filename,
            index,
            total,
            bytes,
        })
    }
}

/// Typed chunk submission.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub hash: ContentHash,
    pub filename: StoredFilename,
    pub index: u32,
    pub total: u32,
    pub bytes: Vec<u8>,
}

/// Query answer. Serializes to the three JSON shapes of the contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum QueryResponse {
    /// `{"exists": true, "url": ...}`: content already stored, skip the upload.
    Stored { exists: bool, url: String },
    /// `{"exists": false, "uploadedChunks": [...]}`
    Pending {
        exists: bool,
        #[serde(rename = "uploadedChunks")]
        uploaded_chunks: Vec<u32>,
    },
    /// `{"exists": bool}` for one queried index.
    Chunk { exists: bool },
}

impl QueryResponse {
    pub fn stored(url: String) -> Self {
        QueryResponse::Stored { exists: true, url }
    }

    pub fn pending(uploaded_chunks: Vec<u32>) -> Self {
        QueryResponse::Pending {
            exists: false,
            uploaded_chunks,
        }
    }

    pub fn chunk(exists: bool) -> Self {
        QueryResponse::Chunk { exists }
    }
}

/// What a successful submit achieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Chunk stored; `received` of `total` indices are present.
    Partial { received: u32, total: u32 },
    /// Artifact committed (now, or earlier by a peer / previous upload).
    Complete { url: String, deduplicated: bool },
}

impl SubmitOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, SubmitOutcome::Complete { .. })
    }

    pub fn to_response(&self) -> SubmitResponse {
        match self {
            SubmitOutcome::Partial { received, total } => SubmitResponse {
                success: true,
                url: None,
                message: format!("{received}/{total} uploaded"),
            },
            SubmitOutcome::Complete { url, .. } => SubmitResponse {
                success: true,
                url: Some(url.clone()),
                message: "uploaded successfully".to_string(),
            },
        }
    }
}

/// Submit answer: `{"success": true, "url"?: ..., "message": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub message: String,
}
