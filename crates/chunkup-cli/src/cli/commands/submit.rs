//! `chunkup submit` – store one chunk read from a file.

use anyhow::{Context, Result};
use chunkup_core::session::SubmitFields;
use chunkup_core::UploadService;
use std::path::PathBuf;

use super::{print_json, report};

/// Raw submit arguments; the chunk bytes come from `path`.
#[derive(Debug, Clone)]
pub struct SubmitArgs {
    pub hash: String,
    pub filename: String,
    pub chunk_index: String,
    pub chunks: String,
    pub path: PathBuf,
}

pub async fn run_submit(svc: &UploadService, args: SubmitArgs) -> Result<()> {
    let bytes = tokio::fs::read(&args.path)
        .await
        .with_context(|| format!("read chunk file {}", args.path.display()))?;
    let fields = SubmitFields {
        file: Some(bytes),
        hash: Some(args.hash),
        filename: Some(args.filename),
        chunk_index: Some(args.chunk_index),
        chunks: Some(args.chunks),
    };
    let req = fields.parse().map_err(report)?;
    let outcome = svc.submit_chunk(req).await.map_err(report)?;
    tracing::debug!(?outcome, "submit finished");
    print_json(&outcome.to_response())
}
