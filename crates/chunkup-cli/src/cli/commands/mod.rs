//! CLI command handlers. Each command is in its own file.

mod checksum;
mod index;
mod query;
mod sessions;
mod submit;

pub use checksum::run_checksum;
pub use index::{run_index_import, run_index_list, run_index_remove};
pub use query::{run_query, QueryArgs};
pub use sessions::{run_gc, run_sessions, run_state};
pub use submit::{run_submit, SubmitArgs};

use anyhow::{Context, Result};
use chunkup_core::config::ChunkupConfig;
use chunkup_core::error::ErrorBody;
use chunkup_core::{ServiceSettings, UploadError, UploadService};
use serde::Serialize;
use std::path::Path;

/// Open the upload service over `root`, or the configured storage root.
pub async fn open_service(cfg: &ChunkupConfig, root: Option<&Path>) -> Result<UploadService> {
    let root = match root {
        Some(r) => r.to_path_buf(),
        None => cfg.resolve_storage_root()?,
    };
    tracing::debug!(root = %root.display(), "opening upload store");
    UploadService::open_at(&root, ServiceSettings::from(cfg))
        .await
        .with_context(|| format!("open upload store at {}", root.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print the client-facing error body, then fail with the full error chain.
fn report(err: UploadError) -> anyhow::Error {
    let body = ErrorBody::from(&err);
    if let Ok(json) = serde_json::to_string_pretty(&body) {
        println!("{json}");
    }
    tracing::warn!(status = err.status_code(), error = %err, "request failed");
    let status = err.status_code();
    anyhow::Error::new(err).context(format!("request failed with status {status}"))
}
