//! `chunkup index list|remove|import` – hash index maintenance.

use anyhow::{bail, Result};
use chunkup_core::hash::ContentHash;
use chunkup_core::UploadService;
use std::path::Path;

use super::{print_json, report};

pub async fn run_index_list(svc: &UploadService) -> Result<()> {
    let entries = svc.index().list().await.map_err(report)?;
    if entries.is_empty() {
        println!("No stored uploads in index.");
        return Ok(());
    }
    println!("{:<34} {:<12} {}", "HASH", "RECORDED", "FILENAME");
    for e in entries {
        println!("{:<34} {:<12} {}", e.hash, e.recorded_at, e.filename);
    }
    Ok(())
}

/// Forget `hash`; the next upload of that content is stored again.
pub async fn run_index_remove(svc: &UploadService, hash: &str) -> Result<()> {
    let parsed = ContentHash::parse(hash).map_err(report)?;
    if !svc.index().remove(&parsed).await.map_err(report)? {
        bail!("hash {} not in index", parsed);
    }
    println!("Removed {} from index.", parsed);
    Ok(())
}

pub async fn run_index_import(svc: &UploadService, path: &Path) -> Result<()> {
    let imported = svc.index().import_json(path).await.map_err(report)?;
    print_json(&serde_json::json!({ "imported": imported }))
}
