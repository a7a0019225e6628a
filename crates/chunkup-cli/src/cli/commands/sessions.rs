//! `chunkup state`, `chunkup sessions`, `chunkup gc`.

use anyhow::Result;
use chunkup_core::hash::ContentHash;
use chunkup_core::UploadService;
use serde::Serialize;
use std::time::Duration;

use super::{print_json, report};

#[derive(Debug, Serialize)]
struct StateReport<'a> {
    hash: &'a str,
    #[serde(flatten)]
    state: chunkup_core::session::SessionState,
}

pub async fn run_state(svc: &UploadService, hash: &str) -> Result<()> {
    let parsed = ContentHash::parse(hash).map_err(report)?;
    let state = svc.session_state(&parsed).await.map_err(report)?;
    print_json(&StateReport {
        hash: parsed.as_str(),
        state,
    })
}

/// Recovery scan: sweep crash leftovers, then list what is still in flight.
pub async fn run_sessions(svc: &UploadService) -> Result<()> {
    let sessions = svc.recover().await.map_err(report)?;
    print_json(&sessions)
}

pub async fn run_gc(svc: &UploadService, max_age_secs: u64) -> Result<()> {
    let collected = svc
        .collect_abandoned(Duration::from_secs(max_age_secs))
        .await
        .map_err(report)?;
    tracing::info!(count = collected.len(), max_age_secs, "gc finished");
    print_json(&collected)
}
