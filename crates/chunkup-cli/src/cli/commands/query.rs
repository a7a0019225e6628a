//! `chunkup query` – stored / uploaded chunks / single chunk check.

use anyhow::Result;
use chunkup_core::session::QueryParams;
use chunkup_core::UploadService;

use super::{print_json, report};

/// Raw query arguments as typed on the command line.
#[derive(Debug, Clone)]
pub struct QueryArgs {
    pub hash: String,
    pub filename: String,
    pub chunk_index: Option<String>,
}

impl QueryArgs {
    pub fn into_params(self) -> QueryParams {
        QueryParams {
            hash: Some(self.hash),
            filename: Some(self.filename),
            chunk_index: self.chunk_index,
        }
    }
}

pub async fn run_query(svc: &UploadService, args: QueryArgs) -> Result<()> {
    let req = args.into_params().parse().map_err(report)?;
    let resp = svc.query(&req).await.map_err(report)?;
    print_json(&resp)
}
