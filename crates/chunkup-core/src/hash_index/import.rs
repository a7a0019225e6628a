//! One-shot import of a legacy whole-file JSON mapping (`{"<hash>": "<filename>"}`).

use std::collections::BTreeMap;
use std::path::Path;

use super::db::HashIndex;
use crate::error::{IoContext, UploadError, UploadResult};
use crate::hash::{ContentHash, StoredFilename};

impl HashIndex {
    /// Import every valid entry of a legacy JSON map. Invalid hashes or
    /// filenames are skipped with a warning. A missing file imports nothing.
    /// Returns the number of entries written.
    pub async fn import_json(&self, path: &Path) -> UploadResult<usize> {
        let data = match tokio::fs::read(path).await {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e).storage_context(|| format!("read {}", path.display())),
        };
        let map: BTreeMap<String, String> = serde_json::from_slice(&data).map_err(|e| {
            UploadError::parameter(format!("legacy index {} is not a JSON object of strings: {e}", path.display()))
        })?;

        let mut imported = 0;
        for (raw_hash, raw_name) in map {
            let (hash, name) = match (ContentHash::parse(&raw_hash), StoredFilename::parse(&raw_name)) {
                (Ok(h), Ok(n)) => (h, n),
                _ => {
                    tracing::warn!(hash = %raw_hash, filename = %raw_name, "skipping invalid legacy index entry");
                    continue;
                }
            };
            self.record(&hash, name.as_str()).await?;
            imported += 1;
        }
        tracing::info!(path = %path.display(), imported, "legacy hash index imported");
        Ok(imported)
    }
}
