use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::checksum::HashAlgorithm;

/// Global configuration loaded from `~/.config/chunkup/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkupConfig {
    /// Root of the persisted layout (chunks, staging, complete, index).
    /// None = `~/.local/share/chunkup/files`.
    #[serde(default)]
    pub storage_root: Option<PathBuf>,
    /// Public address prefix for completed artifacts.
    #[serde(default = "default_public_prefix")]
    pub public_prefix: String,
    /// Digest the clients use to produce the content hash.
    #[serde(default)]
    pub hash_algorithm: HashAlgorithm,
    /// Upper bound on the declared chunk count of one upload.
    pub max_total_chunks: u32,
    /// Upper bound on the size of a single chunk in bytes.
    pub max_chunk_bytes: u64,
    /// Sessions idle for longer than this are garbage-collected by `gc`.
    pub abandon_after_secs: u64,
}

fn default_public_prefix() -> String {
    "/files/complete".to_string()
}

impl Default for ChunkupConfig {
    fn default() -> Self {
        Self {
            storage_root: None,
            public_prefix: default_public_prefix(),
            hash_algorithm: HashAlgorithm::default(),
            max_total_chunks: 10_000,
            max_chunk_bytes: 64 * 1024 * 1024,
            abandon_after_secs: 24 * 60 * 60,
        }
    }
}

impl ChunkupConfig {
    /// Storage root from config, or the XDG data dir default.
    pub fn resolve_storage_root(&self) -> Result<PathBuf> {
        if let Some(root) = &self.storage_root {
            return Ok(root.clone());
        }
        let xdg_dirs = xdg::BaseDirectories::with_prefix("chunkup")?;
        Ok(xdg_dirs.get_data_home().join("files"))
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("chunkup")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<ChunkupConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = ChunkupConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: ChunkupConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    Ok(cfg)
}
