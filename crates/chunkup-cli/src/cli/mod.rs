//! CLI for the chunkup upload store.

mod commands;

use anyhow::Result;
use chunkup_core::checksum::HashAlgorithm;
use chunkup_core::config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::{
    open_service, run_checksum, run_gc, run_index_import, run_index_list, run_index_remove,
    run_query, run_sessions, run_state, run_submit, QueryArgs, SubmitArgs,
};

/// Top-level CLI for the chunkup upload store.
#[derive(Debug, Parser)]
#[command(name = "chunkup")]
#[command(about = "chunkup: resumable, content-addressed chunked uploads", long_about = None)]
pub struct Cli {
    /// Storage root (overrides `storage_root` from the config file).
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Ask whether content is stored, or which chunks have arrived.
    Query {
        /// Client-claimed content hash.
        #[arg(long)]
        hash: String,
        /// Target filename.
        #[arg(long)]
        filename: String,
        /// Check a single chunk index instead of listing all.
        #[arg(long, value_name = "N")]
        chunk_index: Option<String>,
    },

    /// Submit one chunk read from a file.
    Submit {
        /// Client-claimed content hash.
        #[arg(long)]
        hash: String,
        /// Target filename.
        #[arg(long)]
        filename: String,
        /// Zero-based index of this chunk.
        #[arg(long, value_name = "N")]
        chunk_index: String,
        /// Total number of chunks in the upload.
        #[arg(long, value_name = "N")]
        chunks: String,
        /// File holding the chunk bytes.
        path: PathBuf,
    },

    /// Show the lifecycle state of one upload.
    State {
        /// Content hash.
        hash: String,
    },

    /// Scan storage: clean crash leftovers and list in-flight sessions.
    Sessions,

    /// Remove sessions with no chunk activity for a while.
    Gc {
        /// Idle threshold in seconds (default: `abandon_after_secs` from config).
        #[arg(long, value_name = "SECS")]
        max_age_secs: Option<u64>,
    },

    /// Compute the content hash of a file.
    Checksum {
        /// Path to the file.
        path: PathBuf,
        /// md5 or sha256 (default: `hash_algorithm` from config).
        #[arg(long)]
        algorithm: Option<HashAlgorithm>,
    },

    /// Inspect or edit the hash index.
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum IndexAction {
    /// List all stored hashes, newest first.
    List,
    /// Forget one hash (the stored file is kept).
    Remove {
        /// Content hash.
        hash: String,
    },
    /// Import a legacy `{"<hash>": "<filename>"}` JSON map.
    Import {
        /// Path to the JSON file.
        path: PathBuf,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        if let CliCommand::Checksum { path, algorithm } = &cli.command {
            return run_checksum(path, algorithm.unwrap_or(cfg.hash_algorithm)).await;
        }

        let svc = open_service(&cfg, cli.root.as_deref()).await?;
        let result = match cli.command {
            CliCommand::Query {
                hash,
                filename,
                chunk_index,
            } => {
                run_query(
                    &svc,
                    QueryArgs {
                        hash,
                        filename,
                        chunk_index,
                    },
                )
                .await
            }
            CliCommand::Submit {
                hash,
                filename,
                chunk_index,
                chunks,
                path,
            } => {
                run_submit(
                    &svc,
                    SubmitArgs {
                        hash,
                        filename,
                        chunk_index,
                        chunks,
                        path,
                    },
                )
                .await
            }
            CliCommand::State { hash } => run_state(&svc, &hash).await,
            CliCommand::Sessions => run_sessions(&svc).await,
            CliCommand::Gc { max_age_secs } => {
                run_gc(&svc, max_age_secs.unwrap_or(cfg.abandon_after_secs)).await
            }
            CliCommand::Index { action } => match action {
                IndexAction::List => run_index_list(&svc).await,
                IndexAction::Remove { hash } => run_index_remove(&svc, &hash).await,
                IndexAction::Import { path } => run_index_import(&svc, &path).await,
            },
            // Handled before the service is opened.
            CliCommand::Checksum { .. } => Ok(()),
        };
        svc.index().close().await;
        result
    }
}

#[cfg(test)]
mod tests;
