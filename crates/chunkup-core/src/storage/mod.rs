//! Staging file lifecycle.
//!
//! Assembly writes into a `.part` file outside the complete store, syncs it,
//! and only a verified artifact is atomically renamed into place. A failed
//! attempt discards the staging file.

mod writer;

pub use writer::{StagedArtifact, StagingFile};

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path (e.g. `abc123` → `abc123.part`).
pub fn temp_path(final_path: &std::path::Path) -> std::path::PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    std::path::PathBuf::from(o)
}

/// True if `name` looks like a staging file produced by [`temp_path`].
pub fn is_temp_name(name: &str) -> bool {
    name.ends_with(TEMP_SUFFIX)
}
