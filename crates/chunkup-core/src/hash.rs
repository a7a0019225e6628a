//! Identifier types: content hashes and stored filenames.
//!
//! Both end up as path components under the storage root, so both are
//! validated (hash) or sanitized (filename) before they touch the filesystem.

use crate::error::{UploadError, UploadResult};
use std::fmt;

/// Longest accepted content hash. SHA-512 hex is 128 characters.
pub const MAX_HASH_LEN: usize = 128;

/// Digest string identifying file content. Doubles as the session key and
/// the chunk directory name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(String);

impl ContentHash {
    /// Parse a client-supplied hash. Accepts 1..=128 characters of ASCII
    /// alphanumerics, `-` and `_`; anything else could escape the chunk root.
    pub fn parse(s: &str) -> UploadResult<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(UploadError::parameter("hash is required"));
        }
        if s.len() > MAX_HASH_LEN {
            return Err(UploadError::parameter(format!(
                "hash longer than {MAX_HASH_LEN} characters"
            )));
        }
        if !s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(UploadError::parameter(format!(
                "hash contains unsupported characters: {s}"
            )));
        }
        Ok(ContentHash(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compare with a recomputed hex digest. Hex digests are case-insensitive.
    pub fn matches_digest(&self, digest: &str) -> bool {
        self.0.eq_ignore_ascii_case(digest)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Target filename for a completed artifact: always a single Linux-safe path
/// component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoredFilename(String);

impl StoredFilename {
    /// Sanitize a client-supplied filename. Fails if nothing usable is left.
    pub fn parse(name: &str) -> UploadResult<Self> {
        let clean = sanitize_filename(name);
        if clean.is_empty() {
            return Err(UploadError::parameter("filename is required"));
        }
        Ok(StoredFilename(clean))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoredFilename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sanitizes a candidate filename for safe use on Linux.
///
/// - Replaces NUL, `/`, `\`, whitespace and control characters with `_`
/// - Collapses consecutive underscores
/// - Trims leading/trailing spaces, dots and underscores
/// - Limits length to 255 bytes (Linux NAME_MAX)
pub fn sanitize_filename(name: &str) -> String {
    const NAME_MAX: usize = 255;

    let mut out = String::with_capacity(name.len());
    let mut prev_underscore = false;

    for c in name.chars() {
        let replacement = if c == '\0' || c == '/' || c == '\\' || c.is_control() || c.is_whitespace()
        {
            '_'
        } else {
            c
        };

        if replacement == '_' {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
        } else {
            out.push(replacement);
            prev_underscore = false;
        }
    }

    let trimmed = out.trim_matches(|c| c == ' ' || c == '.' || c == '_');

    if trimmed.len() > NAME_MAX {
        let mut take = NAME_MAX;
        while take > 0 && !trimmed.is_char_boundary(take) {
            take -= 1;
        }
        trimmed[..take].to_string()
    } else {
        trimmed.to_string()
    }
}
