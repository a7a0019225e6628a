//! Explicit per-hash session state.

use serde::Serialize;

/// Where one content hash stands in the upload lifecycle.
///
/// ```text
/// Empty -> Accumulating -> Assembling -> Committed
///                 ^             |
///                 +-- mismatch -+
/// any -> Abandoned (garbage collection)
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum SessionState {
    /// No chunks and no index entry.
    Empty,
    /// Chunks are on disk; `received` lists their indices.
    Accumulating { received: Vec<u32> },
    /// A task holds the session lock and is assembling/verifying.
    Assembling,
    /// Indexed; a verified artifact exists under `filename`.
    Committed { filename: String },
    /// Session was garbage-collected before completing.
    Abandoned,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_state_tag() {
        let s = SessionState::Accumulating { received: vec![0, 1] };
        assert_eq!(
            serde_json::to_string(&s).unwrap(),
            r#"{"state":"accumulating","received":[0,1]}"#
        );
        assert_eq!(
            serde_json::to_string(&SessionState::Empty).unwrap(),
            r#"{"state":"empty"}"#
        );
    }
}
