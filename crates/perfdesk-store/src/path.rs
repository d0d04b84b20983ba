//! Store path handling.
//!
//! Paths are `/`-separated keys. Leading and trailing slashes are ignored
//! and the empty path addresses the root.

use crate::error::{Result, StoreError};

const FORBIDDEN: [char; 5] = ['.', '#', '$', '[', ']'];
const MAX_KEY_BYTES: usize = 768;

/// Split a path into validated segments.
pub fn segments(path: &str) -> Result<Vec<&str>> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|segment| {
            if segment.len() > MAX_KEY_BYTES {
                return Err(invalid(path, format!("key longer than {MAX_KEY_BYTES} bytes")));
            }
            if let Some(c) = segment.chars().find(|c| FORBIDDEN.contains(c) || c.is_control()) {
                return Err(invalid(path, format!("key {segment:?} contains {c:?}")));
            }
            Ok(segment)
        })
        .collect()
}

/// Whether two paths sit on the same branch (one contains the other).
pub fn overlaps(a: &[&str], b: &[&str]) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| x == y)
}

fn invalid(path: &str, reason: String) -> StoreError {
    StoreError::InvalidPath {
        path: path.to_string(),
        reason,
    }
}
