//! Error types for the store capability.

use std::sync::LazyLock;

use regex::Regex;

/// Errors surfaced by a [`Store`](crate::Store) implementation.
///
/// `IndexNotDefined` is kept apart from every other failure so callers can
/// degrade to a client-side scan without inspecting error text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Index not defined, add \".indexOn\": \"{field}\", for path \"/{path}\", to the rules")]
    IndexNotDefined { path: String, field: String },
    #[error("Invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },
    #[error("Permission denied at {0}")]
    PermissionDenied(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Backend error: {0}")]
    Backend(String),
}

static INDEX_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"add "\.indexOn": "([^"]+)".*path "/?([^"]*)""#).expect("Invalid index hint regex")
});

impl StoreError {
    pub fn is_index_not_defined(&self) -> bool {
        matches!(self, StoreError::IndexNotDefined { .. })
    }

    /// Classify a raw error message from a remote backend.
    ///
    /// Adapters call this once at the wire boundary; nothing above the store
    /// looks at message text.
    pub fn from_backend_message(message: &str) -> Self {
        if message.contains("Index not defined") {
            if let Some(caps) = INDEX_HINT.captures(message) {
                return StoreError::IndexNotDefined {
                    field: caps[1].to_string(),
                    path: caps[2].to_string(),
                };
            }
        }
        let lower = message.to_ascii_lowercase();
        if lower.contains("permission_denied") || lower.contains("permission denied") {
            StoreError::PermissionDenied(message.to_string())
        } else if lower.contains("unavailable") || lower.contains("disconnected") {
            StoreError::Unavailable(message.to_string())
        } else {
            StoreError::Backend(message.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
