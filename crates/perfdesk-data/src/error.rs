//! Error types for the data-access layer.

use perfdesk_core::error::PerfdeskError;
use perfdesk_store::StoreError;
use tracing::error;

/// Errors from primary data operations.
///
/// Index errors never show up here: the resolver absorbs them. Failures
/// while emitting notifications never show up here either; they are
/// reported through [`DispatchReport`](crate::dispatcher::DispatchReport).
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Domain(#[from] PerfdeskError),
    #[error("Malformed {collection} record {key}: {source}")]
    Decode {
        collection: String,
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::Domain(PerfdeskError::from(err))
    }
}

pub type Result<T> = std::result::Result<T, DataError>;

/// Log a failed primary operation with its context and hand the error back
/// unchanged.
pub(crate) trait LogFailure<T> {
    fn log_failure(self, operation: impl FnOnce() -> String) -> Result<T>;
}

impl<T, E: Into<DataError>> LogFailure<T> for std::result::Result<T, E> {
    fn log_failure(self, operation: impl FnOnce() -> String) -> Result<T> {
        self.map_err(|e| {
            let e = e.into();
            error!(operation = %operation(), error = %e, "Database operation failed");
            e
        })
    }
}
