use thiserror::Error;

/// Top-level error type for the Perfdesk domain.
///
/// Store and data-layer crates define their own error types and wrap this
/// one, so `?` works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PerfdeskError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid timestamp: {input:?}")]
    InvalidTimestamp { input: String },
}

impl From<toml::de::Error> for PerfdeskError {
    fn from(err: toml::de::Error) -> Self {
        PerfdeskError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for PerfdeskError {
    fn from(err: toml::ser::Error) -> Self {
        PerfdeskError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for PerfdeskError {
    fn from(err: serde_json::Error) -> Self {
        PerfdeskError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Perfdesk domain operations.
pub type Result<T> = std::result::Result<T, PerfdeskError>;
