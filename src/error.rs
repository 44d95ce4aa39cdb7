//! Error types for index building and query execution.

use thiserror::Error;

/// Errors raised while loading records or validating and running a query.
///
/// Every failure is local and deterministic: a query either completes with
/// its full result set or fails with one of these variants, never with a
/// partial result.
#[derive(Debug, Error)]
pub enum RoastIndexError {
    /// A field in the data source could not be parsed (for example a review
    /// date that is not in "Month Year" form).
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// An attribute name that is not part of the fixed attribute set, or a
    /// column the record store does not carry.
    #[error("Invalid attribute: {0}")]
    InvalidAttribute(String),

    /// The query request was rejected before any index was built.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "toml")]
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, RoastIndexError>;
