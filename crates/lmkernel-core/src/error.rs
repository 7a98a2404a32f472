//! Error types for `lmkernel` core library.

use thiserror::Error;

/// Result type alias using `lmkernel` Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for `lmkernel` operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
