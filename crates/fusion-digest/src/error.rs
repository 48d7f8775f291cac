//! Digest error types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, DigestError>;

/// Digest errors
#[derive(Error, Debug)]
pub enum DigestError {
    /// Algorithm name not present in the registry
    #[error("unknown checksum algorithm: {0}")]
    UnknownAlgorithm(String),

    /// Reading the input source failed
    #[error("digest input error: {0}")]
    Io(#[from] std::io::Error),
}
