//! Client error types

use fusion_digest::VerifyError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Client errors
#[derive(Error, Debug)]
pub enum Error {
    /// Bad local input, raised before any network call
    #[error("validation error: {0}")]
    Validation(String),

    /// Non-success response from any service endpoint
    #[error("API error (status {status}): {body}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body, verbatim
        body: String,
    },

    /// Checksum mismatch detected while consuming a stream
    #[error("corrupted stream, checksum verification failed (expected {expected}, got {actual})")]
    Corruption {
        /// Digest the remote advertised
        expected: String,
        /// Digest actually accumulated
        actual: String,
    },

    /// A specific part of a multi-part transfer failed
    #[error("part {number} failed: {source}")]
    Part {
        /// 1-based part number
        number: u32,
        /// The causal error
        #[source]
        source: Box<Error>,
    },

    /// A transfer was aborted; wraps the cause so callers can distinguish
    /// why without inspecting task plumbing
    #[error("{operation} failed: {source}")]
    Transfer {
        /// Which operation aborted
        operation: &'static str,
        /// The first fatal error observed
        #[source]
        source: Box<Error>,
    },

    /// A success response whose shape violates the wire protocol
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Local IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Digest computation or algorithm selection error
    #[error(transparent)]
    Digest(#[from] fusion_digest::DigestError),

    /// A transfer worker task was cancelled or panicked
    #[error("transfer task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl Error {
    /// Build an API error from a non-success response, consuming its body
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Self::Api { status, body }
    }

    /// Wrap a failure in transfer-orchestration context, preserving the
    /// original cause
    pub(crate) fn transfer(operation: &'static str, source: Error) -> Self {
        Self::Transfer {
            operation,
            source: Box::new(source),
        }
    }

    /// Walk `Part`/`Transfer` wrappers down to the causal error
    pub fn root_cause(&self) -> &Error {
        match self {
            Self::Part { source, .. } | Self::Transfer { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Whether the root cause is a checksum mismatch
    pub fn is_corruption(&self) -> bool {
        matches!(self.root_cause(), Self::Corruption { .. })
    }

    /// Whether the root cause is a non-success API response
    pub fn is_api_error(&self) -> bool {
        matches!(self.root_cause(), Self::Api { .. })
    }
}

impl From<VerifyError<Error>> for Error {
    fn from(err: VerifyError<Error>) -> Self {
        match err {
            VerifyError::Corrupted { expected, actual } => Self::Corruption { expected, actual },
            VerifyError::Source(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_cause_unwraps_nested_wrappers() {
        let err = Error::transfer(
            "download",
            Error::Part {
                number: 3,
                source: Box::new(Error::Corruption {
                    expected: "a".into(),
                    actual: "b".into(),
                }),
            },
        );
        assert!(err.is_corruption());
        assert!(matches!(err.root_cause(), Error::Corruption { .. }));
    }

    #[test]
    fn corruption_message_is_distinct() {
        let err = Error::Corruption {
            expected: "w6uP".into(),
            actual: "dodgy".into(),
        };
        assert!(err
            .to_string()
            .starts_with("corrupted stream, checksum verification failed"));
    }

    #[test]
    fn verify_error_maps_source_through() {
        let source = VerifyError::Source(Error::Validation("bad".into()));
        assert!(matches!(Error::from(source), Error::Validation(_)));
    }
}
