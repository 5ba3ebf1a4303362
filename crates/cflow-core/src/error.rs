//! Centralized error types for ContextFlow.

use thiserror::Error;

/// Main error type for collection and normalization.
#[derive(Error, Debug)]
pub enum CflowError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Client error ({status}): {message}")]
    Client { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected response shape: {0}")]
    Decode(String),

    #[error("Gave up after {attempts} attempts: {last}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        last: Box<CflowError>,
    },

    #[error("Graph store error: {0}")]
    Graph(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for ContextFlow operations.
pub type CflowResult<T> = Result<T, CflowError>;

impl CflowError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a graph store error from any displayable failure.
    pub fn graph(err: impl std::fmt::Display) -> Self {
        Self::Graph(err.to_string())
    }

    /// True for failures confined to a single entity record.
    ///
    /// Batches skip such records and keep going.
    pub fn is_entity_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Parse(_))
    }

    /// True when the remote reported the resource as absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_errors() {
        assert!(CflowError::validation("bad state").is_entity_error());
        assert!(CflowError::parse("bad date").is_entity_error());
        assert!(!CflowError::NotFound("repo".into()).is_entity_error());
        assert!(!CflowError::Server { status: 502, message: "bad gateway".into() }.is_entity_error());
    }

    #[test]
    fn test_retry_exhausted_keeps_source() {
        use std::error::Error as _;

        let err = CflowError::RetryExhausted {
            attempts: 3,
            last: Box::new(CflowError::Server { status: 503, message: "unavailable".into() }),
        };
        assert_eq!(
            err.to_string(),
            "Gave up after 3 attempts: Server error (503): unavailable"
        );
        assert!(err.source().is_some());
    }
}
