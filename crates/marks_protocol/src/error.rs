//! Error types for protocol parsing and validation.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while validating or decoding protocol values.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A required text field was empty.
    #[error("field `{0}` must not be empty")]
    EmptyField(&'static str),

    /// A filter expression could not be parsed.
    #[error("invalid filter `{0}`")]
    InvalidFilter(String),

    /// An ordering expression could not be parsed.
    #[error("invalid order `{0}`")]
    InvalidOrder(String),

    /// An identifier was not a valid UUID.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] uuid::Error),

    /// JSON encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(
            ProtocolError::EmptyField("title").to_string(),
            "field `title` must not be empty"
        );
        assert!(ProtocolError::InvalidFilter("owner".into())
            .to_string()
            .contains("owner"));
    }
}
