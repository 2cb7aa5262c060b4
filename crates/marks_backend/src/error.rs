//! Error types for the reference platform.

use marks_protocol::{ProtocolError, RestResponse};
use thiserror::Error;

/// Result type for platform operations.
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Errors that can occur in the reference platform.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// Invalid request format.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Missing, invalid, expired or revoked credentials.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The row-level policy rejected the request.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// Unknown route or table.
    #[error("not found: {0}")]
    NotFound(String),

    /// Internal platform error.
    #[error("internal error: {0}")]
    Internal(String),

    /// Malformed protocol data.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl PlatformError {
    /// Returns the HTTP status for this error.
    pub fn status(&self) -> u16 {
        match self {
            PlatformError::InvalidRequest(_) | PlatformError::Protocol(_) => 400,
            PlatformError::AuthenticationFailed(_) => 401,
            PlatformError::NotAuthorized(_) => 403,
            PlatformError::NotFound(_) => 404,
            PlatformError::Internal(_) => 500,
        }
    }

    /// Returns a short machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            PlatformError::InvalidRequest(_) | PlatformError::Protocol(_) => "bad_request",
            PlatformError::AuthenticationFailed(_) => "unauthorized",
            PlatformError::NotAuthorized(_) => "forbidden",
            PlatformError::NotFound(_) => "not_found",
            PlatformError::Internal(_) => "internal",
        }
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status())
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status() >= 500
    }

    /// Renders the error as a REST response.
    pub fn to_response(&self) -> RestResponse {
        RestResponse::error(self.status(), self.code(), self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        assert!(PlatformError::InvalidRequest("bad".into()).is_client_error());
        assert!(PlatformError::Internal("oops".into()).is_server_error());
        assert!(!PlatformError::InvalidRequest("bad".into()).is_server_error());
        assert_eq!(PlatformError::NotAuthorized("policy".into()).status(), 403);
        assert_eq!(
            PlatformError::Protocol(ProtocolError::EmptyField("title")).status(),
            400
        );
    }

    #[test]
    fn error_response() {
        let response = PlatformError::AuthenticationFailed("token expired".into()).to_response();
        assert_eq!(response.status, 401);
        let body = response.error_body();
        assert_eq!(body.code, "unauthorized");
        assert!(body.message.contains("token expired"));
    }
}
