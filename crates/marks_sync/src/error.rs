//! Error types for the bookmark view.

use marks_protocol::{BookmarkId, ProtocolError};
use thiserror::Error;

/// Result type for view operations.
pub type ViewResult<T> = Result<T, ViewError>;

/// Broad category of a failure, as surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The request was never sent: the input or view state was not acceptable.
    Input,
    /// Sign-in, sign-out or session validation failed.
    Authentication,
    /// The store's per-user policy rejected the write.
    Authorization,
    /// Network, transport or server failure.
    Transport,
}

/// Errors that can occur while driving the bookmark view.
#[derive(Error, Debug)]
pub enum ViewError {
    /// The view is still restoring the session.
    #[error("session is still loading")]
    Loading,

    /// No identity is present.
    #[error("not signed in")]
    NotAuthenticated,

    /// The bookmark is not in the local view.
    #[error("bookmark {0} is not visible in this view")]
    NotVisible(BookmarkId),

    /// The input failed validation before any request was made.
    #[error("invalid input: {0}")]
    InvalidInput(ProtocolError),

    /// Authentication failed.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The store's row-level policy rejected the request.
    #[error("not authorized: {0}")]
    Authorization(String),

    /// The store rejected the request as malformed.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// Network or transport error.
    #[error("transport error: {0}")]
    Transport(String),

    /// The store failed while handling the request.
    #[error("server error: {0}")]
    Server(String),

    /// Encoding or decoding failed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl ViewError {
    /// Returns the category this error belongs to.
    pub fn class(&self) -> ErrorClass {
        match self {
            ViewError::Loading
            | ViewError::NotAuthenticated
            | ViewError::NotVisible(_)
            | ViewError::InvalidInput(_) => ErrorClass::Input,
            ViewError::Authentication(_) => ErrorClass::Authentication,
            ViewError::Authorization(_) | ViewError::Rejected(_) => ErrorClass::Authorization,
            ViewError::Transport(_) | ViewError::Server(_) | ViewError::Protocol(_) => {
                ErrorClass::Transport
            }
        }
    }

    /// Returns true if the request reached the store.
    pub fn was_sent(&self) -> bool {
        self.class() != ErrorClass::Input
    }
}
