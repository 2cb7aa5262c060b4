//! Session identity types.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identifier of an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Generates a fresh random user id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the raw 16 bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// Rebuilds a user id from raw bytes.
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for UserId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> ProtocolResult<Self> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// The authenticated principal behind a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Platform user id.
    pub user_id: UserId,
    /// Email reported by the OAuth provider, if any.
    pub email: Option<String>,
    /// OAuth provider the user signed in with.
    pub provider: String,
}

impl Identity {
    /// Creates an identity.
    pub fn new(user_id: UserId, provider: impl Into<String>) -> Self {
        Self {
            user_id,
            email: None,
            provider: provider.into(),
        }
    }

    /// Sets the email.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Returns true if both identities name the same user.
    pub fn same_user(&self, other: &Identity) -> bool {
        self.user_id == other.user_id
    }
}

/// Why the auth provider notified its listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthChangeKind {
    /// Delivered once on registration with the session at that moment.
    InitialSession,
    /// A user completed sign-in.
    SignedIn,
    /// The session ended.
    SignedOut,
    /// The session token was rotated for the same user.
    TokenRefreshed,
}

/// Notification delivered to auth listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthChange {
    /// What happened.
    pub kind: AuthChangeKind,
    /// The identity after the change, or `None` when signed out.
    pub identity: Option<Identity>,
}

impl AuthChange {
    /// Creates a notification.
    pub fn new(kind: AuthChangeKind, identity: Option<Identity>) -> Self {
        Self { kind, identity }
    }

    /// Creates a sign-out notification.
    pub fn signed_out() -> Self {
        Self::new(AuthChangeKind::SignedOut, None)
    }
}
