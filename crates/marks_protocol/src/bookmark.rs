//! Bookmark records.

use crate::error::{ProtocolError, ProtocolResult};
use crate::identity::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Identifier of a bookmark, assigned by the store at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookmarkId(Uuid);

impl BookmarkId {
    /// Generates a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for BookmarkId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BookmarkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for BookmarkId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Creates a timestamp from raw milliseconds.
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Returns the current wall-clock time.
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self(millis)
    }

    /// Returns the raw milliseconds.
    pub const fn as_millis(&self) -> u64 {
        self.0
    }
}

/// A saved link.
///
/// Bookmarks are immutable once created: the store assigns `id`,
/// `created_at` and stamps `owner`, after which the record is only ever
/// inserted or removed wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    /// Store-assigned identifier.
    pub id: BookmarkId,
    /// Target URL.
    pub url: String,
    /// Display title.
    pub title: String,
    /// Insertion time; the sole sort key.
    pub created_at: Timestamp,
    /// User who created the bookmark.
    pub owner: UserId,
}

impl Bookmark {
    /// Sort key placing newer bookmarks first.
    ///
    /// Ties on `created_at` fall back to the id so that ordering is total.
    pub fn newest_first_key(&self) -> (std::cmp::Reverse<Timestamp>, BookmarkId) {
        (std::cmp::Reverse(self.created_at), self.id)
    }
}

/// Insert payload for a bookmark that has not reached the store yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBookmark {
    /// Display title.
    pub title: String,
    /// Target URL.
    pub url: String,
    /// Claimed owner; the store rejects the insert unless it matches the caller.
    pub owner: UserId,
}

impl NewBookmark {
    /// Creates an insert payload.
    pub fn new(title: impl Into<String>, url: impl Into<String>, owner: UserId) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            owner,
        }
    }

    /// Checks that title and url carry more than whitespace.
    pub fn validate(&self) -> ProtocolResult<()> {
        if self.title.trim().is_empty() {
            return Err(ProtocolError::EmptyField("title"));
        }
        if self.url.trim().is_empty() {
            return Err(ProtocolError::EmptyField("url"));
        }
        Ok(())
    }

    /// Returns true if the url looks like an absolute http(s) link.
    ///
    /// This is only a hint for the caller; the store accepts any non-empty url.
    pub fn looks_like_url(&self) -> bool {
        let url = self.url.trim();
        url.starts_with("https://") || url.starts_with("http://")
    }
}
