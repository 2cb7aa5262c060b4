//! # Marks Protocol
//!
//! Data types shared between Marks clients and the bookmark platform.
//!
//! This crate provides:
//! - `Bookmark` records and the `NewBookmark` insert payload
//! - Session identity and auth-change notifications
//! - `ChangeEvent` for the realtime change feed
//! - Row filters and ordering for store queries
//! - REST request/response envelopes with JSON bodies
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod bookmark;
mod change;
mod error;
mod filter;
mod identity;
mod rest;

pub use bookmark::{Bookmark, BookmarkId, NewBookmark, Timestamp};
pub use change::{ChangeEvent, ChangeKind, Snapshot};
pub use error::{ProtocolError, ProtocolResult};
pub use filter::{Column, Filter, Order};
pub use identity::{AuthChange, AuthChangeKind, Identity, UserId};
pub use rest::{ErrorBody, Method, RestRequest, RestResponse};

/// Name of the table bookmarks live in.
pub const BOOKMARKS_TABLE: &str = "bookmarks";
