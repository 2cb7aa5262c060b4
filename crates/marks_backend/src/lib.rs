//! # Marks Backend
//!
//! In-process reference implementation of the managed platform Marks runs
//! against.
//!
//! This crate provides:
//! - Simulated OAuth code exchange with HMAC-SHA256 session tokens
//! - A bookmark table enforcing a per-user row-level policy
//! - A commit-ordered change feed with filtered subscriptions and backfill
//! - A REST router in the PostgREST dialect
//! - OAuth callback and sign-out redirect routes
//! - `PlatformClient`, the per-session SDK implementing the `marks_sync`
//!   collaborator traits
//!
//! ## Key Invariants
//!
//! - A write is published to the change feed only after it commits
//! - Change events carry strictly increasing sequence numbers
//! - A session never sees, receives or deletes another user's rows
//! - Snapshots report the sequence their rows reflect

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod auth;
mod change_feed;
mod client;
mod config;
mod error;
mod platform;
mod router;
pub mod routes;
mod store;

pub use auth::{AuthService, Session};
pub use change_feed::ChangeFeed;
pub use client::{bookmark_view, to_view_error, PlatformClient, PlatformView};
pub use config::{AuthConfig, PlatformConfig, SigningKey};
pub use error::{PlatformError, PlatformResult};
pub use platform::Platform;
pub use router::RestRouter;
pub use routes::{Redirect, SessionCookie};
pub use store::BookmarkTable;
