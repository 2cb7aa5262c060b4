//! # Marks Sync
//!
//! Live bookmark view for Marks clients.
//!
//! This crate provides:
//! - Session identity tracking (restore, auth-change listener, transitions)
//! - Subscription lifecycle (initial fetch, filtered change stream, teardown)
//! - Reconciliation of change events into the local view state
//! - Bookmark add/remove requests and the draft form
//! - Collaborator traits for the auth provider, store and change stream
//! - A REST-backed store adapter
//!
//! ## Architecture
//!
//! The view never mutates its list on its own. Writes go to the
//! authoritative store; the store commits them and publishes change
//! events; the view's subscription delivers those events back and
//! reconciliation applies them:
//!
//! 1. Restore the session, register the auth listener
//! 2. On sign-in, fetch the user's rows and subscribe from the snapshot
//! 3. Apply insert/delete events as they arrive
//! 4. On sign-out or unmount, close the subscription and clear the list
//!
//! ## Key Invariants
//!
//! - The list only holds rows owned by the signed-in user
//! - The list is sorted by `created_at` descending with unique ids
//! - At most one subscription is open
//! - Reconciliation is idempotent under duplicate and out-of-order delivery

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod local_view;
mod mutation;
mod rest;
mod session;
mod subscription;
mod transport;
mod view;

pub use config::ViewConfig;
pub use error::{ErrorClass, ViewError, ViewResult};
pub use local_view::{LocalView, Reconciliation};
pub use mutation::{Draft, MutationHandler};
pub use rest::{HttpClient, RestStore};
pub use session::{IdentityTransition, SessionManager, SessionState};
pub use subscription::{SubscriptionEvent, SubscriptionManager};
pub use transport::{
    AuthListener, AuthProvider, BookmarkStore, ChangeStream, ListenerId, MockOp, MockPlatform,
    SignInRedirect, Subscription, SubscriptionId,
};
pub use view::{BookmarkView, ViewStats, ViewUpdate};
