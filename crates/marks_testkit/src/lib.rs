//! # Marks Testkit
//!
//! Test utilities for Marks.
//!
//! This crate provides:
//! - Fixtures wiring bookmark views to an in-process platform
//! - Property-based generators for bookmarks and causal change-event scripts
//!
//! ## Usage
//!
//! ```rust,ignore
//! use marks_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn test_with_sessions() {
//!     let platform = TestPlatform::new();
//!     let mut alice = platform.signed_in("alice").await;
//!     alice.view.add("Example", "https://example.com").await.unwrap();
//!     alice.settle().await;
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
