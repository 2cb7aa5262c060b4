//! Bookmark mutations.
//!
//! Neither operation touches the local view. The list changes only when the
//! store's change event comes back through the subscription.

use crate::error::{ViewError, ViewResult};
use crate::local_view::LocalView;
use crate::transport::BookmarkStore;
use marks_protocol::{Bookmark, BookmarkId, NewBookmark, UserId};
use std::sync::Arc;
use tracing::{debug, warn};

/// The add form's input fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    /// Title field.
    pub title: String,
    /// URL field.
    pub url: String,
}

impl Draft {
    /// Creates a draft.
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }

    /// Empties both fields.
    pub fn clear(&mut self) {
        self.title.clear();
        self.url.clear();
    }

    /// Returns true if both fields are empty.
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.url.is_empty()
    }
}

/// Sends insert and delete requests to the store.
pub struct MutationHandler<S: BookmarkStore> {
    store: Arc<S>,
    table: String,
}

impl<S: BookmarkStore> MutationHandler<S> {
    /// Creates a handler for `table`.
    pub fn new(store: Arc<S>, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
        }
    }

    /// Inserts a bookmark owned by `owner`.
    ///
    /// An empty title or url fails with [`ViewError::InvalidInput`] before
    /// anything is sent.
    pub async fn add(&self, owner: UserId, title: &str, url: &str) -> ViewResult<Bookmark> {
        let record = NewBookmark::new(title, url, owner);
        record.validate().map_err(ViewError::InvalidInput)?;
        if !record.looks_like_url() {
            debug!(url, "url does not look like an http link");
        }

        match self.store.insert(&self.table, &record).await {
            Ok(stored) => {
                debug!(id = %stored.id, "insert accepted");
                Ok(stored)
            }
            Err(e) => {
                warn!("insert failed: {e}");
                Err(e)
            }
        }
    }

    /// Deletes a bookmark visible in `view`.
    pub async fn remove(&self, view: &LocalView, id: BookmarkId) -> ViewResult<()> {
        if !view.contains(id) {
            return Err(ViewError::NotVisible(id));
        }
        match self.store.delete(&self.table, id).await {
            Ok(()) => {
                debug!(%id, "delete accepted");
                Ok(())
            }
            Err(e) => {
                warn!(%id, "delete failed: {e}");
                Err(e)
            }
        }
    }
}
