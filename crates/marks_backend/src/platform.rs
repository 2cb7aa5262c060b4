//! The assembled reference platform.

use crate::auth::AuthService;
use crate::change_feed::ChangeFeed;
use crate::config::PlatformConfig;
use crate::store::BookmarkTable;
use marks_protocol::BOOKMARKS_TABLE;
use std::sync::Arc;
use tracing::info;

/// Auth service, bookmark table and change feed behind one handle.
///
/// Shared between every session through an `Arc`.
pub struct Platform {
    config: PlatformConfig,
    auth: AuthService,
    feed: Arc<ChangeFeed>,
    bookmarks: BookmarkTable,
}

impl Platform {
    /// Creates an empty platform.
    pub fn new(config: PlatformConfig) -> Self {
        let feed = Arc::new(ChangeFeed::with_max_history(config.feed_history));
        let bookmarks = BookmarkTable::new(BOOKMARKS_TABLE, feed.clone(), config.max_rows);
        let auth = AuthService::new(config.auth.clone());
        info!(site = %config.site_url, "platform started");
        Self {
            config,
            auth,
            feed,
            bookmarks,
        }
    }

    /// Creates a shared platform.
    pub fn shared(config: PlatformConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    /// Returns the configuration.
    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    /// Returns the auth service.
    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    /// Returns the change feed.
    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Looks up a table by name.
    pub fn table(&self, name: &str) -> Option<&BookmarkTable> {
        (name == self.bookmarks.name()).then_some(&self.bookmarks)
    }

    /// Returns the bookmark table.
    pub fn bookmarks(&self) -> &BookmarkTable {
        &self.bookmarks
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::new(PlatformConfig::default())
    }
}
