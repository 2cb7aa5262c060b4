//! Configuration for the bookmark view.

use marks_protocol::BOOKMARKS_TABLE;

/// Configuration for a bookmark view.
#[derive(Debug, Clone)]
pub struct ViewConfig {
    /// Table holding the bookmarks.
    pub table: String,
    /// OAuth provider used by `sign_in`.
    pub provider: String,
    /// Where the provider should send the user back to after consent.
    pub redirect_to: Option<String>,
    /// Path prefix of the platform's REST endpoint.
    pub rest_path: String,
    /// Upper bound on rows fetched when a session starts.
    pub fetch_limit: Option<u32>,
}

impl ViewConfig {
    /// Creates a configuration for the given table.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            provider: "google".into(),
            redirect_to: None,
            rest_path: "/rest/v1".into(),
            fetch_limit: None,
        }
    }

    /// Sets the OAuth provider.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    /// Sets the post-sign-in redirect target.
    pub fn with_redirect_to(mut self, url: impl Into<String>) -> Self {
        self.redirect_to = Some(url.into());
        self
    }

    /// Sets the REST path prefix.
    pub fn with_rest_path(mut self, path: impl Into<String>) -> Self {
        self.rest_path = path.into();
        self
    }

    /// Caps the initial fetch.
    pub fn with_fetch_limit(mut self, limit: u32) -> Self {
        self.fetch_limit = Some(limit);
        self
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self::new(BOOKMARKS_TABLE)
    }
}
