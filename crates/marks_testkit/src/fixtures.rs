//! Test fixtures and platform helpers.
//!
//! Provides a shared platform and per-session views over it, plus helpers
//! for building bookmark records directly.

use marks_backend::{bookmark_view, Platform, PlatformClient, PlatformConfig, PlatformView};
use marks_protocol::{Bookmark, BookmarkId, Timestamp, UserId};
use marks_sync::ViewConfig;
use std::sync::Arc;

/// A platform shared by any number of test sessions.
pub struct TestPlatform {
    /// The platform instance.
    pub platform: Arc<Platform>,
}

impl TestPlatform {
    /// Creates a platform with default settings.
    pub fn new() -> Self {
        Self::with_config(PlatformConfig::default())
    }

    /// Creates a platform with the given settings.
    pub fn with_config(config: PlatformConfig) -> Self {
        Self {
            platform: Platform::shared(config),
        }
    }

    /// Opens a mounted, signed-out session.
    pub async fn session(&self) -> TestSession {
        let client = Arc::new(PlatformClient::new(self.platform.clone()));
        TestSession::mount(client).await
    }

    /// Opens a mounted session holding a persisted token.
    pub async fn restored(&self, token: &str) -> TestSession {
        let client = Arc::new(PlatformClient::with_session(self.platform.clone(), token));
        TestSession::mount(client).await
    }

    /// Opens a session signed in as `user` with its initial fetch applied.
    pub async fn signed_in(&self, user: &str) -> TestSession {
        let mut session = self.session().await;
        session.sign_in(user).await;
        session
    }
}

impl Default for TestPlatform {
    fn default() -> Self {
        Self::new()
    }
}

/// One browser session: a client and the view mounted on it.
pub struct TestSession {
    /// The session's SDK client.
    pub client: Arc<PlatformClient>,
    /// The mounted view.
    pub view: PlatformView,
}

impl TestSession {
    async fn mount(client: Arc<PlatformClient>) -> Self {
        let mut view = bookmark_view(&client, ViewConfig::default());
        view.mount().await.expect("Failed to mount view");
        view.settle().await;
        Self { client, view }
    }

    /// Signs in through the simulated provider and applies the transition.
    pub async fn sign_in(&mut self, user: &str) -> UserId {
        let email = format!("{user}@example.com");
        let identity = self
            .client
            .sign_in_with("google", user, Some(&email))
            .expect("Failed to sign in");
        self.view.settle().await;
        identity.user_id
    }

    /// Applies everything queued for this session.
    pub async fn settle(&mut self) -> usize {
        self.view.settle().await
    }

    /// Returns the titles of the visible bookmarks, newest first.
    pub fn titles(&self) -> Vec<String> {
        self.view.bookmarks().iter().map(|b| b.title.clone()).collect()
    }
}

/// Settles every session until none has anything queued.
pub async fn settle_all(sessions: &mut [&mut TestSession]) {
    loop {
        let mut processed = 0;
        for session in sessions.iter_mut() {
            processed += session.settle().await;
        }
        if processed == 0 {
            return;
        }
    }
}

/// Builds a stored-looking bookmark without going through a store.
pub fn bookmark(owner: UserId, created_at: u64, title: &str) -> Bookmark {
    Bookmark {
        id: BookmarkId::new(),
        url: format!("https://example.com/{created_at}"),
        title: title.to_string(),
        created_at: Timestamp::from_millis(created_at),
        owner,
    }
}
