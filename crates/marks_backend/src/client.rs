//! Client SDK for the reference platform.
//!
//! A [`PlatformClient`] is one browser session: it holds that session's
//! access token, fans auth changes out to its listeners, sends REST
//! requests with the token attached and opens change-feed subscriptions
//! as the token's user.

use crate::error::PlatformError;
use crate::platform::Platform;
use crate::router::RestRouter;
use crate::routes::{self, SessionCookie};
use marks_protocol::{AuthChange, AuthChangeKind, Filter, Identity, RestRequest, RestResponse};
use marks_sync::{
    AuthListener, AuthProvider, BookmarkView, ChangeStream, HttpClient, ListenerId, RestStore,
    SignInRedirect, Subscription, SubscriptionId, ViewConfig, ViewError, ViewResult,
};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, info};
use url::Url;

/// A bookmark view wired to a [`PlatformClient`].
pub type PlatformView = BookmarkView<PlatformClient, RestStore<PlatformClient>, PlatformClient>;

/// Builds a bookmark view over `client`.
pub fn bookmark_view(client: &Arc<PlatformClient>, config: ViewConfig) -> PlatformView {
    let store = Arc::new(RestStore::new(client.clone(), config.rest_path.clone()));
    BookmarkView::new(config, client.clone(), store, client.clone())
}

/// Maps a platform error onto the view's error taxonomy.
pub fn to_view_error(error: PlatformError) -> ViewError {
    match error.status() {
        401 => ViewError::Authentication(error.to_string()),
        403 => ViewError::Authorization(error.to_string()),
        400..=499 => ViewError::Rejected(error.to_string()),
        _ => ViewError::Server(error.to_string()),
    }
}

/// One session's handle on the platform.
pub struct PlatformClient {
    platform: Arc<Platform>,
    router: RestRouter,
    token: RwLock<Option<String>>,
    listeners: Mutex<Vec<(ListenerId, UnboundedSender<AuthChange>)>>,
    next_listener: AtomicU64,
}

impl PlatformClient {
    /// Creates a client with no session.
    pub fn new(platform: Arc<Platform>) -> Self {
        Self {
            router: RestRouter::new(platform.clone()),
            platform,
            token: RwLock::new(None),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
        }
    }

    /// Creates a client holding a persisted access token.
    ///
    /// The token is only checked when the session is restored.
    pub fn with_session(platform: Arc<Platform>, token: impl Into<String>) -> Self {
        let client = Self::new(platform);
        *client.token.write() = Some(token.into());
        client
    }

    /// Returns the platform.
    pub fn platform(&self) -> &Arc<Platform> {
        &self.platform
    }

    /// Returns the current access token.
    pub fn access_token(&self) -> Option<String> {
        self.token.read().clone()
    }

    /// Completes an OAuth sign-in by running the callback exchange.
    pub fn complete_sign_in(&self, code: &str) -> ViewResult<Identity> {
        let redirect = routes::callback(&self.platform, Some(code));
        let SessionCookie::Set(token) = redirect.cookie else {
            return Err(ViewError::Authentication(format!(
                "sign-in failed, redirected to {}",
                redirect.location
            )));
        };
        let identity = self
            .platform
            .auth()
            .validate(&token)
            .map_err(to_view_error)?;

        *self.token.write() = Some(token);
        self.notify(AuthChangeKind::SignedIn, Some(identity.clone()));
        Ok(identity)
    }

    /// Runs the whole provider round trip for `subject`.
    pub fn sign_in_with(
        &self,
        provider: &str,
        subject: &str,
        email: Option<&str>,
    ) -> ViewResult<Identity> {
        let code = self.platform.auth().authorize(provider, subject, email);
        self.complete_sign_in(&code)
    }

    /// Rotates the access token.
    pub fn refresh_session(&self) -> ViewResult<Identity> {
        let token = self
            .access_token()
            .ok_or_else(|| ViewError::Authentication("no session".into()))?;
        let session = self.platform.auth().refresh(&token).map_err(to_view_error)?;

        *self.token.write() = Some(session.access_token);
        self.notify(AuthChangeKind::TokenRefreshed, Some(session.identity.clone()));
        Ok(session.identity)
    }

    /// Returns the number of registered auth listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    fn session_identity(&self) -> Option<Identity> {
        let token = self.access_token()?;
        self.platform.auth().validate(&token).ok()
    }

    fn notify(&self, kind: AuthChangeKind, identity: Option<Identity>) {
        let change = AuthChange::new(kind, identity);
        debug!(kind = ?change.kind, "notifying auth listeners");
        self.listeners
            .lock()
            .retain(|(_, tx)| tx.send(change.clone()).is_ok());
    }
}

impl AuthProvider for PlatformClient {
    async fn current_identity(&self) -> ViewResult<Option<Identity>> {
        let Some(token) = self.access_token() else {
            return Ok(None);
        };
        match self.platform.auth().validate(&token) {
            Ok(identity) => Ok(Some(identity)),
            Err(e) => {
                info!("discarding persisted session: {e}");
                *self.token.write() = None;
                Ok(None)
            }
        }
    }

    fn on_identity_change(&self) -> AuthListener {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::SeqCst));
        let (tx, rx) = mpsc::unbounded_channel();
        let initial = AuthChange::new(AuthChangeKind::InitialSession, self.session_identity());
        // The receiver is still in hand, so this cannot fail.
        let _ = tx.send(initial);
        self.listeners.lock().push((id, tx));
        AuthListener { id, receiver: rx }
    }

    fn remove_listener(&self, id: ListenerId) {
        self.listeners.lock().retain(|(l, _)| *l != id);
    }

    async fn sign_in(
        &self,
        provider: &str,
        redirect_to: Option<&str>,
    ) -> ViewResult<SignInRedirect> {
        if provider.is_empty() {
            return Err(ViewError::Authentication("no provider given".into()));
        }
        let config = self.platform.config();
        let redirect_to = redirect_to
            .map(str::to_string)
            .unwrap_or_else(|| config.callback_url());
        let authorize = format!("{}/auth/v1/authorize", config.site_url.trim_end_matches('/'));
        let url = Url::parse_with_params(
            &authorize,
            &[("provider", provider), ("redirect_to", redirect_to.as_str())],
        )
        .map_err(|e| ViewError::Rejected(format!("invalid site url {}: {e}", config.site_url)))?;
        Ok(SignInRedirect { url: url.into() })
    }

    async fn sign_out(&self) -> ViewResult<()> {
        let token = self.token.write().take();
        if token.is_none() {
            return Ok(());
        }
        routes::sign_out(&self.platform, token.as_deref());
        self.notify(AuthChangeKind::SignedOut, None);
        Ok(())
    }
}

impl HttpClient for PlatformClient {
    async fn send(&self, request: RestRequest) -> Result<RestResponse, String> {
        let token = self.access_token();
        Ok(self.router.handle(token.as_deref(), &request))
    }
}

impl ChangeStream for PlatformClient {
    async fn subscribe(
        &self,
        table: &str,
        filter: &Filter,
        since: u64,
    ) -> ViewResult<Subscription> {
        let token = self
            .access_token()
            .ok_or_else(|| ViewError::Authentication("no session".into()))?;
        let identity = self
            .platform
            .auth()
            .validate(&token)
            .map_err(to_view_error)?;
        if self.platform.table(table).is_none() {
            return Err(ViewError::Rejected(format!("unknown table {table}")));
        }
        Ok(self
            .platform
            .feed()
            .subscribe(table, filter, identity.user_id, since))
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> ViewResult<()> {
        self.platform.feed().unsubscribe(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlatformConfig;
    use marks_protocol::BOOKMARKS_TABLE;
    use marks_sync::{IdentityTransition, SessionState, ViewUpdate};

    fn platform() -> Arc<Platform> {
        Platform::shared(PlatformConfig::default())
    }

    #[tokio::test]
    async fn sign_in_notifies_listeners() {
        let client = PlatformClient::new(platform());
        let mut listener = client.on_identity_change();
        assert_eq!(
            listener.receiver.try_recv().unwrap().kind,
            AuthChangeKind::InitialSession
        );

        let identity = client.sign_in_with("google", "alice", None).unwrap();
        let change = listener.receiver.try_recv().unwrap();
        assert_eq!(change.kind, AuthChangeKind::SignedIn);
        assert_eq!(change.identity, Some(identity.clone()));
        assert_eq!(client.current_identity().await.unwrap(), Some(identity));

        client.sign_out().await.unwrap();
        assert_eq!(
            listener.receiver.try_recv().unwrap().kind,
            AuthChangeKind::SignedOut
        );
        assert_eq!(client.current_identity().await.unwrap(), None);
    }

    #[tokio::test]
    async fn revoked_persisted_session_is_discarded() {
        let platform = platform();
        let first = PlatformClient::new(platform.clone());
        first.sign_in_with("google", "alice", None).unwrap();
        let token = first.access_token().unwrap();

        let restored = PlatformClient::with_session(platform.clone(), token.clone());
        assert!(restored.current_identity().await.unwrap().is_some());

        routes::sign_out(&platform, Some(&token));
        assert_eq!(restored.current_identity().await.unwrap(), None);
        assert_eq!(restored.access_token(), None);
    }

    #[tokio::test]
    async fn failed_code_exchange() {
        let client = PlatformClient::new(platform());
        let err = client.complete_sign_in("bogus").unwrap_err();
        assert!(matches!(err, ViewError::Authentication(_)));
        assert_eq!(client.access_token(), None);
    }

    #[tokio::test]
    async fn sign_in_redirect_defaults_to_callback() {
        let client = PlatformClient::new(platform());
        let redirect = client.sign_in("github", None).await.unwrap();
        assert_eq!(
            redirect.url,
            "http://localhost:3000/auth/v1/authorize?provider=github&redirect_to=http%3A%2F%2Flocalhost%3A3000%2Fauth%2Fcallback"
        );
    }

    #[tokio::test]
    async fn sign_in_redirect_keeps_its_own_query() {
        let client = PlatformClient::new(platform());
        let redirect = client
            .sign_in("google", Some("https://app.dev/cb?next=/list&tab=1"))
            .await
            .unwrap();

        let url = Url::parse(&redirect.url).unwrap();
        let params: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            params,
            vec![
                ("provider".to_string(), "google".to_string()),
                (
                    "redirect_to".to_string(),
                    "https://app.dev/cb?next=/list&tab=1".to_string()
                ),
            ]
        );
    }

    #[tokio::test]
    async fn subscribe_requires_session() {
        let client = PlatformClient::new(platform());
        let owner = marks_protocol::UserId::new();
        let result = client
            .subscribe(BOOKMARKS_TABLE, &Filter::owner(owner), 0)
            .await;
        assert!(matches!(result, Err(ViewError::Authentication(_))));
    }

    #[tokio::test]
    async fn view_over_platform() {
        let client = Arc::new(PlatformClient::new(platform()));
        let mut view = bookmark_view(&client, ViewConfig::default());
        view.mount().await.unwrap();
        assert_eq!(view.state(), &SessionState::SignedOut);

        let alice = client.sign_in_with("google", "alice", None).unwrap();
        view.settle().await;
        assert_eq!(view.identity(), Some(&alice));
        assert!(view.is_subscribed());

        view.add("Example", "https://example.com").await.unwrap();
        let update = view.next_update().await.unwrap();
        assert!(matches!(update, ViewUpdate::Reconciled { .. }));
        assert_eq!(view.bookmarks().len(), 1);
        assert_eq!(view.bookmarks()[0].owner, alice.user_id);

        client.refresh_session().unwrap();
        assert_eq!(
            view.next_update().await,
            Some(ViewUpdate::Identity(IdentityTransition::Unchanged))
        );

        view.unmount().await;
        assert_eq!(client.listener_count(), 0);
        assert_eq!(client.platform().feed().subscriber_count(), 0);
    }
}
