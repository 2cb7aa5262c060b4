//! The bookmark view state container.
//!
//! [`BookmarkView`] owns everything a mounted view needs: the session
//! manager, the subscription manager, the local view state and the draft
//! form. It is driven through `&mut self`, so auth changes, change events
//! and user actions are applied one at a time.

use crate::config::ViewConfig;
use crate::error::{ViewError, ViewResult};
use crate::local_view::{LocalView, Reconciliation};
use crate::mutation::{Draft, MutationHandler};
use crate::session::{IdentityTransition, SessionManager, SessionState};
use crate::subscription::{SubscriptionEvent, SubscriptionManager};
use crate::transport::{AuthProvider, BookmarkStore, ChangeStream, SignInRedirect};
use marks_protocol::{AuthChange, Bookmark, BookmarkId, ChangeEvent, Identity, UserId};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Counters describing what the view has done.
#[derive(Debug, Clone, Default)]
pub struct ViewStats {
    /// Initial fetches completed.
    pub fetches: u64,
    /// Subscriptions opened.
    pub subscriptions_opened: u64,
    /// Change events that altered the list.
    pub events_applied: u64,
    /// Change events dropped as duplicate, stale, foreign or unsupported.
    pub events_ignored: u64,
    /// Inserts accepted by the store.
    pub inserts_sent: u64,
    /// Deletes accepted by the store.
    pub deletes_sent: u64,
    /// Times the change stream dropped the subscription.
    pub disconnects: u64,
    /// Last error message.
    pub last_error: Option<String>,
}

/// What a call to [`BookmarkView::next_update`] processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewUpdate {
    /// An auth notification.
    Identity(IdentityTransition),
    /// An auth notification whose initial fetch or subscribe failed.
    ///
    /// The view is left empty with no subscription until the next sign-in
    /// or [`BookmarkView::reload`].
    FetchFailed {
        /// The transition that was applied.
        transition: IdentityTransition,
        /// Why loading the incoming user's rows failed.
        error: String,
    },
    /// A change event.
    Reconciled {
        /// The event as delivered.
        event: ChangeEvent,
        /// What it did to the list.
        outcome: Reconciliation,
    },
    /// The change stream dropped the subscription.
    Disconnected,
    /// The auth provider closed the listener channel.
    ListenerClosed,
}

enum Inbound {
    Auth(Option<AuthChange>),
    Feed(Option<SubscriptionEvent>),
}

/// A mounted bookmark view over the platform's collaborators.
pub struct BookmarkView<A: AuthProvider, S: BookmarkStore, F: ChangeStream> {
    config: ViewConfig,
    auth: Arc<A>,
    session: SessionManager<A>,
    subscriptions: SubscriptionManager<S, F>,
    mutations: MutationHandler<S>,
    local: LocalView,
    draft: Draft,
    stats: ViewStats,
    mounted: bool,
}

impl<A: AuthProvider, S: BookmarkStore, F: ChangeStream> BookmarkView<A, S, F> {
    /// Creates an unmounted view.
    pub fn new(config: ViewConfig, auth: Arc<A>, store: Arc<S>, stream: Arc<F>) -> Self {
        let session = SessionManager::new(auth.clone());
        let subscriptions = SubscriptionManager::new(store.clone(), stream, config.table.clone())
            .with_fetch_limit(config.fetch_limit);
        let mutations = MutationHandler::new(store, config.table.clone());
        Self {
            config,
            auth,
            session,
            subscriptions,
            mutations,
            local: LocalView::new(),
            draft: Draft::default(),
            stats: ViewStats::default(),
            mounted: false,
        }
    }

    /// Mounts the view: registers the auth listener, restores the persisted
    /// session and, if there is one, loads and subscribes to its rows.
    ///
    /// The listener is registered first so no auth change between restore
    /// and registration is lost. A failed restore leaves the view signed out
    /// and is returned.
    pub async fn mount(&mut self) -> ViewResult<()> {
        if self.mounted {
            return Ok(());
        }
        self.mounted = true;
        self.session.observe_auth_changes();

        match self.session.restore_session().await {
            Ok(identity) => {
                self.apply_identity(identity).await;
                Ok(())
            }
            Err(e) => {
                self.record_error(&e);
                Err(e)
            }
        }
    }

    /// Unmounts the view, releasing the auth listener and the subscription
    /// and discarding local state.
    ///
    /// The session goes back to loading, so a later [`mount`](Self::mount)
    /// restores, fetches and subscribes from scratch.
    pub async fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        self.session.stop_observing();
        self.subscriptions.close().await;
        self.local.clear();
        self.session.reset();
        self.mounted = false;
        info!("view unmounted");
    }

    /// Starts an OAuth sign-in with the configured provider.
    pub async fn sign_in(&mut self) -> ViewResult<SignInRedirect> {
        if self.session.state().is_loading() {
            return Err(ViewError::Loading);
        }
        let result = self
            .auth
            .sign_in(&self.config.provider, self.config.redirect_to.as_deref())
            .await;
        if let Err(e) = &result {
            self.record_error(e);
        }
        result
    }

    /// Signs out.
    ///
    /// The view goes to the signed-out state even if the provider call fails.
    pub async fn sign_out(&mut self) -> ViewResult<()> {
        self.session.require_user()?;
        let result = self.auth.sign_out().await;
        if let Err(e) = &result {
            self.record_error(e);
        }
        self.apply_identity(None).await;
        result
    }

    /// Inserts a bookmark for the signed-in user.
    ///
    /// The list does not change until the insert event arrives.
    pub async fn add(&mut self, title: &str, url: &str) -> ViewResult<Bookmark> {
        let owner = self.session.require_user()?;
        match self.mutations.add(owner, title, url).await {
            Ok(stored) => {
                self.stats.inserts_sent += 1;
                Ok(stored)
            }
            Err(e) => {
                self.record_error(&e);
                Err(e)
            }
        }
    }

    /// Submits the draft form.
    ///
    /// The draft is cleared on success and kept on failure.
    pub async fn submit(&mut self) -> ViewResult<Bookmark> {
        let Draft { title, url } = self.draft.clone();
        let stored = self.add(&title, &url).await?;
        self.draft.clear();
        Ok(stored)
    }

    /// Deletes a visible bookmark.
    ///
    /// The list does not change until the delete event arrives.
    pub async fn remove(&mut self, id: BookmarkId) -> ViewResult<()> {
        self.session.require_user()?;
        match self.mutations.remove(&self.local, id).await {
            Ok(()) => {
                self.stats.deletes_sent += 1;
                Ok(())
            }
            Err(e) => {
                self.record_error(&e);
                Err(e)
            }
        }
    }

    /// Refetches and resubscribes for the signed-in user.
    pub async fn reload(&mut self) -> ViewResult<usize> {
        let owner = self.session.require_user()?;
        self.open(owner).await
    }

    /// Waits for the next auth change or change event and applies it.
    ///
    /// Auth changes are taken first. Returns `None` when there is nothing
    /// left to wait on.
    pub async fn next_update(&mut self) -> Option<ViewUpdate> {
        let observing = self.session.is_observing();
        let subscribed = self.subscriptions.is_active();
        let inbound = tokio::select! {
            biased;
            change = self.session.next_change(), if observing => Inbound::Auth(change),
            event = self.subscriptions.next_event(), if subscribed => Inbound::Feed(event),
            else => return None,
        };

        match inbound {
            Inbound::Auth(Some(change)) => Some(self.apply_auth_change(change).await),
            Inbound::Auth(None) => {
                warn!("auth listener closed by provider");
                Some(ViewUpdate::ListenerClosed)
            }
            Inbound::Feed(Some(event)) => Some(self.apply_subscription_event(event)),
            Inbound::Feed(None) => None,
        }
    }

    /// Applies every auth change and change event already queued.
    ///
    /// Returns the number of items processed.
    pub async fn settle(&mut self) -> usize {
        let mut processed = 0;
        loop {
            if let Some(change) = self.session.try_next_change() {
                self.apply_auth_change(change).await;
            } else if let Some(event) = self.subscriptions.try_next_event() {
                self.apply_subscription_event(event);
            } else {
                return processed;
            }
            processed += 1;
        }
    }

    async fn apply_auth_change(&mut self, change: AuthChange) -> ViewUpdate {
        debug!(kind = ?change.kind, "auth change");
        self.apply_identity(change.identity).await
    }

    async fn apply_identity(&mut self, identity: Option<Identity>) -> ViewUpdate {
        let transition = self.session.transition(identity);
        if transition.clears_view() {
            self.subscriptions.close().await;
            self.local.clear();
        }

        // The same user authenticating again reloads a view whose
        // subscription was lost.
        let owner = match &transition {
            IdentityTransition::Unchanged if !self.subscriptions.is_active() => {
                self.session.identity().map(|identity| identity.user_id)
            }
            other => other.incoming().map(|identity| identity.user_id),
        };
        if let Some(owner) = owner {
            if let Err(e) = self.open(owner).await {
                return ViewUpdate::FetchFailed {
                    transition,
                    error: e.to_string(),
                };
            }
        }
        ViewUpdate::Identity(transition)
    }

    async fn open(&mut self, owner: UserId) -> ViewResult<usize> {
        match self.subscriptions.open(owner, &mut self.local).await {
            Ok(rows) => {
                self.stats.fetches += 1;
                self.stats.subscriptions_opened += 1;
                Ok(rows)
            }
            Err(e) => {
                self.record_error(&e);
                Err(e)
            }
        }
    }

    fn apply_subscription_event(&mut self, event: SubscriptionEvent) -> ViewUpdate {
        match event {
            SubscriptionEvent::Change(event) => {
                let outcome = self.local.apply(&event);
                debug!(
                    sequence = event.sequence,
                    id = %event.record.id,
                    ?outcome,
                    "reconciled"
                );
                if outcome.changed() {
                    self.stats.events_applied += 1;
                } else {
                    self.stats.events_ignored += 1;
                }
                ViewUpdate::Reconciled { event, outcome }
            }
            SubscriptionEvent::Disconnected => {
                self.stats.disconnects += 1;
                self.stats.last_error = Some("change stream disconnected".into());
                ViewUpdate::Disconnected
            }
        }
    }

    fn record_error(&mut self, error: &ViewError) {
        if error.was_sent() {
            warn!(class = ?error.class(), "{error}");
        } else {
            debug!("{error}");
        }
        self.stats.last_error = Some(error.to_string());
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    /// Returns the session state.
    pub fn state(&self) -> &SessionState {
        self.session.state()
    }

    /// Returns the signed-in identity.
    pub fn identity(&self) -> Option<&Identity> {
        self.session.identity()
    }

    /// Returns the visible bookmarks, newest first.
    pub fn bookmarks(&self) -> &[Bookmark] {
        self.local.bookmarks()
    }

    /// Returns the local view state.
    pub fn local_view(&self) -> &LocalView {
        &self.local
    }

    /// Returns the draft form.
    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    /// Returns the draft form for editing.
    pub fn draft_mut(&mut self) -> &mut Draft {
        &mut self.draft
    }

    /// Returns the counters.
    pub fn stats(&self) -> &ViewStats {
        &self.stats
    }

    /// Returns true between `mount` and `unmount`.
    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Returns true while a change-stream subscription is open.
    pub fn is_subscribed(&self) -> bool {
        self.subscriptions.is_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockOp, MockPlatform};
    use marks_protocol::{ProtocolError, BOOKMARKS_TABLE};

    type MockView = BookmarkView<MockPlatform, MockPlatform, MockPlatform>;

    fn view(mock: &Arc<MockPlatform>) -> MockView {
        BookmarkView::new(
            ViewConfig::default(),
            mock.clone(),
            mock.clone(),
            mock.clone(),
        )
    }

    fn alice() -> Identity {
        Identity::new(UserId::new(), "google").with_email("alice@example.com")
    }

    async fn signed_in() -> (Arc<MockPlatform>, MockView, Identity) {
        let mock = Arc::new(MockPlatform::new());
        let user = alice();
        mock.set_identity(Some(user.clone()));
        let mut view = view(&mock);
        view.mount().await.unwrap();
        view.settle().await;
        (mock, view, user)
    }

    #[tokio::test]
    async fn loading_blocks_actions() {
        let mock = Arc::new(MockPlatform::new());
        let mut view = view(&mock);

        assert!(view.state().is_loading());
        assert!(matches!(
            view.add("Example", "https://example.com").await,
            Err(ViewError::Loading)
        ));
        assert!(matches!(view.sign_in().await, Err(ViewError::Loading)));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn mount_restores_and_subscribes() {
        let mock = Arc::new(MockPlatform::new());
        let user = alice();
        mock.set_identity(Some(user.clone()));
        mock.seed(BOOKMARKS_TABLE, user.user_id, "old", "https://old.dev");

        let mut view = view(&mock);
        view.mount().await.unwrap();
        assert_eq!(view.identity(), Some(&user));
        assert_eq!(view.bookmarks().len(), 1);
        assert!(view.is_subscribed());

        // The initial-session echo is not a transition.
        assert_eq!(view.settle().await, 1);
        assert_eq!(mock.call_count("query"), 1);
        assert_eq!(view.stats().fetches, 1);
    }

    #[tokio::test]
    async fn mount_without_session() {
        let mock = Arc::new(MockPlatform::new());
        let mut view = view(&mock);
        view.mount().await.unwrap();

        assert_eq!(view.state(), &SessionState::SignedOut);
        assert!(!view.is_subscribed());
        assert!(matches!(
            view.add("Example", "https://example.com").await,
            Err(ViewError::NotAuthenticated)
        ));
        let redirect = view.sign_in().await.unwrap();
        assert!(redirect.url.contains("provider=google"));
    }

    #[tokio::test]
    async fn failed_restore_is_recorded() {
        let mock = Arc::new(MockPlatform::new());
        mock.set_failing(MockOp::Restore, true);
        let mut view = view(&mock);

        assert!(view.mount().await.is_err());
        assert_eq!(view.state(), &SessionState::SignedOut);
        assert!(view.stats().last_error.is_some());
    }

    #[tokio::test]
    async fn add_appears_after_event() {
        let (_mock, mut view, user) = signed_in().await;

        let stored = view.add("Example", "https://example.com").await.unwrap();
        assert!(view.bookmarks().is_empty());

        let update = view.next_update().await.unwrap();
        assert!(matches!(
            update,
            ViewUpdate::Reconciled { outcome: Reconciliation::Inserted, .. }
        ));
        assert_eq!(view.bookmarks(), &[stored.clone()]);
        assert_eq!(stored.owner, user.user_id);
        assert_eq!(view.stats().inserts_sent, 1);
        assert_eq!(view.stats().events_applied, 1);
    }

    #[tokio::test]
    async fn empty_title_is_never_sent() {
        let (mock, mut view, _) = signed_in().await;

        let err = view.add("", "https://example.com").await.unwrap_err();
        assert!(matches!(
            err,
            ViewError::InvalidInput(ProtocolError::EmptyField("title"))
        ));
        assert_eq!(mock.call_count("insert"), 0);
        assert!(view.bookmarks().is_empty());
    }

    #[tokio::test]
    async fn submit_clears_draft_only_on_success() {
        let (mock, mut view, _) = signed_in().await;
        *view.draft_mut() = Draft::new("Example", "https://example.com");

        mock.set_failing(MockOp::Insert, true);
        assert!(view.submit().await.is_err());
        assert_eq!(view.draft().title, "Example");

        mock.set_failing(MockOp::Insert, false);
        view.submit().await.unwrap();
        assert!(view.draft().is_empty());
        assert!(view.bookmarks().is_empty());
        view.settle().await;
        assert_eq!(view.bookmarks().len(), 1);
    }

    #[tokio::test]
    async fn remove_waits_for_event() {
        let (mock, mut view, user) = signed_in().await;
        let row = mock.seed(BOOKMARKS_TABLE, user.user_id, "one", "https://one.dev");
        view.settle().await;
        assert_eq!(view.bookmarks().len(), 1);

        view.remove(row.id).await.unwrap();
        assert_eq!(view.bookmarks().len(), 1);
        view.settle().await;
        assert!(view.bookmarks().is_empty());

        let err = view.remove(row.id).await.unwrap_err();
        assert!(matches!(err, ViewError::NotVisible(_)));
        assert_eq!(mock.call_count("delete"), 1);
    }

    #[tokio::test]
    async fn sign_out_clears_and_unsubscribes() {
        let (mock, mut view, user) = signed_in().await;
        mock.seed(BOOKMARKS_TABLE, user.user_id, "one", "https://one.dev");
        view.settle().await;

        view.sign_out().await.unwrap();
        assert_eq!(view.state(), &SessionState::SignedOut);
        assert!(view.bookmarks().is_empty());
        assert_eq!(mock.subscriber_count(), 0);

        // The provider's own sign-out notification is a no-op now.
        view.settle().await;
        assert_eq!(view.state(), &SessionState::SignedOut);
    }

    #[tokio::test]
    async fn failed_sign_out_still_signs_out_locally() {
        let (mock, mut view, _) = signed_in().await;
        mock.set_failing(MockOp::SignOut, true);

        assert!(view.sign_out().await.is_err());
        assert_eq!(view.state(), &SessionState::SignedOut);
        assert!(!view.is_subscribed());
    }

    #[tokio::test]
    async fn switching_identity_replaces_rows() {
        let (mock, mut view, user) = signed_in().await;
        let bob = Identity::new(UserId::new(), "google");
        mock.seed(BOOKMARKS_TABLE, user.user_id, "alice's", "https://a.dev");
        mock.seed(BOOKMARKS_TABLE, bob.user_id, "bob's", "https://b.dev");
        view.settle().await;
        assert_eq!(view.bookmarks()[0].title, "alice's");

        mock.sign_in_as(bob.clone());
        let update = view.next_update().await.unwrap();
        assert!(matches!(
            update,
            ViewUpdate::Identity(IdentityTransition::Switched { .. })
        ));
        assert_eq!(view.bookmarks().len(), 1);
        assert_eq!(view.bookmarks()[0].owner, bob.user_id);
        assert_eq!(mock.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn token_refresh_keeps_subscription() {
        let (mock, mut view, _) = signed_in().await;
        let before = view.subscriptions.subscription_id();

        mock.refresh_token();
        let update = view.next_update().await.unwrap();
        assert_eq!(update, ViewUpdate::Identity(IdentityTransition::Unchanged));
        assert_eq!(view.subscriptions.subscription_id(), before);
        assert_eq!(mock.call_count("query"), 1);
    }

    #[tokio::test]
    async fn disconnect_is_reported_not_retried() {
        let (mock, mut view, _) = signed_in().await;

        mock.disconnect_subscribers();
        assert_eq!(view.next_update().await, Some(ViewUpdate::Disconnected));
        assert!(!view.is_subscribed());
        assert_eq!(view.stats().disconnects, 1);
        assert_eq!(mock.call_count("subscribe"), 1);

        view.reload().await.unwrap();
        assert!(view.is_subscribed());
    }

    #[tokio::test]
    async fn failed_fetch_then_reload() {
        let mock = Arc::new(MockPlatform::new());
        let user = alice();
        mock.set_identity(Some(user.clone()));
        mock.seed(BOOKMARKS_TABLE, user.user_id, "one", "https://one.dev");
        mock.set_failing(MockOp::Query, true);

        let mut view = view(&mock);
        view.mount().await.unwrap();
        assert!(view.bookmarks().is_empty());
        assert!(!view.is_subscribed());
        assert!(view.stats().last_error.is_some());

        mock.set_failing(MockOp::Query, false);
        assert_eq!(view.reload().await.unwrap(), 1);
        assert!(view.is_subscribed());
    }

    #[tokio::test]
    async fn unmount_releases_everything() {
        let (mock, mut view, _) = signed_in().await;
        assert_eq!(mock.listener_count(), 1);
        assert_eq!(mock.subscriber_count(), 1);

        view.unmount().await;
        assert_eq!(mock.listener_count(), 0);
        assert_eq!(mock.subscriber_count(), 0);
        assert!(view.bookmarks().is_empty());

        // Nothing left to wait on.
        mock.sign_out_now();
        assert_eq!(view.next_update().await, None);
    }

    #[tokio::test]
    async fn remount_refetches_and_resubscribes() {
        let (mock, mut view, user) = signed_in().await;
        mock.seed(BOOKMARKS_TABLE, user.user_id, "one", "https://one.dev");
        view.settle().await;

        view.unmount().await;
        assert!(view.state().is_loading());

        view.mount().await.unwrap();
        view.settle().await;
        assert_eq!(view.identity(), Some(&user));
        assert!(view.is_subscribed());
        assert_eq!(view.bookmarks().len(), 1);
        assert_eq!(mock.call_count("query"), 2);
        assert_eq!(mock.listener_count(), 1);
        assert_eq!(mock.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn reauthentication_after_disconnect_refetches() {
        let (mock, mut view, user) = signed_in().await;
        mock.disconnect_subscribers();
        assert_eq!(view.next_update().await, Some(ViewUpdate::Disconnected));

        mock.seed(BOOKMARKS_TABLE, user.user_id, "missed", "https://missed.dev");
        mock.sign_in_as(user.clone());
        let update = view.next_update().await.unwrap();

        assert_eq!(update, ViewUpdate::Identity(IdentityTransition::Unchanged));
        assert!(view.is_subscribed());
        assert_eq!(view.bookmarks()[0].title, "missed");
        assert_eq!(mock.call_count("query"), 2);
    }

    #[tokio::test]
    async fn failed_fetch_is_reported_to_the_caller() {
        let (mock, mut view, _) = signed_in().await;
        let bob = Identity::new(UserId::new(), "google");
        mock.set_failing(MockOp::Query, true);

        mock.sign_in_as(bob.clone());
        let update = view.next_update().await.unwrap();
        match update {
            ViewUpdate::FetchFailed { transition, error } => {
                assert_eq!(transition.incoming(), Some(&bob));
                assert!(error.contains("Query"));
            }
            other => panic!("unexpected update {other:?}"),
        }
        assert!(view.bookmarks().is_empty());
        assert!(!view.is_subscribed());
        assert_eq!(view.state(), &SessionState::SignedIn(bob));
    }
}
