//! Collaborator contracts consumed by the view.
//!
//! The view never talks to the platform directly. It goes through three
//! traits, one per external collaborator: the auth provider, the
//! authoritative store, and the change stream. All calls are async; event
//! delivery happens over `tokio` unbounded channels handed out as explicit
//! handles, so releasing a listener or subscription is a matter of calling
//! the matching remove/unsubscribe and dropping the receiver.

use crate::error::{ViewError, ViewResult};
use marks_protocol::{
    AuthChange, AuthChangeKind, Bookmark, BookmarkId, ChangeEvent, ChangeKind, Filter, Identity,
    NewBookmark, Order, Snapshot, Timestamp, UserId,
};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Handle identifying a registered auth listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// A registered auth-change listener.
#[derive(Debug)]
pub struct AuthListener {
    /// Id to pass back to [`AuthProvider::remove_listener`].
    pub id: ListenerId,
    /// Auth changes in the order the provider observed them.
    pub receiver: UnboundedReceiver<AuthChange>,
}

/// Handle identifying an open change-stream subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// An open change-stream subscription.
#[derive(Debug)]
pub struct Subscription {
    /// Id to pass back to [`ChangeStream::unsubscribe`].
    pub id: SubscriptionId,
    /// Change events matching the subscription filter.
    pub receiver: UnboundedReceiver<ChangeEvent>,
}

/// Where to send the user to start an OAuth sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInRedirect {
    /// Provider authorization URL.
    pub url: String,
}

/// The authentication provider.
#[allow(async_fn_in_trait)]
pub trait AuthProvider: Send + Sync {
    /// Returns the identity of the persisted session, if any.
    async fn current_identity(&self) -> ViewResult<Option<Identity>>;

    /// Registers a listener for sign-in, sign-out and token refresh.
    fn on_identity_change(&self) -> AuthListener;

    /// Unregisters a listener. Unknown ids are ignored.
    fn remove_listener(&self, id: ListenerId);

    /// Starts an OAuth sign-in with the given provider.
    async fn sign_in(&self, provider: &str, redirect_to: Option<&str>)
        -> ViewResult<SignInRedirect>;

    /// Ends the current session.
    async fn sign_out(&self) -> ViewResult<()>;
}

/// The authoritative bookmark store.
#[allow(async_fn_in_trait)]
pub trait BookmarkStore: Send + Sync {
    /// Reads rows matching `filter` in the given order.
    async fn query(
        &self,
        table: &str,
        filter: &Filter,
        order: Order,
        limit: Option<u32>,
    ) -> ViewResult<Snapshot>;

    /// Inserts a row and returns it as stored.
    async fn insert(&self, table: &str, record: &NewBookmark) -> ViewResult<Bookmark>;

    /// Deletes a row by id.
    async fn delete(&self, table: &str, id: BookmarkId) -> ViewResult<()>;
}

/// The store's change feed.
#[allow(async_fn_in_trait)]
pub trait ChangeStream: Send + Sync {
    /// Opens a filtered subscription.
    ///
    /// Retained events with a sequence greater than `since` are delivered
    /// first, then live events as they commit.
    async fn subscribe(&self, table: &str, filter: &Filter, since: u64)
        -> ViewResult<Subscription>;

    /// Closes a subscription. Unknown ids are ignored.
    async fn unsubscribe(&self, id: SubscriptionId) -> ViewResult<()>;
}

/// Operations a [`MockPlatform`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockOp {
    /// `current_identity`
    Restore,
    /// `query`
    Query,
    /// `insert`
    Insert,
    /// `delete`
    Delete,
    /// `subscribe`
    Subscribe,
    /// `sign_out`
    SignOut,
}

#[derive(Default)]
struct MockState {
    identity: Option<Identity>,
    rows: Vec<Bookmark>,
    sequence: u64,
    clock: u64,
    next_handle: u64,
    history: Vec<ChangeEvent>,
    listeners: Vec<(ListenerId, UnboundedSender<AuthChange>)>,
    subscribers: Vec<(SubscriptionId, String, Filter, UnboundedSender<ChangeEvent>)>,
    failing: Vec<MockOp>,
    calls: Vec<String>,
}

impl MockState {
    fn next_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn check(&mut self, op: MockOp, call: String) -> ViewResult<()> {
        self.calls.push(call);
        if self.failing.contains(&op) {
            return Err(ViewError::Transport(format!("mock {op:?} failure")));
        }
        Ok(())
    }

    fn notify(&mut self, change: AuthChange) {
        self.listeners
            .retain(|(_, tx)| tx.send(change.clone()).is_ok());
    }

    fn commit(&mut self, table: &str, kind: ChangeKind, record: Bookmark) -> ChangeEvent {
        self.sequence += 1;
        let event = ChangeEvent {
            sequence: self.sequence,
            table: table.to_string(),
            kind,
            record,
        };
        self.history.push(event.clone());
        self.deliver(&event);
        event
    }

    fn deliver(&mut self, event: &ChangeEvent) {
        self.subscribers.retain(|(_, table, filter, tx)| {
            if *table != event.table || !filter.matches(&event.record) {
                return true;
            }
            tx.send(event.clone()).is_ok()
        });
    }
}

/// An in-memory platform for testing.
///
/// Implements all three collaborator traits over a single shared table.
/// Writes commit synchronously and push their change events straight into
/// the subscriber channels, so a test can issue a request and then drain
/// the view without any timing.
pub struct MockPlatform {
    state: Mutex<MockState>,
    connected: AtomicBool,
}

impl MockPlatform {
    /// Creates an empty mock with no session.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            connected: AtomicBool::new(true),
        }
    }

    /// Sets the persisted session without notifying listeners.
    pub fn set_identity(&self, identity: Option<Identity>) {
        self.state.lock().identity = identity;
    }

    /// Signs a user in and notifies listeners.
    pub fn sign_in_as(&self, identity: Identity) {
        let mut state = self.state.lock();
        state.identity = Some(identity.clone());
        state.notify(AuthChange::new(AuthChangeKind::SignedIn, Some(identity)));
    }

    /// Ends the session and notifies listeners.
    pub fn sign_out_now(&self) {
        let mut state = self.state.lock();
        state.identity = None;
        state.notify(AuthChange::signed_out());
    }

    /// Notifies listeners of a token refresh for the current identity.
    pub fn refresh_token(&self) {
        let mut state = self.state.lock();
        let identity = state.identity.clone();
        state.notify(AuthChange::new(AuthChangeKind::TokenRefreshed, identity));
    }

    /// Writes a row as `owner`, bypassing the session. Emits an insert event.
    pub fn seed(&self, table: &str, owner: UserId, title: &str, url: &str) -> Bookmark {
        let mut state = self.state.lock();
        state.clock += 1;
        let record = Bookmark {
            id: BookmarkId::new(),
            url: url.to_string(),
            title: title.to_string(),
            created_at: Timestamp::from_millis(state.clock),
            owner,
        };
        state.rows.push(record.clone());
        state.commit(table, ChangeKind::Insert, record.clone());
        record
    }

    /// Deletes a row, bypassing the session. Emits a delete event.
    pub fn remove_external(&self, table: &str, id: BookmarkId) -> Option<Bookmark> {
        let mut state = self.state.lock();
        let index = state.rows.iter().position(|r| r.id == id)?;
        let record = state.rows.remove(index);
        state.commit(table, ChangeKind::Delete, record.clone());
        Some(record)
    }

    /// Delivers an arbitrary event to matching subscribers without touching rows.
    pub fn emit_raw(&self, event: ChangeEvent) {
        self.state.lock().deliver(&event);
    }

    /// Drops every subscriber channel, as if the feed connection went away.
    pub fn disconnect_subscribers(&self) {
        self.state.lock().subscribers.clear();
    }

    /// Makes an operation fail with a transport error until cleared.
    pub fn set_failing(&self, op: MockOp, failing: bool) {
        let mut state = self.state.lock();
        state.failing.retain(|o| *o != op);
        if failing {
            state.failing.push(op);
        }
    }

    /// Sets the connected state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Returns the calls received so far, oldest first.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    /// Returns the number of calls whose description starts with `prefix`.
    pub fn call_count(&self, prefix: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    /// Returns the rows currently stored.
    pub fn rows(&self) -> Vec<Bookmark> {
        self.state.lock().rows.clone()
    }

    /// Returns the number of registered auth listeners.
    pub fn listener_count(&self) -> usize {
        self.state.lock().listeners.len()
    }

    /// Returns the number of open subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    fn ensure_connected(&self) -> ViewResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ViewError::Transport("not connected".into()))
        }
    }
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthProvider for MockPlatform {
    async fn current_identity(&self) -> ViewResult<Option<Identity>> {
        self.ensure_connected()?;
        let mut state = self.state.lock();
        state.check(MockOp::Restore, "restore".into())?;
        Ok(state.identity.clone())
    }

    fn on_identity_change(&self) -> AuthListener {
        let mut state = self.state.lock();
        let id = ListenerId(state.next_handle());
        let (tx, rx) = mpsc::unbounded_channel();
        let initial = AuthChange::new(AuthChangeKind::InitialSession, state.identity.clone());
        // The receiver is still in hand, so this cannot fail.
        let _ = tx.send(initial);
        state.listeners.push((id, tx));
        AuthListener { id, receiver: rx }
    }

    fn remove_listener(&self, id: ListenerId) {
        self.state.lock().listeners.retain(|(l, _)| *l != id);
    }

    async fn sign_in(
        &self,
        provider: &str,
        redirect_to: Option<&str>,
    ) -> ViewResult<SignInRedirect> {
        self.ensure_connected()?;
        self.state.lock().calls.push(format!("sign_in {provider}"));
        let mut url = format!("https://auth.mock/authorize?provider={provider}");
        if let Some(redirect) = redirect_to {
            url.push_str("&redirect_to=");
            url.push_str(redirect);
        }
        Ok(SignInRedirect { url })
    }

    async fn sign_out(&self) -> ViewResult<()> {
        self.ensure_connected()?;
        let mut state = self.state.lock();
        state.check(MockOp::SignOut, "sign_out".into())?;
        state.identity = None;
        state.notify(AuthChange::signed_out());
        Ok(())
    }
}

impl BookmarkStore for MockPlatform {
    async fn query(
        &self,
        _table: &str,
        filter: &Filter,
        order: Order,
        limit: Option<u32>,
    ) -> ViewResult<Snapshot> {
        self.ensure_connected()?;
        let mut state = self.state.lock();
        state.check(MockOp::Query, format!("query {filter}"))?;
        let caller = state
            .identity
            .as_ref()
            .map(|i| i.user_id)
            .ok_or_else(|| ViewError::Authentication("no session".into()))?;

        let mut rows: Vec<Bookmark> = state
            .rows
            .iter()
            .filter(|r| r.owner == caller && filter.matches(r))
            .cloned()
            .collect();
        order.sort(&mut rows);
        if let Some(limit) = limit {
            rows.truncate(limit as usize);
        }
        Ok(Snapshot::new(rows, state.sequence))
    }

    async fn insert(&self, table: &str, record: &NewBookmark) -> ViewResult<Bookmark> {
        self.ensure_connected()?;
        let mut state = self.state.lock();
        state.check(MockOp::Insert, format!("insert {}", record.title))?;
        let caller = state
            .identity
            .as_ref()
            .map(|i| i.user_id)
            .ok_or_else(|| ViewError::Authentication("no session".into()))?;
        if record.owner != caller {
            return Err(ViewError::Authorization("owner does not match session".into()));
        }
        record
            .validate()
            .map_err(|e| ViewError::Rejected(e.to_string()))?;

        state.clock += 1;
        let stored = Bookmark {
            id: BookmarkId::new(),
            url: record.url.clone(),
            title: record.title.clone(),
            created_at: Timestamp::from_millis(state.clock),
            owner: caller,
        };
        state.rows.push(stored.clone());
        state.commit(table, ChangeKind::Insert, stored.clone());
        Ok(stored)
    }

    async fn delete(&self, table: &str, id: BookmarkId) -> ViewResult<()> {
        self.ensure_connected()?;
        let mut state = self.state.lock();
        state.check(MockOp::Delete, format!("delete {id}"))?;
        let caller = state
            .identity
            .as_ref()
            .map(|i| i.user_id)
            .ok_or_else(|| ViewError::Authentication("no session".into()))?;

        if let Some(index) = state
            .rows
            .iter()
            .position(|r| r.id == id && r.owner == caller)
        {
            let record = state.rows.remove(index);
            state.commit(table, ChangeKind::Delete, record);
        }
        Ok(())
    }
}

impl ChangeStream for MockPlatform {
    async fn subscribe(
        &self,
        table: &str,
        filter: &Filter,
        since: u64,
    ) -> ViewResult<Subscription> {
        self.ensure_connected()?;
        let mut state = self.state.lock();
        state.check(MockOp::Subscribe, format!("subscribe {filter} since {since}"))?;

        let id = SubscriptionId(state.next_handle());
        let (tx, rx) = mpsc::unbounded_channel();
        for event in state
            .history
            .iter()
            .filter(|e| e.sequence > since && e.table == table && filter.matches(&e.record))
        {
            // The receiver is still in hand, so this cannot fail.
            let _ = tx.send(event.clone());
        }
        state
            .subscribers
            .push((id, table.to_string(), filter.clone(), tx));
        Ok(Subscription { id, receiver: rx })
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> ViewResult<()> {
        let mut state = self.state.lock();
        state.calls.push(format!("unsubscribe {id}"));
        state.subscribers.retain(|(s, _, _, _)| *s != id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity::new(UserId::new(), "github")
    }

    #[tokio::test]
    async fn mock_not_connected_error() {
        let mock = MockPlatform::new();
        mock.set_connected(false);
        let result = mock.current_identity().await;
        assert!(matches!(result, Err(ViewError::Transport(_))));
    }

    #[tokio::test]
    async fn mock_insert_checks_owner() {
        let mock = MockPlatform::new();
        let alice = identity();
        mock.set_identity(Some(alice.clone()));

        let foreign = NewBookmark::new("x", "https://x.dev", UserId::new());
        let result = mock.insert("bookmarks", &foreign).await;
        assert!(matches!(result, Err(ViewError::Authorization(_))));

        let own = NewBookmark::new("x", "https://x.dev", alice.user_id);
        let stored = mock.insert("bookmarks", &own).await.unwrap();
        assert_eq!(stored.owner, alice.user_id);
        assert_eq!(mock.rows().len(), 1);
    }

    #[tokio::test]
    async fn mock_subscription_backfills_after_cursor() {
        let mock = MockPlatform::new();
        let owner = UserId::new();
        mock.seed("bookmarks", owner, "a", "https://a.dev");
        mock.seed("bookmarks", owner, "b", "https://b.dev");

        let mut sub = mock
            .subscribe("bookmarks", &Filter::owner(owner), 1)
            .await
            .unwrap();
        let event = sub.receiver.try_recv().unwrap();
        assert_eq!(event.sequence, 2);
        assert!(sub.receiver.try_recv().is_err());

        mock.unsubscribe(sub.id).await.unwrap();
        assert_eq!(mock.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn mock_listener_lifecycle() {
        let mock = MockPlatform::new();
        let mut listener = mock.on_identity_change();
        assert_eq!(mock.listener_count(), 1);
        let initial = listener.receiver.try_recv().unwrap();
        assert_eq!(initial.kind, AuthChangeKind::InitialSession);
        assert_eq!(initial.identity, None);

        mock.sign_in_as(identity());
        let change = listener.receiver.try_recv().unwrap();
        assert_eq!(change.kind, AuthChangeKind::SignedIn);

        mock.remove_listener(listener.id);
        assert_eq!(mock.listener_count(), 0);
    }
}
