//! Subscription lifecycle.
//!
//! At most one change-stream subscription is open at a time, always for
//! the identity whose rows are in the local view.

use crate::error::ViewResult;
use crate::local_view::LocalView;
use crate::transport::{BookmarkStore, ChangeStream, SubscriptionId};
use marks_protocol::{ChangeEvent, Filter, Order, UserId};
use std::sync::Arc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

/// Something that arrived on the active subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionEvent {
    /// A change event.
    Change(ChangeEvent),
    /// The feed closed the channel. The subscription is gone.
    Disconnected,
}

struct ActiveSubscription {
    id: SubscriptionId,
    owner: UserId,
    receiver: UnboundedReceiver<ChangeEvent>,
}

/// Opens, tracks and closes the view's subscription.
pub struct SubscriptionManager<S: BookmarkStore, F: ChangeStream> {
    store: Arc<S>,
    stream: Arc<F>,
    table: String,
    fetch_limit: Option<u32>,
    active: Option<ActiveSubscription>,
}

impl<S: BookmarkStore, F: ChangeStream> SubscriptionManager<S, F> {
    /// Creates a manager with nothing open.
    pub fn new(store: Arc<S>, stream: Arc<F>, table: impl Into<String>) -> Self {
        Self {
            store,
            stream,
            table: table.into(),
            fetch_limit: None,
            active: None,
        }
    }

    /// Caps the initial fetch.
    pub fn with_fetch_limit(mut self, limit: Option<u32>) -> Self {
        self.fetch_limit = limit;
        self
    }

    /// Loads `owner`'s rows into `view` and subscribes to their changes.
    ///
    /// Any open subscription is closed and the view emptied before the
    /// fetch. The subscription starts at the snapshot's sequence so nothing
    /// committed in between is missed. If the fetch fails the view stays
    /// empty and nothing is subscribed.
    pub async fn open(&mut self, owner: UserId, view: &mut LocalView) -> ViewResult<usize> {
        self.close().await;
        view.clear();

        let filter = Filter::owner(owner);
        let snapshot = self
            .store
            .query(&self.table, &filter, Order::CreatedAtDesc, self.fetch_limit)
            .await?;
        let as_of = snapshot.as_of;
        view.replace(owner, snapshot);
        debug!(rows = view.len(), as_of, "initial fetch complete");

        let subscription = self.stream.subscribe(&self.table, &filter, as_of).await?;
        info!(subscription = %subscription.id, %owner, since = as_of, "subscribed");
        self.active = Some(ActiveSubscription {
            id: subscription.id,
            owner,
            receiver: subscription.receiver,
        });
        Ok(view.len())
    }

    /// Closes the open subscription, if any. Returns true if one was open.
    ///
    /// Unsubscribe failures are logged; the receiver is dropped regardless.
    pub async fn close(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };
        if let Err(e) = self.stream.unsubscribe(active.id).await {
            warn!(subscription = %active.id, "unsubscribe failed: {e}");
        } else {
            info!(subscription = %active.id, "unsubscribed");
        }
        true
    }

    /// Returns true while a subscription is open.
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Returns the open subscription's id.
    pub fn subscription_id(&self) -> Option<SubscriptionId> {
        self.active.as_ref().map(|a| a.id)
    }

    /// Returns the user the open subscription is filtered on.
    pub fn owner(&self) -> Option<UserId> {
        self.active.as_ref().map(|a| a.owner)
    }

    /// Waits for the next event. Returns `None` if nothing is open.
    pub async fn next_event(&mut self) -> Option<SubscriptionEvent> {
        let active = self.active.as_mut()?;
        let received = active.receiver.recv().await;
        match received {
            Some(event) => Some(SubscriptionEvent::Change(event)),
            None => Some(self.disconnected()),
        }
    }

    /// Returns an already queued event, if any.
    pub fn try_next_event(&mut self) -> Option<SubscriptionEvent> {
        let active = self.active.as_mut()?;
        match active.receiver.try_recv() {
            Ok(event) => Some(SubscriptionEvent::Change(event)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(self.disconnected()),
        }
    }

    fn disconnected(&mut self) -> SubscriptionEvent {
        if let Some(active) = self.active.take() {
            warn!(subscription = %active.id, "change stream disconnected; view is stale");
        }
        SubscriptionEvent::Disconnected
    }
}
