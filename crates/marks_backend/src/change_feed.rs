//! Change feed for observing committed bookmark writes.
//!
//! The change feed:
//! - Emits only committed operations
//! - Preserves commit order
//! - Delivers an event only to subscribers whose filter matches and who
//!   own the row
//! - Retains recent history so a subscription can start from a snapshot's
//!   sequence without missing anything

use marks_protocol::{Bookmark, ChangeEvent, ChangeKind, Filter, UserId};
use marks_sync::{Subscription, SubscriptionId};
use parking_lot::RwLock;
use std::collections::VecDeque;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, warn};

struct Subscriber {
    id: SubscriptionId,
    table: String,
    filter: Filter,
    viewer: UserId,
    sender: UnboundedSender<ChangeEvent>,
}

impl Subscriber {
    fn wants(&self, event: &ChangeEvent) -> bool {
        self.table == event.table
            && self.viewer == event.record.owner
            && self.filter.matches(&event.record)
    }
}

#[derive(Default)]
struct FeedState {
    sequence: u64,
    next_subscriber: u64,
    history: VecDeque<ChangeEvent>,
    subscribers: Vec<Subscriber>,
}

/// Distributes committed writes to filtered subscribers.
pub struct ChangeFeed {
    state: RwLock<FeedState>,
    max_history: usize,
}

impl ChangeFeed {
    /// Creates a change feed.
    pub fn new() -> Self {
        Self::with_max_history(10_000)
    }

    /// Creates a change feed with a specific history limit.
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            state: RwLock::new(FeedState::default()),
            max_history,
        }
    }

    /// Records a committed write and delivers it.
    ///
    /// Assigns the next sequence number. Subscribers whose channel is closed
    /// are dropped.
    pub fn publish(&self, table: &str, kind: ChangeKind, record: Bookmark) -> ChangeEvent {
        let mut state = self.state.write();
        state.sequence += 1;
        let event = ChangeEvent {
            sequence: state.sequence,
            table: table.to_string(),
            kind,
            record,
        };

        state.history.push_back(event.clone());
        while state.history.len() > self.max_history {
            state.history.pop_front();
        }

        state.subscribers.retain(|sub| {
            if !sub.wants(&event) {
                return true;
            }
            let delivered = sub.sender.send(event.clone()).is_ok();
            if !delivered {
                debug!(subscription = %sub.id, "dropping closed subscriber");
            }
            delivered
        });
        event
    }

    /// Opens a subscription for `viewer`.
    ///
    /// Retained events after `since` that the subscriber may see are queued
    /// first; live events follow in commit order.
    pub fn subscribe(
        &self,
        table: &str,
        filter: &Filter,
        viewer: UserId,
        since: u64,
    ) -> Subscription {
        let mut state = self.state.write();
        state.next_subscriber += 1;
        let id = SubscriptionId(state.next_subscriber);
        let (sender, receiver) = mpsc::unbounded_channel();

        let subscriber = Subscriber {
            id,
            table: table.to_string(),
            filter: filter.clone(),
            viewer,
            sender,
        };

        if let Some(oldest) = state.history.front() {
            if oldest.sequence > since + 1 {
                warn!(
                    subscription = %id,
                    since,
                    oldest = oldest.sequence,
                    "backfill requested beyond retained history"
                );
            }
        }
        for event in state
            .history
            .iter()
            .filter(|e| e.sequence > since && subscriber.wants(e))
        {
            // The receiver is still in hand, so this cannot fail.
            let _ = subscriber.sender.send(event.clone());
        }

        debug!(subscription = %id, %viewer, filter = %filter, since, "subscriber added");
        state.subscribers.push(subscriber);
        Subscription { id, receiver }
    }

    /// Closes a subscription. Returns true if it was open.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = self.state.write();
        let before = state.subscribers.len();
        state.subscribers.retain(|s| s.id != id);
        state.subscribers.len() != before
    }

    /// Drops every subscriber, closing their channels.
    pub fn disconnect_all(&self) -> usize {
        let mut state = self.state.write();
        let dropped = state.subscribers.len();
        state.subscribers.clear();
        if dropped > 0 {
            warn!(dropped, "all feed subscribers disconnected");
        }
        dropped
    }

    /// Polls events from a sequence cursor.
    ///
    /// Returns events with sequence > cursor, up to limit.
    pub fn poll(&self, cursor: u64, limit: usize) -> Vec<ChangeEvent> {
        self.state
            .read()
            .history
            .iter()
            .filter(|e| e.sequence > cursor)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Returns the sequence of the last published event.
    pub fn latest_sequence(&self) -> u64 {
        self.state.read().sequence
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.state.read().subscribers.len()
    }

    /// Returns the number of events in history.
    pub fn history_len(&self) -> usize {
        self.state.read().history.len()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}
