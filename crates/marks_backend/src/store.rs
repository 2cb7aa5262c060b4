//! The bookmark table and its row-level policy.
//!
//! Every call is made on behalf of a caller. Rows are visible and deletable
//! only by their owner, and an insert must claim the caller as owner.
//! Writes are published to the change feed while the table lock is held,
//! so a snapshot's `as_of` always matches the rows it carries.

use crate::change_feed::ChangeFeed;
use crate::error::{PlatformError, PlatformResult};
use marks_protocol::{
    Bookmark, BookmarkId, ChangeKind, Filter, NewBookmark, Order, Snapshot, Timestamp, UserId,
};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};

struct TableState {
    rows: Vec<Bookmark>,
    last_created: u64,
}

/// A bookmark table guarded by a per-user policy.
pub struct BookmarkTable {
    name: String,
    state: RwLock<TableState>,
    feed: Arc<ChangeFeed>,
    max_rows: u32,
}

impl BookmarkTable {
    /// Creates an empty table publishing to `feed`.
    pub fn new(name: impl Into<String>, feed: Arc<ChangeFeed>, max_rows: u32) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(TableState {
                rows: Vec::new(),
                last_created: 0,
            }),
            feed,
            max_rows,
        }
    }

    /// Returns the table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the caller's rows matching every filter.
    ///
    /// At most `max_rows` rows are returned, whatever `limit` asks for.
    pub fn select(
        &self,
        caller: UserId,
        filters: &[Filter],
        order: Order,
        limit: Option<u32>,
    ) -> Snapshot {
        let state = self.state.read();
        let mut rows: Vec<Bookmark> = state
            .rows
            .iter()
            .filter(|r| r.owner == caller && filters.iter().all(|f| f.matches(r)))
            .cloned()
            .collect();
        order.sort(&mut rows);

        if rows.len() > self.max_rows as usize {
            warn!(
                %caller,
                matched = rows.len(),
                max_rows = self.max_rows,
                "select truncated at the row cap"
            );
        }
        let cap = limit.map_or(self.max_rows, |l| l.min(self.max_rows));
        rows.truncate(cap as usize);
        Snapshot::new(rows, self.feed.latest_sequence())
    }

    /// Inserts a row on behalf of `caller`.
    ///
    /// The store assigns `id` and a `created_at` strictly greater than any
    /// earlier one.
    pub fn insert(&self, caller: UserId, record: NewBookmark) -> PlatformResult<Bookmark> {
        if record.owner != caller {
            warn!(%caller, claimed = %record.owner, "insert rejected by row-level policy");
            return Err(PlatformError::NotAuthorized(
                "new row violates row-level security policy".into(),
            ));
        }
        record.validate()?;

        let mut state = self.state.write();
        let created_at = Timestamp::now().as_millis().max(state.last_created + 1);
        state.last_created = created_at;

        let stored = Bookmark {
            id: BookmarkId::new(),
            url: record.url,
            title: record.title,
            created_at: Timestamp::from_millis(created_at),
            owner: caller,
        };
        state.rows.push(stored.clone());
        let event = self
            .feed
            .publish(&self.name, ChangeKind::Insert, stored.clone());
        debug!(id = %stored.id, sequence = event.sequence, "row inserted");
        Ok(stored)
    }

    /// Deletes the caller's rows matching every filter.
    ///
    /// Rows the caller cannot see are left alone; deleting nothing is not
    /// an error. Returns the deleted rows.
    pub fn delete(&self, caller: UserId, filters: &[Filter]) -> PlatformResult<Vec<Bookmark>> {
        if filters.is_empty() {
            return Err(PlatformError::InvalidRequest(
                "delete requires a filter".into(),
            ));
        }

        let mut state = self.state.write();
        let (deleted, kept): (Vec<Bookmark>, Vec<Bookmark>) = std::mem::take(&mut state.rows)
            .into_iter()
            .partition(|r| r.owner == caller && filters.iter().all(|f| f.matches(r)));
        state.rows = kept;

        for row in &deleted {
            let event = self.feed.publish(&self.name, ChangeKind::Delete, row.clone());
            debug!(id = %row.id, sequence = event.sequence, "row deleted");
        }
        Ok(deleted)
    }

    /// Returns the total number of rows, across all owners.
    pub fn len(&self) -> usize {
        self.state.read().rows.len()
    }

    /// Returns true if the table holds no rows.
    pub fn is_empty(&self) -> bool {
        self.state.read().rows.is_empty()
    }
}
