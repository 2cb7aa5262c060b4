//! Local view state.
//!
//! The in-memory copy of the signed-in user's bookmarks, kept sorted by
//! `created_at` descending with unique ids. It is mutated only by a
//! wholesale [`LocalView::replace`] from a snapshot, by [`LocalView::clear`],
//! and by applying change events.
//!
//! Event delivery order is not trusted. Each event carries the store's
//! commit sequence, so events already reflected in the snapshot are
//! dropped; removed ids are remembered for the rest of the session so a
//! late insert cannot resurrect them; inserts go to their sorted position.

use marks_protocol::{Bookmark, BookmarkId, ChangeEvent, ChangeKind, Order, Snapshot, UserId};
use std::collections::HashSet;

/// Outcome of applying one change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// The record was added.
    Inserted,
    /// The record was removed.
    Removed,
    /// Insert of an id already present.
    Duplicate,
    /// Delete of an id not present.
    AlreadyAbsent,
    /// The event is at or below the snapshot sequence.
    Stale,
    /// Insert of an id already removed in this session.
    Tombstoned,
    /// The record belongs to someone else.
    Foreign,
    /// The event kind is not reconciled.
    Ignored(ChangeKind),
}

impl Reconciliation {
    /// Returns true if the visible list changed.
    pub fn changed(&self) -> bool {
        matches!(self, Reconciliation::Inserted | Reconciliation::Removed)
    }
}

/// The local, sorted copy of one user's bookmarks.
#[derive(Debug, Default)]
pub struct LocalView {
    owner: Option<UserId>,
    items: Vec<Bookmark>,
    tombstones: HashSet<BookmarkId>,
    as_of: u64,
    last_sequence: u64,
}

impl LocalView {
    /// Creates an empty view with no owner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the contents with a snapshot of `owner`'s rows.
    ///
    /// Rows owned by anyone else are dropped, the rest are sorted and
    /// deduplicated.
    pub fn replace(&mut self, owner: UserId, snapshot: Snapshot) {
        let mut rows: Vec<Bookmark> = snapshot
            .rows
            .into_iter()
            .filter(|r| r.owner == owner)
            .collect();
        Order::CreatedAtDesc.sort(&mut rows);
        let mut seen = HashSet::new();
        rows.retain(|r| seen.insert(r.id));

        self.owner = Some(owner);
        self.items = rows;
        self.tombstones.clear();
        self.as_of = snapshot.as_of;
        self.last_sequence = snapshot.as_of;
    }

    /// Empties the view and forgets its owner.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Applies one change event.
    pub fn apply(&mut self, event: &ChangeEvent) -> Reconciliation {
        match self.owner {
            Some(owner) if owner == event.record.owner => {}
            _ => return Reconciliation::Foreign,
        }
        if event.sequence <= self.as_of {
            return Reconciliation::Stale;
        }
        self.last_sequence = self.last_sequence.max(event.sequence);

        match event.kind {
            ChangeKind::Insert => self.insert(&event.record),
            ChangeKind::Delete => self.remove(event.record.id),
            ChangeKind::Update => Reconciliation::Ignored(ChangeKind::Update),
        }
    }

    fn insert(&mut self, record: &Bookmark) -> Reconciliation {
        if self.tombstones.contains(&record.id) {
            return Reconciliation::Tombstoned;
        }
        if self.contains(record.id) {
            return Reconciliation::Duplicate;
        }
        let key = record.newest_first_key();
        let pos = self.items.partition_point(|b| b.newest_first_key() < key);
        self.items.insert(pos, record.clone());
        Reconciliation::Inserted
    }

    fn remove(&mut self, id: BookmarkId) -> Reconciliation {
        self.tombstones.insert(id);
        match self.items.iter().position(|b| b.id == id) {
            Some(pos) => {
                self.items.remove(pos);
                Reconciliation::Removed
            }
            None => Reconciliation::AlreadyAbsent,
        }
    }

    /// Returns true if a bookmark with `id` is visible.
    pub fn contains(&self, id: BookmarkId) -> bool {
        self.items.iter().any(|b| b.id == id)
    }

    /// Returns the visible bookmark with `id`.
    pub fn get(&self, id: BookmarkId) -> Option<&Bookmark> {
        self.items.iter().find(|b| b.id == id)
    }

    /// Returns the visible bookmarks, newest first.
    pub fn bookmarks(&self) -> &[Bookmark] {
        &self.items
    }

    /// Returns the number of visible bookmarks.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if nothing is visible.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the user whose rows the view holds.
    pub fn owner(&self) -> Option<UserId> {
        self.owner
    }

    /// Returns the sequence of the snapshot the view was built from.
    pub fn as_of(&self) -> u64 {
        self.as_of
    }

    /// Returns the highest sequence reflected in the view.
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    /// Returns true if the items are sorted newest first with unique ids.
    pub fn is_sorted(&self) -> bool {
        let sorted = self
            .items
            .windows(2)
            .all(|w| w[0].newest_first_key() < w[1].newest_first_key());
        let ids: HashSet<BookmarkId> = self.items.iter().map(|b| b.id).collect();
        sorted && ids.len() == self.items.len()
    }
}
