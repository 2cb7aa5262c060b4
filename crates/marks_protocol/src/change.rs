//! Change feed events and query snapshots.

use crate::bookmark::Bookmark;
use serde::{Deserialize, Serialize};

/// Type of change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    /// Row was inserted.
    Insert,
    /// Row was updated.
    Update,
    /// Row was deleted.
    Delete,
}

/// A single row-level change from the store.
///
/// Events are emitted only after the write commits. `sequence` is the
/// store's commit sequence: strictly increasing, never reused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Commit sequence of the write.
    pub sequence: u64,
    /// Table the row belongs to.
    pub table: String,
    /// Type of change.
    pub kind: ChangeKind,
    /// The row after an insert/update, or the removed row for a delete.
    pub record: Bookmark,
}

impl ChangeEvent {
    /// Creates an insert event.
    pub fn insert(sequence: u64, table: impl Into<String>, record: Bookmark) -> Self {
        Self {
            sequence,
            table: table.into(),
            kind: ChangeKind::Insert,
            record,
        }
    }

    /// Creates an update event.
    pub fn update(sequence: u64, table: impl Into<String>, record: Bookmark) -> Self {
        Self {
            sequence,
            table: table.into(),
            kind: ChangeKind::Update,
            record,
        }
    }

    /// Creates a delete event.
    pub fn delete(sequence: u64, table: impl Into<String>, record: Bookmark) -> Self {
        Self {
            sequence,
            table: table.into(),
            kind: ChangeKind::Delete,
            record,
        }
    }
}

/// Result of a store query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Matching rows in the requested order.
    ///
    /// The store caps how many rows one query returns, so a user with more
    /// rows than the cap sees only the newest ones.
    pub rows: Vec<Bookmark>,
    /// Commit sequence the rows reflect.
    ///
    /// Every change with a sequence at or below this value is already
    /// visible in `rows`.
    pub as_of: u64,
}

impl Snapshot {
    /// Creates a snapshot.
    pub fn new(rows: Vec<Bookmark>, as_of: u64) -> Self {
        Self { rows, as_of }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BookmarkId, Timestamp, UserId};

    fn record() -> Bookmark {
        Bookmark {
            id: BookmarkId::new(),
            url: "https://example.com".into(),
            title: "Example".into(),
            created_at: Timestamp::from_millis(1),
            owner: UserId::new(),
        }
    }

    #[test]
    fn constructors_set_kind() {
        let r = record();
        assert_eq!(ChangeEvent::insert(1, "bookmarks", r.clone()).kind, ChangeKind::Insert);
        assert_eq!(ChangeEvent::update(2, "bookmarks", r.clone()).kind, ChangeKind::Update);
        assert_eq!(ChangeEvent::delete(3, "bookmarks", r).kind, ChangeKind::Delete);
    }

    #[test]
    fn kind_wire_names() {
        assert_eq!(serde_json::to_string(&ChangeKind::Delete).unwrap(), "\"DELETE\"");
        let kind: ChangeKind = serde_json::from_str("\"INSERT\"").unwrap();
        assert_eq!(kind, ChangeKind::Insert);
    }
}
