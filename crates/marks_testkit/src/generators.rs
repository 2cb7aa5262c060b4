//! Property-based test generators using proptest.
//!
//! Provides strategies for bookmark fields and for causal scripts of
//! change events, together with the store contents each script leaves
//! behind.

use marks_protocol::{
    Bookmark, BookmarkId, ChangeEvent, Order, Timestamp, UserId, BOOKMARKS_TABLE,
};
use proptest::prelude::*;

/// Strategy for generating user ids.
pub fn user_id_strategy() -> impl Strategy<Value = UserId> {
    prop::array::uniform16(any::<u8>()).prop_map(UserId::from_bytes)
}

/// Strategy for generating non-blank titles.
pub fn title_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z0-9][A-Za-z0-9 ]{0,39}").expect("Invalid regex")
}

/// Strategy for generating http(s) urls.
pub fn url_strategy() -> impl Strategy<Value = String> {
    (
        prop_oneof![Just("http"), Just("https")],
        prop::string::string_regex("[a-z]{1,12}").expect("Invalid regex"),
        prop::string::string_regex("[a-z0-9/]{0,16}").expect("Invalid regex"),
    )
        .prop_map(|(scheme, host, path)| format!("{scheme}://{host}.example/{path}"))
}

/// Strategy for generating whitespace-only strings, including the empty one.
pub fn blank_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[ \t\n]{0,4}").expect("Invalid regex")
}

/// One step against the store.
#[derive(Debug, Clone)]
pub enum ScriptOp {
    /// Insert a bookmark with this title.
    Insert(String),
    /// Delete the live row at this index (modulo the live count).
    Delete(usize),
}

/// Strategy for generating a sequence of store operations.
pub fn script_ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<ScriptOp>> {
    prop::collection::vec(
        prop_oneof![
            3 => title_strategy().prop_map(ScriptOp::Insert),
            2 => any::<usize>().prop_map(ScriptOp::Delete),
        ],
        0..max_len,
    )
}

/// Change events a store would emit for a script, in commit order.
#[derive(Debug, Clone)]
pub struct EventScript {
    /// Owner of every row.
    pub owner: UserId,
    /// Events in commit order.
    pub events: Vec<ChangeEvent>,
    /// Store contents after the script, newest first.
    pub expected: Vec<Bookmark>,
}

impl EventScript {
    /// Runs `ops` against a simulated store.
    ///
    /// Deletes against an empty store are skipped, as a real store would
    /// emit nothing for them.
    pub fn build(owner: UserId, ops: &[ScriptOp]) -> Self {
        let mut live: Vec<Bookmark> = Vec::new();
        let mut events = Vec::new();
        let mut sequence = 0u64;

        for op in ops {
            match op {
                ScriptOp::Insert(title) => {
                    sequence += 1;
                    let record = Bookmark {
                        id: BookmarkId::new(),
                        url: format!("https://example.com/{sequence}"),
                        title: title.clone(),
                        created_at: Timestamp::from_millis(sequence),
                        owner,
                    };
                    live.push(record.clone());
                    events.push(ChangeEvent::insert(sequence, BOOKMARKS_TABLE, record));
                }
                ScriptOp::Delete(index) => {
                    if live.is_empty() {
                        continue;
                    }
                    sequence += 1;
                    let record = live.remove(index % live.len());
                    events.push(ChangeEvent::delete(sequence, BOOKMARKS_TABLE, record));
                }
            }
        }

        Order::CreatedAtDesc.sort(&mut live);
        Self {
            owner,
            events,
            expected: live,
        }
    }
}

/// Strategy for generating event scripts.
pub fn event_script_strategy(max_len: usize) -> impl Strategy<Value = EventScript> {
    (user_id_strategy(), script_ops_strategy(max_len))
        .prop_map(|(owner, ops)| EventScript::build(owner, &ops))
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
