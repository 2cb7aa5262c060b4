//! Reconciliation properties of the local view under arbitrary delivery.

use marks_protocol::{ChangeEvent, ChangeKind, Snapshot, BOOKMARKS_TABLE};
use marks_sync::{LocalView, Reconciliation};
use marks_testkit::prelude::*;
use proptest::prelude::*;

fn empty_view(script: &EventScript) -> LocalView {
    let mut view = LocalView::new();
    view.replace(script.owner, Snapshot::new(Vec::new(), 0));
    view
}

fn apply_all<'a>(view: &mut LocalView, events: impl IntoIterator<Item = &'a ChangeEvent>) {
    for event in events {
        view.apply(event);
    }
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn in_order_delivery_matches_store(script in event_script_strategy(50)) {
        let mut view = empty_view(&script);
        apply_all(&mut view, &script.events);

        prop_assert_eq!(view.bookmarks(), script.expected.as_slice());
        prop_assert!(view.is_sorted());
    }

    #[test]
    fn duplicate_delivery_is_idempotent(script in event_script_strategy(30)) {
        let mut view = empty_view(&script);
        for event in &script.events {
            view.apply(event);
            let again = view.apply(event);
            prop_assert!(!again.changed());
        }

        prop_assert_eq!(view.bookmarks(), script.expected.as_slice());
    }

    #[test]
    fn deleting_an_absent_row_changes_nothing(
        script in event_script_strategy(30),
        title in title_strategy(),
    ) {
        let mut view = empty_view(&script);
        apply_all(&mut view, &script.events);
        let before = view.bookmarks().to_vec();

        let next = script.events.last().map_or(1, |e| e.sequence + 1);
        let ghost = bookmark(script.owner, next, &title);
        let outcome = view.apply(&ChangeEvent::delete(next, BOOKMARKS_TABLE, ghost));

        prop_assert_eq!(outcome, Reconciliation::AlreadyAbsent);
        prop_assert_eq!(view.bookmarks(), before.as_slice());
    }

    #[test]
    fn any_delivery_order_converges(
        (script, shuffled) in event_script_strategy(40).prop_flat_map(|script| {
            let events = script.events.clone();
            (Just(script), Just(events).prop_shuffle())
        })
    ) {
        let mut view = empty_view(&script);
        apply_all(&mut view, &shuffled);

        prop_assert_eq!(view.bookmarks(), script.expected.as_slice());
        prop_assert!(view.is_sorted());
    }

    #[test]
    fn events_covered_by_the_snapshot_are_stale(
        script in event_script_strategy(40),
        cut in any::<prop::sample::Index>(),
    ) {
        prop_assume!(!script.events.is_empty());
        let split = cut.index(script.events.len());

        // Build the snapshot the store would return after `split` events.
        let mut prefix = empty_view(&script);
        apply_all(&mut prefix, &script.events[..split]);
        let as_of = split
            .checked_sub(1)
            .map_or(0, |i| script.events[i].sequence);

        let mut view = LocalView::new();
        view.replace(script.owner, Snapshot::new(prefix.bookmarks().to_vec(), as_of));

        // The subscription replays everything; the prefix must be dropped.
        for (i, event) in script.events.iter().enumerate() {
            let outcome = view.apply(event);
            if i < split {
                prop_assert_eq!(outcome, Reconciliation::Stale);
            }
        }
        prop_assert_eq!(view.bookmarks(), script.expected.as_slice());
    }

    #[test]
    fn foreign_events_are_ignored(
        script in event_script_strategy(20),
        stranger in user_id_strategy(),
    ) {
        prop_assume!(stranger != script.owner);
        let mut view = empty_view(&script);
        apply_all(&mut view, &script.events);
        let before = view.bookmarks().to_vec();

        let foreign = bookmark(stranger, 1, "not yours");
        for kind in [ChangeKind::Insert, ChangeKind::Delete] {
            let event = ChangeEvent {
                sequence: u64::MAX,
                table: BOOKMARKS_TABLE.to_string(),
                kind,
                record: foreign.clone(),
            };
            prop_assert_eq!(view.apply(&event), Reconciliation::Foreign);
        }
        prop_assert_eq!(view.bookmarks(), before.as_slice());
    }
}
