//! End-to-end scenarios: views mounted over the in-process platform.

use marks_protocol::{Identity, UserId, BOOKMARKS_TABLE};
use marks_sync::{
    BookmarkView, Draft, IdentityTransition, MockOp, MockPlatform, Reconciliation, SessionState,
    ViewConfig, ViewError, ViewUpdate,
};
use marks_testkit::prelude::*;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn added_bookmark_appears_after_one_event() {
    let platform = TestPlatform::new();
    let mut alice = platform.signed_in("alice").await;
    let owner = alice.view.identity().unwrap().user_id;

    alice.view.add("Example", "https://example.com").await.unwrap();
    assert!(alice.view.bookmarks().is_empty());

    let update = tokio::time::timeout(Duration::from_secs(1), alice.view.next_update())
        .await
        .expect("insert event not delivered")
        .unwrap();
    match update {
        ViewUpdate::Reconciled { outcome, .. } => assert_eq!(outcome, Reconciliation::Inserted),
        other => panic!("unexpected update {other:?}"),
    }
    assert_eq!(alice.titles(), vec!["Example"]);
    assert_eq!(alice.view.bookmarks()[0].owner, owner);
}

#[tokio::test]
async fn delete_propagates_to_passive_session() {
    let platform = TestPlatform::new();
    let mut first = platform.signed_in("alice").await;
    let mut second = platform.signed_in("alice").await;
    assert_eq!(first.view.identity(), second.view.identity());

    first.view.add("Older", "https://older.dev").await.unwrap();
    first.view.add("Newer", "https://newer.dev").await.unwrap();
    settle_all(&mut [&mut first, &mut second]).await;
    assert_eq!(first.titles(), vec!["Newer", "Older"]);
    assert_eq!(second.titles(), first.titles());

    let oldest = first.view.bookmarks()[1].id;
    first.view.remove(oldest).await.unwrap();

    // The second session only drains what was pushed to it.
    let deletes_before = second.view.stats().deletes_sent;
    second.settle().await;
    assert_eq!(second.titles(), vec!["Newer"]);
    assert_eq!(second.view.stats().deletes_sent, deletes_before);
    assert_eq!(second.view.stats().fetches, 1);

    first.settle().await;
    assert_eq!(first.titles(), second.titles());
}

#[tokio::test]
async fn blank_title_is_never_sent() {
    let platform = TestPlatform::new();
    let mut alice = platform.signed_in("alice").await;
    let feed_before = platform.platform.feed().latest_sequence();

    let err = alice.view.add("   ", "https://example.com").await.unwrap_err();
    assert!(matches!(err, ViewError::InvalidInput(_)));
    assert!(!err.was_sent());

    let err = alice.view.add("Example", "").await.unwrap_err();
    assert!(matches!(err, ViewError::InvalidInput(_)));

    assert!(platform.platform.bookmarks().is_empty());
    assert_eq!(platform.platform.feed().latest_sequence(), feed_before);
    assert_eq!(alice.view.stats().inserts_sent, 0);
}

#[tokio::test]
async fn identity_switch_clears_previous_rows_even_if_fetch_fails() {
    let mock = Arc::new(MockPlatform::new());
    let alice = Identity::new(UserId::new(), "google");
    let bob = Identity::new(UserId::new(), "google");
    mock.seed(BOOKMARKS_TABLE, alice.user_id, "Alice's", "https://a.dev");
    mock.set_identity(Some(alice.clone()));

    let mut view = BookmarkView::new(ViewConfig::default(), mock.clone(), mock.clone(), mock.clone());
    view.mount().await.unwrap();
    view.settle().await;
    assert_eq!(view.bookmarks().len(), 1);

    mock.set_failing(MockOp::Query, true);
    mock.sign_in_as(bob.clone());
    view.settle().await;

    assert_eq!(view.state(), &SessionState::SignedIn(bob));
    assert!(view.bookmarks().is_empty());
    assert!(!view.is_subscribed());
    assert!(view.stats().last_error.is_some());
    assert_eq!(mock.subscriber_count(), 0);

    mock.set_failing(MockOp::Query, false);
    assert_eq!(view.reload().await.unwrap(), 0);
    assert!(view.is_subscribed());
}

#[tokio::test]
async fn unmount_releases_listener_and_subscription() {
    let platform = TestPlatform::new();
    let mut alice = platform.signed_in("alice").await;
    assert_eq!(alice.client.listener_count(), 1);
    assert_eq!(platform.platform.feed().subscriber_count(), 1);

    alice.view.unmount().await;
    assert_eq!(alice.client.listener_count(), 0);
    assert_eq!(platform.platform.feed().subscriber_count(), 0);
    assert!(alice.view.bookmarks().is_empty());

    // Later writes reach nobody.
    let mut bob = platform.signed_in("bob").await;
    bob.view.add("Bob's", "https://b.dev").await.unwrap();
    assert_eq!(alice.view.next_update().await, None);
}

#[tokio::test]
async fn remount_restores_rows_and_subscription() {
    let platform = TestPlatform::new();
    let mut alice = platform.signed_in("alice").await;
    alice.view.add("Example", "https://example.com").await.unwrap();
    alice.settle().await;

    alice.view.unmount().await;
    alice.view.mount().await.unwrap();
    alice.settle().await;

    assert!(alice.view.identity().is_some());
    assert!(alice.view.is_subscribed());
    assert_eq!(alice.titles(), vec!["Example"]);
    assert_eq!(alice.client.listener_count(), 1);
    assert_eq!(platform.platform.feed().subscriber_count(), 1);

    alice.view.add("After", "https://after.dev").await.unwrap();
    alice.settle().await;
    assert_eq!(alice.titles(), vec!["After", "Example"]);
}

#[tokio::test]
async fn signing_in_again_recovers_a_dropped_subscription() {
    let platform = TestPlatform::new();
    let mut alice = platform.signed_in("alice").await;
    let mut writer = platform.signed_in("alice").await;

    platform.platform.feed().disconnect_all();
    settle_all(&mut [&mut alice, &mut writer]).await;
    assert!(!alice.view.is_subscribed());

    writer.view.reload().await.unwrap();
    writer.view.add("Missed", "https://missed.dev").await.unwrap();
    alice.settle().await;
    assert!(alice.titles().is_empty());

    alice.sign_in("alice").await;
    assert!(alice.view.is_subscribed());
    assert_eq!(alice.titles(), vec!["Missed"]);
    assert_eq!(alice.view.stats().fetches, 2);
}

#[tokio::test]
async fn foreign_rows_are_never_delivered() {
    let platform = TestPlatform::new();
    let mut alice = platform.signed_in("alice").await;
    let mut bob = platform.signed_in("bob").await;

    bob.view.add("Bob's", "https://b.dev").await.unwrap();
    alice.view.add("Alice's", "https://a.dev").await.unwrap();
    settle_all(&mut [&mut alice, &mut bob]).await;

    assert_eq!(alice.titles(), vec!["Alice's"]);
    assert_eq!(bob.titles(), vec!["Bob's"]);
    assert_eq!(alice.view.stats().events_ignored, 0);
    assert_eq!(bob.view.stats().events_ignored, 0);

    // Bob cannot delete Alice's row, even by id.
    let alice_row = alice.view.bookmarks()[0].id;
    let err = bob.view.remove(alice_row).await.unwrap_err();
    assert!(matches!(err, ViewError::NotVisible(_)));
    assert_eq!(platform.platform.bookmarks().len(), 2);
}

#[tokio::test]
async fn sign_out_clears_the_view() {
    let platform = TestPlatform::new();
    let mut alice = platform.signed_in("alice").await;
    alice.view.add("Example", "https://example.com").await.unwrap();
    alice.settle().await;
    assert_eq!(alice.view.bookmarks().len(), 1);

    alice.view.sign_out().await.unwrap();
    alice.settle().await;

    assert_eq!(alice.view.state(), &SessionState::SignedOut);
    assert!(alice.view.bookmarks().is_empty());
    assert!(!alice.view.is_subscribed());
    assert_eq!(platform.platform.feed().subscriber_count(), 0);
    assert_eq!(alice.client.access_token(), None);

    let err = alice.view.add("Again", "https://example.com").await.unwrap_err();
    assert!(matches!(err, ViewError::NotAuthenticated));
}

#[tokio::test]
async fn persisted_session_is_restored_on_mount() {
    let platform = TestPlatform::new();
    let mut first = platform.signed_in("alice").await;
    first.view.add("Example", "https://example.com").await.unwrap();
    first.settle().await;
    let token = first.client.access_token().unwrap();

    let mut restored = platform.restored(&token).await;
    assert_eq!(restored.view.identity(), first.view.identity());
    assert_eq!(restored.titles(), vec!["Example"]);
    assert!(restored.view.is_subscribed());

    // The initial-session notification names the same user.
    assert_eq!(restored.settle().await, 0);
}

#[tokio::test]
async fn invalid_persisted_session_mounts_signed_out() {
    let platform = TestPlatform::new();
    let session = platform.restored("not-a-token").await;
    assert_eq!(session.view.state(), &SessionState::SignedOut);
    assert_eq!(session.client.access_token(), None);
}

#[tokio::test]
async fn revoked_session_keeps_the_draft() {
    let platform = TestPlatform::new();
    let mut alice = platform.signed_in("alice").await;
    let token = alice.client.access_token().unwrap();
    platform.platform.auth().revoke(&token).unwrap();

    *alice.view.draft_mut() = Draft::new("Example", "https://example.com");
    let err = alice.view.submit().await.unwrap_err();
    assert!(matches!(err, ViewError::Authentication(_)));
    assert!(err.was_sent());
    assert_eq!(alice.view.draft().title, "Example");
    assert!(alice.view.stats().last_error.is_some());
    assert!(platform.platform.bookmarks().is_empty());
}

#[tokio::test]
async fn token_refresh_keeps_the_list() {
    let platform = TestPlatform::new();
    let mut alice = platform.signed_in("alice").await;
    alice.view.add("Example", "https://example.com").await.unwrap();
    alice.settle().await;
    let fetches = alice.view.stats().fetches;

    alice.client.refresh_session().unwrap();
    let update = alice.view.next_update().await;
    assert_eq!(
        update,
        Some(ViewUpdate::Identity(IdentityTransition::Unchanged))
    );
    assert_eq!(alice.titles(), vec!["Example"]);
    assert_eq!(alice.view.stats().fetches, fetches);
}
