//! RoomSync Integration Tests
//!
//! These tests drive a RoomSync against the in-process store and verify
//! that the projection follows the store's snapshots, and nothing else.
//!
//! ## Test Scenarios
//!
//! - Snapshot projection: title, ordering, empty rooms, duplicates
//! - Submit gating: blank content, anonymous participants
//! - Append shape and round-trip visibility of new questions
//! - Moderation changes observed as new snapshots
//! - Releasing the subscription on close

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use letmeask_core::{
    Account, Author, Identity, LetmeaskError, LetmeaskResult, MemoryStore, Question, RealtimeStore,
    Room, RoomId, RoomSync, RoomSyncState, StorePath, Subscription,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::watch;

// ============================================================================
// Test Utilities
// ============================================================================

/// MemoryStore wrapper that records every append
#[derive(Clone, Default)]
struct RecordingStore {
    inner: MemoryStore,
    appends: Arc<Mutex<Vec<(String, Value)>>>,
}

impl RecordingStore {
    fn appends(&self) -> Vec<(String, Value)> {
        self.appends.lock().clone()
    }
}

#[async_trait]
impl RealtimeStore for RecordingStore {
    fn subscribe(&self, path: &StorePath) -> Subscription<Value> {
        self.inner.subscribe(path)
    }

    async fn append(&self, path: &StorePath, value: Value) -> LetmeaskResult<String> {
        self.appends.lock().push((path.to_string(), value.clone()));
        self.inner.append(path, value).await
    }

    async fn get(&self, path: &StorePath) -> LetmeaskResult<Option<Value>> {
        self.inner.get(path).await
    }
}

/// Store whose writes always fail
struct UnreachableStore {
    attempts: AtomicUsize,
}

#[async_trait]
impl RealtimeStore for UnreachableStore {
    fn subscribe(&self, _path: &StorePath) -> Subscription<Value> {
        let (_tx, subscription) = Subscription::channel(|| {});
        subscription
    }

    async fn append(&self, _path: &StorePath, _value: Value) -> LetmeaskResult<String> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(LetmeaskError::StoreWrite("network unreachable".to_string()))
    }

    async fn get(&self, _path: &StorePath) -> LetmeaskResult<Option<Value>> {
        Err(LetmeaskError::StoreRead("network unreachable".to_string()))
    }
}

fn identity(name: &str, avatar: &str) -> Identity {
    Identity::from_account(&Account {
        uid: format!("uid-{}", name.to_lowercase()),
        display_name: Some(name.to_string()),
        photo_url: Some(avatar.to_string()),
    })
    .unwrap()
}

fn room_id(code: &str) -> RoomId {
    RoomId::parse(code).unwrap()
}

fn question_json(content: &str, name: &str, avatar: &str) -> Value {
    json!({
        "content": content,
        "author": {"name": name, "avatar": avatar},
        "isAnswered": false,
        "isHighlighted": false
    })
}

/// Wait for the next projection published after the last one seen
async fn next_room(rx: &mut watch::Receiver<Room>) -> Room {
    tokio::time::timeout(Duration::from_secs(2), rx.changed())
        .await
        .expect("timed out waiting for a projection")
        .expect("projection sender dropped");
    rx.borrow_and_update().clone()
}

/// Open a sync on `code` and wait until the initial snapshot is applied
async fn open_room(store: Arc<dyn RealtimeStore>, code: &str) -> (RoomSync, watch::Receiver<Room>) {
    let mut sync = RoomSync::new(store, room_id(code));
    let mut rx = sync.watch();
    sync.open();
    next_room(&mut rx).await;
    (sync, rx)
}

// ============================================================================
// Projection Tests
// ============================================================================

/// End-to-end: initial snapshot, submit, round trip, store order
#[tokio::test]
async fn test_open_submit_and_observe_round_trip() {
    let store = RecordingStore::default();
    let r1 = room_id("r1");
    store
        .inner
        .set(
            &StorePath::room(&r1),
            json!({"title": "Q&A", "questions": {"k1": question_json("Hi", "Bob", "b.png")}}),
        )
        .unwrap();

    let (mut sync, mut rx) = open_room(Arc::new(store.clone()), "r1").await;

    assert_eq!(sync.state(), RoomSyncState::Subscribed);
    assert_eq!(sync.title(), "Q&A");
    assert_eq!(
        sync.questions(),
        vec![Question {
            id: "k1".into(),
            content: "Hi".to_string(),
            author: Author {
                name: "Bob".to_string(),
                avatar: "b.png".to_string()
            },
            is_answered: false,
            is_highlighted: false,
        }]
    );

    let ana = identity("Ana", "a.png");
    let key = sync
        .submit_question("New?", Some(&ana))
        .await
        .unwrap()
        .expect("content is not blank");

    // Not optimistic: nothing changes until the store pushes the snapshot
    assert_eq!(sync.questions().len(), 1);
    assert_eq!(store.appends().len(), 1);

    let room = next_room(&mut rx).await;
    assert_eq!(room.questions.len(), 2);
    assert_eq!(room.questions[0].id.as_str(), "k1");
    assert_eq!(room.questions[1].id, key);
    assert_eq!(room.questions[1].content, "New?");
    assert_eq!(room.questions[1].author.name, "Ana");

    sync.close().await;
}

/// A room without a questions field projects to an empty list
#[tokio::test]
async fn test_room_without_questions() {
    let store = MemoryStore::new();
    store
        .set(&StorePath::room(&room_id("r1")), json!({"title": "Fresh"}))
        .unwrap();

    let (sync, _rx) = open_room(Arc::new(store), "r1").await;

    assert_eq!(sync.title(), "Fresh");
    assert!(sync.questions().is_empty());
}

/// A room whose record does not exist yet projects to an empty room
#[tokio::test]
async fn test_room_not_yet_populated() {
    let store = MemoryStore::new();
    let (sync, _rx) = open_room(Arc::new(store), "r1").await;

    assert_eq!(sync.room(), Room::empty(room_id("r1")));
}

/// The title is filled in when the room record arrives later
#[tokio::test]
async fn test_title_arrives_later() {
    let store = MemoryStore::new();
    let (sync, mut rx) = open_room(Arc::new(store.clone()), "r1").await;
    assert_eq!(sync.title(), "");

    store
        .set(&StorePath::room(&room_id("r1")).child("title"), json!("Later"))
        .unwrap();

    assert_eq!(next_room(&mut rx).await.title, "Later");
}

/// Delivering the same snapshot twice yields the same projection
#[tokio::test]
async fn test_duplicate_snapshot_same_projection() {
    let store = MemoryStore::new();
    let path = StorePath::room(&room_id("r1"));
    let snapshot = json!({"title": "Q&A", "questions": {"k1": question_json("Hi", "Bob", "b.png")}});
    store.set(&path, snapshot.clone()).unwrap();

    let (sync, mut rx) = open_room(Arc::new(store.clone()), "r1").await;
    let first = sync.room();

    store.set(&path, snapshot).unwrap();
    let second = next_room(&mut rx).await;

    assert_eq!(first, second);
}

/// Questions are listed in the order the store lists their keys
#[tokio::test]
async fn test_questions_follow_store_order() {
    let store = MemoryStore::new();
    let r1 = room_id("r1");
    let (sync, mut rx) = open_room(Arc::new(store.clone()), "r1").await;

    let mut keys = Vec::new();
    for n in 0..5 {
        let key = store
            .append(
                &StorePath::room_questions(&r1),
                question_json(&format!("q{n}"), "Bob", "b.png"),
            )
            .await
            .unwrap();
        keys.push(key);
    }

    // Intermediate snapshots may be coalesced; only the final state matters
    let mut room = next_room(&mut rx).await;
    while room.questions.len() < keys.len() {
        room = next_room(&mut rx).await;
    }

    let ids: Vec<_> = sync.questions().iter().map(|q| q.id.to_string()).collect();
    assert_eq!(ids, keys);
}

/// Moderation changes made elsewhere show up as new snapshots
#[tokio::test]
async fn test_moderation_changes_are_observed() {
    let store = MemoryStore::new();
    let r1 = room_id("r1");
    store
        .set(
            &StorePath::room(&r1),
            json!({"title": "Q&A", "questions": {"k1": question_json("Hi", "Bob", "b.png")}}),
        )
        .unwrap();
    let (_sync, mut rx) = open_room(Arc::new(store.clone()), "r1").await;

    let question = StorePath::room_questions(&r1).child("k1");
    store.set(&question.child("isHighlighted"), json!(true)).unwrap();
    let room = next_room(&mut rx).await;
    assert!(room.questions[0].is_highlighted);
    assert!(!room.questions[0].is_answered);

    store.set(&question.child("isAnswered"), json!(true)).unwrap();
    let room = next_room(&mut rx).await;
    assert!(room.questions[0].is_answered);

    store.set(&question, Value::Null).unwrap();
    assert!(next_room(&mut rx).await.questions.is_empty());
}

/// A snapshot that cannot be projected is skipped, not fatal
#[tokio::test]
async fn test_malformed_snapshot_is_skipped() {
    let store = MemoryStore::new();
    let path = StorePath::room(&room_id("r1"));
    store.set(&path, json!({"title": "Q&A"})).unwrap();
    let (sync, mut rx) = open_room(Arc::new(store.clone()), "r1").await;

    store.set(&path.child("title"), json!(42)).unwrap();
    store.set(&path.child("title"), json!("Fixed")).unwrap();

    assert_eq!(next_room(&mut rx).await.title, "Fixed");
    assert_eq!(sync.state(), RoomSyncState::Subscribed);
}

/// A malformed question entry does not stop later snapshots from applying
#[tokio::test]
async fn test_malformed_question_does_not_freeze_projection() {
    let store = MemoryStore::new();
    let r1 = room_id("r1");
    let path = StorePath::room(&r1);
    store.set(&path, json!({"title": "Q&A"})).unwrap();
    let (sync, mut rx) = open_room(Arc::new(store.clone()), "r1").await;

    store
        .set(&StorePath::room_questions(&r1).child("bad"), json!({"content": "x"}))
        .unwrap();
    let good = store
        .append(&StorePath::room_questions(&r1), question_json("Valid?", "Bob", "b.png"))
        .await
        .unwrap();
    store.set(&path.child("title"), json!("Renamed")).unwrap();

    let mut room = next_room(&mut rx).await;
    while room.title != "Renamed" {
        room = next_room(&mut rx).await;
    }

    assert_eq!(room.questions.len(), 1);
    assert_eq!(room.questions[0].id.as_str(), good);
    assert_eq!(sync.title(), "Renamed");
}

// ============================================================================
// Submit Tests
// ============================================================================

/// Blank content is a no-op without a store call
#[tokio::test]
async fn test_blank_content_is_not_submitted() {
    let store = RecordingStore::default();
    let sync = RoomSync::new(Arc::new(store.clone()), room_id("r1"));
    let ana = identity("Ana", "a.png");

    for content in ["", "   ", "\n\t "] {
        assert_eq!(sync.submit_question(content, Some(&ana)).await.unwrap(), None);
    }

    assert!(store.appends().is_empty());
}

/// Anonymous submission fails without a store call
#[tokio::test]
async fn test_anonymous_submission_fails() {
    let store = RecordingStore::default();
    let sync = RoomSync::new(Arc::new(store.clone()), room_id("r1"));

    let err = sync.submit_question("hi", None).await.unwrap_err();

    assert!(matches!(err, LetmeaskError::Unauthenticated));
    assert!(store.appends().is_empty());
}

/// The appended payload carries the author snapshot and cleared flags
#[tokio::test]
async fn test_append_payload_shape() {
    let store = RecordingStore::default();
    let sync = RoomSync::new(Arc::new(store.clone()), room_id("r1"));
    let before = sync.room();

    sync.submit_question("What is X?", Some(&identity("Ana", "u.png")))
        .await
        .unwrap();

    assert_eq!(
        store.appends(),
        vec![(
            "rooms/r1/questions".to_string(),
            json!({
                "content": "What is X?",
                "author": {"name": "Ana", "avatar": "u.png"},
                "isAnswered": false,
                "isHighlighted": false
            })
        )]
    );
    assert_eq!(sync.room(), before);
}

/// Store failures surface once, with no retry
#[tokio::test]
async fn test_store_write_failure_is_not_retried() {
    let store = Arc::new(UnreachableStore {
        attempts: AtomicUsize::new(0),
    });
    let sync = RoomSync::new(store.clone(), room_id("r1"));

    let err = sync
        .submit_question("hi", Some(&identity("Ana", "a.png")))
        .await
        .unwrap_err();

    assert!(matches!(err, LetmeaskError::StoreWrite(_)));
    assert_eq!(store.attempts.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Lifecycle Tests
// ============================================================================

/// Closing releases the subscription and freezes the projection
#[tokio::test]
async fn test_close_releases_subscription() {
    let store = MemoryStore::new();
    let r1 = room_id("r1");
    let (mut sync, _rx) = open_room(Arc::new(store.clone()), "r1").await;
    assert_eq!(store.subscriber_count(), 1);

    sync.close().await;

    assert_eq!(sync.state(), RoomSyncState::Unsubscribed);
    assert_eq!(store.subscriber_count(), 0);

    store
        .append(&StorePath::room_questions(&r1), question_json("late", "Bob", "b.png"))
        .await
        .unwrap();
    tokio::task::yield_now().await;
    assert!(sync.questions().is_empty());

    // Closing twice is harmless
    sync.close().await;
}

/// Reopening after close picks up the current state again
#[tokio::test]
async fn test_reopen_after_close() {
    let store = MemoryStore::new();
    let r1 = room_id("r1");
    let (mut sync, mut rx) = open_room(Arc::new(store.clone()), "r1").await;
    sync.close().await;

    store
        .append(&StorePath::room_questions(&r1), question_json("while away", "Bob", "b.png"))
        .await
        .unwrap();

    sync.open();
    let room = next_room(&mut rx).await;
    assert_eq!(room.questions.len(), 1);
    assert_eq!(store.subscriber_count(), 1);
}

/// Opening twice keeps a single subscription
#[tokio::test]
async fn test_open_twice_is_a_no_op() {
    let store = MemoryStore::new();
    let (mut sync, _rx) = open_room(Arc::new(store.clone()), "r1").await;

    sync.open();

    assert_eq!(store.subscriber_count(), 1);
}

/// Dropping the sync releases the subscription
#[tokio::test]
async fn test_drop_releases_subscription() {
    let store = MemoryStore::new();
    let (sync, _rx) = open_room(Arc::new(store.clone()), "r1").await;

    drop(sync);
    tokio::task::yield_now().await;

    assert_eq!(store.subscriber_count(), 0);
}

/// Two rooms are independent
#[tokio::test]
async fn test_rooms_are_isolated() {
    let store = MemoryStore::new();
    let (room_a, _rx_a) = open_room(Arc::new(store.clone()), "a").await;
    let (room_b, mut rx_b) = open_room(Arc::new(store.clone()), "b").await;

    room_b
        .submit_question("only in b", Some(&identity("Ana", "a.png")))
        .await
        .unwrap();
    next_room(&mut rx_b).await;

    assert!(room_a.questions().is_empty());
    assert_eq!(room_b.questions().len(), 1);
}
