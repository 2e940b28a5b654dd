//! Live projection of one room
//!
//! ```text
//! ┌──────────────┐  open()   ┌──────────────┐
//! │ Unsubscribed │ ────────▶ │  Subscribed  │ ◀── snapshot ── RealtimeStore
//! │              │ ◀──────── │              │
//! └──────────────┘  close()  └──────────────┘
//!                                   │ submit_question()
//!                                   ▼
//!                     append rooms/{roomId}/questions
//! ```
//!
//! A submitted question only shows up once the store pushes the snapshot
//! that contains it; the projection is never updated optimistically.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::snapshot::project_room;
use crate::error::{LetmeaskError, LetmeaskResult};
use crate::store::{RealtimeStore, StorePath};
use crate::types::{Identity, Question, QuestionId, QuestionRecord, Room, RoomId};

/// Subscription state of a [`RoomSync`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoomSyncState {
    /// No listener is registered on the room
    #[default]
    Unsubscribed,
    /// Receiving snapshots of the room
    Subscribed,
}

impl fmt::Display for RoomSyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomSyncState::Unsubscribed => write!(f, "Unsubscribed"),
            RoomSyncState::Subscribed => write!(f, "Subscribed"),
        }
    }
}

/// Keeps a local projection of one room in step with the store.
///
/// # Example
///
/// ```ignore
/// let mut sync = RoomSync::new(store, room_id);
/// sync.open();
///
/// let mut changes = sync.watch();
/// while changes.changed().await.is_ok() {
///     let room = changes.borrow().clone();
///     println!("{}: {} question(s)", room.title, room.questions.len());
/// }
///
/// sync.close().await;
/// ```
pub struct RoomSync {
    room_id: RoomId,
    store: Arc<dyn RealtimeStore>,
    projection: Arc<watch::Sender<Room>>,
    listener: Option<JoinHandle<()>>,
}

impl RoomSync {
    /// Create an unsubscribed sync for `room_id`.
    pub fn new(store: Arc<dyn RealtimeStore>, room_id: RoomId) -> Self {
        let (projection, _) = watch::channel(Room::empty(room_id.clone()));
        Self {
            room_id,
            store,
            projection: Arc::new(projection),
            listener: None,
        }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn state(&self) -> RoomSyncState {
        match &self.listener {
            Some(handle) if !handle.is_finished() => RoomSyncState::Subscribed,
            _ => RoomSyncState::Unsubscribed,
        }
    }

    /// Start following `rooms/{roomId}`.
    ///
    /// Every snapshot the store pushes replaces the projection. A snapshot
    /// that cannot be projected is logged and skipped. Calling `open` on a
    /// subscribed sync does nothing.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(&mut self) {
        if self.state() == RoomSyncState::Subscribed {
            debug!(room_id = %self.room_id, "Room already open");
            return;
        }

        let mut subscription = self.store.subscribe(&StorePath::room(&self.room_id));
        let projection = self.projection.clone();
        let room_id = self.room_id.clone();

        self.listener = Some(tokio::spawn(async move {
            while let Some(snapshot) = subscription.recv().await {
                match project_room(&room_id, &snapshot) {
                    Ok(room) => {
                        debug!(
                            %room_id,
                            questions = room.questions.len(),
                            "Applied room snapshot"
                        );
                        projection.send_replace(room);
                    }
                    Err(e) => {
                        warn!(%room_id, error = %e, "Skipping room snapshot");
                    }
                }
            }
            debug!(%room_id, "Room subscription closed by store");
        }));

        info!(room_id = %self.room_id, "Opened room");
    }

    /// Stop following the room and release the store subscription.
    ///
    /// The last projection stays readable. Closing an unsubscribed sync
    /// does nothing.
    pub async fn close(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
            let _ = listener.await;
            info!(room_id = %self.room_id, "Closed room");
        }
    }

    /// Current projection
    pub fn room(&self) -> Room {
        self.projection.borrow().clone()
    }

    pub fn title(&self) -> String {
        self.projection.borrow().title.clone()
    }

    pub fn questions(&self) -> Vec<Question> {
        self.projection.borrow().questions.clone()
    }

    /// Receiver that is notified every time a snapshot replaces the projection
    pub fn watch(&self) -> watch::Receiver<Room> {
        self.projection.subscribe()
    }

    /// Append a question to the room, attributed to `author`.
    ///
    /// Returns `Ok(None)` without contacting the store when `content` is
    /// blank. Otherwise returns the key the store assigned. The projection
    /// is not touched; the question appears with the next snapshot.
    ///
    /// # Errors
    ///
    /// - `LetmeaskError::Unauthenticated` if `author` is `None`
    /// - `LetmeaskError::StoreWrite` if the append fails (not retried)
    pub async fn submit_question(
        &self,
        content: &str,
        author: Option<&Identity>,
    ) -> LetmeaskResult<Option<QuestionId>> {
        if content.trim().is_empty() {
            return Ok(None);
        }

        let author = author.ok_or(LetmeaskError::Unauthenticated)?;

        let payload = serde_json::to_value(QuestionRecord::new(content, author.author()))?;
        let key = self
            .store
            .append(&StorePath::room_questions(&self.room_id), payload)
            .await?;

        info!(room_id = %self.room_id, question = %key, "Submitted question");
        Ok(Some(key.into()))
    }
}

impl Drop for RoomSync {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}
