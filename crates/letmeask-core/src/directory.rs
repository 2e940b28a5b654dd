//! Creating rooms and resolving room codes

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{LetmeaskError, LetmeaskResult};
use crate::store::{RealtimeStore, StorePath};
use crate::types::{Identity, RoomId, RoomRecord};

/// Entry points that lead into a room view.
#[derive(Clone)]
pub struct RoomDirectory {
    store: Arc<dyn RealtimeStore>,
}

impl RoomDirectory {
    pub fn new(store: Arc<dyn RealtimeStore>) -> Self {
        Self { store }
    }

    /// Create a room owned by `author` and return its id.
    ///
    /// Returns `Ok(None)` without contacting the store when `title` is blank.
    ///
    /// # Errors
    ///
    /// - `LetmeaskError::Unauthenticated` if `author` is `None`
    /// - `LetmeaskError::StoreWrite` if the append fails
    pub async fn create_room(
        &self,
        title: &str,
        author: Option<&Identity>,
    ) -> LetmeaskResult<Option<RoomId>> {
        if title.trim().is_empty() {
            return Ok(None);
        }

        let author = author.ok_or(LetmeaskError::Unauthenticated)?;

        let record = RoomRecord {
            title: title.to_string(),
            author_id: author.id().to_string(),
        };
        let key = self
            .store
            .append(&StorePath::rooms(), serde_json::to_value(record)?)
            .await?;
        let room_id = RoomId::parse(&key)?;

        info!(%room_id, "Created room");
        Ok(Some(room_id))
    }

    /// Resolve a room code to an existing room.
    ///
    /// # Errors
    ///
    /// - `LetmeaskError::InvalidRoomId` if the code cannot name a room
    /// - `LetmeaskError::RoomNotFound` if no room record exists for it
    pub async fn join_room(&self, code: &str) -> LetmeaskResult<RoomId> {
        let room_id = RoomId::parse(code)?;

        match self.store.get(&StorePath::room(&room_id)).await? {
            Some(value) if !value.is_null() => {
                debug!(%room_id, "Room exists");
                Ok(room_id)
            }
            _ => Err(LetmeaskError::RoomNotFound(room_id.to_string())),
        }
    }
}
