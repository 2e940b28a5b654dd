//! Realtime store interface
//!
//! The store holds a tree of JSON records addressed by slash-separated
//! paths. Subscribers receive a complete snapshot of their path whenever
//! anything under it changes, and `append` adds a child under a
//! store-generated key.
//!
//! ## Path convention
//!
//! ```text
//! rooms/                         # append target for new rooms
//! └── {roomId}                   # { title, authorId, questions? }
//!     └── questions/             # append target for new questions
//!         └── {key}              # { content, author, isAnswered, isHighlighted }
//! ```

use async_trait::async_trait;
use serde_json::Value;

use crate::error::LetmeaskResult;
use crate::sync::Subscription;
use crate::types::RoomId;

pub mod memory;

pub use memory::MemoryStore;

const ROOMS: &str = "rooms";
const QUESTIONS: &str = "questions";

/// Slash-separated location in the store tree
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct StorePath {
    segments: Vec<String>,
}

impl StorePath {
    /// The root of the tree
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a path, ignoring empty segments (`"/rooms//r1/"` is `rooms/r1`)
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// `rooms`
    pub fn rooms() -> Self {
        Self::root().child(ROOMS)
    }

    /// `rooms/{roomId}`
    pub fn room(room_id: &RoomId) -> Self {
        Self::rooms().child(room_id.as_str())
    }

    /// `rooms/{roomId}/questions`
    pub fn room_questions(room_id: &RoomId) -> Self {
        Self::room(room_id).child(QUESTIONS)
    }

    pub fn child(&self, key: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(key.to_string());
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// True if `self` is `other` or one of its ancestors
    pub fn contains(&self, other: &StorePath) -> bool {
        other.segments.starts_with(&self.segments)
    }

    /// True if a write at one path changes the snapshot at the other
    pub fn overlaps(&self, other: &StorePath) -> bool {
        self.contains(other) || other.contains(self)
    }
}

impl std::fmt::Display for StorePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// A remote tree-structured store that pushes full-subtree snapshots.
#[async_trait]
pub trait RealtimeStore: Send + Sync {
    /// Register a continuous listener on `path`.
    ///
    /// The current value is delivered first, then one complete snapshot
    /// per change under `path`. An absent value is delivered as
    /// `Value::Null`.
    fn subscribe(&self, path: &StorePath) -> Subscription<Value>;

    /// Add `value` as a new child of `path` and return its generated key.
    ///
    /// # Errors
    ///
    /// Returns `LetmeaskError::StoreWrite` if the store rejects the write.
    async fn append(&self, path: &StorePath, value: Value) -> LetmeaskResult<String>;

    /// Read the current value at `path` once.
    ///
    /// # Errors
    ///
    /// Returns `LetmeaskError::StoreRead` if the store cannot serve the read.
    async fn get(&self, path: &StorePath) -> LetmeaskResult<Option<Value>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_convention() {
        let room_id = RoomId::parse("r1").unwrap();
        assert_eq!(StorePath::rooms().to_string(), "rooms");
        assert_eq!(StorePath::room(&room_id).to_string(), "rooms/r1");
        assert_eq!(
            StorePath::room_questions(&room_id).to_string(),
            "rooms/r1/questions"
        );
    }

    #[test]
    fn test_parse_ignores_empty_segments() {
        assert_eq!(StorePath::parse("/rooms//r1/"), StorePath::parse("rooms/r1"));
        assert!(StorePath::parse("/").is_root());
    }

    #[test]
    fn test_overlaps() {
        let room = StorePath::parse("rooms/r1");
        let questions = StorePath::parse("rooms/r1/questions");
        let other = StorePath::parse("rooms/r2");

        assert!(room.contains(&questions));
        assert!(!questions.contains(&room));
        assert!(room.overlaps(&questions));
        assert!(questions.overlaps(&room));
        assert!(StorePath::root().overlaps(&other));
        assert!(!room.overlaps(&other));
        assert!(!StorePath::parse("rooms/r").overlaps(&room));
    }
}
