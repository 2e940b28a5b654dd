//! Subscribe-and-project synchronization for rooms
//!
//! ## Overview
//!
//! Rooms are never polled. A [`RoomSync`] registers a [`Subscription`] on
//! `rooms/{roomId}` and the store pushes a complete snapshot of the room
//! after every change. Each snapshot is projected into a fresh [`Room`]
//! that replaces the previous one wholesale.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  RoomSync (one per open room view)                              │
//! │  ├── Subscription<Value>   snapshots pushed by the store        │
//! │  ├── listener task         project_room() on each snapshot      │
//! │  └── watch::Sender<Room>   current projection                   │
//! │                                                                 │
//! │  submit_question()  ──append──▶  rooms/{roomId}/questions       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`Room`]: crate::types::Room

pub mod room;
pub mod snapshot;
pub mod subscription;

pub use room::{RoomSync, RoomSyncState};
pub use snapshot::project_room;
pub use subscription::Subscription;
