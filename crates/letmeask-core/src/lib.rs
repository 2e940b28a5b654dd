//! Letmeask Core Library
//!
//! Realtime synchronization core for live Q&A rooms.
//!
//! ## Overview
//!
//! Participants sign in, open a room and submit questions. Everyone in the
//! room sees the question list change live as others submit, highlight or
//! answer questions. This crate holds the two pieces that make that work:
//!
//! - **[`AuthSession`]**: owns the single current [`Identity`] of the
//!   process, fed by an [`IdentityProvider`]
//! - **[`RoomSync`]**: keeps a local, ordered projection of one room in step
//!   with a [`RealtimeStore`] by subscribing to full snapshots, and appends
//!   new questions
//!
//! [`RoomDirectory`] creates rooms and resolves room codes.
//! [`MemoryStore`] and [`LocalIdentityProvider`] are local stand-ins for
//! the hosted store and provider.
//!
//! ## Core Principles
//!
//! - **Store is the source of truth**: projections are rebuilt from each
//!   snapshot, never patched or merged
//! - **Round trip, not optimistic**: a submitted question appears when the
//!   store pushes it back
//! - **Single attempt**: nothing is retried; every failure reaches the caller
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use letmeask_core::{AuthSession, Consent, LocalIdentityProvider, MemoryStore, RoomDirectory, RoomSync};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::new());
//!     let auth = AuthSession::start(Arc::new(LocalIdentityProvider::new(
//!         Consent::grant("Ana", "https://example.com/ana.png"),
//!     )));
//!     auth.sign_in_with_google().await?;
//!
//!     let directory = RoomDirectory::new(store.clone());
//!     let room_id = directory
//!         .create_room("Weekly Q&A", auth.current_identity().as_ref())
//!         .await?
//!         .expect("title is not blank");
//!
//!     let mut room = RoomSync::new(store, room_id);
//!     room.open();
//!     room.submit_question("What is X?", auth.current_identity().as_ref()).await?;
//!
//!     let mut changes = room.watch();
//!     changes.changed().await?;
//!     println!("{} question(s)", room.questions().len());
//!
//!     room.close().await;
//!     auth.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod directory;
pub mod error;
pub mod logging;
pub mod storage;
pub mod store;
pub mod sync;
pub mod types;

// Re-exports
pub use auth::{
    AuthEvent, AuthSession, Consent, IdentityProvider, IdentityReader, LocalIdentityProvider,
    ProviderKind,
};
pub use directory::RoomDirectory;
pub use error::{LetmeaskError, LetmeaskResult};
pub use storage::Storage;
pub use store::{MemoryStore, RealtimeStore, StorePath};
pub use sync::{project_room, RoomSync, RoomSyncState, Subscription};
pub use types::*;
