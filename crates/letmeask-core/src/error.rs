//! Error types for the Letmeask realtime core

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for Letmeask operations
#[derive(Error, Debug)]
pub enum LetmeaskError {
    /// The provider returned an account without a display name or photo URL
    #[error("Missing information from account {uid}: display name and photo URL are required")]
    MissingProfileData {
        /// Provider uid of the rejected account
        uid: String,
    },

    /// The interactive sign-in flow failed or was dismissed
    #[error("Sign-in failed: {0}")]
    ProviderAuth(String),

    /// An action that requires a signed-in participant was attempted anonymously
    #[error("You must be logged in")]
    Unauthenticated,

    /// The store rejected an append
    #[error("Store write failed: {0}")]
    StoreWrite(String),

    /// The store could not serve a read
    #[error("Store read failed: {0}")]
    StoreRead(String),

    /// No room record exists under the given code
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    /// Room code is empty or contains characters the store cannot key on
    #[error("Invalid room id: {0:?}")]
    InvalidRoomId(String),

    /// Error during serialization/deserialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The database file is locked by another process
    #[error("Database is already in use by another process: {}", .0.display())]
    DatabaseInUse(PathBuf),

    /// Database creation/opening error
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    /// Transaction error
    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    /// Table error
    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    /// Storage operation error
    #[error("Storage operation error: {0}")]
    StorageOp(#[from] redb::StorageError),

    /// Commit error
    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for LetmeaskError {
    fn from(err: serde_json::Error) -> Self {
        LetmeaskError::Serialization(err.to_string())
    }
}

/// Result type alias using LetmeaskError
pub type LetmeaskResult<T> = Result<T, LetmeaskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LetmeaskError::RoomNotFound("-Nx1".to_string());
        assert_eq!(format!("{}", err), "Room not found: -Nx1");

        assert_eq!(
            format!("{}", LetmeaskError::Unauthenticated),
            "You must be logged in"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: LetmeaskError = io_err.into();
        assert!(matches!(err, LetmeaskError::Io(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: LetmeaskError = json_err.into();
        assert!(matches!(err, LetmeaskError::Serialization(_)));
    }
}
