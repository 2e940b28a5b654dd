//! Core types for Letmeask

use serde::{Deserialize, Serialize};

use crate::error::{LetmeaskError, LetmeaskResult};

/// Characters the store refuses inside a single key
const RESERVED_KEY_CHARS: &[char] = &['/', '.', '#', '$', '[', ']'];

/// Identifier of a room, as assigned by the store and shared as a room code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Parse a room code entered by a user or taken from a route.
    ///
    /// Surrounding whitespace is ignored. The code must be non-empty and
    /// usable as a single store key.
    pub fn parse(code: &str) -> LetmeaskResult<Self> {
        let code = code.trim();
        if code.is_empty() || code.contains(RESERVED_KEY_CHARS) {
            return Err(LetmeaskError::InvalidRoomId(code.to_string()));
        }
        Ok(Self(code.to_string()))
    }

    /// Get the room code
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Store-assigned key of a question, unique within its room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(String);

impl QuestionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for QuestionId {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&str> for QuestionId {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl std::fmt::Display for QuestionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw account record reported by an identity provider.
///
/// Profile fields are optional at this level; [`Identity::from_account`]
/// decides whether the account is usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub uid: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

/// An authenticated participant.
///
/// Only ever built from an account that carries a uid, a display name and
/// a photo URL. Partial identities do not exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    id: String,
    display_name: String,
    avatar_url: String,
}

impl Identity {
    /// Validate a provider account.
    ///
    /// # Errors
    ///
    /// Returns `LetmeaskError::MissingProfileData` when the display name or
    /// the photo URL is absent or empty.
    pub fn from_account(account: &Account) -> LetmeaskResult<Self> {
        match (non_empty(&account.display_name), non_empty(&account.photo_url)) {
            (Some(display_name), Some(avatar_url)) => Ok(Self {
                id: account.uid.clone(),
                display_name,
                avatar_url,
            }),
            _ => Err(LetmeaskError::MissingProfileData {
                uid: account.uid.clone(),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn avatar_url(&self) -> &str {
        &self.avatar_url
    }

    /// Copy the display fields for attribution
    pub fn author(&self) -> Author {
        Author {
            name: self.display_name.clone(),
            avatar: self.avatar_url.clone(),
        }
    }
}

fn non_empty(field: &Option<String>) -> Option<String> {
    field.as_deref().filter(|s| !s.is_empty()).map(str::to_string)
}

/// Display fields of the participant who submitted a question, frozen at
/// submission time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub avatar: String,
}

/// A question as it is stored under `rooms/{roomId}/questions/{key}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRecord {
    pub content: String,
    pub author: Author,
    #[serde(default)]
    pub is_answered: bool,
    #[serde(default)]
    pub is_highlighted: bool,
}

impl QuestionRecord {
    /// A freshly submitted question: neither answered nor highlighted
    pub fn new(content: impl Into<String>, author: Author) -> Self {
        Self {
            content: content.into(),
            author,
            is_answered: false,
            is_highlighted: false,
        }
    }
}

/// A room as it is stored under `rooms/{roomId}`, without its questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRecord {
    pub title: String,
    pub author_id: String,
}

/// One question in a room projection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub content: String,
    pub author: Author,
    pub is_answered: bool,
    pub is_highlighted: bool,
}

impl Question {
    pub fn from_record(id: QuestionId, record: QuestionRecord) -> Self {
        Self {
            id,
            content: record.content,
            author: record.author,
            is_answered: record.is_answered,
            is_highlighted: record.is_highlighted,
        }
    }
}

/// Local projection of one room.
///
/// `questions` keeps the order in which the store presented its entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub title: String,
    pub questions: Vec<Question>,
}

impl Room {
    /// Projection of a room whose record has not arrived or does not exist
    pub fn empty(id: RoomId) -> Self {
        Self {
            id,
            title: String::new(),
            questions: Vec::new(),
        }
    }
}
