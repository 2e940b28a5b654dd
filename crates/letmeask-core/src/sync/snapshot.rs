//! Conversion from a room snapshot to a room projection
//!
//! A projection is a pure function of one snapshot. Nothing from an
//! earlier projection is carried over, so duplicate or skipped snapshots
//! cannot leave stale questions behind.

use serde_json::Value;
use tracing::warn;

use crate::error::{LetmeaskError, LetmeaskResult};
use crate::types::{Question, QuestionRecord, Room, RoomId};

/// Build the projection of `room_id` from a full snapshot of `rooms/{roomId}`.
///
/// - A null snapshot (no room record) projects to an empty room.
/// - An absent `questions` field is an empty list.
/// - Questions keep the order in which the snapshot lists their keys.
/// - A question entry that cannot be read is logged and left out; the
///   other entries are still projected.
/// - An absent `title` is the empty string.
///
/// # Errors
///
/// Returns `LetmeaskError::Serialization` if the snapshot itself is not
/// shaped like a room record.
pub fn project_room(room_id: &RoomId, snapshot: &Value) -> LetmeaskResult<Room> {
    let record = match snapshot {
        Value::Null => return Ok(Room::empty(room_id.clone())),
        Value::Object(record) => record,
        other => {
            return Err(LetmeaskError::Serialization(format!(
                "room {} snapshot is not an object: {}",
                room_id, other
            )))
        }
    };

    let title = match record.get("title") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(title)) => title.clone(),
        Some(other) => {
            return Err(LetmeaskError::Serialization(format!(
                "room {} title is not a string: {}",
                room_id, other
            )))
        }
    };

    let questions = match record.get("questions") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Object(entries)) => entries
            .iter()
            .filter_map(|(key, value)| {
                match serde_json::from_value::<QuestionRecord>(value.clone()) {
                    Ok(record) => Some(Question::from_record(key.as_str().into(), record)),
                    Err(e) => {
                        warn!(%room_id, question_id = %key, error = %e, "Skipping malformed question");
                        None
                    }
                }
            })
            .collect(),
        Some(other) => {
            return Err(LetmeaskError::Serialization(format!(
                "room {} questions is not a mapping: {}",
                room_id, other
            )))
        }
    };

    Ok(Room {
        id: room_id.clone(),
        title,
        questions,
    })
}
