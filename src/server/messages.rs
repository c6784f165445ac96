//! Canonical wire payload exchanged over the chat rooms.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Canonical chat message as sent by clients and round-tripped through
/// Redis. The `room` field is carried inside the payload so the publish
/// path does not depend on the transport it arrived on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub room: String,
    pub name: String,
    pub message: String,
}

/// Why a structurally valid `ChatMessage` was still rejected.
#[derive(Debug, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("room '{actual}' does not match handler room '{expected}'")]
    RoomMismatch { actual: String, expected: String },
    #[error("sender name must not be empty")]
    EmptyName,
    #[error("message body must not be empty")]
    EmptyMessage,
}

impl ChatMessage {
    /// Check the payload against the room the handler is registered for.
    /// Rejected messages are dropped by the handler, never published.
    pub fn validate(&self, expected_room: &str) -> Result<(), ValidationError> {
        if self.room != expected_room {
            return Err(ValidationError::RoomMismatch {
                actual: self.room.clone(),
                expected: expected_room.to_string(),
            });
        }
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.message.is_empty() {
            return Err(ValidationError::EmptyMessage);
        }
        Ok(())
    }
}
