//! Error types for coordinator operations

use thiserror::Error;

use crate::types::SessionStatus;

/// Result type alias for coordinator operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while coordinating sessions
#[derive(Debug, Error)]
pub enum Error {
    /// Referenced user does not exist
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Referenced key-generation session does not exist
    #[error("Key session not found: {0}")]
    KeyNotFound(String),

    /// No key-generation session owns the given room
    #[error("No key session for room: {0}")]
    RoomNotFound(String),

    /// No key-generation session owns the given signing session
    #[error("Signing session not found: {0}")]
    SigningSessionNotFound(String),

    /// Event targets a session that cannot move to the reported status
    #[error("Invalid transition: {from} -> {reported}")]
    InvalidTransition {
        from: SessionStatus,
        reported: SessionStatus,
    },

    /// Reported participant index is outside the session's range
    #[error("Participant index {index} out of range (participants: {bound})")]
    InvalidParticipant { index: u16, bound: u16 },

    /// Reported participant index was never asked to sign
    #[error("Participant index {0} is not part of this signing session")]
    UnknownParticipant(u16),

    /// Invalid session configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Inbound event is missing a required field
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    /// Command channel error
    #[error("Bus error: {0}")]
    Bus(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::MalformedEvent(e.to_string())
    }
}
