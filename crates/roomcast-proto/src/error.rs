//! Protocol error types.

use thiserror::Error;

/// Errors produced while decoding or encoding protocol frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame was not a JSON object with an `event` field.
    #[error("malformed frame: {0}")]
    MalformedFrame(#[source] serde_json::Error),

    /// The event requires a payload but `data` was absent or null.
    #[error("missing payload for event {0}")]
    MissingPayload(String),

    /// The payload did not match the shape the event requires.
    #[error("invalid payload for event {event}: {source}")]
    InvalidPayload {
        /// Event kind whose payload failed to decode.
        event: String,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// A room identifier failed validation.
    #[error("invalid room id: {0:?}")]
    InvalidRoomId(String),

    /// Serialization of an outbound event failed.
    #[error("encode error: {0}")]
    Encode(#[source] serde_json::Error),
}
