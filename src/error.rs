//! Unified error handling for roomcast.
//!
//! Handler errors carry a stable code used both for metrics labels and for the
//! `error` event sent back to the offending connection.

use roomcast_proto::{ProtocolError, RoomId, ServerEvent};
use thiserror::Error;

// ============================================================================
// Handler Errors (event processing)
// ============================================================================

/// Errors that can occur while handling a client event.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("invalid room id: {0:?}")]
    InvalidRoomId(String),

    #[error("missing payload for {0}")]
    MissingPayload(String),

    #[error("malformed payload for {event}: {reason}")]
    MalformedPayload { event: String, reason: String },

    #[error("not allowed to join {room}: {reason}")]
    Forbidden { room: RoomId, reason: String },

    #[error("not in room {0}")]
    NotInRoom(RoomId),

    #[error("rate limited")]
    RateLimited,

    #[error("message exceeds {limit} characters")]
    ContentTooLong { limit: usize },

    #[error("message is empty")]
    EmptyContent,

    #[error("unknown event: {0}")]
    UnknownEvent(String),

    #[error("already authenticated")]
    AlreadyAuthenticated,

    /// The connection closed while the event was in flight.
    #[error("connection closed")]
    ConnectionClosed,

    #[error("internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidRoomId(_) => "invalid_room_id",
            Self::MissingPayload(_) => "missing_payload",
            Self::MalformedPayload { .. } => "malformed_payload",
            Self::Forbidden { .. } => "forbidden",
            Self::NotInRoom(_) => "not_in_room",
            Self::RateLimited => "rate_limited",
            Self::ContentTooLong { .. } => "content_too_long",
            Self::EmptyContent => "empty_content",
            Self::UnknownEvent(_) => "unknown_event",
            Self::AlreadyAuthenticated => "already_authenticated",
            Self::ConnectionClosed => "connection_closed",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Convert to an `error` event for the offending connection.
    ///
    /// Returns `None` for errors that don't warrant a client-visible reply.
    pub fn to_reply(&self) -> Option<ServerEvent> {
        match self {
            Self::ConnectionClosed | Self::Internal(_) => None,
            _ => Some(ServerEvent::error(self.error_code(), self.to_string())),
        }
    }
}

impl From<ProtocolError> for HandlerError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::InvalidRoomId(raw) => Self::InvalidRoomId(raw),
            ProtocolError::MissingPayload(event) => Self::MissingPayload(event),
            ProtocolError::InvalidPayload { event, source } => {
                // Room ids are validated during deserialization; surface them distinctly.
                let reason = source.to_string();
                if reason.starts_with("invalid room id") {
                    Self::InvalidRoomId(reason)
                } else {
                    Self::MalformedPayload { event, reason }
                }
            }
            ProtocolError::MalformedFrame(e) => Self::MalformedPayload {
                event: "frame".to_string(),
                reason: e.to_string(),
            },
            ProtocolError::Encode(e) => Self::Internal(e.to_string()),
        }
    }
}

/// Result type for event handlers.
pub type HandlerResult = Result<(), HandlerError>;
