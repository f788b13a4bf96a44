//! Error handling utilities for connection management.
//!
//! Provides classification of transport errors and conversion of handshake
//! failures into client-visible `error` events.

use super::handshake::HandshakeError;
use roomcast_proto::ServerEvent;
use tokio_tungstenite::tungstenite::Error as WsError;

/// Error code sent when the credential exchange fails.
pub(super) const AUTH_FAILED: &str = "auth_failed";

/// Classification of transport read errors for appropriate handling.
#[derive(Debug)]
pub(super) enum ReadErrorAction {
    /// The peer went away; nothing more can be written.
    Closed,
    /// Protocol violation - attempt a close frame, then disconnect.
    FatalProtocolError { error_msg: String },
}

/// Classify a transport read error into an actionable category.
pub(super) fn classify_read_error(e: &WsError) -> ReadErrorAction {
    match e {
        WsError::ConnectionClosed | WsError::AlreadyClosed | WsError::Io(_) => {
            ReadErrorAction::Closed
        }
        WsError::Capacity(cap) => ReadErrorAction::FatalProtocolError {
            error_msg: format!("frame too large: {cap}"),
        },
        WsError::Utf8 => ReadErrorAction::FatalProtocolError {
            error_msg: "invalid UTF-8 in text frame".to_string(),
        },
        other => ReadErrorAction::FatalProtocolError {
            error_msg: format!("protocol error: {other}"),
        },
    }
}

/// Convert a handshake failure to the `error` event sent before closing.
///
/// Returns None when the peer is already gone.
pub(super) fn handshake_failure_reply(error: &HandshakeError) -> Option<ServerEvent> {
    match error {
        HandshakeError::Auth(e) => Some(ServerEvent::error(AUTH_FAILED, e.to_string())),
        HandshakeError::Timeout => Some(ServerEvent::error(
            AUTH_FAILED,
            "authentication timed out",
        )),
        HandshakeError::Closed | HandshakeError::Transport(_) => None,
    }
}
