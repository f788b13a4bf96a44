//! Client and server event types.
//!
//! Both directions share the adjacently-tagged JSON layout
//! `{"event": "<kind>", "data": <payload>}`.

use crate::{ProtocolError, RoomId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event kind names as they appear on the wire.
pub mod kind {
    /// Client: present a bearer credential during the handshake.
    pub const AUTHENTICATE: &str = "authenticate";
    /// Client: join a room.
    pub const JOIN_ROOM: &str = "join-room";
    /// Client: leave a room.
    pub const LEAVE_ROOM: &str = "leave-room";
    /// Client: send a message to a room.
    pub const SEND_MESSAGE: &str = "send-message";
    /// Client: start (or keep) typing in a room.
    pub const TYPING: &str = "typing";
    /// Client: stop typing in a room.
    pub const STOP_TYPING: &str = "stop-typing";
    /// Client: mark a message as read.
    pub const MESSAGE_READ: &str = "message-read";

    /// Server: handshake completed.
    pub const READY: &str = "ready";
    /// Server: a message was posted to a room.
    pub const NEW_MESSAGE: &str = "new-message";
    /// Server: someone joined a room.
    pub const USER_JOINED: &str = "user-joined";
    /// Server: someone left a room.
    pub const USER_LEFT: &str = "user-left";
    /// Server: someone is typing.
    pub const USER_TYPING: &str = "user-typing";
    /// Server: someone stopped typing.
    pub const USER_STOP_TYPING: &str = "user-stop-typing";
    /// Server: someone read a message.
    pub const MESSAGE_READ_UPDATE: &str = "message-read-update";
    /// Server: an identity went offline.
    pub const USER_OFFLINE: &str = "user-offline";
    /// Server: a room you participate in was created.
    pub const ROOM_CREATED: &str = "room-created";
    /// Server: a command was rejected.
    pub const ERROR: &str = "error";
}

/// Payload of `send-message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    /// Target room.
    pub room_id: RoomId,
    /// Message text.
    pub content: String,
}

/// Payload of `message-read`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRead {
    /// Room the message belongs to.
    pub room_id: RoomId,
    /// Identifier of the message that was read.
    pub message_id: String,
}

/// Events sent by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Present a bearer credential (only valid before the connection is active).
    Authenticate {
        /// Bearer token.
        token: String,
    },
    /// Join a room.
    JoinRoom(RoomId),
    /// Leave a room.
    LeaveRoom(RoomId),
    /// Post a message.
    SendMessage(SendMessage),
    /// Typing indicator on.
    Typing(RoomId),
    /// Typing indicator off.
    StopTyping(RoomId),
    /// Read receipt.
    MessageRead(MessageRead),
}

impl ClientEvent {
    /// Wire name of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Authenticate { .. } => kind::AUTHENTICATE,
            Self::JoinRoom(_) => kind::JOIN_ROOM,
            Self::LeaveRoom(_) => kind::LEAVE_ROOM,
            Self::SendMessage(_) => kind::SEND_MESSAGE,
            Self::Typing(_) => kind::TYPING,
            Self::StopTyping(_) => kind::STOP_TYPING,
            Self::MessageRead(_) => kind::MESSAGE_READ,
        }
    }

    /// Encode as a JSON text frame.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    /// Decode a JSON text frame.
    pub fn from_json(raw: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(raw).map_err(ProtocolError::MalformedFrame)
    }
}

/// An identity as shown inside message and room payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    /// Identity id.
    pub id: String,
    /// Display name.
    pub username: String,
}

/// An identity reference (`{userId, username}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    /// Identity id.
    pub user_id: String,
    /// Display name.
    pub username: String,
}

/// An identity acting inside a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomUser {
    /// Room the event is scoped to.
    pub room_id: RoomId,
    /// Identity id.
    pub user_id: String,
    /// Display name.
    pub username: String,
}

/// Payload of `user-stop-typing`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopTyping {
    /// Room the event is scoped to.
    pub room_id: RoomId,
    /// Identity id.
    pub user_id: String,
}

/// Message body inside `new-message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageBody {
    /// Server-assigned message id.
    pub id: String,
    /// Message text.
    pub content: String,
    /// Author.
    pub sender: Sender,
    /// Server receive time.
    pub created_at: DateTime<Utc>,
}

/// Payload of `new-message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    /// Room the message was posted to.
    pub room_id: RoomId,
    /// The message.
    pub message: MessageBody,
}

/// Payload of `message-read-update`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageReadUpdate {
    /// Room the message belongs to.
    pub room_id: RoomId,
    /// Message that was read.
    pub message_id: String,
    /// Reader.
    pub user_id: String,
}

/// Room visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomKind {
    /// Anyone may join.
    #[default]
    Public,
    /// Only participants may join.
    Private,
}

/// Room object carried by `room-created`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    /// Room id.
    pub id: RoomId,
    /// Human readable name.
    pub name: String,
    /// Visibility.
    #[serde(rename = "type")]
    pub kind: RoomKind,
    /// Participants at creation time.
    pub participants: Vec<Sender>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Payload of `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    /// Stable machine-readable code.
    pub code: String,
    /// Human readable description.
    pub message: String,
}

/// Events sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Handshake completed; the connection is active.
    Ready(UserRef),
    /// A message was posted.
    NewMessage(NewMessage),
    /// Someone joined a room.
    UserJoined(RoomUser),
    /// Someone left a room.
    UserLeft(RoomUser),
    /// Someone is typing.
    UserTyping(RoomUser),
    /// Someone stopped typing.
    UserStopTyping(StopTyping),
    /// Someone read a message.
    MessageReadUpdate(MessageReadUpdate),
    /// An identity went offline. Carries only the identity id.
    UserOffline(String),
    /// A room you participate in was created.
    RoomCreated(RoomInfo),
    /// A command from this connection was rejected.
    Error(ErrorReply),
}

impl ServerEvent {
    /// Wire name of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ready(_) => kind::READY,
            Self::NewMessage(_) => kind::NEW_MESSAGE,
            Self::UserJoined(_) => kind::USER_JOINED,
            Self::UserLeft(_) => kind::USER_LEFT,
            Self::UserTyping(_) => kind::USER_TYPING,
            Self::UserStopTyping(_) => kind::USER_STOP_TYPING,
            Self::MessageReadUpdate(_) => kind::MESSAGE_READ_UPDATE,
            Self::UserOffline(_) => kind::USER_OFFLINE,
            Self::RoomCreated(_) => kind::ROOM_CREATED,
            Self::Error(_) => kind::ERROR,
        }
    }

    /// Build an `error` event.
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error(ErrorReply {
            code: code.into(),
            message: message.into(),
        })
    }

    /// Encode as a JSON text frame.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    /// Decode a JSON text frame.
    pub fn from_json(raw: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(raw).map_err(ProtocolError::MalformedFrame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn room(id: &str) -> RoomId {
        RoomId::parse(id).unwrap()
    }

    #[test]
    fn client_events_use_kebab_case_tags() {
        let ev = ClientEvent::StopTyping(room("r1"));
        assert_eq!(ev.to_json().unwrap(), r#"{"event":"stop-typing","data":"r1"}"#);
        assert_eq!(ev.kind(), kind::STOP_TYPING);
    }

    #[test]
    fn send_message_payload_is_camel_case() {
        let raw = r#"{"event":"send-message","data":{"roomId":"r1","content":"hello"}}"#;
        let ev = ClientEvent::from_json(raw).unwrap();
        assert_eq!(
            ev,
            ClientEvent::SendMessage(SendMessage {
                room_id: room("r1"),
                content: "hello".into(),
            })
        );
    }

    #[test]
    fn new_message_shape() {
        let created_at = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let ev = ServerEvent::NewMessage(NewMessage {
            room_id: room("r1"),
            message: MessageBody {
                id: "m1".into(),
                content: "hello".into(),
                sender: Sender {
                    id: "a".into(),
                    username: "alice".into(),
                },
                created_at,
            },
        });
        let value: serde_json::Value = serde_json::from_str(&ev.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "event": "new-message",
                "data": {
                    "roomId": "r1",
                    "message": {
                        "id": "m1",
                        "content": "hello",
                        "sender": {"id": "a", "username": "alice"},
                        "createdAt": "2024-01-01T00:00:00Z"
                    }
                }
            })
        );
    }

    #[test]
    fn user_offline_carries_only_the_id() {
        let ev = ServerEvent::UserOffline("u42".into());
        assert_eq!(ev.to_json().unwrap(), r#"{"event":"user-offline","data":"u42"}"#);
    }

    #[test]
    fn room_info_renames_kind_to_type() {
        let ev = ServerEvent::RoomCreated(RoomInfo {
            id: room("r9"),
            name: "Nine".into(),
            kind: RoomKind::Private,
            participants: vec![],
            created_at: Utc::now(),
        });
        let value: serde_json::Value = serde_json::from_str(&ev.to_json().unwrap()).unwrap();
        assert_eq!(value["data"]["type"], "private");
    }

    #[test]
    fn invalid_room_id_fails_client_decode() {
        let raw = r#"{"event":"join-room","data":"has space"}"#;
        assert!(ClientEvent::from_json(raw).is_err());
    }
}
