//! # roomcast-proto
//!
//! Wire protocol for the roomcast real-time room broadcast server.
//!
//! Every frame is a WebSocket text frame carrying one JSON object of the form
//! `{"event": "<kind>", "data": <payload>}`. Event kinds are kebab-case.
//!
//! ## Quick Start
//!
//! ```rust
//! use roomcast_proto::{ClientEvent, RoomId, ServerEvent};
//!
//! let room = RoomId::parse("lobby").expect("valid room id");
//! let join = ClientEvent::JoinRoom(room);
//! let json = join.to_json().expect("encodable");
//! assert_eq!(json, r#"{"event":"join-room","data":"lobby"}"#);
//!
//! let raw = r#"{"event":"user-offline","data":"u1"}"#;
//! let event = ServerEvent::from_json(raw).expect("valid frame");
//! assert_eq!(event, ServerEvent::UserOffline("u1".to_string()));
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod envelope;
pub mod error;
pub mod event;
pub mod room;

pub use envelope::Envelope;
pub use error::ProtocolError;
pub use event::{
    ClientEvent, ErrorReply, MessageBody, MessageRead, MessageReadUpdate, NewMessage, RoomInfo,
    RoomKind, RoomUser, SendMessage, Sender, ServerEvent, StopTyping, UserRef, kind,
};
pub use room::RoomId;
