//! Room identifiers.

use crate::ProtocolError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length of a room identifier, in characters.
pub const MAX_ROOM_ID_LEN: usize = 128;

/// A validated room identifier.
///
/// Room ids are opaque to the broadcast engine. They must be non-empty, at most
/// [`MAX_ROOM_ID_LEN`] characters, and free of whitespace and control characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomId(String);

impl RoomId {
    /// Validate and wrap a room identifier.
    pub fn parse(raw: impl Into<String>) -> Result<Self, ProtocolError> {
        let raw = raw.into();
        if is_valid_room_id(&raw) {
            Ok(Self(raw))
        } else {
            Err(ProtocolError::InvalidRoomId(raw))
        }
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Check whether `raw` is an acceptable room identifier.
pub fn is_valid_room_id(raw: &str) -> bool {
    !raw.is_empty()
        && raw.chars().count() <= MAX_ROOM_ID_LEN
        && !raw.chars().any(|c| c.is_whitespace() || c.is_control())
}

impl TryFrom<String> for RoomId {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<RoomId> for String {
    fn from(room: RoomId) -> Self {
        room.0
    }
}

impl AsRef<str> for RoomId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
