//! Untyped frame decoding.
//!
//! The server dispatches on the event name before it knows the payload shape,
//! so frames are first decoded into an [`Envelope`] and each handler then asks
//! for the payload type it expects.

use crate::ProtocolError;
use serde::Deserialize;
use serde::de::DeserializeOwned;

/// A decoded frame whose payload has not been interpreted yet.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    /// Event kind.
    pub event: String,
    /// Raw payload (`null` when absent).
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Envelope {
    /// Decode a text frame.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(raw).map_err(ProtocolError::MalformedFrame)
    }

    /// Interpret the payload as `T`.
    ///
    /// A missing or `null` payload is reported as [`ProtocolError::MissingPayload`]
    /// rather than a type mismatch.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        if self.data.is_null() {
            return Err(ProtocolError::MissingPayload(self.event.clone()));
        }
        T::deserialize(&self.data).map_err(|source| ProtocolError::InvalidPayload {
            event: self.event.clone(),
            source,
        })
    }
}
