//! Handler context and the handler trait.
//!
//! A [`Context`] is built per inbound frame by the connection event loop and
//! borrowed by exactly one handler invocation.

use crate::error::HandlerResult;
use crate::state::{ConnectionHandle, Matrix};
use async_trait::async_trait;
use roomcast_proto::Envelope;
use std::sync::Arc;

/// Handler context passed to each event handler.
pub struct Context<'a> {
    /// Shared server state.
    pub matrix: &'a Arc<Matrix>,
    /// The Active connection that sent the event.
    pub handle: &'a Arc<ConnectionHandle>,
}

impl<'a> Context<'a> {
    pub fn new(matrix: &'a Arc<Matrix>, handle: &'a Arc<ConnectionHandle>) -> Self {
        Self { matrix, handle }
    }

    /// Connection id of the sender.
    #[inline]
    pub fn conn_id(&self) -> &str {
        &self.handle.id
    }

    /// Identity id of the sender.
    #[inline]
    pub fn user_id(&self) -> &str {
        &self.handle.identity.id
    }
}

/// An event handler for one client event kind.
///
/// Handlers only ever run for Active connections; the `authenticate` event is
/// consumed by the handshake before a context exists.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: &Context<'_>, env: &Envelope) -> HandlerResult;
}
