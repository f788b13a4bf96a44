//! Per-connection handle shared between the connection task and the state tables.
//!
//! The connection task owns the only strong reference that matters for its
//! lifetime (via [`Matrix::connections`](super::Matrix)); rooms and the session
//! registry hold `Weak` references and skip handles that are closed.

use super::ConnId;
use crate::auth::Identity;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use roomcast_proto::{RoomId, ServerEvent};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;

/// Why an event could not be queued for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The connection is closed or its writer is gone.
    Closed,
    /// The outbound queue is full.
    Full,
}

/// An active connection as seen by the rest of the server.
#[derive(Debug)]
pub struct ConnectionHandle {
    pub id: ConnId,
    pub identity: Identity,
    pub connected_at: DateTime<Utc>,
    sender: mpsc::Sender<Arc<ServerEvent>>,
    /// Rooms this connection has joined. Mutated only while the room's
    /// membership entry is locked.
    joined_rooms: Mutex<HashSet<RoomId>>,
    closed: AtomicBool,
    shutdown: CancellationToken,
}

impl ConnectionHandle {
    pub fn new(
        id: ConnId,
        identity: Identity,
        sender: mpsc::Sender<Arc<ServerEvent>>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            id,
            identity,
            connected_at: Utc::now(),
            sender,
            joined_rooms: Mutex::new(HashSet::new()),
            closed: AtomicBool::new(false),
            shutdown,
        }
    }

    /// Queue an event without waiting.
    pub fn deliver(&self, event: Arc<ServerEvent>) -> Result<(), DeliveryError> {
        if self.is_closed() {
            return Err(DeliveryError::Closed);
        }
        self.sender.try_send(event).map_err(|err| match err {
            TrySendError::Full(_) => DeliveryError::Full,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Mark the connection closed. Returns `true` only for the first caller.
    pub fn begin_close(&self) -> bool {
        self.closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Token cancelled when the server wants this connection's task to exit.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub fn is_in_room(&self, room: &RoomId) -> bool {
        self.joined_rooms.lock().contains(room)
    }

    pub fn joined_rooms(&self) -> Vec<RoomId> {
        self.joined_rooms.lock().iter().cloned().collect()
    }

    /// Record a join. Fails if the connection has already begun closing, so a
    /// join racing with close can never leave a stale membership behind.
    pub(super) fn add_room(&self, room: &RoomId) -> bool {
        let mut rooms = self.joined_rooms.lock();
        if self.is_closed() {
            return false;
        }
        rooms.insert(room.clone());
        true
    }

    pub(super) fn remove_room(&self, room: &RoomId) {
        self.joined_rooms.lock().remove(room);
    }

    /// Take every joined room. Only meaningful after [`begin_close`](Self::begin_close).
    pub(super) fn take_rooms(&self) -> Vec<RoomId> {
        self.joined_rooms.lock().drain().collect()
    }
}
