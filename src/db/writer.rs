//! Fire-and-forget write-through to the database.
//!
//! Presence changes and delivered messages are queued on a bounded channel and
//! written by a single background task. Enqueueing never blocks: a full or
//! closed queue drops the operation, logs it and counts it.

use super::Database;
use crate::state::Presence;
use chrono::{DateTime, Utc};
use roomcast_proto::{MessageBody, RoomId};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A queued write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOp {
    /// An identity went online or offline.
    PresenceChanged {
        user_id: String,
        status: Presence,
        at: DateTime<Utc>,
    },
    /// A message was delivered to a room.
    MessageSent { room_id: RoomId, message: MessageBody },
}

impl PersistOp {
    fn label(&self) -> &'static str {
        match self {
            Self::PresenceChanged { .. } => "presence",
            Self::MessageSent { .. } => "message",
        }
    }
}

/// Handle used by the real-time path to enqueue writes.
#[derive(Debug, Clone)]
pub struct PersistenceWriter {
    tx: mpsc::Sender<PersistOp>,
}

impl PersistenceWriter {
    /// Create a writer handle and the receiving end of its queue.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<PersistOp>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Enqueue a write without waiting.
    pub fn enqueue(&self, op: PersistOp) {
        if let Err(err) = self.tx.try_send(op) {
            let (reason, op) = match err {
                TrySendError::Full(op) => ("queue full", op),
                TrySendError::Closed(op) => ("writer stopped", op),
            };
            warn!(op = op.label(), reason, "Dropping persistence write");
            crate::metrics::inc_persistence_failures();
        }
    }
}

/// Drain the queue into the database until it closes or `shutdown` fires.
///
/// On shutdown, already-queued writes are flushed before returning.
pub async fn run(db: Database, mut rx: mpsc::Receiver<PersistOp>, shutdown: CancellationToken) {
    info!("Persistence writer started");
    loop {
        tokio::select! {
            op = rx.recv() => match op {
                Some(op) => apply(&db, op).await,
                None => break,
            },
            _ = shutdown.cancelled() => {
                rx.close();
                while let Some(op) = rx.recv().await {
                    apply(&db, op).await;
                }
                break;
            }
        }
    }
    info!("Persistence writer stopped");
}

async fn apply(db: &Database, op: PersistOp) {
    let label = op.label();
    let result = match &op {
        PersistOp::PresenceChanged {
            user_id,
            status,
            at,
        } => db.users().set_presence(user_id, *status, *at).await,
        PersistOp::MessageSent { room_id, message } => {
            db.messages().insert(room_id, message).await
        }
    };

    match result {
        Ok(()) => debug!(op = label, "Persisted"),
        Err(e) => {
            warn!(op = label, error = %e, "Persistence write failed");
            crate::metrics::inc_persistence_failures();
        }
    }
}
