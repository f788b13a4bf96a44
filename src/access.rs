//! Room admission policy.
//!
//! Every `join-room` is checked against a [`RoomAccess`] implementation before
//! the connection is added to the room.

use crate::auth::Identity;
use crate::db::Database;
use async_trait::async_trait;
use roomcast_proto::{RoomId, RoomKind};
use tracing::warn;

/// Outcome of an admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allowed,
    Denied(String),
}

#[async_trait]
pub trait RoomAccess: Send + Sync {
    /// Decide whether `identity` may join `room`.
    async fn check(&self, identity: &Identity, room: &RoomId) -> AccessDecision;
}

/// Admits every authenticated identity to every room id.
pub struct OpenAccess;

#[async_trait]
impl RoomAccess for OpenAccess {
    async fn check(&self, _identity: &Identity, _room: &RoomId) -> AccessDecision {
        AccessDecision::Allowed
    }
}

/// Admits only to stored rooms; private rooms require participation.
pub struct ParticipantAccess {
    db: Database,
}

impl ParticipantAccess {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RoomAccess for ParticipantAccess {
    async fn check(&self, identity: &Identity, room: &RoomId) -> AccessDecision {
        let record = match self.db.rooms().find(room).await {
            Ok(Some(record)) => record,
            Ok(None) => return AccessDecision::Denied("no such room".into()),
            Err(e) => {
                warn!(room = %room, error = %e, "Room lookup failed");
                return AccessDecision::Denied("room lookup failed".into());
            }
        };

        if record.kind == RoomKind::Public {
            return AccessDecision::Allowed;
        }

        match self.db.rooms().is_participant(room, &identity.id).await {
            Ok(true) => AccessDecision::Allowed,
            Ok(false) => AccessDecision::Denied("not a participant".into()),
            Err(e) => {
                warn!(room = %room, error = %e, "Participant lookup failed");
                AccessDecision::Denied("room lookup failed".into())
            }
        }
    }
}
