//! Presence tracking.
//!
//! Presence is derived from connection lifecycle only; no client command sets
//! it. Every transition is published on a broadcast channel for whoever cares
//! (the persistence forwarder in `main`).

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::broadcast;

/// Online status of an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Online,
    Offline,
}

impl Presence {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

/// Current presence of one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceRecord {
    pub status: Presence,
    pub last_seen: Option<DateTime<Utc>>,
}

/// A published transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceChange {
    pub user_id: String,
    pub status: Presence,
    pub at: DateTime<Utc>,
}

/// Capacity of the transition channel; slow subscribers see `Lagged`.
const CHANGE_CHANNEL_CAPACITY: usize = 1024;

/// Tracks online/offline status and last-seen time per identity.
#[derive(Debug)]
pub struct PresenceTracker {
    records: DashMap<String, PresenceRecord>,
    changes: broadcast::Sender<PresenceChange>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            records: DashMap::new(),
            changes,
        }
    }

    /// Subscribe to presence transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<PresenceChange> {
        self.changes.subscribe()
    }

    pub fn set_online(&self, user_id: &str) -> PresenceChange {
        let at = Utc::now();
        self.records
            .entry(user_id.to_string())
            .and_modify(|r| r.status = Presence::Online)
            .or_insert(PresenceRecord {
                status: Presence::Online,
                last_seen: None,
            });
        self.publish(user_id, Presence::Online, at)
    }

    /// Mark offline and stamp `last_seen`.
    pub fn set_offline(&self, user_id: &str) -> PresenceChange {
        let at = Utc::now();
        self.records.insert(
            user_id.to_string(),
            PresenceRecord {
                status: Presence::Offline,
                last_seen: Some(at),
            },
        );
        self.publish(user_id, Presence::Offline, at)
    }

    pub fn get(&self, user_id: &str) -> Option<PresenceRecord> {
        self.records.get(user_id).map(|r| r.clone())
    }

    fn publish(&self, user_id: &str, status: Presence, at: DateTime<Utc>) -> PresenceChange {
        let change = PresenceChange {
            user_id: user_id.to_string(),
            status,
            at,
        };
        // No subscribers is fine.
        let _ = self.changes.send(change.clone());
        change
    }
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new()
    }
}
