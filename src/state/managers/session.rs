//! Identity to connection registry.
//!
//! At most one entry per identity; the latest registration wins. A superseded
//! connection stays valid for room broadcasts but can no longer be addressed
//! by identity.

use crate::state::{ConnId, ConnectionHandle};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::{Arc, Weak};
use tracing::debug;

#[derive(Debug, Clone)]
struct SessionEntry {
    conn_id: ConnId,
    handle: Weak<ConnectionHandle>,
}

/// Maps identity ids to their current connection.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, SessionEntry>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle` for its identity, replacing any previous entry.
    ///
    /// `on_registered` runs while the identity's entry is still locked, so a
    /// racing `unregister` for the same identity sees either none or all of
    /// it. Returns the id of the superseded connection, if any.
    pub fn register(
        &self,
        handle: &Arc<ConnectionHandle>,
        on_registered: impl FnOnce(),
    ) -> Option<ConnId> {
        let entry = SessionEntry {
            conn_id: handle.id.clone(),
            handle: Arc::downgrade(handle),
        };
        let previous = match self.sessions.entry(handle.identity.id.clone()) {
            Entry::Occupied(mut slot) => {
                let prev = slot.insert(entry);
                on_registered();
                Some(prev.conn_id)
            }
            Entry::Vacant(slot) => {
                let _held = slot.insert(entry);
                on_registered();
                None
            }
        };
        if let Some(prev) = &previous {
            debug!(user = %handle.identity.id, superseded = %prev, conn = %handle.id, "session replaced");
        }
        previous
    }

    /// Remove the entry for `identity_id` only if it still points at `conn_id`.
    ///
    /// `on_removed` runs under the same entry lock before the entry goes
    /// away. Returns `true` if an entry was removed.
    pub fn unregister(&self, identity_id: &str, conn_id: &ConnId, on_removed: impl FnOnce()) -> bool {
        match self.sessions.entry(identity_id.to_string()) {
            Entry::Occupied(slot) if &slot.get().conn_id == conn_id => {
                on_removed();
                slot.remove();
                true
            }
            _ => false,
        }
    }

    /// The current live connection for an identity.
    pub fn lookup(&self, identity_id: &str) -> Option<Arc<ConnectionHandle>> {
        let handle = self.sessions.get(identity_id)?.handle.upgrade()?;
        (!handle.is_closed()).then_some(handle)
    }

    /// Number of registered identities.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}
