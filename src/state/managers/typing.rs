//! Typing indicators with server-side expiry.
//!
//! One slot per identity per room. Every `start` bumps a generation number;
//! an expiry timer only clears the slot if the generation it was armed with is
//! still current, so refreshes and explicit stops make older timers inert.

use dashmap::DashMap;
use roomcast_proto::RoomId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct TypingEntry {
    generation: u64,
    expires_at: Instant,
}

/// Result of [`TypingCoordinator::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingStart {
    /// A new entry; announce it.
    Started { generation: u64 },
    /// An existing entry had its expiry pushed back; nothing to announce.
    Refreshed { generation: u64 },
}

impl TypingStart {
    pub fn generation(self) -> u64 {
        match self {
            Self::Started { generation } | Self::Refreshed { generation } => generation,
        }
    }
}

/// Per-room set of identities currently typing.
#[derive(Debug)]
pub struct TypingCoordinator {
    rooms: DashMap<RoomId, HashMap<String, TypingEntry>>,
    generation: AtomicU64,
    timeout: Duration,
}

impl TypingCoordinator {
    pub fn new(timeout: Duration) -> Self {
        Self {
            rooms: DashMap::new(),
            generation: AtomicU64::new(0),
            timeout,
        }
    }

    /// Inactivity window after which an entry expires.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Insert or refresh the entry for `user_id` in `room`.
    pub fn start(&self, room: &RoomId, user_id: &str) -> TypingStart {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let entry = TypingEntry {
            generation,
            expires_at: Instant::now() + self.timeout,
        };
        let mut typists = self.rooms.entry(room.clone()).or_default();
        match typists.insert(user_id.to_string(), entry) {
            None => TypingStart::Started { generation },
            Some(_) => TypingStart::Refreshed { generation },
        }
    }

    /// Remove the entry unconditionally. Returns `true` if one existed.
    pub fn stop(&self, room: &RoomId, user_id: &str) -> bool {
        self.remove_where(room, user_id, |_| true)
    }

    /// Remove the entry only if it still carries `generation`.
    pub fn expire(&self, room: &RoomId, user_id: &str, generation: u64) -> bool {
        self.remove_where(room, user_id, |entry| entry.generation == generation)
    }

    pub fn is_typing(&self, room: &RoomId, user_id: &str) -> bool {
        self.rooms
            .get(room)
            .and_then(|typists| typists.get(user_id).map(|e| e.expires_at > Instant::now()))
            .unwrap_or(false)
    }

    fn remove_where(
        &self,
        room: &RoomId,
        user_id: &str,
        pred: impl FnOnce(&TypingEntry) -> bool,
    ) -> bool {
        let removed = match self.rooms.get_mut(room) {
            Some(mut typists) => {
                let current = typists.get(user_id).is_some_and(pred);
                current && typists.remove(user_id).is_some()
            }
            None => false,
        };
        if removed {
            self.rooms.remove_if(room, |_, typists| typists.is_empty());
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> RoomId {
        RoomId::parse("r1").unwrap()
    }

    #[test]
    fn start_then_refresh() {
        let typing = TypingCoordinator::new(Duration::from_secs(2));
        let first = typing.start(&room(), "a");
        assert!(matches!(first, TypingStart::Started { .. }));
        let second = typing.start(&room(), "a");
        assert!(matches!(second, TypingStart::Refreshed { .. }));
        assert!(second.generation() > first.generation());
        assert!(typing.is_typing(&room(), "a"));
    }

    #[test]
    fn stale_generation_does_not_expire() {
        let typing = TypingCoordinator::new(Duration::from_secs(2));
        let old = typing.start(&room(), "a").generation();
        let new = typing.start(&room(), "a").generation();

        assert!(!typing.expire(&room(), "a", old));
        assert!(typing.is_typing(&room(), "a"));
        assert!(typing.expire(&room(), "a", new));
        assert!(!typing.is_typing(&room(), "a"));
    }

    #[test]
    fn stop_is_unconditional_and_idempotent() {
        let typing = TypingCoordinator::new(Duration::from_secs(2));
        let generation = typing.start(&room(), "a").generation();
        assert!(typing.stop(&room(), "a"));
        assert!(!typing.stop(&room(), "a"));
        assert!(!typing.expire(&room(), "a", generation));
    }
}
