//! Room membership and broadcast fan-out.
//!
//! Each room maps connection ids to `Weak` handles. Membership changes for a
//! room happen under that room's DashMap entry lock, and a broadcast takes its
//! recipient snapshot under the same lock, so a snapshot never observes a
//! half-applied join or leave.

use crate::state::{ConnId, ConnectionHandle, DeliveryError};
use dashmap::DashMap;
use roomcast_proto::{RoomId, ServerEvent};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// Result of a join attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    AlreadyMember,
    /// The connection began closing before the join could be recorded.
    Closed,
}

/// What happened during one broadcast.
#[derive(Debug, Default)]
pub struct BroadcastReport {
    pub delivered: usize,
    /// Recipients whose outbound queue was full.
    pub full: Vec<ConnId>,
}

/// Tracks which connections are joined to which rooms.
#[derive(Debug, Default)]
pub struct RoomManager {
    rooms: DashMap<RoomId, HashMap<ConnId, Weak<ConnectionHandle>>>,
}

impl RoomManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a room. Idempotent.
    pub fn join(&self, room: &RoomId, handle: &Arc<ConnectionHandle>) -> JoinOutcome {
        let mut members = self.rooms.entry(room.clone()).or_default();
        if members.contains_key(&handle.id) {
            return JoinOutcome::AlreadyMember;
        }
        if !handle.add_room(room) {
            let empty = members.is_empty();
            drop(members);
            if empty {
                self.rooms.remove_if(room, |_, m| m.is_empty());
            }
            return JoinOutcome::Closed;
        }
        members.insert(handle.id.clone(), Arc::downgrade(handle));
        debug!(room = %room, conn = %handle.id, size = members.len(), "joined room");
        JoinOutcome::Joined
    }

    /// Remove a connection from a room. Returns `true` if it was a member.
    pub fn leave(&self, room: &RoomId, handle: &ConnectionHandle) -> bool {
        let removed = self.remove_member(room, &handle.id);
        if removed {
            handle.remove_room(room);
        }
        removed
    }

    /// Remove a connection id from a room, dropping the room once empty.
    pub(crate) fn remove_member(&self, room: &RoomId, conn_id: &ConnId) -> bool {
        let removed = match self.rooms.get_mut(room) {
            Some(mut members) => members.remove(conn_id).is_some(),
            None => false,
        };
        if removed {
            self.rooms.remove_if(room, |_, members| members.is_empty());
            debug!(room = %room, conn = %conn_id, "left room");
        }
        removed
    }

    /// Live members of a room.
    pub fn members(&self, room: &RoomId) -> Vec<Arc<ConnectionHandle>> {
        self.rooms
            .get(room)
            .map(|members| {
                members
                    .values()
                    .filter_map(Weak::upgrade)
                    .filter(|h| !h.is_closed())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn member_count(&self, room: &RoomId) -> usize {
        self.rooms.get(room).map(|m| m.len()).unwrap_or(0)
    }

    /// Number of rooms with at least one member.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Deliver `event` to every member of `room` except `exclude`.
    ///
    /// Delivery is per recipient and never fails the caller: closed recipients
    /// are skipped and full queues are reported back.
    pub fn broadcast(
        &self,
        room: &RoomId,
        event: Arc<ServerEvent>,
        exclude: Option<&ConnId>,
    ) -> BroadcastReport {
        let recipients: Vec<Arc<ConnectionHandle>> = self
            .members(room)
            .into_iter()
            .filter(|h| exclude != Some(&h.id))
            .collect();

        let mut report = BroadcastReport::default();
        for recipient in recipients {
            match recipient.deliver(event.clone()) {
                Ok(()) => report.delivered += 1,
                Err(DeliveryError::Full) => report.full.push(recipient.id.clone()),
                Err(DeliveryError::Closed) => {
                    trace!(room = %room, conn = %recipient.id, "skipping closed recipient");
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::{drain, handle};

    fn room(id: &str) -> RoomId {
        RoomId::parse(id).unwrap()
    }

    #[test]
    fn join_is_idempotent() {
        let rooms = RoomManager::new();
        let (a, _rx) = handle("C1", "a", "alice");

        assert_eq!(rooms.join(&room("r1"), &a), JoinOutcome::Joined);
        assert_eq!(rooms.join(&room("r1"), &a), JoinOutcome::AlreadyMember);
        assert_eq!(rooms.member_count(&room("r1")), 1);
        assert_eq!(a.joined_rooms(), vec![room("r1")]);
    }

    #[test]
    fn closed_handle_cannot_join() {
        let rooms = RoomManager::new();
        let (a, _rx) = handle("C1", "a", "alice");
        a.begin_close();
        assert_eq!(rooms.join(&room("r1"), &a), JoinOutcome::Closed);
        assert_eq!(rooms.room_count(), 0);
    }

    #[test]
    fn leave_removes_membership_and_empty_rooms() {
        let rooms = RoomManager::new();
        let (a, _rx) = handle("C1", "a", "alice");
        rooms.join(&room("r1"), &a);

        assert!(rooms.leave(&room("r1"), &a));
        assert!(!rooms.leave(&room("r1"), &a));
        assert_eq!(rooms.room_count(), 0);
        assert!(a.joined_rooms().is_empty());
    }

    #[test]
    fn broadcast_reaches_members_only() {
        let rooms = RoomManager::new();
        let (a, mut rx_a) = handle("C1", "a", "alice");
        let (b, mut rx_b) = handle("C2", "b", "bob");
        let (c, mut rx_c) = handle("C3", "c", "carol");
        rooms.join(&room("r1"), &a);
        rooms.join(&room("r1"), &b);
        rooms.join(&room("r2"), &c);

        let ev = Arc::new(ServerEvent::UserOffline("x".into()));
        let report = rooms.broadcast(&room("r1"), ev.clone(), Some(&a.id));
        assert_eq!(report.delivered, 1);

        assert!(drain(&mut rx_a).is_empty());
        assert_eq!(drain(&mut rx_b), vec![(*ev).clone()]);
        assert!(drain(&mut rx_c).is_empty());
    }

    #[test]
    fn broadcast_skips_closed_and_reports_full() {
        let rooms = RoomManager::new();
        let (a, _rx_a) = handle("C1", "a", "alice");
        let (b, rx_b) = handle("C2", "b", "bob");
        let (c, mut rx_c) = handle("C3", "c", "carol");
        for h in [&a, &b, &c] {
            rooms.join(&room("r1"), h);
        }
        drop(rx_b);

        // Fill a's queue (capacity 8 in tests).
        let filler = Arc::new(ServerEvent::UserOffline("f".into()));
        while a.deliver(filler.clone()).is_ok() {}

        let report = rooms.broadcast(&room("r1"), filler, None);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.full, vec!["C1".to_string()]);
        assert_eq!(drain(&mut rx_c).len(), 1);
    }

    #[test]
    fn dropped_handles_are_not_members() {
        let rooms = RoomManager::new();
        let (a, _rx) = handle("C1", "a", "alice");
        rooms.join(&room("r1"), &a);
        drop(a);
        assert!(rooms.members(&room("r1")).is_empty());
    }
}
