//! The Matrix - central shared state for the broadcast engine.
//!
//! The Matrix wires the session registry, room membership, presence and
//! typing managers together and implements every state transition a
//! connection can cause. Handlers and the connection task call into it; no
//! other code mutates the managers.

use crate::access::{AccessDecision, RoomAccess};
use crate::auth::Identity;
use crate::config::Config;
use crate::db::{PersistOp, PersistenceWriter};
use crate::error::{HandlerError, HandlerResult};
use crate::security::RateLimitManager;
use crate::state::managers::presence::{PresenceChange, PresenceTracker};
use crate::state::managers::room::{BroadcastReport, JoinOutcome, RoomManager};
use crate::state::managers::session::SessionRegistry;
use crate::state::managers::typing::{TypingCoordinator, TypingStart};
use crate::state::{ConnId, ConnIdGenerator, ConnectionHandle, DashMapExt};
use chrono::Utc;
use dashmap::DashMap;
use roomcast_proto::{
    MessageBody, MessageRead, MessageReadUpdate, NewMessage, RoomId, RoomInfo, RoomUser,
    SendMessage, Sender, ServerEvent, StopTyping, UserRef,
};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Configuration the Matrix needs at runtime.
#[derive(Debug, Clone)]
pub struct MatrixConfig {
    pub server_name: String,
    pub outbound_queue: usize,
    pub max_content_len: usize,
    pub typing_timeout: Duration,
}

impl MatrixConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            server_name: config.server.name.clone(),
            outbound_queue: config.server.outbound_queue,
            max_content_len: config.rooms.max_content_len,
            typing_timeout: config.rooms.typing_timeout(),
        }
    }
}

/// The Matrix - central shared state container.
pub struct Matrix {
    pub sessions: SessionRegistry,
    pub rooms: RoomManager,
    pub presence: PresenceTracker,
    pub typing: TypingCoordinator,
    /// Every active connection, indexed by connection id.
    pub connections: DashMap<ConnId, Arc<ConnectionHandle>>,
    pub rate_limiter: RateLimitManager,
    pub config: MatrixConfig,
    conn_ids: ConnIdGenerator,
    access: Arc<dyn RoomAccess>,
    writer: PersistenceWriter,
    shutdown: CancellationToken,
    this: Weak<Matrix>,
}

impl Matrix {
    pub fn new(
        config: MatrixConfig,
        rate_limiter: RateLimitManager,
        access: Arc<dyn RoomAccess>,
        writer: PersistenceWriter,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            sessions: SessionRegistry::new(),
            rooms: RoomManager::new(),
            presence: PresenceTracker::new(),
            typing: TypingCoordinator::new(config.typing_timeout),
            connections: DashMap::new(),
            rate_limiter,
            config,
            conn_ids: ConnIdGenerator::new(),
            access,
            writer,
            shutdown,
            this: this.clone(),
        })
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Bring an authenticated connection into the Active state.
    ///
    /// Registers the session, marks the identity online and queues `ready`.
    /// Returns the handle and the receiving end of its outbound queue.
    pub fn activate(
        &self,
        identity: Identity,
    ) -> (Arc<ConnectionHandle>, mpsc::Receiver<Arc<ServerEvent>>) {
        let (tx, rx) = mpsc::channel(self.config.outbound_queue.max(1));
        let handle = Arc::new(ConnectionHandle::new(
            self.conn_ids.next(),
            identity,
            tx,
            self.shutdown.child_token(),
        ));

        self.connections.insert(handle.id.clone(), handle.clone());
        self.sessions.register(&handle, || {
            self.presence.set_online(&handle.identity.id);
        });

        let ready = ServerEvent::Ready(UserRef {
            user_id: handle.identity.id.clone(),
            username: handle.identity.display_name.clone(),
        });
        if handle.deliver(Arc::new(ready)).is_err() {
            warn!(conn = %handle.id, "could not queue ready");
        }

        crate::metrics::set_connected_sessions(self.connections.len());
        info!(conn = %handle.id, user = %handle.identity.id, "connection active");
        (handle, rx)
    }

    /// Run Closed-state cleanup for a connection.
    ///
    /// Only the first call for a handle does anything; later calls (a second
    /// close signal racing the first) return `false`.
    ///
    /// The offline transition and `user-offline` happen only when this
    /// connection is still the identity's registered session. A connection
    /// superseded by a newer login closes without touching presence, so a
    /// user with a live session never appears offline. This deliberately
    /// departs from announcing `user-offline` on every disconnect.
    pub fn close_connection(&self, handle: &ConnectionHandle, reason: &str) -> bool {
        if !handle.begin_close() {
            return false;
        }
        let user = &handle.identity;

        let rooms = handle.take_rooms();
        for room in &rooms {
            if self.rooms.remove_member(room, &handle.id) {
                self.broadcast(
                    room,
                    ServerEvent::UserLeft(room_user(room, user)),
                    None,
                );
            }
        }

        // Offline and its announcement happen under the session entry lock so
        // a reconnect of the same identity lands strictly before or after.
        let mut slow = Vec::new();
        let went_offline = self.sessions.unregister(&user.id, &handle.id, || {
            self.presence.set_offline(&user.id);
            slow = self.fan_out_all(Arc::new(ServerEvent::UserOffline(user.id.clone()))).full;
        });
        for conn_id in slow {
            self.drop_slow_consumer(conn_id);
        }
        if !went_offline {
            debug!(conn = %handle.id, user = %user.id, "superseded session closed; presence unchanged");
        }

        for room in &rooms {
            if self.typing.stop(room, &user.id) {
                self.broadcast(room, stop_typing(room, user), None);
            }
        }

        self.connections.remove(&handle.id);
        self.rate_limiter.remove_client(&handle.id);
        handle.shutdown_token().cancel();

        crate::metrics::set_connected_sessions(self.connections.len());
        crate::metrics::set_active_rooms(self.rooms.room_count());
        let connected_secs = (Utc::now() - handle.connected_at).num_seconds();
        info!(conn = %handle.id, user = %user.id, reason, connected_secs, "connection closed");
        true
    }

    /// Close a connection by id from the server side.
    pub fn disconnect(&self, conn_id: &ConnId, reason: &str) -> bool {
        match self.connections.get_cloned(conn_id) {
            Some(handle) => self.close_connection(&handle, reason),
            None => false,
        }
    }

    /// Forward presence transitions to the persistence writer until shutdown.
    pub fn spawn_presence_writer(&self, stop: CancellationToken) -> JoinHandle<()> {
        let mut changes = self.presence.subscribe();
        let writer = self.writer.clone();
        let forward = move |change: PresenceChange| {
            writer.enqueue(PersistOp::PresenceChanged {
                user_id: change.user_id,
                status: change.status,
                at: change.at,
            })
        };
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    change = changes.recv() => match change {
                        Ok(change) => forward(change),
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(skipped = n, "Presence writer lagged");
                            for _ in 0..n {
                                crate::metrics::inc_persistence_failures();
                            }
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    _ = stop.cancelled() => {
                        while let Ok(change) = changes.try_recv() {
                            forward(change);
                        }
                        break;
                    }
                }
            }
        })
    }

    // ========================================================================
    // Room commands
    // ========================================================================

    pub async fn join_room(&self, handle: &Arc<ConnectionHandle>, room: RoomId) -> HandlerResult {
        if let AccessDecision::Denied(reason) = self.access.check(&handle.identity, &room).await {
            return Err(HandlerError::Forbidden { room, reason });
        }

        match self.rooms.join(&room, handle) {
            JoinOutcome::Joined => {
                self.broadcast(
                    &room,
                    ServerEvent::UserJoined(room_user(&room, &handle.identity)),
                    Some(&handle.id),
                );
                crate::metrics::set_active_rooms(self.rooms.room_count());
                Ok(())
            }
            JoinOutcome::AlreadyMember => Ok(()),
            JoinOutcome::Closed => Err(HandlerError::ConnectionClosed),
        }
    }

    pub fn leave_room(&self, handle: &ConnectionHandle, room: RoomId) -> HandlerResult {
        if !self.rooms.leave(&room, handle) {
            return Err(HandlerError::NotInRoom(room));
        }
        let user = &handle.identity;
        self.broadcast(&room, ServerEvent::UserLeft(room_user(&room, user)), None);
        if self.typing.stop(&room, &user.id) {
            self.broadcast(&room, stop_typing(&room, user), None);
        }
        crate::metrics::set_active_rooms(self.rooms.room_count());
        Ok(())
    }

    /// Post a message to a room; every member, sender included, receives it.
    pub fn send_message(&self, handle: &ConnectionHandle, msg: SendMessage) -> HandlerResult {
        require_member(handle, &msg.room_id)?;
        if msg.content.trim().is_empty() {
            return Err(HandlerError::EmptyContent);
        }
        let limit = self.config.max_content_len;
        if msg.content.chars().count() > limit {
            return Err(HandlerError::ContentTooLong { limit });
        }

        let message = MessageBody {
            id: uuid::Uuid::new_v4().to_string(),
            content: msg.content,
            sender: Sender {
                id: handle.identity.id.clone(),
                username: handle.identity.display_name.clone(),
            },
            created_at: Utc::now(),
        };

        let room = msg.room_id;
        self.writer.enqueue(PersistOp::MessageSent {
            room_id: room.clone(),
            message: message.clone(),
        });
        self.broadcast(
            &room,
            ServerEvent::NewMessage(NewMessage {
                room_id: room.clone(),
                message,
            }),
            None,
        );
        Ok(())
    }

    pub fn mark_read(&self, handle: &ConnectionHandle, read: MessageRead) -> HandlerResult {
        require_member(handle, &read.room_id)?;
        let room = read.room_id.clone();
        self.broadcast(
            &room,
            ServerEvent::MessageReadUpdate(MessageReadUpdate {
                room_id: read.room_id,
                message_id: read.message_id,
                user_id: handle.identity.id.clone(),
            }),
            None,
        );
        Ok(())
    }

    // ========================================================================
    // Typing
    // ========================================================================

    pub fn start_typing(&self, handle: &ConnectionHandle, room: RoomId) -> HandlerResult {
        require_member(handle, &room)?;
        let user = &handle.identity;

        let start = self.typing.start(&room, &user.id);
        if let TypingStart::Started { .. } = start {
            self.broadcast(
                &room,
                ServerEvent::UserTyping(room_user(&room, user)),
                Some(&handle.id),
            );
        }
        self.arm_typing_timer(room, user.id.clone(), start.generation());
        Ok(())
    }

    pub fn stop_typing(&self, handle: &ConnectionHandle, room: RoomId) -> HandlerResult {
        require_member(handle, &room)?;
        if self.typing.stop(&room, &handle.identity.id) {
            self.broadcast(&room, stop_typing(&room, &handle.identity), Some(&handle.id));
        }
        Ok(())
    }

    /// Clear a typing entry whose window elapsed without a refresh or stop.
    pub fn expire_typing(&self, room: &RoomId, user_id: &str, generation: u64) -> bool {
        if !self.typing.expire(room, user_id, generation) {
            return false;
        }
        debug!(room = %room, user = %user_id, "typing expired");
        self.broadcast(
            room,
            ServerEvent::UserStopTyping(StopTyping {
                room_id: room.clone(),
                user_id: user_id.to_string(),
            }),
            None,
        );
        true
    }

    fn arm_typing_timer(&self, room: RoomId, user_id: String, generation: u64) {
        let this = self.this.clone();
        let timeout = self.typing.timeout();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(matrix) = this.upgrade() {
                matrix.expire_typing(&room, &user_id, generation);
            }
        });
    }

    // ========================================================================
    // Direct notifications
    // ========================================================================

    /// Send `room-created` to each participant's registered session.
    ///
    /// Returns the number of participants reached.
    pub fn notify_room_created(&self, room: &RoomInfo) -> usize {
        let event = Arc::new(ServerEvent::RoomCreated(room.clone()));
        let mut reached = 0;
        for participant in &room.participants {
            let Some(handle) = self.sessions.lookup(&participant.id) else {
                continue;
            };
            match handle.deliver(event.clone()) {
                Ok(()) => reached += 1,
                Err(e) => {
                    debug!(conn = %handle.id, error = ?e, "room-created not delivered");
                    crate::metrics::inc_delivery_failures();
                }
            }
        }
        reached
    }

    // ========================================================================
    // Fan-out
    // ========================================================================

    /// Broadcast to a room. Never fails; full recipients are disconnected.
    pub fn broadcast(&self, room: &RoomId, event: ServerEvent, exclude: Option<&ConnId>) -> usize {
        let report = self.rooms.broadcast(room, Arc::new(event), exclude);
        crate::metrics::record_fanout(report.delivered);
        for conn_id in report.full {
            self.drop_slow_consumer(conn_id);
        }
        report.delivered
    }

    /// Queue `event` on every active connection. Full recipients are
    /// reported rather than disconnected so this is safe under a lock.
    fn fan_out_all(&self, event: Arc<ServerEvent>) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        for handle in self.connections.values_cloned() {
            match handle.deliver(event.clone()) {
                Ok(()) => report.delivered += 1,
                Err(crate::state::DeliveryError::Full) => report.full.push(handle.id.clone()),
                Err(crate::state::DeliveryError::Closed) => {}
            }
        }
        report
    }

    /// A recipient whose queue is full has fallen behind; close it off the
    /// sender's path.
    fn drop_slow_consumer(&self, conn_id: ConnId) {
        crate::metrics::inc_delivery_failures();
        warn!(conn = %conn_id, "outbound queue full; disconnecting");
        let this = self.this.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                rt.spawn(async move {
                    if let Some(matrix) = this.upgrade() {
                        matrix.disconnect(&conn_id, "outbound queue full");
                    }
                });
            }
            Err(_) => {
                self.disconnect(&conn_id, "outbound queue full");
            }
        }
    }
}

fn require_member(handle: &ConnectionHandle, room: &RoomId) -> HandlerResult {
    if handle.is_in_room(room) {
        Ok(())
    } else {
        Err(HandlerError::NotInRoom(room.clone()))
    }
}

fn room_user(room: &RoomId, user: &Identity) -> RoomUser {
    RoomUser {
        room_id: room.clone(),
        user_id: user.id.clone(),
        username: user.display_name.clone(),
    }
}

fn stop_typing(room: &RoomId, user: &Identity) -> ServerEvent {
    ServerEvent::UserStopTyping(StopTyping {
        room_id: room.clone(),
        user_id: user.id.clone(),
    })
}
