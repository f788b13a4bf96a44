//! Helpers shared by the state unit tests.

use crate::access::{AccessDecision, OpenAccess, RoomAccess};
use crate::auth::Identity;
use crate::config::RateLimitConfig;
use crate::db::{PersistOp, PersistenceWriter};
use crate::security::RateLimitManager;
use crate::state::{ConnectionHandle, Matrix, MatrixConfig};
use async_trait::async_trait;
use roomcast_proto::{RoomId, ServerEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub const TEST_QUEUE: usize = 8;

pub fn identity(id: &str, name: &str) -> Identity {
    Identity {
        id: id.into(),
        display_name: name.into(),
    }
}

/// A bare handle with a small outbound queue.
pub fn handle(
    conn: &str,
    user: &str,
    name: &str,
) -> (Arc<ConnectionHandle>, mpsc::Receiver<Arc<ServerEvent>>) {
    let (tx, rx) = mpsc::channel(TEST_QUEUE);
    let h = ConnectionHandle::new(conn.into(), identity(user, name), tx, CancellationToken::new());
    (Arc::new(h), rx)
}

/// Everything currently queued.
pub fn drain(rx: &mut mpsc::Receiver<Arc<ServerEvent>>) -> Vec<ServerEvent> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push((*ev).clone());
    }
    out
}

pub fn room(id: &str) -> RoomId {
    RoomId::parse(id).unwrap()
}

/// Denies every join.
pub struct DenyAll;

#[async_trait]
impl RoomAccess for DenyAll {
    async fn check(&self, _identity: &Identity, _room: &RoomId) -> AccessDecision {
        AccessDecision::Denied("closed for testing".into())
    }
}

pub struct TestMatrix {
    pub matrix: Arc<Matrix>,
    pub persisted: mpsc::Receiver<PersistOp>,
}

pub fn matrix_with(
    typing_timeout: Duration,
    outbound_queue: usize,
    access: Arc<dyn RoomAccess>,
) -> TestMatrix {
    let (writer, persisted) = PersistenceWriter::new(64);
    let config = MatrixConfig {
        server_name: "test".into(),
        outbound_queue,
        max_content_len: 16,
        typing_timeout,
    };
    let limits = RateLimitConfig {
        message_rate_per_second: 1000,
        connection_burst_per_ip: 1000,
        join_burst_per_client: 1000,
    };
    let matrix = Matrix::new(
        config,
        RateLimitManager::new(limits),
        access,
        writer,
        CancellationToken::new(),
    );
    TestMatrix { matrix, persisted }
}

pub fn matrix() -> TestMatrix {
    matrix_with(Duration::from_millis(150), TEST_QUEUE, Arc::new(OpenAccess))
}
