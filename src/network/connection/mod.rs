//! Connection - Handles an individual client connection.
//!
//! Each Connection runs in its own Tokio task:
//!
//! ```text
//! Connecting ── credential accepted ──▶ Active ── any close signal ──▶ Closed
//!     │                                   │
//!     └─ auth_failed + close frame        └─ select! over inbound frames,
//!                                            outbound queue, keepalive, shutdown
//! ```
//!
//! Closed-state cleanup always runs through [`Matrix::close_connection`],
//! which is one-shot, so a transport close racing a server-side disconnect
//! cleans up exactly once.

mod error_handling;
mod event_loop;
mod handshake;

use crate::auth::Authenticator;
use crate::config::IdleTimeoutsConfig;
use crate::handlers::Registry;
use crate::state::Matrix;
use event_loop::{EventLoop, LoopExit};
use futures_util::SinkExt;
use futures_util::stream::{SplitSink, SplitStream, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{Span, debug, info};

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsStream = SplitStream<WebSocketStream<TcpStream>>;

/// A client connection handler.
pub struct Connection {
    addr: SocketAddr,
    ws: WebSocketStream<TcpStream>,
    /// Credential captured from the upgrade request, if any.
    credential: Option<String>,
    matrix: Arc<Matrix>,
    registry: Arc<Registry>,
    authenticator: Arc<Authenticator>,
    timeouts: IdleTimeoutsConfig,
}

impl Connection {
    pub fn new(
        addr: SocketAddr,
        ws: WebSocketStream<TcpStream>,
        credential: Option<String>,
        matrix: Arc<Matrix>,
        registry: Arc<Registry>,
        authenticator: Arc<Authenticator>,
        timeouts: IdleTimeoutsConfig,
    ) -> Self {
        Self {
            addr,
            ws,
            credential,
            matrix,
            registry,
            authenticator,
            timeouts,
        }
    }

    /// Run the connection until it reaches the Closed state.
    pub async fn run(self) -> anyhow::Result<()> {
        let Self {
            addr,
            ws,
            credential,
            matrix,
            registry,
            authenticator,
            timeouts,
        } = self;
        let (mut sink, mut stream) = ws.split();

        // Phase 1: Connecting
        let identity = match handshake::authenticate(
            &mut stream,
            credential,
            &authenticator,
            Duration::from_secs(timeouts.handshake),
        )
        .await
        {
            Ok(identity) => identity,
            Err(e) => {
                if let Some(reason) = e.metric_reason() {
                    crate::metrics::record_auth_failure(reason);
                }
                info!(%addr, error = %e, "Authentication failed");
                if let Some(reply) = error_handling::handshake_failure_reply(&e) {
                    let json = reply.to_json()?;
                    let _ = sink.send(Message::Text(json)).await;
                    let _ = sink.send(close_frame(CloseCode::Policy, "authentication failed")).await;
                }
                return Ok(());
            }
        };

        // Phase 2: Active
        let (handle, mut outbound) = matrix.activate(identity);
        let span = Span::current();
        span.record("conn", handle.id.as_str());
        span.record("user", handle.identity.id.as_str());

        let event_loop = EventLoop {
            matrix: &matrix,
            registry: &registry,
            handle: &handle,
            ping_after: Duration::from_secs(timeouts.ping),
            idle_limit: Duration::from_secs(timeouts.timeout),
        };
        let exit = event_loop.run(&mut sink, &mut stream, &mut outbound).await;
        match &exit {
            LoopExit::Transport(error) => info!(%error, "Transport failed"),
            LoopExit::PingTimeout { idle_secs } => info!(idle_secs, "Ping timeout"),
            LoopExit::ClientClosed | LoopExit::Shutdown => debug!(?exit, "Event loop finished"),
        }

        // Phase 3: Closed
        matrix.close_connection(&handle, exit.reason());
        if exit.peer_reachable() {
            let _ = sink.send(close_frame(CloseCode::Normal, exit.reason())).await;
        }
        Ok(())
    }
}

fn close_frame(code: CloseCode, reason: &'static str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: reason.into(),
    }))
}
