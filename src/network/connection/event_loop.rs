//! Active-phase event loop.
//!
//! One `tokio::select!` multiplexes inbound frames, the outbound event queue,
//! keepalive ticks and the connection's shutdown token. The loop never mutates
//! shared state itself; text frames go through the handler registry.

use super::error_handling::{ReadErrorAction, classify_read_error};
use super::{WsSink, WsStream};
use crate::error::HandlerError;
use crate::handlers::{Context, Registry};
use crate::state::{ConnectionHandle, Matrix};
use futures_util::{SinkExt, StreamExt};
use roomcast_proto::{Envelope, ServerEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

/// Why the Active phase ended.
#[derive(Debug)]
pub(super) enum LoopExit {
    /// Close frame or end of stream from the client.
    ClientClosed,
    /// The transport failed or carried an unusable frame.
    Transport(String),
    /// Nothing received within the idle limit.
    PingTimeout { idle_secs: u64 },
    /// The connection or the whole server was told to stop.
    Shutdown,
}

impl LoopExit {
    pub(super) fn reason(&self) -> &'static str {
        match self {
            Self::ClientClosed => "client closed",
            Self::Transport(_) => "transport error",
            Self::PingTimeout { .. } => "ping timeout",
            Self::Shutdown => "disconnected",
        }
    }

    /// Whether a close frame can still reach the peer.
    pub(super) fn peer_reachable(&self) -> bool {
        matches!(self, Self::PingTimeout { .. } | Self::Shutdown)
    }
}

pub(super) struct EventLoop<'a> {
    pub matrix: &'a Arc<Matrix>,
    pub registry: &'a Registry,
    pub handle: &'a Arc<ConnectionHandle>,
    /// Inbound silence after which a ping is sent.
    pub ping_after: Duration,
    /// Inbound silence after which the connection is dropped.
    pub idle_limit: Duration,
}

impl EventLoop<'_> {
    pub(super) async fn run(
        &self,
        sink: &mut WsSink,
        stream: &mut WsStream,
        outbound: &mut mpsc::Receiver<Arc<ServerEvent>>,
    ) -> LoopExit {
        let shutdown = self.handle.shutdown_token().clone();
        let mut last_activity = Instant::now();
        let mut keepalive = tokio::time::interval_at(last_activity + self.ping_after, self.ping_after);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return LoopExit::Shutdown,

                frame = stream.next() => {
                    last_activity = Instant::now();
                    match frame {
                        Some(Ok(Message::Text(text))) => self.process_text(&text).await,
                        Some(Ok(Message::Close(_))) | None => return LoopExit::ClientClosed,
                        // Pings are answered by the transport; pongs only refresh activity.
                        Some(Ok(_)) => {}
                        Some(Err(e)) => match classify_read_error(&e) {
                            ReadErrorAction::Closed => return LoopExit::ClientClosed,
                            ReadErrorAction::FatalProtocolError { error_msg } => {
                                warn!(error = %error_msg, "Protocol error - disconnecting");
                                return LoopExit::Transport(error_msg);
                            }
                        },
                    }
                }

                event = outbound.recv() => {
                    let Some(event) = event else {
                        return LoopExit::Shutdown;
                    };
                    match event.to_json() {
                        Ok(json) => {
                            if let Err(e) = sink.send(Message::Text(json)).await {
                                debug!(error = %e, "Write failed");
                                return LoopExit::Transport(e.to_string());
                            }
                        }
                        Err(e) => warn!(event = event.kind(), error = %e, "Failed to encode event"),
                    }
                }

                _ = keepalive.tick() => {
                    let idle = last_activity.elapsed();
                    if idle >= self.idle_limit {
                        return LoopExit::PingTimeout { idle_secs: idle.as_secs() };
                    }
                    if idle >= self.ping_after
                        && let Err(e) = sink.send(Message::Ping(Vec::new())).await
                    {
                        return LoopExit::Transport(e.to_string());
                    }
                }
            }
        }
    }

    /// Decode and dispatch one text frame, replying with `error` on failure.
    async fn process_text(&self, text: &str) {
        let result = match Envelope::parse(text) {
            Ok(env) => {
                let ctx = Context::new(self.matrix, self.handle);
                self.registry.dispatch(&ctx, &env).await
            }
            Err(e) => {
                crate::metrics::record_event_error("frame", "malformed_payload");
                Err(HandlerError::from(e))
            }
        };

        if let Err(e) = result
            && let Some(reply) = e.to_reply()
            && self.handle.deliver(Arc::new(reply)).is_err()
        {
            debug!(error = %e, "Could not queue error reply");
        }
    }
}
