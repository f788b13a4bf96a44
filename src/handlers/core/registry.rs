//! Event handler registry and dispatch.
//!
//! The `Registry` maps wire event names to handlers and keeps per-event usage
//! counters. Every dispatch is timed and runs inside an `event` span.

use super::context::{Context, Handler};
use crate::error::{HandlerError, HandlerResult};
use crate::handlers::{
    messaging::{MessageReadHandler, SendMessageHandler},
    room::{JoinRoomHandler, LeaveRoomHandler},
    typing::{StopTypingHandler, TypingHandler},
};
use crate::telemetry::{EventTimer, spans};
use roomcast_proto::{Envelope, kind};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{Instrument, debug};

/// Registry of event handlers.
pub struct Registry {
    handlers: HashMap<&'static str, Box<dyn Handler>>,
    /// Event usage counters.
    event_counts: HashMap<&'static str, Arc<AtomicU64>>,
}

impl Registry {
    /// Create a new registry with all handlers registered.
    pub fn new() -> Self {
        let mut handlers: HashMap<&'static str, Box<dyn Handler>> = HashMap::new();

        handlers.insert(kind::JOIN_ROOM, Box::new(JoinRoomHandler));
        handlers.insert(kind::LEAVE_ROOM, Box::new(LeaveRoomHandler));
        handlers.insert(kind::SEND_MESSAGE, Box::new(SendMessageHandler));
        handlers.insert(kind::MESSAGE_READ, Box::new(MessageReadHandler));
        handlers.insert(kind::TYPING, Box::new(TypingHandler));
        handlers.insert(kind::STOP_TYPING, Box::new(StopTypingHandler));

        let event_counts = handlers
            .keys()
            .map(|&name| (name, Arc::new(AtomicU64::new(0))))
            .collect();

        Self {
            handlers,
            event_counts,
        }
    }

    /// Usage counts for every registered event, in no particular order.
    pub fn get_event_stats(&self) -> Vec<(&'static str, u64)> {
        self.event_counts
            .iter()
            .map(|(&name, count)| (name, count.load(Ordering::Relaxed)))
            .collect()
    }

    /// Dispatch one decoded frame to its handler.
    pub async fn dispatch(&self, ctx: &Context<'_>, env: &Envelope) -> HandlerResult {
        let Some((&name, handler)) = self.handlers.get_key_value(env.event.as_str()) else {
            let err = if env.event == kind::AUTHENTICATE {
                HandlerError::AlreadyAuthenticated
            } else {
                HandlerError::UnknownEvent(env.event.clone())
            };
            crate::metrics::record_event_error(&env.event, err.error_code());
            return Err(err);
        };

        if let Some(counter) = self.event_counts.get(name) {
            counter.fetch_add(1, Ordering::Relaxed);
        }

        let room = env.data.as_str().or_else(|| {
            env.data
                .get("roomId")
                .and_then(serde_json::Value::as_str)
        });
        let span = spans::event(name, room);
        let _timer = EventTimer::new(name);

        let result = handler.handle(ctx, env).instrument(span).await;

        if let Err(ref e) = result {
            if matches!(e, HandlerError::RateLimited) {
                crate::metrics::inc_rate_limited();
            }
            crate::metrics::record_event_error(name, e.error_code());
            debug!(event = %name, conn = %ctx.conn_id(), error = %e, "event error");
        }

        result
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
