//! Telemetry utilities for event timing and tracing spans.

use std::time::Instant;

/// Guard for timing event handling and recording metrics.
///
/// Records event latency when dropped.
pub struct EventTimer {
    event: &'static str,
    start: Instant,
}

impl EventTimer {
    /// Start timing an event.
    pub fn new(event: &'static str) -> Self {
        Self {
            event,
            start: Instant::now(),
        }
    }
}

impl Drop for EventTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        crate::metrics::record_event(self.event, duration);
    }
}

/// Standardized span constructors.
pub mod spans {
    use tracing::{Span, info_span};

    /// Span for a client connection.
    ///
    /// `conn` and `user` are recorded once the connection is authenticated.
    pub fn connection(addr: &std::net::SocketAddr) -> Span {
        info_span!(
            "connection",
            addr = %addr,
            conn = tracing::field::Empty,
            user = tracing::field::Empty
        )
    }

    /// Span for one client event.
    pub fn event(name: &str, room: Option<&str>) -> Span {
        if let Some(room) = room {
            info_span!("event", name = %name, room = %room)
        } else {
            info_span!("event", name = %name)
        }
    }
}
