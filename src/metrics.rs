//! Prometheus metrics collection for roomcast.
//!
//! Exposed on the HTTP listener at `/metrics` when it is enabled.
//!
//! - `roomcast_events_total{event}` - Client events processed by kind
//! - `roomcast_event_duration_seconds{event}` - Event handling latency
//! - `roomcast_event_errors_total{event,error}` - Rejected client events
//! - `roomcast_broadcast_fanout` - Recipients per room broadcast

use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters
// ========================================================================

/// Events dropped because a recipient queue was full or closed.
pub static DELIVERY_FAILURES: OnceLock<IntCounter> = OnceLock::new();

/// Authentication failures by reason.
pub static AUTH_FAILURES: OnceLock<IntCounterVec> = OnceLock::new();

/// Write-through operations that failed or were dropped.
pub static PERSISTENCE_FAILURES: OnceLock<IntCounter> = OnceLock::new();

/// Total rate limit hits.
pub static RATE_LIMITED: OnceLock<IntCounter> = OnceLock::new();

// ========================================================================
// Gauges
// ========================================================================

/// Currently active (authenticated) connections.
pub static CONNECTED_SESSIONS: OnceLock<IntGauge> = OnceLock::new();

/// Rooms with at least one member.
pub static ACTIVE_ROOMS: OnceLock<IntGauge> = OnceLock::new();

// ========================================================================
// Event metrics
// ========================================================================

pub static EVENT_COUNTER: OnceLock<IntCounterVec> = OnceLock::new();

pub static EVENT_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

pub static EVENT_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

/// Recipients per room broadcast.
pub static BROADCAST_FANOUT: OnceLock<Histogram> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Safe to call more than once; later calls leave the first registration in place.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            if $metric.get().is_none() {
                match $init {
                    Ok(m) => {
                        if let Err(e) = r.register(Box::new(m.clone())) {
                            tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
                        }
                        let _ = $metric.set(m);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, concat!("Failed to create metric ", stringify!($metric)));
                    }
                }
            }
        };
    }

    register!(DELIVERY_FAILURES, IntCounter::new("roomcast_delivery_failures_total", "Events dropped for full or closed recipient queues"));
    register!(AUTH_FAILURES, IntCounterVec::new(Opts::new("roomcast_auth_failures_total", "Authentication failures by reason"), &["reason"]));
    register!(PERSISTENCE_FAILURES, IntCounter::new("roomcast_persistence_failures_total", "Write-through operations that failed or were dropped"));
    register!(RATE_LIMITED, IntCounter::new("roomcast_rate_limited_total", "Rate limit hits"));
    register!(CONNECTED_SESSIONS, IntGauge::new("roomcast_connected_sessions", "Currently active connections"));
    register!(ACTIVE_ROOMS, IntGauge::new("roomcast_active_rooms", "Rooms with at least one member"));
    register!(EVENT_COUNTER, IntCounterVec::new(Opts::new("roomcast_events_total", "Client events processed by kind"), &["event"]));
    register!(EVENT_LATENCY, HistogramVec::new(
        HistogramOpts::new("roomcast_event_duration_seconds", "Client event latency by kind")
            .buckets(vec![0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
        &["event"]));
    register!(EVENT_ERRORS, IntCounterVec::new(Opts::new("roomcast_event_errors_total", "Rejected client events by kind and error"), &["event", "error"]));
    register!(BROADCAST_FANOUT, Histogram::with_opts(
        HistogramOpts::new("roomcast_broadcast_fanout", "Recipients per room broadcast")
            .buckets(vec![1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0])));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Update helpers (no-ops until `init` has run)
// ============================================================================

pub fn record_event(event: &str, duration_secs: f64) {
    if let Some(c) = EVENT_COUNTER.get() {
        c.with_label_values(&[event]).inc();
    }
    if let Some(h) = EVENT_LATENCY.get() {
        h.with_label_values(&[event]).observe(duration_secs);
    }
}

pub fn record_event_error(event: &str, error: &str) {
    if let Some(c) = EVENT_ERRORS.get() {
        c.with_label_values(&[event, error]).inc();
    }
}

pub fn record_fanout(recipients: usize) {
    if let Some(h) = BROADCAST_FANOUT.get() {
        h.observe(recipients as f64);
    }
}

pub fn record_auth_failure(reason: &str) {
    if let Some(c) = AUTH_FAILURES.get() {
        c.with_label_values(&[reason]).inc();
    }
}

pub fn inc_delivery_failures() {
    if let Some(c) = DELIVERY_FAILURES.get() {
        c.inc();
    }
}

pub fn inc_persistence_failures() {
    if let Some(c) = PERSISTENCE_FAILURES.get() {
        c.inc();
    }
}

pub fn inc_rate_limited() {
    if let Some(c) = RATE_LIMITED.get() {
        c.inc();
    }
}

pub fn set_connected_sessions(count: usize) {
    if let Some(g) = CONNECTED_SESSIONS.get() {
        g.set(count as i64);
    }
}

pub fn set_active_rooms(count: usize) {
    if let Some(g) = ACTIVE_ROOMS.get() {
        g.set(count as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent_and_gathers() {
        init();
        init();
        record_event("join-room", 0.001);
        record_fanout(3);
        let text = gather_metrics();
        assert!(text.contains("roomcast_events_total"));
        assert!(text.contains("roomcast_broadcast_fanout"));
    }
}
