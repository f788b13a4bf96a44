//! Rate limiting for flood protection.
//!
//! Provides governor-based rate limiting for:
//! - Room commands per connection (send-message, typing, stop-typing, message-read)
//! - Connection attempts per IP
//! - Room joins per connection
//!
//! Each limiter type has its own storage so one kind of traffic never
//! consumes another's budget.

use crate::config::RateLimitConfig;
use crate::state::ConnId;
use dashmap::DashMap;
use governor::{Quota, RateLimiter as GovRateLimiter};
use nonzero_ext::nonzero;
use std::net::IpAddr;
use std::num::NonZeroU32;
use tracing::debug;

/// Type alias for governor's direct rate limiter.
type DirectRateLimiter = governor::DefaultDirectRateLimiter;

/// Limiter tables above this size are cleared by [`RateLimitManager::cleanup`].
const MAX_ENTRIES: usize = 10_000;

/// Thread-safe rate limit manager using governor.
#[derive(Debug)]
pub struct RateLimitManager {
    message_limiters: DashMap<ConnId, DirectRateLimiter>,
    connection_limiters: DashMap<IpAddr, DirectRateLimiter>,
    join_limiters: DashMap<ConnId, DirectRateLimiter>,
    config: RateLimitConfig,
}

impl RateLimitManager {
    /// Create a new rate limit manager with the given configuration.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            message_limiters: DashMap::new(),
            connection_limiters: DashMap::new(),
            join_limiters: DashMap::new(),
            config,
        }
    }

    /// Check if a connection can issue another room command.
    ///
    /// Returns `true` if allowed, `false` if rate limited.
    pub fn check_message_rate(&self, conn: &ConnId) -> bool {
        let limiter = self.message_limiters.entry(conn.clone()).or_insert_with(|| {
            let rate = NonZeroU32::new(self.config.message_rate_per_second)
                .unwrap_or(nonzero!(2u32));
            GovRateLimiter::direct(Quota::per_second(rate))
        });

        let allowed = limiter.check().is_ok();
        if !allowed {
            debug!(conn = %conn, "message rate limit exceeded");
        }
        allowed
    }

    /// Check if an IP can open a new connection.
    pub fn check_connection_rate(&self, ip: IpAddr) -> bool {
        let limiter = self.connection_limiters.entry(ip).or_insert_with(|| {
            let burst = NonZeroU32::new(self.config.connection_burst_per_ip)
                .unwrap_or(nonzero!(3u32));
            // 1 connection per second with burst
            GovRateLimiter::direct(Quota::per_second(nonzero!(1u32)).allow_burst(burst))
        });

        let allowed = limiter.check().is_ok();
        if !allowed {
            debug!(ip = %ip, "connection rate limit exceeded");
        }
        allowed
    }

    /// Check if a connection can join another room.
    pub fn check_join_rate(&self, conn: &ConnId) -> bool {
        let limiter = self.join_limiters.entry(conn.clone()).or_insert_with(|| {
            let burst = NonZeroU32::new(self.config.join_burst_per_client)
                .unwrap_or(nonzero!(5u32));
            // 1 join per second with burst
            GovRateLimiter::direct(Quota::per_second(nonzero!(1u32)).allow_burst(burst))
        });

        let allowed = limiter.check().is_ok();
        if !allowed {
            debug!(conn = %conn, "join rate limit exceeded");
        }
        allowed
    }

    /// Remove a connection from all per-connection limiters (on close).
    pub fn remove_client(&self, conn: &ConnId) {
        self.message_limiters.remove(conn);
        self.join_limiters.remove(conn);
    }

    /// Cleanup old entries to prevent memory growth.
    ///
    /// Called periodically from the maintenance task in `main`.
    pub fn cleanup(&self) {
        if self.message_limiters.len() > MAX_ENTRIES {
            self.message_limiters.clear();
            debug!("cleared message rate limiters (exceeded {} entries)", MAX_ENTRIES);
        }
        if self.connection_limiters.len() > MAX_ENTRIES {
            self.connection_limiters.clear();
            debug!("cleared connection rate limiters (exceeded {} entries)", MAX_ENTRIES);
        }
        if self.join_limiters.len() > MAX_ENTRIES {
            self.join_limiters.clear();
            debug!("cleared join rate limiters (exceeded {} entries)", MAX_ENTRIES);
        }
    }
}
