//! Security configuration for rate limiting.

use serde::Deserialize;

use super::defaults::{default_connection_burst, default_join_burst, default_message_rate};

/// Security configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecurityConfig {
    /// Rate limiting configuration.
    #[serde(default)]
    pub rate_limits: RateLimitConfig,
}

/// Rate limiting configuration.
///
/// Limits are applied per connection (messages, joins) and per remote IP
/// (new connections).
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Room commands (send-message, typing, message-read) allowed per second.
    #[serde(default = "default_message_rate")]
    pub message_rate_per_second: u32,
    /// Connection attempts allowed in a burst from one IP.
    #[serde(default = "default_connection_burst")]
    pub connection_burst_per_ip: u32,
    /// Room joins allowed in a burst from one connection.
    #[serde(default = "default_join_burst")]
    pub join_burst_per_client: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            message_rate_per_second: default_message_rate(),
            connection_burst_per_ip: default_connection_burst(),
            join_burst_per_client: default_join_burst(),
        }
    }
}
