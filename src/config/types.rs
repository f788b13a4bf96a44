//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use super::defaults::*;
use super::listen::{HttpConfig, ListenConfig};
use super::security::SecurityConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Returns `true` (for serde defaults).
pub fn default_true() -> bool {
    true
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server information.
    #[serde(default)]
    pub server: ServerConfig,
    /// WebSocket listen configuration.
    pub listen: ListenConfig,
    /// Optional HTTP API / metrics listener.
    pub http: Option<HttpConfig>,
    /// Credential verification.
    pub auth: AuthConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Room behaviour (access policy, typing window, message limits).
    #[serde(default)]
    pub rooms: RoomsConfig,
    /// Security configuration (rate limiting).
    #[serde(default)]
    pub security: SecurityConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }
}

/// Server identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server name, used in logs and the health endpoint.
    #[serde(default = "default_server_name")]
    pub name: String,
    /// Idle timeout configuration for handshake and keepalive.
    #[serde(default)]
    pub idle_timeouts: IdleTimeoutsConfig,
    /// Per-connection outbound event queue capacity.
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
            idle_timeouts: IdleTimeoutsConfig::default(),
            outbound_queue: default_outbound_queue(),
        }
    }
}

/// Idle timeout configuration for client connection keepalive.
///
/// - `handshake`: Seconds allowed to present a credential (default: 10)
/// - `ping`: Seconds of inbound silence before the server sends a ping (default: 30)
/// - `timeout`: Seconds of inbound silence before the connection is dropped (default: 60)
#[derive(Debug, Clone, Deserialize)]
pub struct IdleTimeoutsConfig {
    #[serde(default = "default_handshake_timeout")]
    pub handshake: u64,
    #[serde(default = "default_ping_interval")]
    pub ping: u64,
    #[serde(default = "default_ping_timeout")]
    pub timeout: u64,
}

impl Default for IdleTimeoutsConfig {
    fn default() -> Self {
        Self {
            handshake: default_handshake_timeout(),
            ping: default_ping_interval(),
            timeout: default_ping_timeout(),
        }
    }
}

/// Credential verification configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret used to verify HS256 bearer tokens.
    pub jwt_secret: String,
    /// Allowed clock skew when checking `exp`, in seconds.
    #[serde(default = "default_jwt_leeway")]
    pub leeway_secs: u64,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file (`:memory:` for an ephemeral store).
    #[serde(default = "default_database_path")]
    pub path: String,
    /// Capacity of the write-through queue.
    #[serde(default = "default_persistence_queue")]
    pub write_queue: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            write_queue: default_persistence_queue(),
        }
    }
}

/// Who may join a room.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccessPolicy {
    /// Any authenticated identity may join any room id.
    #[default]
    Open,
    /// The room must exist; private rooms admit participants only.
    Participants,
}

/// Room behaviour.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomsConfig {
    /// Join admission policy.
    #[serde(default)]
    pub access: AccessPolicy,
    /// Inactivity window after which a typing indicator expires.
    #[serde(default = "default_typing_timeout_ms")]
    pub typing_timeout_ms: u64,
    /// Maximum message length in characters.
    #[serde(default = "default_max_content_len")]
    pub max_content_len: usize,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            access: AccessPolicy::default(),
            typing_timeout_ms: default_typing_timeout_ms(),
            max_content_len: default_max_content_len(),
        }
    }
}

impl RoomsConfig {
    pub fn typing_timeout(&self) -> Duration {
        Duration::from_millis(self.typing_timeout_ms)
    }
}
