//! Network listener configuration.

use serde::Deserialize;
use std::net::SocketAddr;

/// WebSocket listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    /// Address to bind to (e.g., "0.0.0.0:5000").
    pub address: SocketAddr,
    /// Allowed `Origin` header values. Empty means any origin is accepted.
    #[serde(default)]
    pub allow_origins: Vec<String>,
}

/// HTTP API and metrics listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Address to bind to (e.g., "127.0.0.1:5080").
    pub address: SocketAddr,
    /// Serve `/metrics` (default: true).
    #[serde(default = "super::types::default_true")]
    pub metrics: bool,
}
