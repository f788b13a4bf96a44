//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

// =============================================================================
// Server Defaults
// =============================================================================

pub fn default_server_name() -> String {
    "roomcast".to_string()
}

pub fn default_outbound_queue() -> usize {
    256
}

// =============================================================================
// Idle Timeout Defaults
// =============================================================================

pub fn default_handshake_timeout() -> u64 {
    10
}

pub fn default_ping_interval() -> u64 {
    30
}

pub fn default_ping_timeout() -> u64 {
    60
}

// =============================================================================
// Auth Defaults
// =============================================================================

pub fn default_jwt_leeway() -> u64 {
    30
}

// =============================================================================
// Room Defaults
// =============================================================================

pub fn default_typing_timeout_ms() -> u64 {
    2000
}

pub fn default_max_content_len() -> usize {
    4000
}

// =============================================================================
// Database Defaults
// =============================================================================

pub fn default_database_path() -> String {
    "roomcast.db".to_string()
}

pub fn default_persistence_queue() -> usize {
    1024
}

// =============================================================================
// Rate Limit Defaults
// =============================================================================

pub fn default_message_rate() -> u32 {
    10
}

pub fn default_connection_burst() -> u32 {
    10
}

pub fn default_join_burst() -> u32 {
    10
}
