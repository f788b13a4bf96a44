//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Core config struct definitions (Config, ServerConfig, AuthConfig, RoomsConfig)
//! - [`listen`]: Network listener configuration (ListenConfig, HttpConfig)
//! - [`security`]: Security configuration (SecurityConfig, RateLimitConfig)
//! - [`validation`]: Startup validation returning every problem found

mod defaults;
mod listen;
mod security;
mod types;
pub mod validation;

pub use listen::{HttpConfig, ListenConfig};
pub use security::RateLimitConfig;
pub use types::{AccessPolicy, AuthConfig, Config, IdleTimeoutsConfig};
