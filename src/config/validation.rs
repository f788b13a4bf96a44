//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use std::path::Path;
use thiserror::Error;

/// Minimum accepted length of the token signing secret.
const MIN_SECRET_LEN: usize = 16;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("server.name is required")]
    MissingServerName,
    #[error("auth.jwt_secret must be at least {MIN_SECRET_LEN} characters, got {0}")]
    WeakJwtSecret(usize),
    #[error("server.idle_timeouts.timeout ({timeout}s) must exceed ping ({ping}s)")]
    TimeoutNotAfterPing { ping: u64, timeout: u64 },
    #[error("server.idle_timeouts.handshake must be non-zero")]
    ZeroHandshakeTimeout,
    #[error("server.idle_timeouts.ping must be non-zero")]
    ZeroPingInterval,
    #[error("server.outbound_queue must be non-zero")]
    ZeroOutboundQueue,
    #[error("rooms.typing_timeout_ms must be non-zero")]
    ZeroTypingTimeout,
    #[error("rooms.max_content_len must be non-zero")]
    ZeroContentLimit,
    #[error("listen.address and http.address must differ ({0})")]
    ListenerConflict(std::net::SocketAddr),
    #[error("database.path parent directory does not exist: {0}")]
    DatabasePathInvalid(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.name.is_empty() {
        errors.push(ValidationError::MissingServerName);
    }

    let secret_len = config.auth.jwt_secret.chars().count();
    if secret_len < MIN_SECRET_LEN {
        errors.push(ValidationError::WeakJwtSecret(secret_len));
    }

    let timeouts = &config.server.idle_timeouts;
    if timeouts.timeout <= timeouts.ping {
        errors.push(ValidationError::TimeoutNotAfterPing {
            ping: timeouts.ping,
            timeout: timeouts.timeout,
        });
    }
    if timeouts.handshake == 0 {
        errors.push(ValidationError::ZeroHandshakeTimeout);
    }
    if timeouts.ping == 0 {
        errors.push(ValidationError::ZeroPingInterval);
    }
    if config.server.outbound_queue == 0 {
        errors.push(ValidationError::ZeroOutboundQueue);
    }

    if config.rooms.typing_timeout_ms == 0 {
        errors.push(ValidationError::ZeroTypingTimeout);
    }
    if config.rooms.max_content_len == 0 {
        errors.push(ValidationError::ZeroContentLimit);
    }

    if let Some(http) = &config.http
        && http.address == config.listen.address
    {
        errors.push(ValidationError::ListenerConflict(http.address));
    }

    // Database path validation
    let db_path = Path::new(&config.database.path);
    if config.database.path != ":memory:"
        && let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        errors.push(ValidationError::DatabasePathInvalid(
            config.database.path.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_valid_config() -> String {
        r#"
[listen]
address = "127.0.0.1:5000"

[auth]
jwt_secret = "0123456789abcdef-test"

[database]
path = ":memory:"
"#
        .to_string()
    }

    #[test]
    fn test_valid_config_passes() {
        let config = Config::from_toml(&minimal_valid_config()).unwrap();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_weak_secret_rejected() {
        let toml_str = minimal_valid_config().replace("0123456789abcdef-test", "short");
        let config = Config::from_toml(&toml_str).unwrap();
        let errors = validate(&config).unwrap_err();
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, ValidationError::WeakJwtSecret(5)))
        );
    }

    #[test]
    fn test_collects_multiple_errors() {
        let toml_str = format!(
            "{}\n[rooms]\ntyping_timeout_ms = 0\nmax_content_len = 0\n",
            minimal_valid_config()
        );
        let config = Config::from_toml(&toml_str).unwrap();
        let errors = validate(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_timeout_must_exceed_ping() {
        let toml_str = format!(
            "{}\n[server.idle_timeouts]\nping = 60\ntimeout = 30\n",
            minimal_valid_config()
        );
        let config = Config::from_toml(&toml_str).unwrap();
        let errors = validate(&config).unwrap_err();
        assert!(matches!(
            errors[0],
            ValidationError::TimeoutNotAfterPing { ping: 60, timeout: 30 }
        ));
    }

    #[test]
    fn test_listener_conflict() {
        let toml_str = format!(
            "{}\n[http]\naddress = \"127.0.0.1:5000\"\n",
            minimal_valid_config()
        );
        let config = Config::from_toml(&toml_str).unwrap();
        let errors = validate(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::ListenerConflict(_)));
    }

    #[test]
    fn test_missing_database_parent() {
        let toml_str = minimal_valid_config().replace(":memory:", "/nonexistent/dir/db.sqlite");
        let config = Config::from_toml(&toml_str).unwrap();
        let errors = validate(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::DatabasePathInvalid(_)));
    }
}
