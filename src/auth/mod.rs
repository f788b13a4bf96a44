//! Credential verification.
//!
//! Bearer tokens are HS256 JWTs whose `id` claim names a user in the identity
//! store. A connection must present one before it can do anything else.

mod error;
mod store;

pub use error::AuthError;
#[cfg(test)]
pub use store::StaticIdentities;
pub use store::{DbIdentityStore, IdentityStore};

use crate::config::AuthConfig;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// An authenticated user. Immutable for the life of a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub display_name: String,
}

/// Token claims.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Identity id.
    pub id: String,
    /// Expiry (seconds since the epoch).
    pub exp: u64,
}

/// Validates bearer credentials and resolves them to identities.
pub struct Authenticator {
    key: DecodingKey,
    validation: Validation,
    store: Arc<dyn IdentityStore>,
}

impl Authenticator {
    pub fn new(config: &AuthConfig, store: Arc<dyn IdentityStore>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway_secs;
        validation.set_required_spec_claims(&["exp"]);
        Self {
            key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            store,
        }
    }

    /// Verify `credential` and look up its identity.
    pub async fn authenticate(&self, credential: Option<&str>) -> Result<Identity, AuthError> {
        let token = credential
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let claims = decode::<Claims>(token, &self.key, &self.validation)?.claims;

        let identity = self
            .store
            .find(&claims.id)
            .await?
            .ok_or_else(|| AuthError::UnknownIdentity(claims.id.clone()))?;

        debug!(user = %identity.id, "credential accepted");
        Ok(identity)
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim())
        .filter(|t| !t.is_empty())
}
