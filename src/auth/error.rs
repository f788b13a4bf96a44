//! Authentication error types

use thiserror::Error;

/// Reasons a credential is rejected during the handshake.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No credential was presented
    #[error("no authentication token provided")]
    MissingToken,

    /// The token is not a well-formed JWT
    #[error("invalid token format: {0}")]
    InvalidFormat(String),

    /// The token signature verification failed
    #[error("token signature verification failed")]
    InvalidSignature,

    /// The token has expired
    #[error("token has expired")]
    Expired,

    /// The token names an identity the store does not know
    #[error("unknown identity: {0}")]
    UnknownIdentity(String),

    /// The identity store could not be queried
    #[error("identity store unavailable: {0}")]
    Store(String),

    /// Any other JWT decoding error from the jsonwebtoken crate
    #[error("JWT error: {0}")]
    JwtError(jsonwebtoken::errors::Error),
}

impl AuthError {
    /// Static label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingToken => "missing",
            Self::InvalidFormat(_) => "malformed",
            Self::InvalidSignature => "signature",
            Self::Expired => "expired",
            Self::UnknownIdentity(_) => "unknown_identity",
            Self::Store(_) => "store",
            Self::JwtError(_) => "invalid",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => Self::InvalidFormat(err.to_string()),
            _ => Self::JwtError(err),
        }
    }
}
