//! Credential exchange for a freshly upgraded connection.
//!
//! The `Connecting` phase accepts nothing but a credential. It comes either
//! from the upgrade request (captured by the gateway) or from a first
//! `authenticate` frame. Nothing in the shared state is touched until the
//! credential is accepted.

use crate::auth::{AuthError, Authenticator, Identity};
use futures_util::{Stream, StreamExt};
use roomcast_proto::ClientEvent;
use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::debug;

#[derive(Debug, Error)]
pub(crate) enum HandshakeError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("no credential within the handshake timeout")]
    Timeout,
    #[error("peer closed during handshake")]
    Closed,
    #[error("transport error: {0}")]
    Transport(#[from] WsError),
}

impl HandshakeError {
    /// Label for the auth failure metric, None when the peer simply left.
    pub(super) fn metric_reason(&self) -> Option<&'static str> {
        match self {
            Self::Auth(e) => Some(e.reason()),
            Self::Timeout => Some("timeout"),
            Self::Closed | Self::Transport(_) => None,
        }
    }
}

/// Resolve the connection's identity within `within`.
pub(super) async fn authenticate<S>(
    stream: &mut S,
    captured: Option<String>,
    authenticator: &Authenticator,
    within: Duration,
) -> Result<Identity, HandshakeError>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    let exchange = async {
        let token = match captured {
            Some(token) => token,
            None => first_credential(stream).await?,
        };
        Ok::<_, HandshakeError>(authenticator.authenticate(Some(&token)).await?)
    };

    tokio::time::timeout(within, exchange)
        .await
        .unwrap_or(Err(HandshakeError::Timeout))
}

/// Wait for the first meaningful frame, which must be `authenticate`.
async fn first_credential<S>(stream: &mut S) -> Result<String, HandshakeError>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                return match ClientEvent::from_json(&text) {
                    Ok(ClientEvent::Authenticate { token }) => Ok(token),
                    Ok(other) => {
                        debug!(event = other.kind(), "event before authentication");
                        Err(AuthError::MissingToken.into())
                    }
                    Err(e) => {
                        debug!(error = %e, "unreadable frame before authentication");
                        Err(AuthError::MissingToken.into())
                    }
                };
            }
            Some(Ok(Message::Close(_))) | None => return Err(HandshakeError::Closed),
            // Control and binary frames don't carry credentials.
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
        }
    }
}
