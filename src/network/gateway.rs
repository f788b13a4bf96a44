//! Gateway - WebSocket listener that accepts incoming connections.
//!
//! The Gateway binds a TCP socket, performs the WebSocket upgrade (enforcing
//! allowed origins and capturing any bearer credential from the request), and
//! spawns a Connection task for each client.

use crate::auth::{Authenticator, bearer_token};
use crate::config::{IdleTimeoutsConfig, ListenConfig};
use crate::handlers::Registry;
use crate::network::Connection;
use crate::state::Matrix;
use crate::telemetry::spans;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, instrument, warn};

/// The Gateway accepts incoming WebSocket connections and spawns handlers.
pub struct Gateway {
    listener: TcpListener,
    allow_origins: Arc<[String]>,
    timeouts: IdleTimeoutsConfig,
    matrix: Arc<Matrix>,
    registry: Arc<Registry>,
    authenticator: Arc<Authenticator>,
    shutdown: CancellationToken,
}

impl Gateway {
    /// Bind the gateway to the configured address.
    pub async fn bind(
        listen: &ListenConfig,
        timeouts: IdleTimeoutsConfig,
        matrix: Arc<Matrix>,
        authenticator: Arc<Authenticator>,
        shutdown: CancellationToken,
    ) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(listen.address).await?;
        info!(address = %listen.address, "WebSocket listener bound");

        Ok(Self {
            listener,
            allow_origins: listen.allow_origins.clone().into(),
            timeouts,
            matrix,
            registry: Arc::new(Registry::new()),
            authenticator,
            shutdown,
        })
    }

    /// Run the gateway until the shutdown token fires.
    #[instrument(skip(self), name = "gateway")]
    pub async fn run(self) -> anyhow::Result<()> {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    let events = self.registry.get_event_stats();
                    info!(?events, "Gateway stopping");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => self.spawn_connection(stream, addr),
                    Err(e) => error!(error = %e, "Failed to accept connection"),
                },
            }
        }
    }

    fn spawn_connection(&self, stream: TcpStream, addr: SocketAddr) {
        // Check connection rate limit before upgrading
        if !self.matrix.rate_limiter.check_connection_rate(addr.ip()) {
            warn!(%addr, "Connection rate limit exceeded - rejecting");
            crate::metrics::inc_rate_limited();
            drop(stream);
            return;
        }

        let matrix = Arc::clone(&self.matrix);
        let registry = Arc::clone(&self.registry);
        let authenticator = Arc::clone(&self.authenticator);
        let allowed = Arc::clone(&self.allow_origins);
        let timeouts = self.timeouts.clone();

        tokio::spawn(
            async move {
                let mut credential = None;
                let callback = |req: &Request, response: Response| {
                    if !origin_allowed(&allowed, req) {
                        warn!(%addr, "WebSocket origin rejected");
                        return Err(forbidden("origin not allowed"));
                    }
                    credential = credential_from_request(req);
                    Ok(response)
                };

                match accept_hdr_async(stream, callback).await {
                    Ok(ws) => {
                        let connection = Connection::new(
                            addr,
                            ws,
                            credential,
                            matrix,
                            registry,
                            authenticator,
                            timeouts,
                        );
                        if let Err(e) = connection.run().await {
                            error!(error = %e, "Connection error");
                        }
                        info!("Connection closed");
                    }
                    Err(e) => warn!(error = %e, "WebSocket handshake failed"),
                }
            }
            .instrument(spans::connection(&addr)),
        );
    }
}

/// An empty allow-list (or `*`) accepts any origin; otherwise the request's
/// `Origin` header must be listed.
fn origin_allowed(allowed: &[String], req: &Request) -> bool {
    if allowed.is_empty() {
        return true;
    }
    req.headers()
        .get(http::header::ORIGIN)
        .and_then(|o| o.to_str().ok())
        .is_some_and(|origin| allowed.iter().any(|a| a == origin || a == "*"))
}

/// Credential presented with the upgrade request: an `Authorization: Bearer`
/// header, or failing that a `token` query parameter.
fn credential_from_request(req: &Request) -> Option<String> {
    let from_header = req
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token);
    if let Some(token) = from_header {
        return Some(token.to_string());
    }

    req.uri()
        .query()?
        .split('&')
        .find_map(|pair| pair.strip_prefix("token="))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn forbidden(reason: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(reason.to_string()));
    *response.status_mut() = http::StatusCode::FORBIDDEN;
    response
}
