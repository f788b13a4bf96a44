//! roomcastd - real-time room broadcast server
//!
//! Authenticated WebSocket clients join rooms, exchange messages and see each
//! other's presence and typing state as it happens.

mod access;
mod auth;
mod config;
mod db;
mod error;
mod handlers;
mod http;
mod metrics;
mod network;
mod security;
mod state;
mod telemetry;

use crate::access::{OpenAccess, ParticipantAccess, RoomAccess};
use crate::auth::{Authenticator, DbIdentityStore};
use crate::config::{AccessPolicy, Config};
use crate::db::{Database, PersistenceWriter};
use crate::network::Gateway;
use crate::security::RateLimitManager;
use crate::state::{Matrix, MatrixConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// How long connections get to finish Closed cleanup after shutdown starts.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("ROOMCAST_LOG_JSON").is_ok_and(|v| v == "1") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = config::validation::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        anyhow::bail!("{} configuration error(s) in {config_path}", errors.len());
    }

    info!(server = %config.server.name, "Starting roomcastd");

    metrics::init();

    // Initialize database
    let db = Database::new(&config.database.path).await?;
    info!(path = %config.database.path, "Database initialized");

    let shutdown = CancellationToken::new();
    let presence_stop = CancellationToken::new();
    let writer_stop = CancellationToken::new();

    // Write-through persistence
    let (writer, persist_rx) = PersistenceWriter::new(config.database.write_queue);
    let writer_task = tokio::spawn(db::run_writer(db.clone(), persist_rx, writer_stop.clone()));

    let access: Arc<dyn RoomAccess> = match config.rooms.access {
        AccessPolicy::Open => Arc::new(OpenAccess),
        AccessPolicy::Participants => Arc::new(ParticipantAccess::new(db.clone())),
    };
    info!(policy = ?config.rooms.access, "Room access policy");

    let authenticator = Arc::new(Authenticator::new(
        &config.auth,
        Arc::new(DbIdentityStore::new(db.clone())),
    ));

    let matrix = Matrix::new(
        MatrixConfig::from_config(&config),
        RateLimitManager::new(config.security.rate_limits.clone()),
        Arc::clone(&access),
        writer,
        shutdown.clone(),
    );
    let presence_task = matrix.spawn_presence_writer(presence_stop.clone());

    // Rate limiter pruning task (runs every 5 minutes)
    {
        let matrix = Arc::clone(&matrix);
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(300));
            loop {
                tokio::select! {
                    _ = interval.tick() => matrix.rate_limiter.cleanup(),
                    _ = shutdown.cancelled() => break,
                }
            }
        });
    }

    // HTTP API is optional.
    if let Some(http_config) = config.http.clone() {
        let state = http::ApiState {
            matrix: Arc::clone(&matrix),
            db: db.clone(),
            authenticator: Arc::clone(&authenticator),
            access,
        };
        tokio::spawn(http::run_http_server(http_config, state, shutdown.clone()));
    } else {
        info!("HTTP API disabled");
    }

    let gateway = Gateway::bind(
        &config.listen,
        config.server.idle_timeouts.clone(),
        Arc::clone(&matrix),
        authenticator,
        shutdown.clone(),
    )
    .await?;

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Shutdown requested"),
                Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
            }
            shutdown.cancel();
        });
    }

    info!(address = %config.listen.address, "Server ready");
    let result = gateway.run().await;

    // Let connection tasks run their Closed cleanup, then flush persistence.
    shutdown.cancel();
    let deadline = tokio::time::Instant::now() + DRAIN_TIMEOUT;
    while !matrix.connections.is_empty() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    if !matrix.connections.is_empty() {
        warn!(remaining = matrix.connections.len(), "Connections still open at shutdown");
    }

    presence_stop.cancel();
    if let Err(e) = presence_task.await {
        warn!(error = %e, "Presence forwarder ended abnormally");
    }
    writer_stop.cancel();
    if let Err(e) = writer_task.await {
        warn!(error = %e, "Persistence writer ended abnormally");
    }

    info!("Shutdown complete");
    result
}
