//! HTTP API: health, Prometheus metrics and the room REST surface.
//!
//! Runs on its own listener beside the WebSocket gateway. Room creation is
//! the one HTTP path that reaches into the real-time engine: new rooms are
//! announced with `room-created` to every participant that is connected.

use crate::access::{AccessDecision, RoomAccess};
use crate::auth::{AuthError, Authenticator, Identity, bearer_token};
use crate::config::HttpConfig;
use crate::db::{Database, DbError};
use crate::state::Matrix;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{DateTime, Utc};
use roomcast_proto::{MessageBody, RoomId, RoomInfo, RoomKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Messages returned by `GET /rooms/{id}/messages`.
const HISTORY_LIMIT: u32 = 50;

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub struct ApiState {
    pub matrix: Arc<Matrix>,
    pub db: Database,
    pub authenticator: Arc<Authenticator>,
    pub access: Arc<dyn RoomAccess>,
}

/// Errors returned by API handlers, rendered as `{"error", "code"}`.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized(AuthError),
    Forbidden(String),
    NotFound(&'static str),
    BadRequest(String),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, error) = match self {
            Self::Unauthorized(e) => (StatusCode::UNAUTHORIZED, "unauthorized", e.to_string()),
            Self::Forbidden(reason) => (StatusCode::FORBIDDEN, "forbidden", reason),
            Self::NotFound(what) => (StatusCode::NOT_FOUND, "not_found", format!("{what} not found")),
            Self::BadRequest(reason) => (StatusCode::BAD_REQUEST, "bad_request", reason),
            Self::Internal(reason) => {
                error!(error = %reason, "API request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "server error".to_string(),
                )
            }
        };
        (status, Json(ErrorBody { error, code })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Resolve the caller from the `Authorization` header.
async fn caller(state: &ApiState, headers: &HeaderMap) -> Result<Identity, ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token);
    state.authenticator.authenticate(token).await.map_err(|e| {
        crate::metrics::record_auth_failure(e.reason());
        ApiError::Unauthorized(e)
    })
}

fn parse_room(raw: String) -> Result<RoomId, ApiError> {
    RoomId::parse(raw).map_err(|e| ApiError::BadRequest(e.to_string()))
}

// ============================================================================
// Handlers
// ============================================================================

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Health {
    pub name: String,
    pub connections: usize,
    pub sessions: usize,
    pub rooms: usize,
}

/// GET /health
async fn health(State(state): State<ApiState>) -> Json<Health> {
    let matrix = &state.matrix;
    Json(Health {
        name: matrix.config.server_name.clone(),
        connections: matrix.connections.len(),
        sessions: matrix.sessions.len(),
        rooms: matrix.rooms.room_count(),
    })
}

/// GET /metrics - returns Prometheus metrics in text format.
async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

#[derive(Debug, Deserialize)]
pub struct CreateRoom {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: RoomKind,
    #[serde(default)]
    pub participants: Vec<String>,
}

/// POST /rooms
async fn create_room(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<CreateRoom>,
) -> ApiResult<RoomInfo> {
    let creator = caller(&state, &headers).await?;
    let name = body.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("room name is required".into()));
    }

    let rooms = state.db.rooms();
    let record = rooms
        .create(name, body.kind, &creator.id, &body.participants)
        .await?;
    let participants = rooms.participants(&record.id).await?;
    let info = record.into_info(participants);

    let reached = state.matrix.notify_room_created(&info);
    info!(room = %info.id, creator = %creator.id, reached, "Room created");
    Ok(Json(info))
}

/// GET /rooms - rooms the caller participates in.
async fn list_rooms(State(state): State<ApiState>, headers: HeaderMap) -> ApiResult<Vec<RoomInfo>> {
    let identity = caller(&state, &headers).await?;
    let rooms = state.db.rooms();

    let mut out = Vec::new();
    for record in rooms.list_for_user(&identity.id).await? {
        let participants = rooms.participants(&record.id).await?;
        out.push(record.into_info(participants));
    }
    Ok(Json(out))
}

/// GET /rooms/{id}/messages - latest messages, oldest first.
async fn room_messages(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(room): Path<String>,
) -> ApiResult<Vec<MessageBody>> {
    let identity = caller(&state, &headers).await?;
    let room = parse_room(room)?;

    if let AccessDecision::Denied(reason) = state.access.check(&identity, &room).await {
        warn!(room = %room, user = %identity.id, "History request denied");
        return Err(ApiError::Forbidden(reason));
    }

    Ok(Json(state.db.messages().recent(&room, HISTORY_LIMIT).await?))
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserPresence {
    pub id: String,
    pub username: String,
    pub status: String,
    pub last_seen: Option<DateTime<Utc>>,
}

/// GET /users/{id} - live presence, falling back to the stored record.
async fn user_presence(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> ApiResult<UserPresence> {
    caller(&state, &headers).await?;
    let record = state
        .db
        .users()
        .find_by_id(&user_id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    let stored_last_seen = record.last_seen.and_then(DateTime::from_timestamp_millis);
    let (status, last_seen) = match state.matrix.presence.get(&user_id) {
        Some(live) => (
            live.status.as_str().to_string(),
            live.last_seen.or(stored_last_seen),
        ),
        None => (record.status, stored_last_seen),
    };

    Ok(Json(UserPresence {
        id: record.id,
        username: record.username,
        status,
        last_seen,
    }))
}

// ============================================================================
// Server
// ============================================================================

/// Build the API router.
pub fn router(state: ApiState, serve_metrics: bool) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/rooms", get(list_rooms).post(create_room))
        .route("/rooms/:id/messages", get(room_messages))
        .route("/users/:id", get(user_presence));
    if serve_metrics {
        app = app.route("/metrics", get(metrics_handler));
    }
    app.with_state(state)
}

/// Run the HTTP server until `shutdown` fires.
///
/// This is a long-running task that should be spawned in the background.
pub async fn run_http_server(config: HttpConfig, state: ApiState, shutdown: CancellationToken) {
    let app = router(state, config.metrics);

    let listener = match tokio::net::TcpListener::bind(config.address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(address = %config.address, error = %e, "Failed to bind HTTP server");
            return;
        }
    };
    info!(address = %config.address, "HTTP API listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
    {
        error!(error = %e, "HTTP server error");
    }
}
