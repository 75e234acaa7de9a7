//! HTTP route definitions

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::app::AppState;
use crate::session::{RoomSummary, SessionError};
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.client_origin);

    Router::new()
        .route("/health", get(health_handler))
        .route("/rooms", get(list_rooms_handler).post(create_room_handler))
        .route("/rooms/:code", get(room_handler))
        .route("/ws", get(ws_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// CORS for the comma-separated `CLIENT_ORIGIN` list; any origin when empty
fn cors_layer(client_origin: &str) -> CorsLayer {
    let allowed_origins: Vec<HeaderValue> = client_origin
        .split(',')
        .filter_map(|s| {
            let s = s.trim();
            (!s.is_empty()).then(|| s.parse::<HeaderValue>().ok()).flatten()
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if allowed_origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(allowed_origins)
    }
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_rooms: usize,
    active_peers: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        active_rooms: state.rooms.active_rooms(),
        active_peers: state.rooms.total_peers(),
    })
}

// ============================================================================
// Room endpoints
// ============================================================================

#[derive(Serialize)]
struct CreateRoomResponse {
    code: String,
    ws_path: String,
}

async fn list_rooms_handler(State(state): State<AppState>) -> Json<Vec<RoomSummary>> {
    Json(state.rooms.list())
}

async fn create_room_handler(State(state): State<AppState>) -> impl IntoResponse {
    let room = state.rooms.create();
    info!(room = %room.code, "Room created over HTTP");
    (
        StatusCode::CREATED,
        Json(CreateRoomResponse {
            ws_path: format!("/ws?room={}", room.code),
            code: room.code,
        }),
    )
}

async fn room_handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<RoomSummary>, AppError> {
    state
        .rooms
        .get(&code)
        .map(|room| Json(room.summary()))
        .ok_or_else(|| SessionError::RoomNotFound(code).into())
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = match &self {
            AppError::Session(e) => (session_status(e), e.code()),
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}

fn session_status(e: &SessionError) -> StatusCode {
    match e {
        SessionError::RoomNotFound(_) => StatusCode::NOT_FOUND,
        SessionError::RoomFull | SessionError::GameAlreadyRunning | SessionError::NoPlayers => {
            StatusCode::CONFLICT
        }
        SessionError::RoomClosed => StatusCode::GONE,
        SessionError::NotLeader => StatusCode::FORBIDDEN,
    }
}
