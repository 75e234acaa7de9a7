//! WebSocket upgrade handler

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::{IntoResponse, Response},
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::PeerId;
use crate::http::routes::AppError;
use crate::session::{PeerLink, RoomHandle, SessionError};
use crate::util::rate_limit::PeerRateLimiter;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Code of the room to join; a new room is opened when absent
    #[serde(default)]
    pub room: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    let room = match query.room.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(code) => match state.rooms.get(code) {
            Some(room) => room,
            None => {
                warn!(room = %code, "WebSocket upgrade for unknown room");
                return AppError::from(SessionError::RoomNotFound(code.to_string())).into_response();
            }
        },
        None => state.rooms.create(),
    };

    let peer_id = Uuid::new_v4();
    info!(room = %room.code, peer_id = %peer_id, "WebSocket upgrade");
    ws.on_upgrade(move |socket| handle_socket(socket, peer_id, room))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, peer_id: PeerId, room: RoomHandle) {
    let (mut ws_sink, ws_stream) = socket.split();

    let (link, control_rx, state_rx) = PeerLink::channel();
    if let Err(e) = room.connect(peer_id, link).await {
        warn!(room = %room.code, peer_id = %peer_id, error = %e, "Room refused connection");
        let msg = ServerMsg::error(e.code(), e.to_string());
        if let Ok(json) = serde_json::to_string(&msg) {
            let _ = ws_sink.send(Message::Text(json)).await;
        }
        let _ = ws_sink.close().await;
        return;
    }

    run_session(peer_id, &room, ws_sink, ws_stream, control_rx, state_rx).await;

    // Cleanup on disconnect
    room.disconnect(peer_id).await;

    info!(room = %room.code, peer_id = %peer_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    peer_id: PeerId,
    room: &RoomHandle,
    ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
    control_rx: mpsc::UnboundedReceiver<Arc<str>>,
    state_rx: watch::Receiver<Option<Arc<str>>>,
) {
    let rate_limiter = PeerRateLimiter::new();

    // Spawn writer task: room -> WebSocket
    let writer_handle = tokio::spawn(write_loop(peer_id, ws_sink, control_rx, state_rx));

    // Reader loop: WebSocket -> room
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_message() {
                    warn!(peer_id = %peer_id, "Rate limited message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => {
                        if room.send(peer_id, msg).await.is_err() {
                            debug!(peer_id = %peer_id, "Room closed");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(peer_id = %peer_id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(peer_id = %peer_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(peer_id = %peer_id, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(peer_id = %peer_id, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(peer_id = %peer_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(peer_id = %peer_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

/// Forward room output to the socket. Control messages always go before a
/// pending snapshot; snapshots nobody got to in time are overwritten.
async fn write_loop(
    peer_id: PeerId,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut control_rx: mpsc::UnboundedReceiver<Arc<str>>,
    mut state_rx: watch::Receiver<Option<Arc<str>>>,
) {
    let mut state_open = true;
    loop {
        let text = tokio::select! {
            biased;
            msg = control_rx.recv() => match msg {
                Some(text) => text,
                None => {
                    debug!(peer_id = %peer_id, "Control channel closed");
                    break;
                }
            },
            changed = state_rx.changed(), if state_open => {
                if changed.is_err() {
                    state_open = false;
                    continue;
                }
                let latest = state_rx.borrow_and_update().clone();
                match latest {
                    Some(text) => text,
                    None => continue,
                }
            }
        };

        if let Err(e) = ws_sink.send(Message::Text(text.to_string())).await {
            debug!(peer_id = %peer_id, error = %e, "WebSocket send failed");
            break;
        }
    }
}
