use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use survival_host::app::AppState;
use survival_host::config::Config;
use survival_host::http::build_router;
use survival_host::ws::protocol::{ClientMsg, ServerMsg};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn new() -> Self {
        Self::from_config(Config {
            world_seed: Some(11),
            ..Config::default()
        })
        .await
    }

    async fn from_config(config: Config) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = build_router(AppState::new(config));
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            _shutdown: handle,
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn room_url(&self, code: &str) -> String {
        format!("ws://{}/ws?room={}", self.addr, code)
    }
}

pub async fn ws_connect(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

pub async fn ws_send(stream: &mut WsStream, msg: &ClientMsg) {
    let json = serde_json::to_string(msg).unwrap();
    stream.send(Message::Text(json)).await.unwrap();
}

/// Read the next server message, with a timeout.
pub async fn ws_read(stream: &mut WsStream) -> ServerMsg {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("timed out waiting for server message")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Skip messages until one matches.
pub async fn ws_read_until<F>(stream: &mut WsStream, mut pred: F) -> ServerMsg
where
    F: FnMut(&ServerMsg) -> bool,
{
    loop {
        let msg = ws_read(stream).await;
        if pred(&msg) {
            return msg;
        }
    }
}

/// Connect, go through the lobby handshake and return
/// `(stream, peer_id, room_code, color)`.
pub async fn join_lobby(url: &str, name: &str) -> (WsStream, uuid::Uuid, String, String) {
    let mut stream = ws_connect(url).await;
    let (peer_id, room) = match ws_read(&mut stream).await {
        ServerMsg::Welcome { peer_id, room, .. } => (peer_id, room),
        other => panic!("Expected Welcome, got: {other:?}"),
    };

    ws_send(
        &mut stream,
        &ClientMsg::JoinInfo {
            name: name.to_string(),
            color: None,
        },
    )
    .await;
    let color = match ws_read_until(&mut stream, |m| matches!(m, ServerMsg::LobbyInfo { .. })).await
    {
        ServerMsg::LobbyInfo { color, .. } => color,
        other => panic!("Expected LobbyInfo, got: {other:?}"),
    };
    ws_send(
        &mut stream,
        &ClientMsg::JoinInfo {
            name: name.to_string(),
            color: Some(color.clone()),
        },
    )
    .await;

    (stream, peer_id, room, color)
}
