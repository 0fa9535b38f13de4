use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use kimp_core::net::messages::{ClientMessage, JoinMsg, JoinedMsg, ServerMessage};
use kimp_core::net::protocol::{decode_server_message, encode_client_message};

use kimp_server::config::ServerConfig;
use kimp_server::{build_app, spawn_background_tasks};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a server with default settings, except that the lobby
    /// heartbeat is slowed down so tests see only event-driven frames.
    pub async fn new() -> Self {
        let mut config = ServerConfig::default();
        config.game.lobby_heartbeat_ms = 600_000;
        Self::from_config(config).await
    }

    pub async fn from_config(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, state) = build_app(config);
        spawn_background_tasks(&state);

        let handle = tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            _shutdown: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// POST /api/create-room and return the JSON body. Panics on non-200.
    pub async fn create_room(&self, body: Value) -> Value {
        let resp = reqwest::Client::new()
            .post(format!("{}/api/create-room", self.base_url()))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200, "create-room failed");
        resp.json().await.unwrap()
    }

    /// Create a room hosted by `name`. Returns `(room_id, host_key)`.
    pub async fn create_room_as(&self, name: &str) -> (String, String) {
        let body = self.create_room(serde_json::json!({ "name": name })).await;
        (
            body["roomId"].as_str().unwrap().to_string(),
            body["hostKey"].as_str().unwrap().to_string(),
        )
    }

    pub async fn room_info(&self, room_id: &str) -> reqwest::Response {
        reqwest::get(format!("{}/api/room/{room_id}", self.base_url()))
            .await
            .unwrap()
    }

    /// Poll the room info endpoint until `count` active players are listed.
    pub async fn wait_for_players(&self, room_id: &str, count: usize) {
        for _ in 0..100 {
            let info: Value = self.room_info(room_id).await.json().await.unwrap();
            if info["players"].as_array().map(Vec::len) == Some(count) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("room {room_id} never reached {count} players");
    }
}

pub async fn ws_connect(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

pub async fn ws_send(stream: &mut WsStream, msg: &ClientMessage) {
    let encoded = encode_client_message(msg).unwrap();
    stream.send(Message::Text(encoded.into())).await.unwrap();
}

pub async fn ws_send_raw(stream: &mut WsStream, text: &str) {
    stream.send(Message::Text(text.into())).await.unwrap();
}

pub fn join_msg(room_id: &str, name: &str) -> JoinMsg {
    JoinMsg {
        room_id: room_id.to_string(),
        name: name.to_string(),
        ..JoinMsg::default()
    }
}

/// Read the next text frame as a server message (5s timeout). Pings and
/// pongs are skipped.
pub async fn ws_read(stream: &mut WsStream) -> ServerMessage {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return decode_server_message(text.as_str()).unwrap(),
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for a server message")
}

/// Read until a message satisfying `pred` arrives, discarding the rest.
pub async fn ws_read_until(
    stream: &mut WsStream,
    pred: impl Fn(&ServerMessage) -> bool,
) -> ServerMessage {
    loop {
        let msg = ws_read(stream).await;
        if pred(&msg) {
            return msg;
        }
    }
}

/// Expect the server to close the connection within 5s.
pub async fn ws_expect_close(stream: &mut WsStream) {
    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "connection was not closed");
}

/// Join and return the `joined` reply. Panics on anything else.
pub async fn ws_join(stream: &mut WsStream, msg: JoinMsg) -> JoinedMsg {
    ws_send(stream, &ClientMessage::Join(msg)).await;
    match ws_read(stream).await {
        ServerMessage::Joined(joined) => *joined,
        other => panic!("Expected joined, got: {other:?}"),
    }
}

/// Join and return the error text. Panics on anything else.
pub async fn ws_join_expect_error(stream: &mut WsStream, msg: JoinMsg) -> String {
    ws_send(stream, &ClientMessage::Join(msg)).await;
    match ws_read(stream).await {
        ServerMessage::Error(err) => err.message,
        other => panic!("Expected error, got: {other:?}"),
    }
}

/// Host connection already joined, with its `lobby-update` consumed.
pub async fn host_in_lobby(server: &TestServer, name: &str) -> (WsStream, String) {
    let (room_id, host_key) = server.create_room_as(name).await;
    let mut host = ws_connect(&server.ws_url()).await;
    let joined = ws_join(
        &mut host,
        JoinMsg {
            host_key: Some(host_key),
            ..join_msg(&room_id, name)
        },
    )
    .await;
    assert!(joined.is_host);
    let _ = ws_read(&mut host).await;
    (host, room_id)
}
