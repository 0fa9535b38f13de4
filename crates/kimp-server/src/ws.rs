use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use kimp_core::net::messages::{ClientMessage, ServerMessage};
use kimp_core::net::protocol::{decode_client_message, encode_server_message};
use kimp_core::player::ConnectionId;

use crate::game_loop::spawn_grace_timer;
use crate::rate_limit::TokenBucket;
use crate::room_manager::{HostCommand, Outbound, PlayerSender};
use crate::state::{AppState, ConnectionGuard};

pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let max_ws = state.config.limits.max_ws_connections;
    let current = state.ws_connection_count.load(Ordering::Relaxed);
    if current >= max_ws {
        tracing::warn!(current, max = max_ws, "WS connection limit reached");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    ws.max_message_size(state.config.limits.max_message_bytes)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let _guard = ConnectionGuard::new(Arc::clone(&state.ws_connection_count));
    let conn: ConnectionId = Uuid::new_v4();
    let (ws_sender, mut ws_receiver) = socket.split();

    let (tx, rx) = mpsc::channel(state.config.limits.player_message_buffer);
    state.rooms.write().await.register(conn, tx.clone());
    let writer = spawn_writer(ws_sender, rx);
    tracing::debug!(%conn, "Connection opened");

    read_loop(&mut ws_receiver, &state, conn, &tx).await;

    if let Some(pending) = state.rooms.write().await.disconnect(conn) {
        spawn_grace_timer(state.clone(), pending);
    }
    // The writer drains what is queued, then stops once every sender is gone.
    drop(tx);
    if let Err(e) = writer.await {
        tracing::debug!(%conn, error = %e, "Writer task failed");
    }
    tracing::debug!(%conn, "Connection closed");
}

fn spawn_writer(
    mut ws_sender: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Outbound>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let (msg, last) = match frame {
                Outbound::Text(text) => (Message::Text(text), false),
                Outbound::Ping => (Message::Ping(Bytes::new()), false),
                Outbound::Close(reason) => (
                    Message::Close(Some(CloseFrame {
                        code: close_code::NORMAL,
                        reason: reason.into(),
                    })),
                    true,
                ),
            };
            if ws_sender.send(msg).await.is_err() || last {
                break;
            }
        }
    })
}

async fn read_loop(
    ws_receiver: &mut SplitStream<WebSocket>,
    state: &AppState,
    conn: ConnectionId,
    tx: &PlayerSender,
) {
    let limits = &state.config.limits;
    let mut bucket = TokenBucket::new(limits.ws_rate_limit_burst, limits.ws_rate_limit_per_sec);

    let mut keepalive = tokio::time::interval(Duration::from_secs(
        state.config.game.keepalive_interval_secs,
    ));
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Skip);
    keepalive.tick().await;
    let mut alive = true;

    loop {
        tokio::select! {
            frame = ws_receiver.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {
                        alive = true;
                        continue;
                    },
                    Some(Err(e)) => {
                        tracing::debug!(%conn, error = %e, "WebSocket read failed");
                        break;
                    },
                };
                alive = true;

                if !bucket.allow() {
                    tracing::warn!(%conn, "Rate limited");
                    continue;
                }
                if handle_text(text.as_str(), state, conn, tx).await.is_break() {
                    break;
                }
            },
            _ = keepalive.tick() => {
                if !alive {
                    tracing::info!(%conn, "Keepalive missed, dropping connection");
                    break;
                }
                alive = false;
                if tx.try_send(Outbound::Ping).is_err() {
                    tracing::debug!(%conn, "Keepalive ping dropped (slow client)");
                }
            },
        }
    }
}

/// Dispatch one client frame. `Break` ends the connection.
async fn handle_text(
    text: &str,
    state: &AppState,
    conn: ConnectionId,
    tx: &PlayerSender,
) -> ControlFlow<()> {
    let msg = match decode_client_message(text) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::debug!(%conn, error = %e, "Dropping malformed message");
            return ControlFlow::Continue(());
        },
    };

    match msg {
        ClientMessage::Join(join) => {
            let result = state.rooms.write().await.join(conn, &join);
            if let Err(e) = result {
                tracing::debug!(%conn, room = %join.room_id, error = %e, "Join refused");
                reply(tx, &ServerMessage::error(e.to_string()));
                if e.closes_connection() {
                    let _ = tx.try_send(Outbound::Close("Room not found"));
                    return ControlFlow::Break(());
                }
            }
        },
        ClientMessage::Input(input) => state.rooms.write().await.input(conn, &input),
        ClientMessage::Start => state.rooms.write().await.command(conn, HostCommand::Start),
        ClientMessage::Rematch => state.rooms.write().await.command(conn, HostCommand::Rematch),
        ClientMessage::Timeout => state.rooms.write().await.command(conn, HostCommand::Timeout),
        ClientMessage::Ping => reply(tx, &ServerMessage::Pong),
    }
    ControlFlow::Continue(())
}

fn reply(tx: &PlayerSender, msg: &ServerMessage) {
    match encode_server_message(msg) {
        Ok(text) => {
            if tx.try_send(Outbound::Text(text.into())).is_err() {
                tracing::debug!("Reply dropped (slow client)");
            }
        },
        Err(e) => tracing::error!(error = %e, "Failed to encode reply"),
    }
}
