use std::net::SocketAddr;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::HeaderMap;
use axum::http::header::{HOST, ORIGIN};
use axum::response::Json;
use serde::Serialize;

use kimp_core::id::is_valid_room_id;
use kimp_core::room::{CreateRoomRequest, RoomConfig, RoomState};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomResponse {
    pub room_id: String,
    pub host_key: String,
    pub join_url: String,
    pub config: RoomConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfoResponse {
    pub room_id: String,
    pub state: RoomState,
    pub config: RoomInfoConfig,
    pub passcode_required: bool,
    pub players: Vec<RoomInfoPlayer>,
    pub taken_cosmetics: Vec<u8>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfoConfig {
    pub max_players: u8,
    pub target_score: u32,
    pub death_penalty_enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct RoomInfoPlayer {
    pub id: String,
    pub name: String,
    pub cosmetic: u8,
}

/// Origin used for join links: the configured public URL, else the
/// caller's `Origin`, else its `Host`.
fn join_origin(public_url: Option<&str>, headers: &HeaderMap) -> String {
    if let Some(url) = public_url {
        return url.trim_end_matches('/').to_string();
    }
    if let Some(origin) = headers.get(ORIGIN).and_then(|v| v.to_str().ok())
        && origin != "null"
    {
        return origin.trim_end_matches('/').to_string();
    }
    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("http://{host}")
}

/// POST /api/create-room. Unparseable bodies are treated as empty, so every
/// setting falls back to its default.
pub async fn create_room(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CreateRoomResponse>, AppError> {
    if !state.create_room_limiter.check_rate_limit(addr.ip()).await {
        tracing::warn!(ip = %addr.ip(), "Room creation rate limited");
        return Err(AppError::TooManyRequests);
    }

    let req: CreateRoomRequest = serde_json::from_slice(&body).unwrap_or_else(|e| {
        if !body.is_empty() {
            tracing::debug!(error = %e, "Ignoring malformed create-room body");
        }
        CreateRoomRequest::default()
    });

    let created = state
        .rooms
        .write()
        .await
        .create_room(&req)
        .ok_or_else(|| AppError::BadRequest("Invalid name".to_string()))?;

    let origin = join_origin(state.config.public_url.as_deref(), &headers);
    Ok(Json(CreateRoomResponse {
        join_url: format!("{origin}/play/{}", created.room_id),
        room_id: created.room_id,
        host_key: created.host_key,
        config: created.config,
    }))
}

/// GET /api/room/{room_id}. Public lobby details for the join screen.
pub async fn room_info(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomInfoResponse>, AppError> {
    let room_id = room_id.to_lowercase();
    if !is_valid_room_id(&room_id) {
        return Err(AppError::BadRequest("Invalid room id".to_string()));
    }

    let rooms = state.rooms.read().await;
    let room = rooms
        .room(&room_id)
        .ok_or_else(|| AppError::NotFound("Room not found".to_string()))?;

    let players: Vec<RoomInfoPlayer> = room
        .active_players()
        .map(|p| RoomInfoPlayer {
            id: p.id.clone(),
            name: p.name.clone(),
            cosmetic: p.cosmetic,
        })
        .collect();
    let taken_cosmetics = players.iter().map(|p| p.cosmetic).collect();

    Ok(Json(RoomInfoResponse {
        room_id: room.id.clone(),
        state: room.state,
        config: RoomInfoConfig {
            max_players: room.config.max_players,
            target_score: room.config.target_score,
            death_penalty_enabled: room.config.death_penalty_enabled,
        },
        passcode_required: room.passcode.is_some(),
        players,
        taken_cosmetics,
    }))
}
