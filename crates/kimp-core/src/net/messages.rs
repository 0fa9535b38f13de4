use serde::{Deserialize, Serialize};

use crate::entity::Vec2;
use crate::player::PlayerId;
use crate::view::{GameView, LobbyView, ResultsView, RoomView};

// ============================================================================
// Client → server
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    Join(JoinMsg),
    Input(InputMsg),
    Start,
    Rematch,
    Timeout,
    Ping,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinMsg {
    #[serde(default)]
    pub room_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passcode: Option<String>,
    /// Kept wide so out-of-range picks reach validation instead of failing
    /// to parse.
    #[serde(default, alias = "spaceship", skip_serializing_if = "Option::is_none")]
    pub cosmetic: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputMsg {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<Vec2>,
    #[serde(default)]
    pub action: bool,
    #[serde(default)]
    pub powerup: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aim: Option<f32>,
}

// ============================================================================
// Server → client
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    Joined(Box<JoinedMsg>),
    LobbyUpdate(StateMsg<LobbyView>),
    MatchStart(StateMsg<Box<GameView>>),
    PlayerJoined(PlayerJoinedMsg),
    State(StateMsg<Box<GameView>>),
    MatchEnd(Box<MatchEndMsg>),
    HostChange(HostChangeMsg),
    Error(ErrorMsg),
    Pong,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinedMsg {
    pub room_id: String,
    pub player_id: PlayerId,
    pub is_host: bool,
    pub state: RoomView,
}

/// Wrapper for messages whose only payload is a room snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateMsg<V> {
    pub state: V,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerJoinedMsg {
    pub player_id: PlayerId,
    pub player_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchEndMsg {
    pub winner_id: Option<PlayerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timed_out: Option<bool>,
    pub state: ResultsView,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostChangeMsg {
    pub player_id: PlayerId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMsg {
    pub message: String,
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorMsg {
            message: message.into(),
        })
    }

    pub fn lobby_update(view: LobbyView) -> Self {
        Self::LobbyUpdate(StateMsg { state: view })
    }

    pub fn match_start(view: GameView) -> Self {
        Self::MatchStart(StateMsg {
            state: Box::new(view),
        })
    }

    pub fn state(view: GameView) -> Self {
        Self::State(StateMsg {
            state: Box::new(view),
        })
    }

    pub fn match_end(winner_id: Option<PlayerId>, timed_out: bool, view: ResultsView) -> Self {
        Self::MatchEnd(Box::new(MatchEndMsg {
            winner_id,
            timed_out: timed_out.then_some(true),
            state: view,
        }))
    }

    pub fn host_change(player_id: PlayerId) -> Self {
        Self::HostChange(HostChangeMsg { player_id })
    }
}
