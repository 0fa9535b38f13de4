use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::{Bullet, Coin, Enemy, Pickup};
use crate::player::{ConnectionId, Player, PlayerId, sanitize_name};
use crate::time::Millis;

pub const MIN_TARGET_SCORE: u32 = 10;
pub const MAX_TARGET_SCORE: u32 = 500;
pub const MIN_MAX_PLAYERS: u8 = 2;
pub const MAX_MAX_PLAYERS: u8 = 15;
pub const MIN_TIMEOUT_MINUTES: u32 = 2;
pub const MAX_TIMEOUT_MINUTES: u32 = 60;
pub const MAX_PASSCODE_LEN: usize = 32;

/// Per-room settings, fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomConfig {
    pub target_score: u32,
    pub max_players: u8,
    pub room_timeout_minutes: u32,
    pub passcode_enabled: bool,
    pub death_penalty_enabled: bool,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            target_score: 50,
            max_players: 15,
            room_timeout_minutes: 10,
            passcode_enabled: true,
            death_penalty_enabled: true,
        }
    }
}

impl RoomConfig {
    pub fn timeout_ms(&self) -> Millis {
        Millis::from(self.room_timeout_minutes) * 60_000
    }
}

/// Lifecycle state of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomState {
    Lobby,
    Running,
    Results,
}

/// Body of a room-creation request. Fields are loosely typed: anything
/// missing, mistyped or out of range falls back to the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateRoomRequest {
    pub name: Option<String>,
    pub target_score: Value,
    pub max_players: Value,
    pub passcode: Option<String>,
    pub passcode_enabled: Value,
    pub death_penalty_enabled: Value,
    pub room_timeout_minutes: Value,
}

/// Validated result of a [`CreateRoomRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRoom {
    pub host_name: String,
    pub config: RoomConfig,
    pub passcode: Option<String>,
}

fn int_in_range(value: &Value, min: i64, max: i64) -> Option<i64> {
    value.as_i64().filter(|n| (min..=max).contains(n))
}

impl CreateRoomRequest {
    /// Apply range checks on top of `defaults`. Fails only when the host
    /// name is unusable.
    pub fn normalize(&self, defaults: &RoomConfig) -> Option<NormalizedRoom> {
        let host_name = sanitize_name(self.name.as_deref().unwrap_or("Host"))?;

        let mut config = defaults.clone();
        if let Some(n) = int_in_range(
            &self.target_score,
            MIN_TARGET_SCORE.into(),
            MAX_TARGET_SCORE.into(),
        ) {
            config.target_score = n as u32;
        }
        if let Some(n) = int_in_range(
            &self.max_players,
            MIN_MAX_PLAYERS.into(),
            MAX_MAX_PLAYERS.into(),
        ) {
            config.max_players = n as u8;
        }
        if let Some(b) = self.passcode_enabled.as_bool() {
            config.passcode_enabled = b;
        }
        if let Some(b) = self.death_penalty_enabled.as_bool() {
            config.death_penalty_enabled = b;
        }
        if let Some(n) = int_in_range(
            &self.room_timeout_minutes,
            MIN_TIMEOUT_MINUTES.into(),
            MAX_TIMEOUT_MINUTES.into(),
        ) {
            config.room_timeout_minutes = n as u32;
        }

        let passcode = self
            .passcode
            .as_deref()
            .map(str::trim)
            .filter(|p| config.passcode_enabled && !p.is_empty())
            .map(|p| p.chars().take(MAX_PASSCODE_LEN).collect());

        Some(NormalizedRoom {
            host_name,
            config,
            passcode,
        })
    }
}

/// One arena instance and everything in it.
#[derive(Debug, Clone)]
pub struct Room {
    pub id: String,
    pub host_key: String,
    pub host_name: String,
    pub passcode: Option<String>,
    pub config: RoomConfig,
    pub state: RoomState,
    /// Incremented on every match (re)start.
    pub match_id: u64,
    pub winner_id: Option<PlayerId>,
    pub created_at: Millis,
    pub last_active: Millis,
    /// First match start. Kept across rematches.
    pub game_started_at: Option<Millis>,
    /// Start of the current match.
    pub match_started_at: Millis,
    pub last_lobby_broadcast: Millis,
    pub last_powerup_spawn: Millis,
    pub powerups_spawned: u32,
    pub last_rapidfire_spawn: Millis,
    /// Lowercased names nobody but the host may take.
    pub reserved_names: HashSet<String>,
    /// In join order; host promotion picks the earliest active player.
    pub players: Vec<Player>,
    pub coins: Vec<Coin>,
    pub enemies: Vec<Enemy>,
    pub powerups: Vec<Pickup>,
    pub rapidfires: Vec<Pickup>,
    pub bullets: Vec<Bullet>,
}

impl Room {
    pub fn new(id: String, host_key: String, normalized: NormalizedRoom, now: Millis) -> Self {
        let mut reserved_names = HashSet::new();
        reserved_names.insert(normalized.host_name.to_lowercase());
        Self {
            id,
            host_key,
            host_name: normalized.host_name,
            passcode: normalized.passcode,
            config: normalized.config,
            state: RoomState::Lobby,
            match_id: 0,
            winner_id: None,
            created_at: now,
            last_active: now,
            game_started_at: None,
            match_started_at: 0,
            last_lobby_broadcast: now,
            last_powerup_spawn: 0,
            powerups_spawned: 0,
            last_rapidfire_spawn: 0,
            reserved_names,
            players: Vec::new(),
            coins: Vec::new(),
            enemies: Vec::new(),
            powerups: Vec::new(),
            rapidfires: Vec::new(),
            bullets: Vec::new(),
        }
    }

    pub fn touch(&mut self, now: Millis) {
        self.last_active = self.last_active.max(now);
    }

    pub fn is_idle(&self, now: Millis) -> bool {
        now.saturating_sub(self.last_active) > self.config.timeout_ms()
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn player_by_connection(&self, conn: ConnectionId) -> Option<&Player> {
        self.players.iter().find(|p| p.connection == Some(conn))
    }

    pub fn active_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.is_active())
    }

    pub fn active_count(&self) -> usize {
        self.active_players().count()
    }

    /// Whether anyone (connected or within the reconnect grace) holds the
    /// host role.
    pub fn has_host(&self) -> bool {
        self.players.iter().any(|p| p.is_host)
    }

    pub fn host(&self) -> Option<&Player> {
        self.active_players().find(|p| p.is_host)
    }

    pub fn is_cosmetic_taken(&self, cosmetic: u8) -> bool {
        self.active_players().any(|p| p.cosmetic == cosmetic)
    }

    /// Connections of every member that should receive room broadcasts.
    pub fn connections(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.players.iter().filter_map(|p| p.connection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(value: Value) -> CreateRoomRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn room_state_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&RoomState::Running).unwrap(),
            "\"running\""
        );
    }

    #[test]
    fn config_serializes_camel_case() {
        let v = serde_json::to_value(RoomConfig::default()).unwrap();
        assert_eq!(v["targetScore"], 50);
        assert_eq!(v["maxPlayers"], 15);
        assert_eq!(v["roomTimeoutMinutes"], 10);
        assert_eq!(v["passcodeEnabled"], true);
        assert_eq!(v["deathPenaltyEnabled"], true);
    }

    #[test]
    fn normalize_accepts_values_in_range() {
        let n = request(json!({
            "name": "Host",
            "targetScore": 10,
            "maxPlayers": 2,
            "roomTimeoutMinutes": 60,
            "passcodeEnabled": true,
            "deathPenaltyEnabled": false,
            "passcode": "  secret  "
        }))
        .normalize(&RoomConfig::default())
        .unwrap();
        assert_eq!(n.config.target_score, 10);
        assert_eq!(n.config.max_players, 2);
        assert_eq!(n.config.room_timeout_minutes, 60);
        assert!(!n.config.death_penalty_enabled);
        assert_eq!(n.passcode.as_deref(), Some("secret"));
    }

    #[test]
    fn normalize_falls_back_on_out_of_range() {
        let n = request(json!({
            "name": "Host",
            "targetScore": 9,
            "maxPlayers": 16,
            "roomTimeoutMinutes": 1,
            "deathPenaltyEnabled": "yes"
        }))
        .normalize(&RoomConfig::default())
        .unwrap();
        assert_eq!(n.config, RoomConfig::default());
    }

    #[test]
    fn normalize_ignores_non_integers() {
        let n = request(json!({ "targetScore": 12.5, "maxPlayers": "4" }))
            .normalize(&RoomConfig::default())
            .unwrap();
        assert_eq!(n.config.target_score, 50);
        assert_eq!(n.config.max_players, 15);
        assert_eq!(n.host_name, "Host");
    }

    #[test]
    fn passcode_dropped_when_disabled_or_blank() {
        let disabled = request(json!({ "passcode": "abc", "passcodeEnabled": false }))
            .normalize(&RoomConfig::default())
            .unwrap();
        assert!(disabled.passcode.is_none());

        let blank = request(json!({ "passcode": "   " }))
            .normalize(&RoomConfig::default())
            .unwrap();
        assert!(blank.passcode.is_none());
    }

    #[test]
    fn passcode_truncated() {
        let long = "x".repeat(40);
        let n = request(json!({ "passcode": long }))
            .normalize(&RoomConfig::default())
            .unwrap();
        assert_eq!(n.passcode.unwrap().len(), MAX_PASSCODE_LEN);
    }

    #[test]
    fn invalid_host_name_rejected() {
        assert!(
            request(json!({ "name": "a" }))
                .normalize(&RoomConfig::default())
                .is_none()
        );
    }

    #[test]
    fn new_room_reserves_host_name() {
        let n = request(json!({ "name": "Captain" }))
            .normalize(&RoomConfig::default())
            .unwrap();
        let room = Room::new("0a0b0c0d".into(), "key".into(), n, 1_000);
        assert!(room.reserved_names.contains("captain"));
        assert_eq!(room.state, RoomState::Lobby);
        assert_eq!(room.match_id, 0);
        assert!(room.game_started_at.is_none());
    }

    #[test]
    fn idle_after_timeout() {
        let n = request(json!({ "roomTimeoutMinutes": 2 }))
            .normalize(&RoomConfig::default())
            .unwrap();
        let room = Room::new("0a0b0c0d".into(), "key".into(), n, 0);
        assert!(!room.is_idle(120_000));
        assert!(room.is_idle(120_001));
    }
}
