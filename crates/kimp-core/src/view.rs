//! Outgoing room snapshots. Only active players are listed, except on the
//! final scoreboard which covers everyone still in the room.

use serde::{Deserialize, Serialize};

use crate::entity::{Bullet, Coin, Enemy, Pickup};
use crate::player::{Player, PlayerId};
use crate::room::{Room, RoomConfig, RoomState};
use crate::time::Millis;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyPlayer {
    pub id: PlayerId,
    pub name: String,
    pub is_host: bool,
    pub score: u32,
    pub cosmetic: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyView {
    pub id: String,
    pub state: RoomState,
    pub config: RoomConfig,
    pub game_started_at: Option<Millis>,
    pub players: Vec<LobbyPlayer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub score: u32,
    pub alive: bool,
    pub is_host: bool,
    pub dashing: bool,
    pub has_powerup: bool,
    pub has_rapidfire: bool,
    pub cosmetic: u8,
    pub aim: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: String,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemySnapshot {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulletSnapshot {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameView {
    pub id: String,
    pub state: RoomState,
    pub config: RoomConfig,
    pub game_started_at: Option<Millis>,
    pub target_score: u32,
    pub match_id: u64,
    pub players: Vec<PlayerSnapshot>,
    pub coins: Vec<EntitySnapshot>,
    pub enemies: Vec<EnemySnapshot>,
    pub powerups: Vec<EntitySnapshot>,
    pub rapidfires: Vec<EntitySnapshot>,
    pub bullets: Vec<BulletSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreEntry {
    pub id: PlayerId,
    pub name: String,
    pub score: u32,
    pub is_host: bool,
    pub cosmetic: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsView {
    #[serde(flatten)]
    pub game: GameView,
    pub winner_id: Option<PlayerId>,
    /// Highest score first.
    pub scores: Vec<ScoreEntry>,
}

/// Whichever view matches the room's current state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoomView {
    Results(Box<ResultsView>),
    Game(Box<GameView>),
    Lobby(LobbyView),
}

impl RoomView {
    pub fn state(&self) -> RoomState {
        match self {
            Self::Results(r) => r.game.state,
            Self::Game(g) => g.state,
            Self::Lobby(l) => l.state,
        }
    }
}

pub fn lobby_view(room: &Room) -> LobbyView {
    LobbyView {
        id: room.id.clone(),
        state: room.state,
        config: room.config.clone(),
        game_started_at: room.game_started_at,
        players: room
            .active_players()
            .map(|p| LobbyPlayer {
                id: p.id.clone(),
                name: p.name.clone(),
                is_host: p.is_host,
                score: p.score,
                cosmetic: p.cosmetic,
            })
            .collect(),
    }
}

fn player_snapshot(p: &Player, now: Millis) -> PlayerSnapshot {
    PlayerSnapshot {
        id: p.id.clone(),
        name: p.name.clone(),
        x: p.pos.x.round(),
        y: p.pos.y.round(),
        score: p.score,
        alive: p.alive,
        is_host: p.is_host,
        dashing: p.is_dashing(now),
        has_powerup: p.powerup.is_some(),
        has_rapidfire: p.rapidfire.is_some(),
        cosmetic: p.cosmetic,
        aim: p.aim,
    }
}

fn coin_snapshot(c: &Coin) -> EntitySnapshot {
    EntitySnapshot {
        id: c.id.clone(),
        x: c.pos.x.round(),
        y: c.pos.y.round(),
    }
}

fn pickup_snapshot(p: &Pickup) -> EntitySnapshot {
    EntitySnapshot {
        id: p.id.clone(),
        x: p.pos.x.round(),
        y: p.pos.y.round(),
    }
}

fn enemy_snapshot(e: &Enemy) -> EnemySnapshot {
    EnemySnapshot {
        id: e.id.clone(),
        x: e.pos.x.round(),
        y: e.pos.y.round(),
        active: e.is_active(),
    }
}

fn bullet_snapshot(b: &Bullet) -> BulletSnapshot {
    BulletSnapshot {
        id: b.id.clone(),
        x: b.pos.x.round(),
        y: b.pos.y.round(),
        vx: b.vel.x,
        vy: b.vel.y,
    }
}

pub fn game_view(room: &Room, now: Millis) -> GameView {
    GameView {
        id: room.id.clone(),
        state: room.state,
        config: room.config.clone(),
        game_started_at: room.game_started_at,
        target_score: room.config.target_score,
        match_id: room.match_id,
        players: room
            .active_players()
            .map(|p| player_snapshot(p, now))
            .collect(),
        coins: room.coins.iter().map(coin_snapshot).collect(),
        enemies: room.enemies.iter().map(enemy_snapshot).collect(),
        powerups: room.powerups.iter().map(pickup_snapshot).collect(),
        rapidfires: room.rapidfires.iter().map(pickup_snapshot).collect(),
        bullets: room.bullets.iter().map(bullet_snapshot).collect(),
    }
}

pub fn results_view(room: &Room, now: Millis) -> ResultsView {
    let mut game = game_view(room, now);
    game.state = RoomState::Results;
    let mut scores: Vec<ScoreEntry> = room
        .players
        .iter()
        .map(|p| ScoreEntry {
            id: p.id.clone(),
            name: p.name.clone(),
            score: p.score,
            is_host: p.is_host,
            cosmetic: p.cosmetic,
        })
        .collect();
    // Stable: ties keep join order.
    scores.sort_by(|a, b| b.score.cmp(&a.score));
    ResultsView {
        game,
        winner_id: room.winner_id.clone(),
        scores,
    }
}

pub fn room_view(room: &Room, now: Millis) -> RoomView {
    match room.state {
        RoomState::Lobby => RoomView::Lobby(lobby_view(room)),
        RoomState::Running => RoomView::Game(Box::new(game_view(room, now))),
        RoomState::Results => RoomView::Results(Box::new(results_view(room, now))),
    }
}
