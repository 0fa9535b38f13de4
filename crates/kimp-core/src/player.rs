use uuid::Uuid;

use crate::entity::Vec2;
use crate::powerup::Possession;
use crate::time::Millis;
use crate::tuning::DEATH_PENALTY;

/// Server-generated player identity, stable across reconnects.
pub type PlayerId = String;

/// Identity of one live transport connection.
pub type ConnectionId = Uuid;

pub const MIN_NAME_LEN: usize = 2;
pub const MAX_NAME_LEN: usize = 16;

const PROFANITY: &[&str] = &["ass", "dick", "shit", "fuck", "bitch"];

/// Latest intent received from the client, consumed by the tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BufferedInput {
    pub seq: u64,
    /// Movement direction, at most unit length.
    pub dir: Vec2,
    /// One-shot: start a dash.
    pub wants_action: bool,
    /// One-shot: claim or fire the held powerup.
    pub wants_powerup: bool,
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub is_host: bool,
    pub connection: Option<ConnectionId>,
    pub disconnected: bool,
    pub pos: Vec2,
    /// Radians in `[0, 2π)`.
    pub aim: f32,
    pub score: u32,
    pub alive: bool,
    pub respawn_at: Millis,
    pub dashing_until: Millis,
    pub dash_cooldown_until: Millis,
    pub input: BufferedInput,
    pub last_input_at: Option<Millis>,
    pub powerup: Option<Possession>,
    pub rapidfire: Option<Possession>,
    pub last_rapidfire_shot: Millis,
    pub cosmetic: u8,
    pub joined_at: Millis,
}

impl Player {
    pub fn new(
        id: PlayerId,
        name: String,
        is_host: bool,
        connection: ConnectionId,
        pos: Vec2,
        cosmetic: u8,
        now: Millis,
    ) -> Self {
        Self {
            id,
            name,
            is_host,
            connection: Some(connection),
            disconnected: false,
            pos,
            aim: 0.0,
            score: 0,
            alive: true,
            respawn_at: 0,
            dashing_until: 0,
            dash_cooldown_until: 0,
            input: BufferedInput::default(),
            last_input_at: None,
            powerup: None,
            rapidfire: None,
            last_rapidfire_shot: 0,
            cosmetic,
            joined_at: now,
        }
    }

    /// Connected, or at least not yet marked as gone.
    pub fn is_active(&self) -> bool {
        !self.disconnected
    }

    /// Takes part in collisions this tick.
    pub fn is_in_play(&self) -> bool {
        self.is_active() && self.alive
    }

    pub fn is_dashing(&self, now: Millis) -> bool {
        self.dashing_until > now
    }

    /// Knock the player out until `now + respawn_ms`, applying the death
    /// penalty when enabled. Score never drops below zero.
    pub fn kill(&mut self, now: Millis, respawn_ms: Millis, penalty: bool) {
        if penalty {
            self.score = self.score.saturating_sub(DEATH_PENALTY);
        }
        self.alive = false;
        self.respawn_at = now + respawn_ms;
    }

    /// Return every per-match field to its starting value.
    pub fn reset_for_match(&mut self, pos: Vec2) {
        self.score = 0;
        self.input.dir = Vec2::ZERO;
        self.input.wants_action = false;
        self.input.wants_powerup = false;
        self.powerup = None;
        self.rapidfire = None;
        self.last_rapidfire_shot = 0;
        self.alive = true;
        self.respawn_at = 0;
        self.dashing_until = 0;
        self.dash_cooldown_until = 0;
        self.pos = pos;
        self.aim = 0.0;
    }

    pub fn name_matches(&self, other: &str) -> bool {
        self.name.to_lowercase() == other.to_lowercase()
    }
}

/// Trim, cap at 16 characters, require at least 2, reject profanity.
pub fn sanitize_name(raw: &str) -> Option<String> {
    let truncated: String = raw.trim().chars().take(MAX_NAME_LEN).collect();
    let name = truncated.trim_end();
    if name.chars().count() < MIN_NAME_LEN
        || name.chars().any(char::is_control)
        || has_profanity(name)
    {
        return None;
    }
    Some(name.to_string())
}

pub fn has_profanity(name: &str) -> bool {
    let lowered = name.to_lowercase();
    PROFANITY.iter().any(|word| lowered.contains(word))
}
