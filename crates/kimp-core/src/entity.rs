use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::player::PlayerId;
use crate::time::Millis;
use crate::tuning::{ENEMY_SPEED, MAP_HEIGHT, MAP_WIDTH};

/// Generated id of a transient world entity (coin, enemy, pickup, bullet).
pub type EntityId = String;

/// 2D vector in arena space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f32 {
        self.x.hypot(self.y)
    }

    pub fn distance(self, other: Self) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Scale down to unit length when longer than 1; shorter vectors are
    /// kept as-is. Non-finite components collapse to zero.
    pub fn clamp_to_unit(self) -> Self {
        if !self.x.is_finite() || !self.y.is_finite() {
            return Self::ZERO;
        }
        let len = self.length();
        if len > 1.0 {
            Self::new(self.x / len, self.y / len)
        } else {
            self
        }
    }

    /// Unit vector in the same direction, or `None` when too short to have one.
    pub fn normalized(self) -> Option<Self> {
        let len = self.length();
        if len < 0.01 || !len.is_finite() {
            None
        } else {
            Some(Self::new(self.x / len, self.y / len))
        }
    }

    pub fn scale(self, s: f32) -> Self {
        Self::new(self.x * s, self.y * s)
    }

    pub fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y)
    }

    /// Clamp into the arena, keeping a circle of `radius` fully inside.
    pub fn clamp_to_arena(self, radius: f32) -> Self {
        Self::new(
            self.x.clamp(radius, MAP_WIDTH - radius),
            self.y.clamp(radius, MAP_HEIGHT - radius),
        )
    }

    pub fn in_arena(self) -> bool {
        (0.0..=MAP_WIDTH).contains(&self.x) && (0.0..=MAP_HEIGHT).contains(&self.y)
    }

    /// Uniform random point at least `margin` away from every edge.
    pub fn random_in_arena<R: Rng>(rng: &mut R, margin: f32) -> Self {
        Self::new(
            rng.random_range(margin..MAP_WIDTH - margin),
            rng.random_range(margin..MAP_HEIGHT - margin),
        )
    }
}

/// Circle-circle overlap: centre distance no greater than the sum of radii.
pub fn circles_overlap(a: Vec2, ra: f32, b: Vec2, rb: f32) -> bool {
    a.distance(b) <= ra + rb
}

#[derive(Debug, Clone)]
pub struct Coin {
    pub id: EntityId,
    pub pos: Vec2,
}

#[derive(Debug, Clone)]
pub struct Enemy {
    pub id: EntityId,
    pub pos: Vec2,
    pub vel: Vec2,
    /// While set the enemy is off the board, waiting to reappear.
    pub respawn_at: Option<Millis>,
}

impl Enemy {
    pub fn is_active(&self) -> bool {
        self.respawn_at.is_none()
    }

    pub fn random_velocity<R: Rng>(rng: &mut R) -> Vec2 {
        Vec2::new(
            rng.random_range(-ENEMY_SPEED..ENEMY_SPEED),
            rng.random_range(-ENEMY_SPEED..ENEMY_SPEED),
        )
    }
}

/// A collectible lying on the map: powerup or rapid-fire.
#[derive(Debug, Clone)]
pub struct Pickup {
    pub id: EntityId,
    pub pos: Vec2,
    pub expires_at: Millis,
}

#[derive(Debug, Clone)]
pub struct Bullet {
    pub id: EntityId,
    /// Shooter. May no longer be in the room.
    pub owner: PlayerId,
    pub pos: Vec2,
    pub vel: Vec2,
    pub created_at: Millis,
    pub expires_at: Millis,
}
