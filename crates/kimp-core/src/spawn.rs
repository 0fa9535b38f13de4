//! Population upkeep for world entities.

use rand::Rng;

use crate::entity::{Coin, Enemy, Pickup, Vec2};
use crate::id::entity_id;
use crate::room::Room;
use crate::time::Millis;
use crate::tuning::{
    COIN_SPAWN_MARGIN, ENEMY_SPAWN_MARGIN, MAX_COINS, MAX_ENEMIES, MAX_POWERUPS_PER_MATCH,
    PICKUP_SPAWN_MARGIN, POWERUP_DURATION_MS, POWERUP_SPAWN_INTERVAL_MS,
    RAPIDFIRE_PICKUP_LIFETIME_MS, RAPIDFIRE_SPAWN_INTERVAL_MS,
};

pub fn ensure_coins<R: Rng>(room: &mut Room, rng: &mut R) {
    while room.coins.len() < MAX_COINS {
        room.coins.push(Coin {
            id: entity_id(rng),
            pos: Vec2::random_in_arena(rng, COIN_SPAWN_MARGIN),
        });
    }
}

pub fn ensure_enemies<R: Rng>(room: &mut Room, rng: &mut R) {
    while room.enemies.len() < MAX_ENEMIES {
        room.enemies.push(Enemy {
            id: entity_id(rng),
            pos: Vec2::random_in_arena(rng, ENEMY_SPAWN_MARGIN),
            vel: Enemy::random_velocity(rng),
            respawn_at: None,
        });
    }
}

/// Put a defeated enemy back on the board at a fresh spot and heading.
pub fn respawn_enemy<R: Rng>(enemy: &mut Enemy, rng: &mut R) {
    enemy.respawn_at = None;
    enemy.pos = Vec2::random_in_arena(rng, ENEMY_SPAWN_MARGIN);
    enemy.vel = Enemy::random_velocity(rng);
}

/// Drop stale powerups and, when the interval has passed, the map is empty
/// and the per-match cap allows it, place a new one.
pub fn ensure_powerups<R: Rng>(room: &mut Room, now: Millis, rng: &mut R) {
    room.powerups.retain(|p| now < p.expires_at);

    if room.powerups_spawned >= MAX_POWERUPS_PER_MATCH
        || now.saturating_sub(room.last_powerup_spawn) < POWERUP_SPAWN_INTERVAL_MS
        || !room.powerups.is_empty()
    {
        return;
    }

    room.powerups.push(Pickup {
        id: entity_id(rng),
        pos: Vec2::random_in_arena(rng, PICKUP_SPAWN_MARGIN),
        expires_at: now + POWERUP_DURATION_MS,
    });
    room.last_powerup_spawn = now;
    room.powerups_spawned += 1;
}

/// Same policy as [`ensure_powerups`] without a per-match cap.
pub fn ensure_rapidfires<R: Rng>(room: &mut Room, now: Millis, rng: &mut R) {
    room.rapidfires.retain(|p| now < p.expires_at);

    if now.saturating_sub(room.last_rapidfire_spawn) < RAPIDFIRE_SPAWN_INTERVAL_MS
        || !room.rapidfires.is_empty()
    {
        return;
    }

    room.rapidfires.push(Pickup {
        id: entity_id(rng),
        pos: Vec2::random_in_arena(rng, PICKUP_SPAWN_MARGIN),
        expires_at: now + RAPIDFIRE_PICKUP_LIFETIME_MS,
    });
    room.last_rapidfire_spawn = now;
}
