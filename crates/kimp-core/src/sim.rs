//! Fixed-step simulation of a running room.
//!
//! Each tick runs its passes in a fixed order: motion, coins, powerups,
//! rapid-fire, bullets, enemies, spawns. A win inside any scoring pass ends
//! the match and skips every later pass of that tick.

use rand::Rng;

use crate::entity::{Bullet, Vec2, circles_overlap};
use crate::id::entity_id;
use crate::lifecycle::check_win;
use crate::player::PlayerId;
use crate::powerup::{self, Possession, PossessionKind};
use crate::room::{Room, RoomState};
use crate::spawn::{ensure_coins, ensure_powerups, ensure_rapidfires, respawn_enemy};
use crate::time::Millis;
use crate::tuning::{
    BULLET_ENEMY_POINTS, BULLET_LIFETIME_MS, BULLET_PLAYER_POINTS, BULLET_RADIUS, BULLET_SPEED,
    COIN_POINTS, COIN_RADIUS, DASH_COOLDOWN_MS, DASH_DURATION_MS, DASH_KILL_POINTS, DASH_SPEED,
    ENEMY_RADIUS, ENEMY_RESPAWN_MS, MAP_HEIGHT, MAP_WIDTH, MATCH_SPAWN_MARGIN, PLAYER_RADIUS,
    PLAYER_SPEED, POWERUP_DURATION_MS, POWERUP_KILL_POINTS, POWERUP_KILL_RADIUS, POWERUP_RADIUS,
    RAPIDFIRE_DURATION_MS, RAPIDFIRE_RADIUS, RAPIDFIRE_SHOT_INTERVAL_MS, RESPAWN_MS,
    TICK_DELTA_SECS,
};

/// Facing used for auto-fire when the player is not moving.
const DEFAULT_FACING: Vec2 = Vec2 { x: 1.0, y: 0.0 };

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    /// The tick ended the match; the room is now in `results`.
    MatchEnded { winner_id: Option<PlayerId> },
}

/// Advance `room` by one step. Rooms that are not running are left as-is.
pub fn tick<R: Rng>(room: &mut Room, now: Millis, rng: &mut R) -> TickOutcome {
    if room.state != RoomState::Running {
        return TickOutcome::Continue;
    }

    let ended = run_passes(room, now, rng);

    // One-shot intents never outlive the tick that saw them.
    for player in &mut room.players {
        player.input.wants_action = false;
        player.input.wants_powerup = false;
    }

    if ended {
        TickOutcome::MatchEnded {
            winner_id: room.winner_id.clone(),
        }
    } else {
        TickOutcome::Continue
    }
}

/// Returns true when a pass ended the match.
fn run_passes<R: Rng>(room: &mut Room, now: Millis, rng: &mut R) -> bool {
    move_players(room, now, rng);
    if collect_coins(room, now, rng)
        || use_powerups(room, now)
        || fire_rapidfire(room, now, rng)
        || update_bullets(room, now)
        || update_enemies(room, now, rng)
    {
        return true;
    }
    ensure_coins(room, rng);
    ensure_powerups(room, now, rng);
    ensure_rapidfires(room, now, rng);
    false
}

fn move_players<R: Rng>(room: &mut Room, now: Millis, rng: &mut R) {
    for player in &mut room.players {
        if !player.is_active() {
            continue;
        }
        if !player.alive {
            if now >= player.respawn_at {
                player.alive = true;
                player.pos = Vec2::random_in_arena(rng, MATCH_SPAWN_MARGIN);
            }
            continue;
        }

        let speed = if player.is_dashing(now) {
            DASH_SPEED
        } else {
            PLAYER_SPEED
        };
        let step = player.input.dir.clamp_to_unit().scale(speed * TICK_DELTA_SECS);
        player.pos = player.pos.add(step).clamp_to_arena(PLAYER_RADIUS);

        // A dash pressed this tick takes effect from the next step.
        if player.input.wants_action && now > player.dash_cooldown_until {
            player.dashing_until = now + DASH_DURATION_MS;
            player.dash_cooldown_until = now + DASH_COOLDOWN_MS;
        }
        player.input.wants_action = false;
    }
}

fn collect_coins<R: Rng>(room: &mut Room, now: Millis, rng: &mut R) -> bool {
    let mut collected = false;
    for idx in 0..room.players.len() {
        if !room.players[idx].is_in_play() {
            continue;
        }
        let pos = room.players[idx].pos;
        let mut c = 0;
        while c < room.coins.len() {
            if !circles_overlap(pos, PLAYER_RADIUS, room.coins[c].pos, COIN_RADIUS) {
                c += 1;
                continue;
            }
            room.coins.swap_remove(c);
            room.players[idx].score += COIN_POINTS;
            collected = true;
            if check_win(room, idx, now) {
                return true;
            }
        }
    }
    if collected {
        ensure_coins(room, rng);
    }
    false
}

/// Claim a nearby powerup on an explicit press, expire unused ones, and
/// detonate a held one on the next press.
fn use_powerups(room: &mut Room, now: Millis) -> bool {
    // Possessions run out whether or not the holder is in play.
    for player in &mut room.players {
        powerup::expire(&mut player.powerup, now);
    }

    let penalty = room.config.death_penalty_enabled;
    for idx in 0..room.players.len() {
        if !room.players[idx].is_in_play() {
            continue;
        }

        let player = &room.players[idx];
        if player.input.wants_powerup
            && player.powerup.is_none()
            && let Some(k) = room
                .powerups
                .iter()
                .position(|p| circles_overlap(player.pos, PLAYER_RADIUS, p.pos, POWERUP_RADIUS))
        {
            room.powerups.swap_remove(k);
            let player = &mut room.players[idx];
            player.powerup = Some(Possession::new(
                PossessionKind::Powerup,
                now,
                POWERUP_DURATION_MS,
            ));
            player.input.wants_powerup = false;
        }

        let player = &mut room.players[idx];
        if !(player.input.wants_powerup && player.powerup.is_some()) {
            continue;
        }
        player.powerup = None;
        player.input.wants_powerup = false;
        let origin = player.pos;

        let mut kills = 0;
        for (j, other) in room.players.iter_mut().enumerate() {
            if j != idx && other.is_in_play() && other.pos.distance(origin) <= POWERUP_KILL_RADIUS {
                other.kill(now, RESPAWN_MS, penalty);
                kills += 1;
            }
        }
        if kills > 0 {
            tracing::debug!(room_id = %room.id, kills, "Powerup detonated");
            room.players[idx].score += kills * POWERUP_KILL_POINTS;
            if check_win(room, idx, now) {
                return true;
            }
        }
    }
    false
}

/// Passive rapid-fire pickup and the automatic fire it grants. Never ends
/// the match by itself.
fn fire_rapidfire<R: Rng>(room: &mut Room, now: Millis, rng: &mut R) -> bool {
    let Room {
        players,
        rapidfires,
        bullets,
        ..
    } = room;

    for player in players.iter_mut() {
        if powerup::expire(&mut player.rapidfire, now) {
            player.last_rapidfire_shot = 0;
        }
    }

    for player in players.iter_mut() {
        if !player.is_in_play() {
            continue;
        }

        if player.rapidfire.is_none()
            && let Some(k) = rapidfires
                .iter()
                .position(|r| circles_overlap(player.pos, PLAYER_RADIUS, r.pos, RAPIDFIRE_RADIUS))
        {
            rapidfires.swap_remove(k);
            player.rapidfire = Some(Possession::new(
                PossessionKind::RapidFire,
                now,
                RAPIDFIRE_DURATION_MS,
            ));
            player.last_rapidfire_shot = now;
        }

        if player.rapidfire.is_none()
            || now.saturating_sub(player.last_rapidfire_shot) < RAPIDFIRE_SHOT_INTERVAL_MS
        {
            continue;
        }

        let dir = player.input.dir.normalized().unwrap_or(DEFAULT_FACING);
        bullets.push(Bullet {
            id: entity_id(rng),
            owner: player.id.clone(),
            pos: player.pos.add(dir.scale(PLAYER_RADIUS)),
            vel: dir.scale(BULLET_SPEED),
            created_at: now,
            expires_at: now + BULLET_LIFETIME_MS,
        });
        player.last_rapidfire_shot = now;
    }
    false
}

/// Credit `owner` if they are still in the room. Returns true on a win.
fn credit_owner(room: &mut Room, owner: &str, points: u32, now: Millis) -> bool {
    let Some(idx) = room.players.iter().position(|p| p.id == owner) else {
        return false;
    };
    room.players[idx].score += points;
    check_win(room, idx, now)
}

fn update_bullets(room: &mut Room, now: Millis) -> bool {
    for bullet in &mut room.bullets {
        bullet.pos = bullet.pos.add(bullet.vel.scale(TICK_DELTA_SECS));
    }
    room.bullets
        .retain(|b| now < b.expires_at && b.pos.in_arena());

    let penalty = room.config.death_penalty_enabled;
    let mut i = 0;
    while i < room.bullets.len() {
        let pos = room.bullets[i].pos;
        let owner = &room.bullets[i].owner;

        let victim = room.players.iter().position(|p| {
            p.is_in_play()
                && p.id != *owner
                && circles_overlap(pos, BULLET_RADIUS, p.pos, PLAYER_RADIUS)
        });
        if let Some(v) = victim {
            let bullet = room.bullets.remove(i);
            room.players[v].kill(now, RESPAWN_MS, penalty);
            if credit_owner(room, &bullet.owner, BULLET_PLAYER_POINTS, now) {
                return true;
            }
            continue;
        }

        let target = room
            .enemies
            .iter()
            .position(|e| e.is_active() && circles_overlap(pos, BULLET_RADIUS, e.pos, ENEMY_RADIUS));
        if let Some(e) = target {
            let bullet = room.bullets.remove(i);
            room.enemies[e].respawn_at = Some(now + ENEMY_RESPAWN_MS);
            if credit_owner(room, &bullet.owner, BULLET_ENEMY_POINTS, now) {
                return true;
            }
            continue;
        }

        i += 1;
    }
    false
}

fn update_enemies<R: Rng>(room: &mut Room, now: Millis, rng: &mut R) -> bool {
    for enemy in &mut room.enemies {
        match enemy.respawn_at {
            Some(at) if now >= at => respawn_enemy(enemy, rng),
            Some(_) => continue,
            None => {},
        }

        let next = enemy.pos.add(enemy.vel.scale(TICK_DELTA_SECS));
        if next.x < ENEMY_RADIUS || next.x > MAP_WIDTH - ENEMY_RADIUS {
            enemy.vel.x = -enemy.vel.x;
        }
        if next.y < ENEMY_RADIUS || next.y > MAP_HEIGHT - ENEMY_RADIUS {
            enemy.vel.y = -enemy.vel.y;
        }
        enemy.pos = next.clamp_to_arena(ENEMY_RADIUS);
    }

    let penalty = room.config.death_penalty_enabled;
    for e in 0..room.enemies.len() {
        if !room.enemies[e].is_active() {
            continue;
        }
        let enemy_pos = room.enemies[e].pos;
        for p in 0..room.players.len() {
            let player = &mut room.players[p];
            if !player.is_in_play()
                || !circles_overlap(player.pos, PLAYER_RADIUS, enemy_pos, ENEMY_RADIUS)
            {
                continue;
            }
            if player.is_dashing(now) {
                player.score += DASH_KILL_POINTS;
                room.enemies[e].respawn_at = Some(now + ENEMY_RESPAWN_MS);
                if check_win(room, p, now) {
                    return true;
                }
                break;
            }
            player.kill(now, RESPAWN_MS, penalty);
        }
    }
    false
}
