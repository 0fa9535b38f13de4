//! Room state machine: `lobby → running → results → running`.

use rand::Rng;

use crate::entity::Vec2;
use crate::error::CommandError;
use crate::player::PlayerId;
use crate::room::{Room, RoomState};
use crate::spawn::{ensure_coins, ensure_enemies};
use crate::time::Millis;
use crate::tuning::MATCH_SPAWN_MARGIN;

fn require_host(room: &Room, player_id: &str) -> Result<(), CommandError> {
    let player = room
        .player(player_id)
        .filter(|p| p.is_active())
        .ok_or(CommandError::NotJoined)?;
    if !player.is_host {
        return Err(CommandError::NotHost);
    }
    Ok(())
}

fn require_state(room: &Room, state: RoomState) -> Result<(), CommandError> {
    if room.state != state {
        return Err(CommandError::WrongState);
    }
    Ok(())
}

/// Host command: leave the lobby and start the first match.
pub fn start<R: Rng>(
    room: &mut Room,
    player_id: &str,
    now: Millis,
    rng: &mut R,
) -> Result<(), CommandError> {
    require_host(room, player_id)?;
    require_state(room, RoomState::Lobby)?;
    begin_match(room, now, rng)
}

/// Host command: play again from the results screen.
pub fn rematch<R: Rng>(
    room: &mut Room,
    player_id: &str,
    now: Millis,
    rng: &mut R,
) -> Result<(), CommandError> {
    require_host(room, player_id)?;
    require_state(room, RoomState::Results)?;
    begin_match(room, now, rng)
}

/// Host command: the match clock ran out. Ends without a winner.
pub fn timeout(room: &mut Room, player_id: &str, now: Millis) -> Result<(), CommandError> {
    require_host(room, player_id)?;
    require_state(room, RoomState::Running)?;
    finish_match(room, None, now);
    Ok(())
}

/// Reset the world and every player, then switch to `running`.
pub fn begin_match<R: Rng>(room: &mut Room, now: Millis, rng: &mut R) -> Result<(), CommandError> {
    if room.active_count() == 0 {
        return Err(CommandError::NoPlayers);
    }

    room.match_id += 1;
    room.game_started_at.get_or_insert(now);
    room.match_started_at = now;
    room.winner_id = None;

    room.coins.clear();
    room.enemies.clear();
    room.powerups.clear();
    room.rapidfires.clear();
    room.bullets.clear();
    room.powerups_spawned = 0;
    room.last_powerup_spawn = now;
    room.last_rapidfire_spawn = now;

    for player in &mut room.players {
        let pos = Vec2::random_in_arena(rng, MATCH_SPAWN_MARGIN);
        player.reset_for_match(pos);
    }
    ensure_coins(room, rng);
    ensure_enemies(room, rng);

    room.state = RoomState::Running;
    room.touch(now);
    tracing::info!(room_id = %room.id, match_id = room.match_id, "Match started");
    Ok(())
}

/// Freeze the match and move to `results`.
pub fn finish_match(room: &mut Room, winner_id: Option<PlayerId>, now: Millis) {
    tracing::info!(
        room_id = %room.id,
        match_id = room.match_id,
        winner = winner_id.as_deref().unwrap_or("-"),
        "Match ended"
    );
    room.state = RoomState::Results;
    room.winner_id = winner_id;
    room.touch(now);
}

/// End the match if the player at `idx` reached the target score.
pub fn check_win(room: &mut Room, idx: usize, now: Millis) -> bool {
    let Some(player) = room.players.get(idx) else {
        return false;
    };
    if player.score < room.config.target_score {
        return false;
    }
    let winner = player.id.clone();
    finish_match(room, Some(winner), now);
    true
}

/// Whether a running match has outlived a server-side duration limit.
pub fn countdown_expired(room: &Room, now: Millis, duration_ms: Option<Millis>) -> bool {
    room.state == RoomState::Running
        && duration_ms.is_some_and(|d| now.saturating_sub(room.match_started_at) >= d)
}

/// Lobby rooms get a slow heartbeat broadcast. Returns true, and records
/// the send, when one is due.
pub fn lobby_heartbeat_due(room: &mut Room, now: Millis, interval_ms: Millis) -> bool {
    if room.state != RoomState::Lobby
        || now.saturating_sub(room.last_lobby_broadcast) < interval_ms
    {
        return false;
    }
    room.last_lobby_broadcast = now;
    true
}
