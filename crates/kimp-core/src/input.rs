//! Buffering of client intent between ticks.

use std::f32::consts::TAU;

use crate::net::messages::InputMsg;
use crate::room::{Room, RoomState};
use crate::time::Millis;
use crate::tuning::INPUT_RATE_LIMIT_MS;

/// Wrap an angle into `[0, 2π)`. Non-finite input maps to 0.
pub fn normalize_angle(angle: f32) -> f32 {
    if !angle.is_finite() {
        return 0.0;
    }
    let wrapped = angle.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs.
    if wrapped >= TAU { 0.0 } else { wrapped }
}

/// Record an input for `player_id`. Returns false when the input was
/// dropped: room not running, unknown or disconnected player, or rate
/// limited.
///
/// One-shot flags accumulate until the next tick consumes them, so a press
/// followed by a release inside one tick window is not lost.
pub fn apply_input(room: &mut Room, player_id: &str, msg: &InputMsg, now: Millis) -> bool {
    if room.state != RoomState::Running {
        return false;
    }
    let Some(player) = room.player_mut(player_id) else {
        return false;
    };
    if !player.is_active() {
        return false;
    }
    if let Some(last) = player.last_input_at
        && now.saturating_sub(last) < INPUT_RATE_LIMIT_MS
    {
        return false;
    }

    player.last_input_at = Some(now);
    if let Some(seq) = msg.seq {
        player.input.seq = seq;
    }
    if let Some(dir) = msg.dir {
        player.input.dir = dir.clamp_to_unit();
    }
    if let Some(aim) = msg.aim {
        player.aim = normalize_angle(aim);
    }
    player.input.wants_action |= msg.action;
    player.input.wants_powerup |= msg.powerup;

    room.touch(now);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Vec2;
    use crate::test_helpers::{add_player, make_room_with};

    fn running_room() -> (Room, String) {
        let mut room = make_room_with(|r| r.state = RoomState::Running);
        let id = add_player(&mut room, "Alice", 1);
        (room, id)
    }

    fn moving(x: f32, y: f32) -> InputMsg {
        InputMsg {
            seq: Some(1),
            dir: Some(Vec2::new(x, y)),
            ..InputMsg::default()
        }
    }

    #[test]
    fn angles_wrap_into_range() {
        assert_eq!(normalize_angle(0.0), 0.0);
        assert!((normalize_angle(TAU + 1.0) - 1.0).abs() < 1e-5);
        assert!((normalize_angle(-1.0) - (TAU - 1.0)).abs() < 1e-5);
        assert_eq!(normalize_angle(f32::NAN), 0.0);
        assert!(normalize_angle(-1e-9) < TAU);
    }

    #[test]
    fn ignored_outside_running() {
        let (mut room, id) = running_room();
        room.state = RoomState::Lobby;
        assert!(!apply_input(&mut room, &id, &moving(1.0, 0.0), 100));
        assert_eq!(room.players[0].input.dir, Vec2::ZERO);
    }

    #[test]
    fn direction_clamped_not_amplified() {
        let (mut room, id) = running_room();
        assert!(apply_input(&mut room, &id, &moving(3.0, 4.0), 100));
        assert!((room.players[0].input.dir.length() - 1.0).abs() < 1e-6);

        assert!(apply_input(&mut room, &id, &moving(0.3, 0.0), 200));
        assert_eq!(room.players[0].input.dir, Vec2::new(0.3, 0.0));
    }

    #[test]
    fn rate_limited_within_window() {
        let (mut room, id) = running_room();
        assert!(apply_input(&mut room, &id, &moving(1.0, 0.0), 100));
        assert!(!apply_input(&mut room, &id, &moving(0.0, 1.0), 100 + INPUT_RATE_LIMIT_MS - 1));
        assert_eq!(room.players[0].input.dir, Vec2::new(1.0, 0.0));
        assert!(apply_input(&mut room, &id, &moving(0.0, 1.0), 100 + INPUT_RATE_LIMIT_MS));
    }

    #[test]
    fn one_shot_flags_accumulate() {
        let (mut room, id) = running_room();
        let press = InputMsg {
            action: true,
            ..InputMsg::default()
        };
        apply_input(&mut room, &id, &press, 100);
        apply_input(&mut room, &id, &InputMsg::default(), 200);
        assert!(room.players[0].input.wants_action);
        // Direction is kept when a message omits it.
        assert_eq!(room.players[0].input.dir, Vec2::ZERO);
    }

    #[test]
    fn duplicate_input_is_idempotent() {
        let (mut room, id) = running_room();
        let msg = InputMsg {
            seq: Some(7),
            dir: Some(Vec2::new(0.0, -1.0)),
            action: true,
            powerup: false,
            aim: Some(2.0),
        };
        apply_input(&mut room, &id, &msg, 100);
        let first = room.players[0].input.clone();
        let aim = room.players[0].aim;
        apply_input(&mut room, &id, &msg, 200);
        assert_eq!(room.players[0].input, first);
        assert_eq!(room.players[0].aim, aim);
    }

    #[test]
    fn disconnected_player_ignored() {
        let (mut room, id) = running_room();
        room.players[0].disconnected = true;
        assert!(!apply_input(&mut room, &id, &moving(1.0, 0.0), 100));
    }

    #[test]
    fn accepted_input_touches_room() {
        let (mut room, id) = running_room();
        apply_input(&mut room, &id, &moving(1.0, 0.0), 5_000);
        assert_eq!(room.last_active, 5_000);
    }
}
