//! Room membership: joining, reconnecting, dropping and purging players.

use rand::Rng;

use crate::entity::Vec2;
use crate::error::JoinError;
use crate::id;
use crate::player::{ConnectionId, Player, PlayerId, sanitize_name};
use crate::room::{Room, RoomState};
use crate::time::Millis;
use crate::tuning::{LOBBY_SPAWN_MARGIN, MATCH_SPAWN_MARGIN, MAX_COSMETIC, MIN_COSMETIC};

/// Join parameters as sent by the client.
#[derive(Debug, Clone, Copy, Default)]
pub struct JoinRequest<'a> {
    pub name: &'a str,
    pub passcode: Option<&'a str>,
    pub host_key: Option<&'a str>,
    pub cosmetic: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// A new player record was created.
    Joined(PlayerId),
    /// A player waiting out the reconnect grace was rebound.
    Reconnected(PlayerId),
}

impl JoinOutcome {
    pub fn player_id(&self) -> &PlayerId {
        match self {
            Self::Joined(id) | Self::Reconnected(id) => id,
        }
    }
}

/// Result of removing a player whose reconnect grace ran out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Purge {
    pub removed: bool,
    /// Player promoted because the host was removed.
    pub new_host: Option<PlayerId>,
}

fn lowest_free_cosmetic(room: &Room) -> u8 {
    (MIN_COSMETIC..=MAX_COSMETIC)
        .find(|c| !room.is_cosmetic_taken(*c))
        .unwrap_or(MIN_COSMETIC)
}

fn spawn_margin(room: &Room) -> f32 {
    if room.state == RoomState::Running {
        MATCH_SPAWN_MARGIN
    } else {
        LOBBY_SPAWN_MARGIN
    }
}

/// Admit `conn` into `room`, either by rebinding a disconnected player with
/// the same name or by creating a new one. Fails without touching the room.
pub fn join<R: Rng>(
    room: &mut Room,
    req: &JoinRequest<'_>,
    conn: ConnectionId,
    now: Millis,
    rng: &mut R,
) -> Result<JoinOutcome, JoinError> {
    let name = sanitize_name(req.name).ok_or(JoinError::InvalidName)?;

    if let Some(expected) = room.passcode.as_deref()
        && req.passcode != Some(expected)
    {
        return Err(JoinError::InvalidPasscode);
    }

    let requested_cosmetic = match req.cosmetic {
        None => None,
        Some(c) if (i64::from(MIN_COSMETIC)..=i64::from(MAX_COSMETIC)).contains(&c) => {
            Some(c as u8)
        },
        Some(_) => return Err(JoinError::InvalidSelection),
    };

    let full = room.active_count() >= usize::from(room.config.max_players);

    if let Some(idx) = room
        .players
        .iter()
        .position(|p| p.disconnected && p.name_matches(&name))
    {
        if full {
            return Err(JoinError::RoomFull);
        }
        let cosmetic = room.players[idx].cosmetic;
        let cosmetic = if room.is_cosmetic_taken(cosmetic) {
            lowest_free_cosmetic(room)
        } else {
            cosmetic
        };
        let player = &mut room.players[idx];
        player.connection = Some(conn);
        player.disconnected = false;
        player.cosmetic = cosmetic;
        let id = player.id.clone();
        room.touch(now);
        return Ok(JoinOutcome::Reconnected(id));
    }

    if full {
        return Err(JoinError::RoomFull);
    }

    let cosmetic = match requested_cosmetic {
        Some(c) if room.is_cosmetic_taken(c) => return Err(JoinError::SelectionTaken),
        Some(c) => c,
        None => lowest_free_cosmetic(room),
    };

    let is_host = req.host_key.is_some_and(|k| k == room.host_key) && !room.has_host();
    let final_name = if is_host {
        room.host_name.clone()
    } else {
        name
    };
    let lowered = final_name.to_lowercase();
    if is_host {
        room.reserved_names.remove(&lowered);
    } else if room.reserved_names.contains(&lowered)
        || room.players.iter().any(|p| p.name_matches(&final_name))
    {
        return Err(JoinError::NameInUse);
    }

    let player_id = loop {
        let candidate = id::player_id(rng);
        if room.player(&candidate).is_none() {
            break candidate;
        }
    };
    let pos = Vec2::random_in_arena(rng, spawn_margin(room));
    room.players.push(Player::new(
        player_id.clone(),
        final_name,
        is_host,
        conn,
        pos,
        cosmetic,
        now,
    ));
    room.touch(now);
    Ok(JoinOutcome::Joined(player_id))
}

/// Mark the player bound to `conn` as disconnected. The record stays in the
/// room until purged.
pub fn disconnect(room: &mut Room, conn: ConnectionId, now: Millis) -> Option<PlayerId> {
    let player = room
        .players
        .iter_mut()
        .find(|p| p.connection == Some(conn))?;
    player.connection = None;
    player.disconnected = true;
    let id = player.id.clone();
    room.touch(now);
    Some(id)
}

/// Remove `player_id` if it is still disconnected. Promotes the earliest
/// active player when the host goes.
pub fn purge(room: &mut Room, player_id: &str, now: Millis) -> Purge {
    let Some(idx) = room
        .players
        .iter()
        .position(|p| p.id == player_id && p.disconnected)
    else {
        return Purge::default();
    };

    let removed = room.players.remove(idx);
    room.touch(now);

    let mut new_host = None;
    if removed.is_host
        && let Some(candidate) = room.players.iter_mut().find(|p| p.is_active())
    {
        candidate.is_host = true;
        new_host = Some(candidate.id.clone());
    }

    Purge {
        removed: true,
        new_host,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{HOST_KEY, make_room, make_room_with, seeded_rng};
    use uuid::Uuid;

    fn req(name: &str) -> JoinRequest<'_> {
        JoinRequest {
            name,
            ..JoinRequest::default()
        }
    }

    #[test]
    fn first_join_with_host_key_becomes_host() {
        let mut room = make_room();
        let mut rng = seeded_rng();
        let outcome = join(
            &mut room,
            &JoinRequest {
                name: "Whatever",
                host_key: Some(HOST_KEY),
                ..JoinRequest::default()
            },
            Uuid::new_v4(),
            0,
            &mut rng,
        )
        .unwrap();
        let host = room.player(outcome.player_id()).unwrap();
        assert!(host.is_host);
        // The host always plays under the name given at room creation.
        assert_eq!(host.name, room.host_name);
    }

    #[test]
    fn host_claim_only_once() {
        let mut room = make_room();
        let mut rng = seeded_rng();
        let with_key = |name| JoinRequest {
            name,
            host_key: Some(HOST_KEY),
            ..JoinRequest::default()
        };
        join(&mut room, &with_key("One"), Uuid::new_v4(), 0, &mut rng).unwrap();
        let second = join(&mut room, &with_key("Two"), Uuid::new_v4(), 0, &mut rng).unwrap();
        assert!(!room.player(second.player_id()).unwrap().is_host);
        assert_eq!(room.players.iter().filter(|p| p.is_host).count(), 1);
    }

    #[test]
    fn wrong_host_key_is_plain_player() {
        let mut room = make_room();
        let mut rng = seeded_rng();
        let outcome = join(
            &mut room,
            &JoinRequest {
                name: "Sneaky",
                host_key: Some("nope"),
                ..JoinRequest::default()
            },
            Uuid::new_v4(),
            0,
            &mut rng,
        )
        .unwrap();
        assert!(!room.player(outcome.player_id()).unwrap().is_host);
    }

    #[test]
    fn reserved_host_name_refused_to_others() {
        let mut room = make_room();
        let mut rng = seeded_rng();
        let name = room.host_name.to_uppercase();
        assert_eq!(
            join(&mut room, &req(&name), Uuid::new_v4(), 0, &mut rng),
            Err(JoinError::NameInUse)
        );
    }

    #[test]
    fn duplicate_active_name_refused() {
        let mut room = make_room();
        let mut rng = seeded_rng();
        join(&mut room, &req("Alice"), Uuid::new_v4(), 0, &mut rng).unwrap();
        assert_eq!(
            join(&mut room, &req("alice"), Uuid::new_v4(), 0, &mut rng),
            Err(JoinError::NameInUse)
        );
    }

    #[test]
    fn invalid_name_and_passcode() {
        let mut room = make_room_with(|r| r.passcode = Some("pw".into()));
        let mut rng = seeded_rng();
        assert_eq!(
            join(&mut room, &req("x"), Uuid::new_v4(), 0, &mut rng),
            Err(JoinError::InvalidName)
        );
        assert_eq!(
            join(&mut room, &req("Alice"), Uuid::new_v4(), 0, &mut rng),
            Err(JoinError::InvalidPasscode)
        );
        let ok = JoinRequest {
            name: "Alice",
            passcode: Some("pw"),
            ..JoinRequest::default()
        };
        assert!(join(&mut room, &ok, Uuid::new_v4(), 0, &mut rng).is_ok());
    }

    #[test]
    fn cosmetic_range_and_uniqueness() {
        let mut room = make_room();
        let mut rng = seeded_rng();
        let pick = |name, c| JoinRequest {
            name,
            cosmetic: Some(c),
            ..JoinRequest::default()
        };
        assert_eq!(
            join(&mut room, &pick("Alice", 0), Uuid::new_v4(), 0, &mut rng),
            Err(JoinError::InvalidSelection)
        );
        assert_eq!(
            join(&mut room, &pick("Alice", 16), Uuid::new_v4(), 0, &mut rng),
            Err(JoinError::InvalidSelection)
        );
        join(&mut room, &pick("Alice", 4), Uuid::new_v4(), 0, &mut rng).unwrap();
        assert_eq!(
            join(&mut room, &pick("Bobby", 4), Uuid::new_v4(), 0, &mut rng),
            Err(JoinError::SelectionTaken)
        );
    }

    #[test]
    fn missing_cosmetic_gets_lowest_free() {
        let mut room = make_room();
        let mut rng = seeded_rng();
        let pick = JoinRequest {
            name: "Alice",
            cosmetic: Some(1),
            ..JoinRequest::default()
        };
        join(&mut room, &pick, Uuid::new_v4(), 0, &mut rng).unwrap();
        let bob = join(&mut room, &req("Bobby"), Uuid::new_v4(), 0, &mut rng).unwrap();
        assert_eq!(room.player(bob.player_id()).unwrap().cosmetic, 2);
    }

    #[test]
    fn full_room_rejects_without_mutation() {
        let mut room = make_room_with(|r| r.config.max_players = 2);
        let mut rng = seeded_rng();
        join(&mut room, &req("Alice"), Uuid::new_v4(), 0, &mut rng).unwrap();
        join(&mut room, &req("Bobby"), Uuid::new_v4(), 0, &mut rng).unwrap();
        let before = room.players.len();
        let last_active = room.last_active;
        assert_eq!(
            join(&mut room, &req("Carol"), Uuid::new_v4(), 99, &mut rng),
            Err(JoinError::RoomFull)
        );
        assert_eq!(room.players.len(), before);
        assert_eq!(room.last_active, last_active);
    }

    #[test]
    fn reconnect_rebinds_same_player() {
        let mut room = make_room();
        let mut rng = seeded_rng();
        let conn = Uuid::new_v4();
        let first = join(&mut room, &req("Alice"), conn, 0, &mut rng).unwrap();
        room.players[0].score = 12;
        room.players[0].pos = Vec2::new(321.0, 456.0);

        assert_eq!(disconnect(&mut room, conn, 10).as_ref(), Some(first.player_id()));
        assert!(room.players[0].disconnected);
        assert!(room.players[0].connection.is_none());

        let new_conn = Uuid::new_v4();
        let again = join(&mut room, &req("ALICE"), new_conn, 20, &mut rng).unwrap();
        assert_eq!(again, JoinOutcome::Reconnected(first.player_id().clone()));
        let p = &room.players[0];
        assert_eq!(p.score, 12);
        assert_eq!(p.pos, Vec2::new(321.0, 456.0));
        assert_eq!(p.connection, Some(new_conn));
        assert!(!p.disconnected);
        assert_eq!(room.players.len(), 1);
    }

    #[test]
    fn reconnect_picks_new_cosmetic_if_taken_meanwhile() {
        let mut room = make_room();
        let mut rng = seeded_rng();
        let conn = Uuid::new_v4();
        let pick = |name, c| JoinRequest {
            name,
            cosmetic: Some(c),
            ..JoinRequest::default()
        };
        join(&mut room, &pick("Alice", 5), conn, 0, &mut rng).unwrap();
        disconnect(&mut room, conn, 0);
        join(&mut room, &pick("Bobby", 5), Uuid::new_v4(), 0, &mut rng).unwrap();
        join(&mut room, &req("Alice"), Uuid::new_v4(), 0, &mut rng).unwrap();
        assert_ne!(room.players[0].cosmetic, room.players[1].cosmetic);
    }

    #[test]
    fn disconnect_unknown_connection_is_noop() {
        let mut room = make_room();
        assert!(disconnect(&mut room, Uuid::new_v4(), 0).is_none());
    }

    #[test]
    fn purge_promotes_first_active_player() {
        let mut room = make_room();
        let mut rng = seeded_rng();
        let host_conn = Uuid::new_v4();
        let host_req = JoinRequest {
            name: "Host",
            host_key: Some(HOST_KEY),
            ..JoinRequest::default()
        };
        let host = join(&mut room, &host_req, host_conn, 0, &mut rng).unwrap();
        let gone_conn = Uuid::new_v4();
        join(&mut room, &req("Bobby"), gone_conn, 0, &mut rng).unwrap();
        let carol = join(&mut room, &req("Carol"), Uuid::new_v4(), 0, &mut rng).unwrap();

        disconnect(&mut room, gone_conn, 0);
        disconnect(&mut room, host_conn, 0);
        let purge = purge(&mut room, host.player_id(), 10_000);
        assert!(purge.removed);
        assert_eq!(purge.new_host.as_ref(), Some(carol.player_id()));
        assert_eq!(room.active_players().filter(|p| p.is_host).count(), 1);
    }

    #[test]
    fn purge_skips_reconnected_player() {
        let mut room = make_room();
        let mut rng = seeded_rng();
        let conn = Uuid::new_v4();
        let alice = join(&mut room, &req("Alice"), conn, 0, &mut rng).unwrap();
        disconnect(&mut room, conn, 0);
        join(&mut room, &req("Alice"), Uuid::new_v4(), 0, &mut rng).unwrap();
        assert_eq!(purge(&mut room, alice.player_id(), 10_000), Purge::default());
        assert_eq!(room.players.len(), 1);
    }

    #[test]
    fn running_room_spawns_away_from_edges() {
        let mut room = make_room_with(|r| r.state = RoomState::Running);
        let mut rng = seeded_rng();
        for i in 0..10 {
            let name = format!("Player{i}");
            join(&mut room, &req(&name), Uuid::new_v4(), 0, &mut rng).unwrap();
        }
        for p in &room.players {
            assert!(p.pos.x >= MATCH_SPAWN_MARGIN && p.pos.y >= MATCH_SPAWN_MARGIN);
        }
    }
}
