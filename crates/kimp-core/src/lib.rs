pub mod entity;
pub mod error;
pub mod id;
pub mod input;
pub mod lifecycle;
pub mod net;
pub mod player;
pub mod powerup;
pub mod room;
pub mod roster;
pub mod sim;
pub mod spawn;
pub mod time;
pub mod tuning;
pub mod view;

/// Shared fixtures for unit tests here and integration tests downstream.
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use uuid::Uuid;

    use crate::entity::Vec2;
    use crate::player::{Player, PlayerId};
    use crate::room::{CreateRoomRequest, Room, RoomConfig};

    pub const ROOM_ID: &str = "0a0b0c0d";
    pub const HOST_KEY: &str = "hostkey";

    /// Lobby room with default settings and no players, created at t=0.
    pub fn make_room() -> Room {
        make_room_with(|_| {})
    }

    /// Like [`make_room`], then hand the room to `f` for tweaks.
    pub fn make_room_with(f: impl FnOnce(&mut Room)) -> Room {
        let normalized = CreateRoomRequest::default()
            .normalize(&RoomConfig::default())
            .expect("default host name is valid");
        let mut room = Room::new(ROOM_ID.into(), HOST_KEY.into(), normalized, 0);
        f(&mut room);
        room
    }

    /// Push a connected player directly, bypassing join validation. The
    /// first player added becomes host.
    pub fn add_player(room: &mut Room, name: &str, cosmetic: u8) -> PlayerId {
        let id = format!("p{}", room.players.len() + 1);
        let offset = (100 * room.players.len() % 1200) as f32;
        let is_host = room.players.is_empty();
        room.players.push(Player::new(
            id.clone(),
            name.to_string(),
            is_host,
            Uuid::new_v4(),
            Vec2::new(200.0 + offset, 450.0),
            cosmetic,
            0,
        ));
        id
    }

    pub fn seeded_rng() -> StdRng {
        StdRng::seed_from_u64(0x6b69_6d70)
    }
}
