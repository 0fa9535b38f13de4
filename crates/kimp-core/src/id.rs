use rand::Rng;

pub const ROOM_ID_BYTES: usize = 4;
pub const PLAYER_ID_BYTES: usize = 8;
pub const ENTITY_ID_BYTES: usize = 6;
pub const HOST_KEY_BYTES: usize = 16;

/// `n` random bytes, lowercase hex encoded.
pub fn random_hex<R: Rng>(rng: &mut R, n: usize) -> String {
    let mut buf = vec![0u8; n];
    rng.fill_bytes(&mut buf);
    hex::encode(buf)
}

pub fn entity_id<R: Rng>(rng: &mut R) -> String {
    random_hex(rng, ENTITY_ID_BYTES)
}

/// Fresh player id. Callers pass a cryptographically seeded RNG in
/// production so ids are not guessable from one another.
pub fn player_id<R: Rng>(rng: &mut R) -> String {
    random_hex(rng, PLAYER_ID_BYTES)
}

pub fn host_key<R: Rng>(rng: &mut R) -> String {
    random_hex(rng, HOST_KEY_BYTES)
}

/// Candidate room id: 8 lowercase hex characters. Uniqueness against live
/// rooms is the registry's job.
pub fn room_id<R: Rng>(rng: &mut R) -> String {
    random_hex(rng, ROOM_ID_BYTES)
}

/// Validate room id format: exactly 8 lowercase hex characters.
pub fn is_valid_room_id(id: &str) -> bool {
    id.len() == ROOM_ID_BYTES * 2
        && id
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn room_ids_are_valid() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let id = room_id(&mut rng);
            assert!(is_valid_room_id(&id), "bad room id {id}");
        }
    }

    #[test]
    fn rejects_malformed_room_ids() {
        assert!(!is_valid_room_id(""));
        assert!(!is_valid_room_id("abc"));
        assert!(!is_valid_room_id("ABCDEF12"));
        assert!(!is_valid_room_id("abcdefg1"));
        assert!(!is_valid_room_id("abcdef123"));
        assert!(is_valid_room_id("0a1b2c3d"));
    }

    #[test]
    fn id_lengths() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(player_id(&mut rng).len(), 16);
        assert_eq!(entity_id(&mut rng).len(), 12);
        assert_eq!(host_key(&mut rng).len(), 32);
    }
}
