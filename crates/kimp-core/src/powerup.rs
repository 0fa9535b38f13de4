use crate::time::Millis;

/// Which timed effect a player holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PossessionKind {
    /// Area kill, triggered by an explicit use.
    Powerup,
    /// Automatic fire for as long as it lasts.
    RapidFire,
}

/// A timed effect held by a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Possession {
    pub kind: PossessionKind,
    pub expires_at: Millis,
}

impl Possession {
    pub fn new(kind: PossessionKind, now: Millis, duration_ms: Millis) -> Self {
        Self {
            kind,
            expires_at: now + duration_ms,
        }
    }

    pub fn is_expired(&self, now: Millis) -> bool {
        now >= self.expires_at
    }
}

/// Drop `slot` if its possession has run out. Returns true when cleared.
pub fn expire(slot: &mut Option<Possession>, now: Millis) -> bool {
    if slot.is_some_and(|p| p.is_expired(now)) {
        *slot = None;
        true
    } else {
        false
    }
}
