//! Gameplay constants. Distances are pixels, speeds pixels per second,
//! durations milliseconds.

/// Simulation rate of the global tick loop.
pub const TICK_RATE_HZ: u32 = 30;
/// Fixed simulation step in seconds.
pub const TICK_DELTA_SECS: f32 = 1.0 / TICK_RATE_HZ as f32;

pub const MAP_WIDTH: f32 = 1600.0;
pub const MAP_HEIGHT: f32 = 900.0;

pub const PLAYER_RADIUS: f32 = 18.0;
pub const COIN_RADIUS: f32 = 12.0;
pub const ENEMY_RADIUS: f32 = 22.0;
pub const POWERUP_RADIUS: f32 = 16.0;
pub const RAPIDFIRE_RADIUS: f32 = 16.0;
pub const BULLET_RADIUS: f32 = 4.0;

pub const MAX_COINS: usize = 12;
pub const MAX_ENEMIES: usize = 6;
/// Powerups that may appear on the map over a single match.
pub const MAX_POWERUPS_PER_MATCH: u32 = 2;

pub const PLAYER_SPEED: f32 = 380.0;
pub const DASH_SPEED: f32 = 650.0;
/// Per-axis bound of a freshly spawned enemy's velocity.
pub const ENEMY_SPEED: f32 = 160.0;
pub const BULLET_SPEED: f32 = 500.0;

pub const RESPAWN_MS: u64 = 2000;
pub const DASH_DURATION_MS: u64 = 220;
pub const DASH_COOLDOWN_MS: u64 = 900;
pub const ENEMY_RESPAWN_MS: u64 = 6000;

pub const POWERUP_SPAWN_INTERVAL_MS: u64 = 20_000;
/// How long an uncollected powerup stays on the map, and how long a
/// collected one stays usable.
pub const POWERUP_DURATION_MS: u64 = 5000;
pub const POWERUP_KILL_RADIUS: f32 = 200.0;

pub const RAPIDFIRE_SPAWN_INTERVAL_MS: u64 = 15_000;
pub const RAPIDFIRE_PICKUP_LIFETIME_MS: u64 = 10_000;
pub const RAPIDFIRE_DURATION_MS: u64 = 3000;
pub const RAPIDFIRE_SHOT_INTERVAL_MS: u64 = 150;
pub const BULLET_LIFETIME_MS: u64 = 2000;

/// Minimum spacing between accepted inputs from one player.
pub const INPUT_RATE_LIMIT_MS: u64 = 16;

pub const COIN_POINTS: u32 = 1;
pub const POWERUP_KILL_POINTS: u32 = 10;
pub const BULLET_PLAYER_POINTS: u32 = 2;
pub const BULLET_ENEMY_POINTS: u32 = 1;
pub const DASH_KILL_POINTS: u32 = 2;
pub const DEATH_PENALTY: u32 = 1;

/// Inset from the map edge for players joining a lobby.
pub const LOBBY_SPAWN_MARGIN: f32 = 100.0;
/// Inset used when (re)spawning players into a running match.
pub const MATCH_SPAWN_MARGIN: f32 = 200.0;
pub const COIN_SPAWN_MARGIN: f32 = 60.0;
pub const ENEMY_SPAWN_MARGIN: f32 = 60.0;
pub const PICKUP_SPAWN_MARGIN: f32 = 100.0;

/// Inclusive range of selectable cosmetics.
pub const MIN_COSMETIC: u8 = 1;
pub const MAX_COSMETIC: u8 = 15;
