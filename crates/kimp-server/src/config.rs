use serde::Deserialize;

use kimp_core::net::protocol::MAX_MESSAGE_SIZE;
use kimp_core::room::{
    MAX_MAX_PLAYERS, MAX_TARGET_SCORE, MAX_TIMEOUT_MINUTES, MIN_MAX_PLAYERS, MIN_TARGET_SCORE,
    MIN_TIMEOUT_MINUTES, RoomConfig,
};
use kimp_core::time::Millis;

const CONFIG_FILE: &str = "kimp.toml";

/// Top-level server configuration, loaded from `kimp.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub web_root: String,
    /// Base for join URLs handed out at room creation. Falls back to the
    /// request's origin when unset.
    pub public_url: Option<String>,
    pub limits: LimitsConfig,
    pub game: GameConfig,
    pub room_defaults: RoomConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            web_root: "public".to_string(),
            public_url: None,
            limits: LimitsConfig::default(),
            game: GameConfig::default(),
            room_defaults: RoomConfig::default(),
        }
    }
}

/// Infrastructure limits (connection caps, buffer sizes, rate limits).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_ws_connections: usize,
    /// Inbound frame refill rate per connection.
    pub ws_rate_limit_per_sec: f64,
    pub ws_rate_limit_burst: f64,
    /// Outbound queue depth per connection. Frames beyond it are dropped.
    pub player_message_buffer: usize,
    pub max_message_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ws_connections: 500,
            ws_rate_limit_per_sec: 120.0,
            ws_rate_limit_burst: 60.0,
            player_message_buffer: 256,
            max_message_bytes: MAX_MESSAGE_SIZE,
        }
    }
}

/// Timing of the background loops.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub lobby_heartbeat_ms: u64,
    pub reconnect_grace_secs: u64,
    pub keepalive_interval_secs: u64,
    pub sweep_interval_secs: u64,
    /// When set, the server ends running matches after this long.
    pub match_duration_secs: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            lobby_heartbeat_ms: 1000,
            reconnect_grace_secs: 10,
            keepalive_interval_secs: 30,
            sweep_interval_secs: 60,
            match_duration_secs: None,
        }
    }
}

impl GameConfig {
    pub fn match_duration_ms(&self) -> Option<Millis> {
        self.match_duration_secs.map(|s| s * 1000)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

impl ServerConfig {
    /// Check the configuration. Returns one message per problem found.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            problems.push(format!(
                "listen_addr '{}' is not a valid socket address",
                self.listen_addr
            ));
        }
        if let Some(url) = &self.public_url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            problems.push(format!("public_url '{url}' must start with http:// or https://"));
        }

        if self.limits.max_ws_connections == 0 {
            problems.push("limits.max_ws_connections must be > 0".into());
        }
        if self.limits.ws_rate_limit_per_sec <= 0.0 {
            problems.push("limits.ws_rate_limit_per_sec must be > 0".into());
        }
        if self.limits.ws_rate_limit_burst < 1.0 {
            problems.push("limits.ws_rate_limit_burst must be >= 1".into());
        }
        if self.limits.player_message_buffer == 0 {
            problems.push("limits.player_message_buffer must be > 0".into());
        }
        if self.limits.max_message_bytes == 0 || self.limits.max_message_bytes > MAX_MESSAGE_SIZE {
            problems.push(format!(
                "limits.max_message_bytes must be between 1 and {MAX_MESSAGE_SIZE}"
            ));
        }

        if self.game.lobby_heartbeat_ms == 0 {
            problems.push("game.lobby_heartbeat_ms must be > 0".into());
        }
        if self.game.keepalive_interval_secs == 0 {
            problems.push("game.keepalive_interval_secs must be > 0".into());
        }
        if self.game.sweep_interval_secs == 0 {
            problems.push("game.sweep_interval_secs must be > 0".into());
        }
        if self.game.match_duration_secs == Some(0) {
            problems.push("game.match_duration_secs must be > 0 when set".into());
        }

        let d = &self.room_defaults;
        if !(MIN_TARGET_SCORE..=MAX_TARGET_SCORE).contains(&d.target_score) {
            problems.push(format!(
                "room_defaults.targetScore must be between {MIN_TARGET_SCORE} and {MAX_TARGET_SCORE}"
            ));
        }
        if !(MIN_MAX_PLAYERS..=MAX_MAX_PLAYERS).contains(&d.max_players) {
            problems.push(format!(
                "room_defaults.maxPlayers must be between {MIN_MAX_PLAYERS} and {MAX_MAX_PLAYERS}"
            ));
        }
        if !(MIN_TIMEOUT_MINUTES..=MAX_TIMEOUT_MINUTES).contains(&d.room_timeout_minutes) {
            problems.push(format!(
                "room_defaults.roomTimeoutMinutes must be between {MIN_TIMEOUT_MINUTES} and {MAX_TIMEOUT_MINUTES}"
            ));
        }

        problems
    }

    /// Load config from `kimp.toml` if it exists, then apply env var overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string(CONFIG_FILE) {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from {CONFIG_FILE}");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse {CONFIG_FILE}: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No {CONFIG_FILE} found, using defaults");
                ServerConfig::default()
            },
        };
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if let Ok(addr) = std::env::var("KIMP_LISTEN_ADDR")
            && !addr.is_empty()
        {
            self.listen_addr = addr;
        }
        if let Ok(root) = std::env::var("KIMP_WEB_ROOT")
            && !root.is_empty()
        {
            self.web_root = root;
        }
        if let Ok(url) = std::env::var("KIMP_PUBLIC_URL")
            && !url.is_empty()
        {
            self.public_url = Some(url);
        }
        if let Some(n) = env_parse("KIMP_MAX_WS_CONNECTIONS") {
            self.limits.max_ws_connections = n;
        }
        if let Some(n) = env_parse("KIMP_WS_RATE_LIMIT") {
            self.limits.ws_rate_limit_per_sec = n;
        }
        if let Some(n) = env_parse("KIMP_MATCH_DURATION_SECS") {
            self.game.match_duration_secs = Some(n);
        }
    }
}
