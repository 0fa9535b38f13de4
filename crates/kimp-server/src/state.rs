use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::RwLock;

use kimp_core::time::{Clock, MonotonicClock};

use crate::config::ServerConfig;
use crate::rate_limit::IpRateLimiter;
use crate::room_manager::RoomManager;

pub type SharedRoomManager = Arc<RwLock<RoomManager>>;

/// Room creations allowed per IP in a burst, and refilled per second.
const CREATE_ROOM_BURST: f64 = 10.0;
const CREATE_ROOM_PER_SEC: f64 = 0.5;

#[derive(Clone)]
pub struct AppState {
    pub rooms: SharedRoomManager,
    pub config: Arc<ServerConfig>,
    pub ws_connection_count: Arc<AtomicUsize>,
    pub create_room_limiter: Arc<IpRateLimiter>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self::with_clock(config, Arc::new(MonotonicClock::new()))
    }

    /// Build state around an explicit clock; tests pass a manual one.
    pub fn with_clock(config: ServerConfig, clock: Arc<dyn Clock>) -> Self {
        let rooms = RoomManager::new(clock, config.room_defaults.clone());
        Self {
            rooms: Arc::new(RwLock::new(rooms)),
            config: Arc::new(config),
            ws_connection_count: Arc::new(AtomicUsize::new(0)),
            create_room_limiter: Arc::new(IpRateLimiter::new(
                CREATE_ROOM_BURST,
                CREATE_ROOM_PER_SEC,
            )),
        }
    }
}

/// Counts one live WebSocket connection for as long as it is held.
pub struct ConnectionGuard {
    count: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    pub fn new(count: Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::Relaxed);
        Self { count }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::Relaxed);
    }
}
