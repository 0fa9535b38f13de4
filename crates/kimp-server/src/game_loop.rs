use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use kimp_core::tuning::TICK_RATE_HZ;

use crate::room_manager::PendingRemoval;
use crate::state::AppState;

/// Addresses not seen by the room-creation limiter for this long are
/// forgotten on each sweep.
const LIMITER_MAX_AGE: Duration = Duration::from_secs(600);

/// Drive every room at the simulation rate. Each tick runs with the room
/// registry locked, so a room's tick and its broadcast are never
/// interleaved with inbound messages.
pub fn spawn_tick_loop(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let tick_interval = Duration::from_secs_f64(1.0 / f64::from(TICK_RATE_HZ));
        let mut interval = tokio::time::interval(tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let match_duration = state.config.game.match_duration_ms();
        let heartbeat = state.config.game.lobby_heartbeat_ms;

        loop {
            interval.tick().await;
            state.rooms.write().await.tick_all(match_duration, heartbeat);
        }
    })
}

/// Periodically tear down idle rooms and prune the creation limiter.
pub fn spawn_room_sweeper(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = Duration::from_secs(state.config.game.sweep_interval_secs);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // First tick completes immediately.
        interval.tick().await;

        loop {
            interval.tick().await;
            let swept = state.rooms.write().await.sweep_idle();
            if swept > 0 {
                tracing::info!(swept, "Swept inactive rooms");
            }
            state.create_room_limiter.cleanup(LIMITER_MAX_AGE).await;
        }
    })
}

/// Wait out the reconnect grace for a dropped player, then purge them
/// unless they reconnected first.
pub fn spawn_grace_timer(state: AppState, pending: PendingRemoval) -> JoinHandle<()> {
    tokio::spawn(async move {
        let grace = Duration::from_secs(state.config.game.reconnect_grace_secs);
        tokio::select! {
            () = pending.token.cancelled() => {
                tracing::debug!(
                    room = %pending.room_id,
                    player_id = %pending.player_id,
                    "Reconnected within grace period"
                );
            },
            () = tokio::time::sleep(grace) => {
                state.rooms.write().await.expire_player(&pending);
            },
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use kimp_core::net::messages::JoinMsg;
    use kimp_core::room::CreateRoomRequest;
    use kimp_core::time::{Clock, ManualClock};
    use tokio::sync::mpsc;
    use uuid::Uuid;

    use super::*;
    use crate::config::ServerConfig;

    async fn state_with_member(grace_secs: u64) -> (AppState, String, Uuid) {
        let mut config = ServerConfig::default();
        config.game.reconnect_grace_secs = grace_secs;
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(0));
        let state = AppState::with_clock(config, clock);

        let mut rooms = state.rooms.write().await;
        let created = rooms.create_room(&CreateRoomRequest::default()).unwrap();
        let conn = Uuid::new_v4();
        let (tx, _rx) = mpsc::channel(16);
        rooms.register(conn, tx);
        rooms
            .join(
                conn,
                &JoinMsg {
                    room_id: created.room_id.clone(),
                    name: "Alice".into(),
                    ..JoinMsg::default()
                },
            )
            .unwrap();
        drop(rooms);
        (state, created.room_id, conn)
    }

    #[tokio::test]
    async fn grace_timer_purges_after_grace() {
        let (state, room_id, conn) = state_with_member(0).await;
        let pending = state.rooms.write().await.disconnect(conn).unwrap();
        let handle = spawn_grace_timer(state.clone(), pending);

        handle.await.unwrap();
        assert!(state.rooms.read().await.room(&room_id).is_none());
    }

    #[tokio::test]
    async fn cancelled_grace_timer_keeps_player() {
        let (state, room_id, conn) = state_with_member(60).await;
        let pending = state.rooms.write().await.disconnect(conn).unwrap();
        let token = pending.token.clone();
        let handle = spawn_grace_timer(state.clone(), pending);

        token.cancel();
        handle.await.unwrap();
        let rooms = state.rooms.read().await;
        assert_eq!(rooms.room(&room_id).unwrap().players.len(), 1);
    }

    #[tokio::test]
    async fn tick_loop_keeps_running() {
        let (state, _, _) = state_with_member(10).await;
        let handle = spawn_tick_loop(state.clone());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!handle.is_finished());
        handle.abort();
    }
}
