use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::Utf8Bytes;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use kimp_core::error::{CommandError, JoinError};
use kimp_core::id;
use kimp_core::input::apply_input;
use kimp_core::lifecycle;
use kimp_core::net::messages::{InputMsg, JoinMsg, JoinedMsg, PlayerJoinedMsg, ServerMessage};
use kimp_core::net::protocol::encode_server_message;
use kimp_core::player::{ConnectionId, PlayerId};
use kimp_core::room::{CreateRoomRequest, Room, RoomConfig, RoomState};
use kimp_core::roster::{self, JoinOutcome, JoinRequest};
use kimp_core::sim::{self, TickOutcome};
use kimp_core::time::{Clock, Millis};
use kimp_core::view::{game_view, lobby_view, results_view, room_view};

/// Frames queued for a connection's writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text(Utf8Bytes),
    /// WebSocket-level keepalive probe.
    Ping,
    Close(&'static str),
}

/// Per-connection sender for outbound frames. Bounded; frames for a client
/// whose queue is full are dropped.
pub type PlayerSender = mpsc::Sender<Outbound>;

/// Host-only room commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    Start,
    Rematch,
    Timeout,
}

/// Returned by room creation.
#[derive(Debug, Clone)]
pub struct CreatedRoom {
    pub room_id: String,
    pub host_key: String,
    pub config: RoomConfig,
}

/// A player waiting out the reconnect grace. Cancelling `token` keeps the
/// player in the room.
#[derive(Debug, Clone)]
pub struct PendingRemoval {
    pub room_id: String,
    pub player_id: PlayerId,
    pub token: CancellationToken,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub rooms: usize,
    pub players: usize,
}

#[derive(Debug, Clone)]
struct Binding {
    room_id: String,
    player_id: PlayerId,
}

/// Owns every room plus the bookkeeping that ties sockets to players.
pub struct RoomManager {
    rooms: HashMap<String, Room>,
    senders: HashMap<ConnectionId, PlayerSender>,
    bindings: HashMap<ConnectionId, Binding>,
    pending: HashMap<(String, PlayerId), CancellationToken>,
    clock: Arc<dyn Clock>,
    rng: StdRng,
    defaults: RoomConfig,
}

impl RoomManager {
    pub fn new(clock: Arc<dyn Clock>, defaults: RoomConfig) -> Self {
        Self {
            rooms: HashMap::new(),
            senders: HashMap::new(),
            bindings: HashMap::new(),
            pending: HashMap::new(),
            clock,
            rng: StdRng::from_os_rng(),
            defaults,
        }
    }

    pub fn now(&self) -> Millis {
        self.clock.now_ms()
    }

    pub fn register(&mut self, conn: ConnectionId, sender: PlayerSender) {
        self.senders.insert(conn, sender);
    }

    /// Create a lobby room. `None` when the host name is unusable.
    pub fn create_room(&mut self, req: &CreateRoomRequest) -> Option<CreatedRoom> {
        let normalized = req.normalize(&self.defaults)?;
        let room_id = loop {
            let candidate = id::room_id(&mut self.rng);
            if !self.rooms.contains_key(&candidate) {
                break candidate;
            }
        };
        let host_key = id::host_key(&mut self.rng);
        let room = Room::new(room_id.clone(), host_key.clone(), normalized, self.now());
        let config = room.config.clone();

        tracing::info!(
            room = %room_id,
            host = %room.host_name,
            target_score = config.target_score,
            max_players = config.max_players,
            "Room created"
        );
        self.rooms.insert(room_id.clone(), room);
        Some(CreatedRoom {
            room_id,
            host_key,
            config,
        })
    }

    pub fn room(&self, room_id: &str) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    /// Admit `conn` into a room and announce it. A connection that already
    /// joined a room is left as is.
    pub fn join(&mut self, conn: ConnectionId, msg: &JoinMsg) -> Result<(), JoinError> {
        if self.bindings.contains_key(&conn) {
            tracing::debug!(%conn, "Ignoring join on a connection that already joined");
            return Ok(());
        }
        if !id::is_valid_room_id(&msg.room_id) {
            return Err(JoinError::RoomNotFound);
        }
        let now = self.clock.now_ms();
        let room = self
            .rooms
            .get_mut(&msg.room_id)
            .ok_or(JoinError::RoomNotFound)?;

        let req = JoinRequest {
            name: &msg.name,
            passcode: msg.passcode.as_deref(),
            host_key: msg.host_key.as_deref(),
            cosmetic: msg.cosmetic,
        };
        let outcome = roster::join(room, &req, conn, now, &mut self.rng)?;
        let player_id = outcome.player_id().clone();
        let Some(player) = room.player(&player_id) else {
            return Ok(());
        };
        let is_host = player.is_host;
        let player_name = player.name.clone();

        if let JoinOutcome::Reconnected(_) = outcome
            && let Some(token) = self.pending.remove(&(room.id.clone(), player_id.clone()))
        {
            token.cancel();
        }
        tracing::info!(
            room = %room.id,
            player_id = %player_id,
            name = %player_name,
            is_host,
            reconnected = matches!(outcome, JoinOutcome::Reconnected(_)),
            "Player joined"
        );
        self.bindings.insert(
            conn,
            Binding {
                room_id: room.id.clone(),
                player_id: player_id.clone(),
            },
        );

        let joined = ServerMessage::Joined(Box::new(JoinedMsg {
            room_id: room.id.clone(),
            player_id: player_id.clone(),
            is_host,
            state: room_view(room, now),
        }));
        send_to(&self.senders, conn, &joined);

        match (room.state, &outcome) {
            (RoomState::Lobby | RoomState::Results, _) => {
                broadcast(&self.senders, room, &ServerMessage::lobby_update(lobby_view(room)));
            },
            (RoomState::Running, JoinOutcome::Joined(_)) => {
                let announce = ServerMessage::PlayerJoined(PlayerJoinedMsg {
                    player_id,
                    player_name,
                });
                broadcast_except(&self.senders, room, conn, &announce);
                send_to(
                    &self.senders,
                    conn,
                    &ServerMessage::match_start(game_view(room, now)),
                );
            },
            (RoomState::Running, JoinOutcome::Reconnected(_)) => {
                send_to(
                    &self.senders,
                    conn,
                    &ServerMessage::match_start(game_view(room, now)),
                );
            },
        }
        Ok(())
    }

    /// Forget `conn`. If it was bound to a player, that player is kept in
    /// the room as disconnected and a removal is scheduled for the caller
    /// to run after the grace period.
    pub fn disconnect(&mut self, conn: ConnectionId) -> Option<PendingRemoval> {
        self.senders.remove(&conn);
        let binding = self.bindings.remove(&conn)?;
        let now = self.clock.now_ms();
        let room = self.rooms.get_mut(&binding.room_id)?;
        let player_id = roster::disconnect(room, conn, now)?;

        tracing::info!(room = %room.id, player_id = %player_id, "Player disconnected");
        if room.state == RoomState::Lobby {
            broadcast(&self.senders, room, &ServerMessage::lobby_update(lobby_view(room)));
        }

        let token = CancellationToken::new();
        if let Some(previous) = self
            .pending
            .insert((binding.room_id.clone(), player_id.clone()), token.clone())
        {
            previous.cancel();
        }
        Some(PendingRemoval {
            room_id: binding.room_id,
            player_id,
            token,
        })
    }

    /// Grace period over: drop the player if they never came back.
    pub fn expire_player(&mut self, pending: &PendingRemoval) {
        if pending.token.is_cancelled() {
            return;
        }
        self.pending
            .remove(&(pending.room_id.clone(), pending.player_id.clone()));

        let now = self.clock.now_ms();
        let Some(room) = self.rooms.get_mut(&pending.room_id) else {
            return;
        };
        let purge = roster::purge(room, &pending.player_id, now);
        if !purge.removed {
            return;
        }
        tracing::info!(room = %room.id, player_id = %pending.player_id, "Player removed after grace period");

        if let Some(new_host) = purge.new_host {
            tracing::info!(room = %room.id, player_id = %new_host, "Host promoted");
            broadcast(&self.senders, room, &ServerMessage::host_change(new_host));
        }
        if room.players.is_empty() {
            tracing::info!(room = %pending.room_id, "Room empty, removing");
            self.rooms.remove(&pending.room_id);
        } else if room.state == RoomState::Lobby {
            broadcast(&self.senders, room, &ServerMessage::lobby_update(lobby_view(room)));
        }
    }

    /// Buffer movement intent for the next tick.
    pub fn input(&mut self, conn: ConnectionId, msg: &InputMsg) {
        let now = self.clock.now_ms();
        if let Some(binding) = self.bindings.get(&conn)
            && let Some(room) = self.rooms.get_mut(&binding.room_id)
        {
            apply_input(room, &binding.player_id, msg, now);
        }
    }

    /// Apply a host command and announce the resulting transition.
    pub fn command(&mut self, conn: ConnectionId, command: HostCommand) {
        let now = self.clock.now_ms();
        let result = match self.bindings.get(&conn) {
            Some(binding) => match self.rooms.get_mut(&binding.room_id) {
                Some(room) => {
                    let pid = &binding.player_id;
                    let applied = match command {
                        HostCommand::Start => lifecycle::start(room, pid, now, &mut self.rng),
                        HostCommand::Rematch => lifecycle::rematch(room, pid, now, &mut self.rng),
                        HostCommand::Timeout => lifecycle::timeout(room, pid, now),
                    };
                    applied.map(|()| {
                        let msg = match command {
                            HostCommand::Start | HostCommand::Rematch => {
                                ServerMessage::match_start(game_view(room, now))
                            },
                            HostCommand::Timeout => {
                                ServerMessage::match_end(None, true, results_view(room, now))
                            },
                        };
                        broadcast(&self.senders, room, &msg);
                    })
                },
                None => Err(CommandError::NotJoined),
            },
            None => Err(CommandError::NotJoined),
        };

        if let Err(e) = result {
            tracing::debug!(%conn, ?command, error = %e, "Ignoring host command");
            if let Some(message) = e.user_message() {
                send_to(&self.senders, conn, &ServerMessage::error(message));
            }
        }
    }

    /// Advance every room by one tick and push the resulting broadcasts.
    pub fn tick_all(&mut self, match_duration_ms: Option<Millis>, lobby_heartbeat_ms: Millis) {
        let now = self.clock.now_ms();
        let senders = &self.senders;
        let rng = &mut self.rng;

        for room in self.rooms.values_mut() {
            if lifecycle::countdown_expired(room, now, match_duration_ms) {
                lifecycle::finish_match(room, None, now);
                broadcast(
                    senders,
                    room,
                    &ServerMessage::match_end(None, true, results_view(room, now)),
                );
                continue;
            }

            match room.state {
                RoomState::Running => match sim::tick(room, now, rng) {
                    TickOutcome::Continue => {
                        broadcast(senders, room, &ServerMessage::state(game_view(room, now)));
                    },
                    TickOutcome::MatchEnded { winner_id } => {
                        broadcast(
                            senders,
                            room,
                            &ServerMessage::match_end(winner_id, false, results_view(room, now)),
                        );
                    },
                },
                RoomState::Lobby => {
                    if lifecycle::lobby_heartbeat_due(room, now, lobby_heartbeat_ms) {
                        broadcast(senders, room, &ServerMessage::lobby_update(lobby_view(room)));
                    }
                },
                RoomState::Results => {},
            }
        }
    }

    /// Tear down rooms idle past their timeout. Members are told why and
    /// their connections closed. Returns the number of rooms removed.
    pub fn sweep_idle(&mut self) -> usize {
        let now = self.clock.now_ms();
        let expired: Vec<String> = self
            .rooms
            .values()
            .filter(|room| room.is_idle(now))
            .map(|room| room.id.clone())
            .collect();

        for room_id in &expired {
            let Some(room) = self.rooms.remove(room_id) else {
                continue;
            };
            tracing::info!(
                room = %room_id,
                idle_ms = now.saturating_sub(room.last_active),
                timeout_minutes = room.config.room_timeout_minutes,
                "Sweeping inactive room"
            );
            let notice = ServerMessage::error(format!(
                "Room has expired due to inactivity ({} minutes).",
                room.config.room_timeout_minutes
            ));
            broadcast(&self.senders, &room, &notice);
            for conn in room.connections() {
                self.bindings.remove(&conn);
                if let Some(sender) = self.senders.get(&conn) {
                    let _ = sender.try_send(Outbound::Close("Room expired"));
                }
            }
            self.pending.retain(|(id, _), token| {
                if id == room_id {
                    token.cancel();
                    false
                } else {
                    true
                }
            });
        }
        expired.len()
    }

    pub fn stats(&self) -> Stats {
        Stats {
            rooms: self.rooms.len(),
            players: self.rooms.values().map(Room::active_count).sum(),
        }
    }
}

fn encode(msg: &ServerMessage) -> Option<Utf8Bytes> {
    match encode_server_message(msg) {
        Ok(text) => Some(Utf8Bytes::from(text)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode server message");
            None
        },
    }
}

fn send_to(senders: &HashMap<ConnectionId, PlayerSender>, conn: ConnectionId, msg: &ServerMessage) {
    if let Some(sender) = senders.get(&conn)
        && let Some(text) = encode(msg)
        && let Err(e) = sender.try_send(Outbound::Text(text))
    {
        tracing::debug!(%conn, error = %e, "Failed to send to client (slow or disconnected)");
    }
}

fn broadcast(senders: &HashMap<ConnectionId, PlayerSender>, room: &Room, msg: &ServerMessage) {
    broadcast_filtered(senders, room, msg, |_| true);
}

fn broadcast_except(
    senders: &HashMap<ConnectionId, PlayerSender>,
    room: &Room,
    exclude: ConnectionId,
    msg: &ServerMessage,
) {
    broadcast_filtered(senders, room, msg, |conn| conn != exclude);
}

/// Encode once, then queue for every connected member accepted by `keep`.
fn broadcast_filtered(
    senders: &HashMap<ConnectionId, PlayerSender>,
    room: &Room,
    msg: &ServerMessage,
    keep: impl Fn(ConnectionId) -> bool,
) {
    let Some(text) = encode(msg) else {
        return;
    };
    for conn in room.connections().filter(|c| keep(*c)) {
        if let Some(sender) = senders.get(&conn)
            && let Err(e) = sender.try_send(Outbound::Text(text.clone()))
        {
            tracing::debug!(room = %room.id, %conn, error = %e, "Skipping broadcast to slow client");
        }
    }
}
