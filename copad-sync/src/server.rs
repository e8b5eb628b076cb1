//! Reference room server.
//!
//! The production deployment treats the server as an external authority;
//! this implementation exists so the full client stack can be exercised
//! end-to-end (integration tests, the terminal frontend's `serve` mode).
//! It implements the wire contract the client depends on:
//!
//! - assigns each connection a session id and a palette color on join
//! - acknowledges joins with the authoritative text and full roster
//! - relays content changes last-writer-wins, never echoing to the sender
//! - stamps cursor broadcasts with the sender's identity
//! - announces departures, both explicit leaves and dropped sockets
//!
//! ```text
//! Client A ──┐
//!            ├── Room (room_id) ── text + roster ── broadcast channel
//! Client B ──┘                                            │
//!                                              fan-out to N-1 peers
//! ```
//!
//! Rooms are keyed by room-id string; each has one tokio broadcast
//! channel, and every frame carries its origin session id so receivers
//! can skip their own messages.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, RwLock};
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

use crate::protocol::{ClientEvent, JoinAck, Participant, RemoteCursor, ServerEvent};

/// Display colors handed out to members, in join order per room.
const MEMBER_COLORS: [&str; 8] = [
    "#e74c3c", "#8e44ad", "#3498db", "#16a085", "#f39c12", "#d35400", "#2ecc71", "#e84393",
];

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: String,
    /// Joins beyond this per-room count are rejected with an error event.
    pub max_members_per_room: usize,
    /// Broadcast channel capacity per room.
    pub broadcast_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:9600".to_string(),
            max_members_per_room: 32,
            broadcast_capacity: 256,
        }
    }
}

/// Server counters.
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    pub total_connections: u64,
    pub active_connections: u64,
    pub total_events: u64,
    pub active_rooms: usize,
}

/// A broadcast frame: origin session id plus the encoded event, shared
/// across all receivers without re-encoding.
type RoomFrame = Arc<(Uuid, String)>;

/// One room: authoritative text, roster in join order, fan-out channel.
struct Room {
    text: String,
    members: Vec<Participant>,
    colors_assigned: usize,
    tx: broadcast::Sender<RoomFrame>,
}

impl Room {
    fn new(broadcast_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(broadcast_capacity);
        Self {
            text: String::new(),
            members: Vec::new(),
            colors_assigned: 0,
            tx,
        }
    }

    fn next_color(&mut self) -> String {
        let color = MEMBER_COLORS[self.colors_assigned % MEMBER_COLORS.len()];
        self.colors_assigned += 1;
        color.to_owned()
    }

    /// Fan an event out to every subscriber; receivers skip `origin`.
    fn broadcast(&self, origin: Uuid, event: &ServerEvent) {
        match event.encode() {
            Ok(frame) => {
                let _ = self.tx.send(Arc::new((origin, frame)));
            }
            Err(e) => log::error!("failed to encode broadcast event: {e}"),
        }
    }
}

/// A connection's current room binding.
struct Membership {
    room_id: String,
    participant: Participant,
}

/// The room server.
pub struct RoomServer {
    config: ServerConfig,
    rooms: Arc<RwLock<HashMap<String, Room>>>,
    stats: Arc<RwLock<ServerStats>>,
}

impl RoomServer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            rooms: Arc::new(RwLock::new(HashMap::new())),
            stats: Arc::new(RwLock::new(ServerStats::default())),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(ServerConfig::default())
    }

    pub fn bind_addr(&self) -> &str {
        &self.config.bind_addr
    }

    /// Snapshot of the server counters.
    pub async fn stats(&self) -> ServerStats {
        let mut stats = self.stats.read().await.clone();
        stats.active_rooms = self.rooms.read().await.len();
        stats
    }

    /// Start accepting WebSocket connections. Runs forever.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        log::info!("room server listening on {}", self.config.bind_addr);

        loop {
            let (stream, addr) = listener.accept().await?;
            log::debug!("new TCP connection from {addr}");

            let rooms = self.rooms.clone();
            let stats = self.stats.clone();
            let config = self.config.clone();

            tokio::spawn(async move {
                if let Err(e) = Self::handle_connection(stream, addr, rooms, stats, config).await {
                    log::error!("connection error from {addr}: {e}");
                }
            });
        }
    }

    /// Handle a single client connection for its whole lifetime.
    ///
    /// One connection can run several room sessions back to back; a join
    /// while already in a room implicitly leaves the old one first.
    async fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        rooms: Arc<RwLock<HashMap<String, Room>>>,
        stats: Arc<RwLock<ServerStats>>,
        config: ServerConfig,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let ws_stream = tokio_tungstenite::accept_async(stream).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        log::info!("WebSocket connection established from {addr}");
        {
            let mut s = stats.write().await;
            s.total_connections += 1;
            s.active_connections += 1;
        }

        let mut membership: Option<Membership> = None;
        let mut broadcast_rx: Option<broadcast::Receiver<RoomFrame>> = None;

        loop {
            tokio::select! {
                msg = ws_receiver.next() => {
                    match msg {
                        Some(Ok(Message::Text(frame))) => {
                            let event = match ClientEvent::decode(frame.as_str()) {
                                Ok(event) => event,
                                Err(e) => {
                                    log::warn!("undecodable frame from {addr}: {e}");
                                    continue;
                                }
                            };
                            stats.write().await.total_events += 1;

                            match event {
                                ClientEvent::Join { room_id, username } => {
                                    if let Some(old) = membership.take() {
                                        broadcast_rx = None;
                                        Self::depart(&rooms, &old).await;
                                    }

                                    let admitted = {
                                        let mut rooms_w = rooms.write().await;
                                        let room = rooms_w
                                            .entry(room_id.clone())
                                            .or_insert_with(|| Room::new(config.broadcast_capacity));

                                        if room.members.len() >= config.max_members_per_room {
                                            Err(format!("room {room_id} is full"))
                                        } else {
                                            let participant = Participant {
                                                session_id: Uuid::new_v4(),
                                                username: username.clone(),
                                                color: room.next_color(),
                                            };
                                            room.members.push(participant.clone());
                                            let rx = room.tx.subscribe();
                                            let ack = JoinAck {
                                                session_id: participant.session_id,
                                                username: participant.username.clone(),
                                                color: participant.color.clone(),
                                                room_id: room_id.clone(),
                                                text: room.text.clone(),
                                                roster: room.members.clone(),
                                            };
                                            room.broadcast(
                                                participant.session_id,
                                                &ServerEvent::MemberJoined(participant.clone()),
                                            );
                                            Ok((ack, rx, participant))
                                        }
                                    };

                                    match admitted {
                                        Ok((ack, rx, participant)) => {
                                            let frame = ServerEvent::Joined(ack).encode()?;
                                            ws_sender.send(Message::Text(frame.into())).await?;
                                            broadcast_rx = Some(rx);
                                            log::info!(
                                                "{} ({}) joined room {room_id}",
                                                participant.username,
                                                participant.session_id
                                            );
                                            membership = Some(Membership { room_id, participant });
                                        }
                                        Err(message) => {
                                            log::warn!("rejecting join from {addr}: {message}");
                                            let frame = ServerEvent::Error { message }.encode()?;
                                            ws_sender.send(Message::Text(frame.into())).await?;
                                        }
                                    }
                                }

                                ClientEvent::Leave { .. } => {
                                    if let Some(old) = membership.take() {
                                        broadcast_rx = None;
                                        log::info!(
                                            "{} left room {}",
                                            old.participant.username,
                                            old.room_id
                                        );
                                        Self::depart(&rooms, &old).await;
                                    }
                                }

                                ClientEvent::ContentChange { room_id, text, .. } => {
                                    if let Some(m) =
                                        membership.as_ref().filter(|m| m.room_id == room_id)
                                    {
                                        let mut rooms_w = rooms.write().await;
                                        if let Some(room) = rooms_w.get_mut(&room_id) {
                                            room.text = text.clone();
                                            room.broadcast(
                                                m.participant.session_id,
                                                &ServerEvent::ContentUpdate { text },
                                            );
                                        }
                                    }
                                }

                                ClientEvent::CursorMove { room_id, position } => {
                                    if let Some(m) =
                                        membership.as_ref().filter(|m| m.room_id == room_id)
                                    {
                                        let rooms_r = rooms.read().await;
                                        if let Some(room) = rooms_r.get(&room_id) {
                                            room.broadcast(
                                                m.participant.session_id,
                                                &ServerEvent::CursorUpdate(RemoteCursor {
                                                    session_id: m.participant.session_id,
                                                    username: m.participant.username.clone(),
                                                    color: m.participant.color.clone(),
                                                    position: Some(position),
                                                }),
                                            );
                                        }
                                    }
                                }
                            }
                        }

                        Some(Ok(Message::Close(_))) | None => {
                            log::info!("connection closed from {addr}");
                            break;
                        }

                        Some(Ok(Message::Ping(data))) => {
                            ws_sender.send(Message::Pong(data)).await?;
                        }

                        Some(Err(e)) => {
                            log::error!("WebSocket error from {addr}: {e}");
                            break;
                        }

                        _ => {}
                    }
                }

                frame = async {
                    match broadcast_rx.as_mut() {
                        Some(rx) => rx.recv().await,
                        None => std::future::pending().await,
                    }
                } => {
                    match frame {
                        Ok(frame) => {
                            let own = membership
                                .as_ref()
                                .is_some_and(|m| m.participant.session_id == frame.0);
                            if own {
                                continue;
                            }
                            ws_sender.send(Message::Text(frame.1.clone().into())).await?;
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            log::warn!("connection {addr} lagged by {n} broadcast frames");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            broadcast_rx = None;
                        }
                    }
                }
            }
        }

        // A dropped socket is an implicit leave.
        if let Some(old) = membership.take() {
            Self::depart(&rooms, &old).await;
        }
        stats.write().await.active_connections -= 1;

        Ok(())
    }

    /// Remove a member from their room, announce the departure, and drop
    /// the room once it is empty.
    async fn depart(rooms: &RwLock<HashMap<String, Room>>, membership: &Membership) {
        let mut rooms_w = rooms.write().await;
        let Some(room) = rooms_w.get_mut(&membership.room_id) else {
            return;
        };

        let before = room.members.len();
        room.members
            .retain(|p| p.session_id != membership.participant.session_id);
        if room.members.len() < before {
            room.broadcast(
                membership.participant.session_id,
                &ServerEvent::MemberLeft {
                    session_id: membership.participant.session_id,
                    username: membership.participant.username.clone(),
                },
            );
        }

        if room.members.is_empty() {
            rooms_w.remove(&membership.room_id);
            log::info!("room {} removed (empty)", membership.room_id);
        }
    }
}
