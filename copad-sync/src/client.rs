//! WebSocket transport for talking to a room server.
//!
//! [`CollabClient`] owns exactly one bidirectional channel. The
//! connection opens lazily on the first join, never at construction, and
//! survives leave-then-rejoin: room lifecycle is managed by the
//! controller, connection lifecycle by this type.
//!
//! Inbound frames are decoded into [`ServerEvent`]s and forwarded to the
//! application through an event channel; outbound [`ClientEvent`]s go
//! through a writer task. There is no automatic reconnect: a dropped
//! connection surfaces as [`SyncEvent::Disconnected`] and the user
//! rejoins manually.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::Message;

use crate::protocol::{ClientEvent, ProtocolError, ServerEvent};

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// What the transport reports to the application.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Channel established.
    Connected,
    /// Channel lost; the session is stuck until the user rejoins.
    Disconnected,
    /// A decoded server event, in delivery order.
    Room(ServerEvent),
}

/// The sync transport.
pub struct CollabClient {
    server_url: String,
    state: Arc<RwLock<ConnectionState>>,
    /// Feeds the writer task. `None` until connected.
    outgoing_tx: Option<mpsc::Sender<String>>,
    event_tx: mpsc::Sender<SyncEvent>,
    event_rx: Option<mpsc::Receiver<SyncEvent>>,
}

impl CollabClient {
    pub fn new(server_url: impl Into<String>) -> Self {
        let (event_tx, event_rx) = mpsc::channel(256);
        Self {
            server_url: server_url.into(),
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            outgoing_tx: None,
            event_tx,
            event_rx: Some(event_rx),
        }
    }

    /// Take the event receiver (can only be called once).
    pub fn take_event_rx(&mut self) -> Option<mpsc::Receiver<SyncEvent>> {
        self.event_rx.take()
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub async fn connection_state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Open the channel if it is not already open.
    ///
    /// Spawns the writer and reader tasks. Idempotent while connected.
    pub async fn connect(&mut self) -> Result<(), ProtocolError> {
        if *self.state.read().await == ConnectionState::Connected {
            return Ok(());
        }
        *self.state.write().await = ConnectionState::Connecting;

        match tokio_tungstenite::connect_async(&self.server_url).await {
            Ok((ws_stream, _)) => {
                let (mut ws_writer, mut ws_reader) = ws_stream.split();

                // Writer task: forward outbound frames to the socket.
                let (out_tx, mut out_rx) = mpsc::channel::<String>(256);
                self.outgoing_tx = Some(out_tx);
                tokio::spawn(async move {
                    while let Some(frame) = out_rx.recv().await {
                        if ws_writer.send(Message::Text(frame.into())).await.is_err() {
                            break;
                        }
                    }
                });

                *self.state.write().await = ConnectionState::Connected;
                let _ = self.event_tx.send(SyncEvent::Connected).await;

                // Reader task: decode inbound frames in delivery order.
                let event_tx = self.event_tx.clone();
                let state = self.state.clone();
                tokio::spawn(async move {
                    while let Some(msg) = ws_reader.next().await {
                        match msg {
                            Ok(Message::Text(frame)) => match ServerEvent::decode(frame.as_str()) {
                                Ok(event) => {
                                    let _ = event_tx.send(SyncEvent::Room(event)).await;
                                }
                                Err(e) => {
                                    log::warn!("dropping undecodable frame: {e}");
                                }
                            },
                            Ok(Message::Close(_)) | Err(_) => break,
                            _ => {}
                        }
                    }

                    *state.write().await = ConnectionState::Disconnected;
                    let _ = event_tx.send(SyncEvent::Disconnected).await;
                });

                Ok(())
            }
            Err(e) => {
                *self.state.write().await = ConnectionState::Disconnected;
                log::error!("failed to connect to {}: {e}", self.server_url);
                Err(ProtocolError::ConnectionClosed)
            }
        }
    }

    /// Open the channel (lazily) and request to join a room.
    pub async fn join(
        &mut self,
        room_id: impl Into<String>,
        username: impl Into<String>,
    ) -> Result<(), ProtocolError> {
        self.connect().await?;
        self.send(&ClientEvent::Join {
            room_id: room_id.into(),
            username: username.into(),
        })
        .await
    }

    /// Send one outbound event.
    pub async fn send(&self, event: &ClientEvent) -> Result<(), ProtocolError> {
        if *self.state.read().await != ConnectionState::Connected {
            return Err(ProtocolError::ConnectionClosed);
        }
        let frame = event.encode()?;
        match &self.outgoing_tx {
            Some(tx) => tx
                .send(frame)
                .await
                .map_err(|_| ProtocolError::ConnectionClosed),
            None => Err(ProtocolError::ConnectionClosed),
        }
    }

    /// Notify the server we are leaving a room.
    ///
    /// The channel stays open so a follow-up join reuses it.
    pub async fn leave(&self, room_id: impl Into<String>) -> Result<(), ProtocolError> {
        self.send(&ClientEvent::Leave {
            room_id: room_id.into(),
        })
        .await
    }

    /// Drop the channel. The writer task ends when its queue closes and
    /// the socket is released with it.
    pub async fn close(&mut self) {
        self.outgoing_tx = None;
        *self.state.write().await = ConnectionState::Disconnected;
    }
}
