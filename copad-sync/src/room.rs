//! Room synchronization controller.
//!
//! Orchestrates the session store, echo guard, and presence overlay for
//! one room session. The controller is a synchronous state machine: the
//! transport feeds inbound [`ServerEvent`]s into [`RoomController::handle_event`],
//! and local input comes back out as [`ClientEvent`]s for the transport
//! to send. All async stays in the transport layer.
//!
//! ```text
//! server events ──► handle_event ──► {SessionStore, PresenceOverlay} ──► surface
//! local input   ──► local_edit / local_cursor ──► Option<ClientEvent> ──► server
//! ```
//!
//! State machine per room session:
//!
//! ```text
//! Disconnected ──join_request──► Joining ──joined ack──► Joined
//!       ▲                          │ error                  │ leave / rebind
//!       └──────────────────────────┴────────────────────────┘
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use crate::echo::EchoGuard;
use crate::presence::PresenceOverlay;
use crate::protocol::{ClientEvent, CursorPos, Participant, ServerEvent};
use crate::session::SessionStore;
use crate::surface::EditorSurface;

/// Lifecycle of one room session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    Disconnected,
    Joining,
    Joined,
}

/// One-line transient message for the presentation layer.
///
/// The controller queues these; the host drains them with
/// [`RoomController::drain_notices`] and renders them however it likes
/// (toast, status line, log). They are presentation side effects, not
/// session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    MemberJoined { username: String },
    MemberLeft { username: String },
    Error { message: String },
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::MemberJoined { username } => write!(f, "{username} joined the room"),
            Notice::MemberLeft { username } => write!(f, "{username} left the room"),
            Notice::Error { message } => write!(f, "{message}"),
        }
    }
}

/// Synchronization controller for one room session.
pub struct RoomController {
    room_id: String,
    username: String,
    state: RoomState,
    session: SessionStore,
    presence: PresenceOverlay,
    guard: Arc<EchoGuard>,
    /// Mirror of the last known document text.
    content: String,
    notices: VecDeque<Notice>,
}

impl RoomController {
    pub fn new(room_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            username: username.into(),
            state: RoomState::Disconnected,
            session: SessionStore::new(),
            presence: PresenceOverlay::new(),
            guard: Arc::new(EchoGuard::new()),
            content: String::new(),
            notices: VecDeque::new(),
        }
    }

    pub fn state(&self) -> RoomState {
        self.state
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Last known document text.
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn presence(&self) -> &PresenceOverlay {
        &self.presence
    }

    /// Shared handle to the echo guard.
    ///
    /// Surface implementations whose change callbacks fire synchronously
    /// during `set_text` consult this to suppress re-broadcast.
    pub fn echo_guard(&self) -> Arc<EchoGuard> {
        self.guard.clone()
    }

    /// Take all queued presentation notices.
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    /// Build the join request and enter `Joining`.
    pub fn join_request(&mut self) -> ClientEvent {
        self.state = RoomState::Joining;
        ClientEvent::Join {
            room_id: self.room_id.clone(),
            username: self.username.clone(),
        }
    }

    /// Dispatch one inbound server event.
    ///
    /// Events arriving after teardown (state `Disconnected`) are stale
    /// and dropped; everything else is handled idempotently.
    pub fn handle_event(&mut self, event: ServerEvent, surface: &mut dyn EditorSurface) {
        if self.state == RoomState::Disconnected {
            log::debug!("dropping event after teardown: {event:?}");
            return;
        }

        match event {
            ServerEvent::Joined(ack) => {
                // A fresh session may reuse this controller; markers from
                // a previous room must not survive into the new one.
                self.presence.clear_all(surface);

                let local = Participant {
                    session_id: ack.session_id,
                    username: ack.username.clone(),
                    color: ack.color.clone(),
                };
                self.username = ack.username;
                self.session.on_joined(local, ack.roster);
                self.guard
                    .with_remote_application(|| surface.set_text(&ack.text));
                self.content = ack.text;
                self.state = RoomState::Joined;
                log::info!("joined room {} as {}", self.room_id, self.username);
            }

            ServerEvent::MemberJoined(member) => {
                let username = member.username.clone();
                if self.session.on_member_joined(member) {
                    self.notices.push_back(Notice::MemberJoined { username });
                }
            }

            ServerEvent::MemberLeft { session_id, .. } => {
                self.presence.remove_cursor(surface, session_id);
                if let Some(departed) = self.session.on_member_left(session_id) {
                    self.notices.push_back(Notice::MemberLeft {
                        username: departed.username,
                    });
                }
            }

            ServerEvent::ContentUpdate { text } => {
                self.guard
                    .with_remote_application(|| surface.set_text(&text));
                self.content = text;
            }

            ServerEvent::CursorUpdate(cursor) => {
                // A server echoing our own cursor back must not grow a
                // marker for ourselves.
                if self.session.is_local(cursor.session_id) {
                    return;
                }
                self.presence.update_cursor(
                    surface,
                    cursor.session_id,
                    &cursor.username,
                    &cursor.color,
                    cursor.position,
                );
            }

            ServerEvent::Error { message } => {
                log::warn!("server error in room {}: {message}", self.room_id);
                self.notices.push_back(Notice::Error { message });
                if self.state == RoomState::Joining {
                    self.state = RoomState::Disconnected;
                }
            }
        }
    }

    /// Record a local edit, emitting the outbound change unless the edit
    /// is the surface reporting back a remote application.
    pub fn local_edit(&mut self, text: &str) -> Option<ClientEvent> {
        self.content = text.to_owned();

        if self.guard.is_applying_remote() {
            return None;
        }
        if self.state != RoomState::Joined {
            return None;
        }
        let origin = self.session.local_participant()?.session_id;
        Some(ClientEvent::ContentChange {
            room_id: self.room_id.clone(),
            text: text.to_owned(),
            origin_session_id: origin,
        })
    }

    /// Announce the local cursor position.
    ///
    /// Fires on every cursor or selection signal, including the initial
    /// announcement right after the surface binds, which may land before
    /// the join is acknowledged.
    pub fn local_cursor(&self, position: CursorPos) -> Option<ClientEvent> {
        if self.state == RoomState::Disconnected {
            return None;
        }
        Some(ClientEvent::CursorMove {
            room_id: self.room_id.clone(),
            position,
        })
    }

    /// Tear the session down and build the leave notification.
    ///
    /// Releases every presence marker and resets membership and content
    /// state. Safe to call from any state, so error-path unwinds can
    /// always run it.
    pub fn leave(&mut self, surface: &mut dyn EditorSurface) -> ClientEvent {
        self.presence.clear_all(surface);
        self.session.clear();
        self.content.clear();
        self.state = RoomState::Disconnected;
        log::info!("left room {}", self.room_id);
        ClientEvent::Leave {
            room_id: self.room_id.clone(),
        }
    }

    /// Switch to a different room or display name.
    ///
    /// Tears the current session down before entering `Joining` for the
    /// new parameters, so two subscription sets never coexist. Returns
    /// the events to send, in order.
    pub fn rebind(
        &mut self,
        room_id: impl Into<String>,
        username: impl Into<String>,
        surface: &mut dyn EditorSurface,
    ) -> Vec<ClientEvent> {
        let mut events = Vec::new();
        if self.state != RoomState::Disconnected {
            events.push(self.leave(surface));
        }
        self.room_id = room_id.into();
        self.username = username.into();
        events.push(self.join_request());
        events
    }
}
