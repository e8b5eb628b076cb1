//! # copad-sync — room synchronization engine for collaborative editing
//!
//! Keeps a shared code document and per-participant cursor presence in
//! sync across everyone in a room. The engine is the client side of the
//! protocol: it tracks membership, applies remote edits without echoing
//! them back, and renders remote cursors as markers on an editing
//! surface it only knows through a trait.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   WebSocket    ┌──────────────┐
//! │ CollabClient │ ◄────────────► │  RoomServer  │
//! │ (transport)  │  JSON events   │ (authority)  │
//! └──────┬───────┘                └──────────────┘
//!        │ ServerEvent / ClientEvent
//!        ▼
//! ┌────────────────┐
//! │ RoomController │──► SessionStore   (who is here)
//! │ (state machine)│──► PresenceOverlay (whose cursor is where)
//! └──────┬─────────┘──► EchoGuard      (no re-broadcast loops)
//!        ▼
//! ┌────────────────┐
//! │ EditorSurface  │  text + markers
//! └────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] — named JSON events between client and server
//! - [`session`] — local participant and room roster
//! - [`echo`] — re-entrancy guard against edit echo loops
//! - [`presence`] — remote cursor markers, one per participant
//! - [`surface`] — the editing-surface seam and an in-memory buffer
//! - [`room`] — the synchronization controller state machine
//! - [`client`] — async WebSocket transport
//! - [`server`] — reference room server for tests and self-hosting
//!
//! Conflict resolution is deliberately last-writer-wins on whole
//! documents: the server's broadcast order is the only ordering, and no
//! operational transform or CRDT merge is attempted.

pub mod client;
pub mod echo;
pub mod presence;
pub mod protocol;
pub mod room;
pub mod server;
pub mod session;
pub mod surface;

// Re-exports for convenience
pub use client::{CollabClient, ConnectionState, SyncEvent};
pub use echo::EchoGuard;
pub use presence::PresenceOverlay;
pub use protocol::{
    ClientEvent, CursorPos, JoinAck, Participant, ProtocolError, RemoteCursor, ServerEvent,
};
pub use room::{Notice, RoomController, RoomState};
pub use server::{RoomServer, ServerConfig, ServerStats};
pub use session::SessionStore;
pub use surface::{EditorSurface, Marker, MarkerId, TextBuffer};
