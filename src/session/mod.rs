//! Rooms, host/client sessions and the registry of live rooms

pub mod client;
pub mod host;
pub mod registry;
pub mod room;

pub use client::{ClientPhase, ClientSession, RenderFrame, RenderSink};
pub use host::{HostConfig, HostSession, LocalPlayer, Outbound, Recipient};
pub use registry::{PeerLink, RoomHandle, RoomRegistry, RoomSummary};
pub use room::{Room, RoomPhase, RosterEntry};

/// Session-level failures surfaced to callers
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    #[error("Room is full")]
    RoomFull,

    #[error("Room is closed")]
    RoomClosed,

    #[error("Game already running")]
    GameAlreadyRunning,

    #[error("Only the room leader may start the game")]
    NotLeader,

    #[error("No players have joined the room")]
    NoPlayers,
}

impl SessionError {
    /// Stable machine-readable code for wire errors
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::RoomNotFound(_) => "room_not_found",
            SessionError::RoomFull => "room_full",
            SessionError::RoomClosed => "room_closed",
            SessionError::GameAlreadyRunning => "game_already_running",
            SessionError::NotLeader => "not_leader",
            SessionError::NoPlayers => "no_players",
        }
    }
}
