//! Authoritative host for a multiplayer top-down survival game
//!
//! - `game`: terrain, simulation, snapshots and the client mirror
//! - `session`: rooms, host and client sessions, the room registry
//! - `ws`/`http`: WebSocket peers and JSON endpoints over axum

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod session;
pub mod util;
pub mod ws;
