//! Game simulation modules

pub mod combat;
pub mod enemy;
pub mod input;
pub mod physics;
pub mod pickup;
pub mod player;
pub mod simulation;
pub mod snapshot;
pub mod world;

pub use input::{InputFrame, InputSource, LocalControls, StagedInput};
pub use player::PlayerState;
pub use simulation::{GameEvent, SimConfig, Simulation};
pub use snapshot::{ClientMirror, Snapshot, SnapshotBuilder};
pub use world::{TileCoord, TileKind, World};

use uuid::Uuid;

/// Identity of a connected participant (host or client)
pub type PeerId = Uuid;
