//! Host side of a room: routes peer messages, owns the simulation and
//! decides what goes out to whom

use std::collections::HashMap;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::client::{RenderFrame, RenderSink};
use super::room::{JoinOutcome, Room, RoomPhase};
use super::SessionError;
use crate::config::Config;
use crate::game::input::{InputSource, LocalControls};
use crate::game::simulation::{GameEvent, SimConfig, Simulation};
use crate::game::snapshot::{Camera, SnapshotBuilder, SnapshotStats};
use crate::game::PeerId;
use crate::util::time::{
    unix_millis, RateTimer, DEFAULT_BROADCAST_HZ, DEFAULT_MAX_FRAME_SECS, PING_INTERVAL_SECS,
};
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Who an outbound message is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    Peer(PeerId),
    All,
    AllExcept(PeerId),
}

impl Recipient {
    pub fn includes(&self, peer: PeerId) -> bool {
        match self {
            Recipient::Peer(id) => *id == peer,
            Recipient::All => true,
            Recipient::AllExcept(id) => *id != peer,
        }
    }
}

/// A message the host wants delivered
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub to: Recipient,
    pub msg: ServerMsg,
}

impl Outbound {
    fn peer(peer: PeerId, msg: ServerMsg) -> Self {
        Self {
            to: Recipient::Peer(peer),
            msg,
        }
    }

    fn all(msg: ServerMsg) -> Self {
        Self {
            to: Recipient::All,
            msg,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HostConfig {
    pub max_peers: usize,
    pub broadcast_hz: u32,
    pub max_enemies: usize,
    pub max_frame_secs: f32,
    /// Fixed world seed; rolled per game when unset
    pub seed: Option<u64>,
}

impl HostConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_peers: config.max_room_peers,
            broadcast_hz: config.broadcast_hz,
            max_enemies: config.max_enemies,
            max_frame_secs: config.max_frame_secs(),
            seed: config.world_seed,
        }
    }

    fn sim_config(&self, seed: u64) -> SimConfig {
        SimConfig {
            seed,
            max_enemies: self.max_enemies,
            max_frame_secs: self.max_frame_secs,
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            max_peers: 8,
            broadcast_hz: DEFAULT_BROADCAST_HZ,
            max_enemies: 30,
            max_frame_secs: DEFAULT_MAX_FRAME_SECS,
            seed: None,
        }
    }
}

/// The host's own player, driven by a local input device
pub struct LocalPlayer {
    pub name: String,
    input: Box<dyn InputSource>,
    controls: LocalControls,
}

impl LocalPlayer {
    pub fn new(name: impl Into<String>, input: Box<dyn InputSource>) -> Self {
        Self {
            name: name.into(),
            input,
            controls: LocalControls::default(),
        }
    }
}

/// Authoritative side of one room
pub struct HostSession {
    host_id: PeerId,
    room: Room,
    config: HostConfig,
    local: Option<LocalPlayer>,
    sim: Option<Simulation>,
    snapshots: SnapshotBuilder,
    ping_timer: RateTimer,
    latencies: HashMap<PeerId, u64>,
    last_events: Vec<GameEvent>,
}

impl HostSession {
    /// A host with `local` plays alongside its peers; without one it only
    /// simulates
    pub fn new(code: String, config: HostConfig, local: Option<LocalPlayer>) -> Self {
        let host_id = Uuid::new_v4();
        let room = Room::new(
            code,
            host_id,
            local.as_ref().map(|l| l.name.clone()),
            config.max_peers,
        );
        Self {
            host_id,
            room,
            snapshots: SnapshotBuilder::new(config.broadcast_hz),
            ping_timer: RateTimer::from_period(PING_INTERVAL_SECS),
            config,
            local,
            sim: None,
            latencies: HashMap::new(),
            last_events: Vec::new(),
        }
    }

    /// Admit a connection and greet it
    pub fn connect(&mut self, peer: PeerId) -> Result<Vec<Outbound>, SessionError> {
        self.room.connect(peer)?;
        info!(room = %self.room.code(), peer_id = %peer, "Peer connected");
        let running = matches!(
            self.room.phase(),
            RoomPhase::Starting | RoomPhase::InProgress
        );
        Ok(vec![Outbound::peer(
            peer,
            ServerMsg::Welcome {
                peer_id: peer,
                room: self.room.code().to_string(),
                host_id: self.host_id,
                server_time: unix_millis(),
                seed: self.sim.as_ref().filter(|_| running).map(|s| s.seed()),
            },
        )])
    }

    /// Route one inbound message. Messages from unknown peers are ignored.
    pub fn handle(&mut self, peer: PeerId, msg: ClientMsg) -> Vec<Outbound> {
        if !self.room.is_connected(peer) {
            debug!(peer_id = %peer, "Message from unknown peer");
            return Vec::new();
        }

        match msg {
            ClientMsg::JoinInfo { name, color } => match self.room.join(peer, name, color) {
                Some(JoinOutcome::Joined { color }) => {
                    let players = self.room.roster();
                    info!(room = %self.room.code(), peer_id = %peer, color = %color, "Peer joined lobby");
                    vec![
                        Outbound::peer(
                            peer,
                            ServerMsg::LobbyInfo {
                                players: players.clone(),
                                color,
                            },
                        ),
                        Outbound {
                            to: Recipient::AllExcept(peer),
                            msg: ServerMsg::LobbyUpdate { players },
                        },
                    ]
                }
                Some(JoinOutcome::Updated) => vec![self.lobby_update()],
                None => Vec::new(),
            },

            ClientMsg::Inputs(input) => {
                if let Some(sim) = self.sim.as_mut() {
                    sim.stage_input(peer, input.sanitized());
                }
                Vec::new()
            }

            ClientMsg::StartRequest => {
                let result = if self.room.leader() == Some(peer) {
                    self.start()
                } else {
                    Err(SessionError::NotLeader)
                };
                result.unwrap_or_else(|e| {
                    warn!(room = %self.room.code(), peer_id = %peer, error = %e, "Start rejected");
                    vec![Outbound::peer(peer, ServerMsg::error(e.code(), e.to_string()))]
                })
            }

            ClientMsg::Ping { t } => vec![Outbound::peer(peer, ServerMsg::Pong { t })],

            ClientMsg::Pong { t } => {
                let rtt = unix_millis().saturating_sub(t);
                debug!(peer_id = %peer, rtt_ms = rtt, "Latency sample");
                self.latencies.insert(peer, rtt);
                Vec::new()
            }
        }
    }

    /// Drop a peer and its entity; repeated calls produce nothing
    pub fn disconnect(&mut self, peer: PeerId) -> Vec<Outbound> {
        if !self.room.leave(peer) {
            return Vec::new();
        }
        if let Some(sim) = self.sim.as_mut() {
            sim.remove_player(peer);
        }
        self.latencies.remove(&peer);
        info!(room = %self.room.code(), peer_id = %peer, "Peer left");
        vec![
            Outbound::all(ServerMsg::PlayerLeft { peer_id: peer }),
            self.lobby_update(),
        ]
    }

    /// Begin a new game with the current roster
    pub fn start(&mut self) -> Result<Vec<Outbound>, SessionError> {
        self.room.begin_start()?;
        let player_colors = self.room.assign_start_colors();
        let seed = self.config.seed.unwrap_or_else(rand::random);

        let roster: Vec<(PeerId, String, String)> = self
            .room
            .roster()
            .into_iter()
            .map(|e| (e.id, e.name, e.color))
            .collect();
        let mut sim = Simulation::new(self.config.sim_config(seed));
        sim.spawn_players(&roster);
        self.sim = Some(sim);

        if let Some(local) = self.local.as_mut() {
            local.controls = LocalControls::default();
        }
        self.snapshots.force_next();
        self.last_events.clear();

        info!(
            room = %self.room.code(),
            players = roster.len(),
            seed,
            "Game started"
        );
        Ok(vec![Outbound::all(ServerMsg::Start {
            player_colors,
            seed,
        })])
    }

    /// One host frame: pings, local input, simulation, broadcast
    pub fn tick(&mut self, dt: f32) -> Vec<Outbound> {
        let mut out = Vec::new();
        let has_peers = self.room.peer_count() > 0;

        if self.ping_timer.advance(dt) && has_peers {
            out.push(Outbound::all(ServerMsg::Ping { t: unix_millis() }));
        }

        if self.room.phase() == RoomPhase::Starting {
            self.room.mark_in_progress();
        }
        if self.room.phase() != RoomPhase::InProgress {
            return out;
        }
        let Some(sim) = self.sim.as_mut() else {
            return out;
        };

        if let Some(local) = self.local.as_mut() {
            let frame = local.input.sample();
            let staged = local.controls.stage(&frame);
            sim.stage_input(self.host_id, staged);
        }

        let events = sim.tick(dt);
        for event in &events {
            if let GameEvent::PlayerDied { player_id } = event {
                info!(room = %self.room.code(), player_id = %player_id, "Player died");
            }
        }

        // A dedicated host has no entity of its own, so a game every player
        // left is over as well
        let abandoned = sim.players().is_empty();
        if sim.is_game_over() || abandoned {
            out.push(Outbound::all(ServerMsg::State(self.snapshots.build(sim))));
            out.push(Outbound::all(ServerMsg::GameOver));
            info!(
                room = %self.room.code(),
                score = sim.score(),
                kills = sim.kill_count(),
                abandoned,
                "Game over"
            );
            self.room.mark_ended();
        } else if self.snapshots.should_send(dt) && has_peers {
            out.push(Outbound::all(ServerMsg::State(self.snapshots.build(sim))));
        }

        self.last_events = events;
        out
    }

    /// Account for a serialized snapshot
    pub fn record_snapshot_size(&mut self, bytes: usize) {
        let players = self.sim.as_ref().map_or(0, |s| s.players().len());
        self.snapshots.record(players, bytes);
    }

    /// Hand the host's own view to a render sink
    pub fn render(&self, sink: &mut dyn RenderSink) {
        let Some(sim) = self.sim.as_ref() else {
            return;
        };
        let snapshot = self.snapshots.build(sim);
        let camera = sim
            .player(self.host_id)
            .map(|p| Camera { x: p.x, y: p.y })
            .unwrap_or_default();
        sink.render(&RenderFrame {
            my_id: self.host_id,
            world: sim.world(),
            camera,
            players: &snapshot.players,
            enemies: &snapshot.enemies,
            pickups: &snapshot.pickups,
            enemy_bullets: &snapshot.enemy_bullets,
            score: snapshot.score,
            kill_count: snapshot.kill_count,
            build_mode: self.local.as_ref().is_some_and(|l| l.controls.build_mode()),
            events: &self.last_events,
            ping_ms: None,
        });
    }

    fn lobby_update(&self) -> Outbound {
        Outbound::all(ServerMsg::LobbyUpdate {
            players: self.room.roster(),
        })
    }

    pub fn host_id(&self) -> PeerId {
        self.host_id
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    pub fn simulation(&self) -> Option<&Simulation> {
        self.sim.as_ref()
    }

    pub fn simulation_mut(&mut self) -> Option<&mut Simulation> {
        self.sim.as_mut()
    }

    pub fn latency(&self, peer: PeerId) -> Option<u64> {
        self.latencies.get(&peer).copied()
    }

    pub fn snapshot_stats(&self) -> &SnapshotStats {
        self.snapshots.stats()
    }

    pub fn last_events(&self) -> &[GameEvent] {
        &self.last_events
    }
}
