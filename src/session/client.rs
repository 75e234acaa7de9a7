//! Client side of a room: lobby bookkeeping, the mirrored game and the
//! per-frame input/ping cadence

use tracing::{debug, info, warn};

use super::room::RosterEntry;
use crate::game::input::{InputSource, LocalControls};
use crate::game::simulation::GameEvent;
use crate::game::snapshot::{
    BulletSnapshot, Camera, ClientMirror, EnemySnapshot, PickupSnapshot, PlayerSnapshot,
};
use crate::game::world::World;
use crate::game::PeerId;
use crate::util::time::{RateTimer, PING_INTERVAL_SECS};
use crate::ws::protocol::{ClientMsg, ServerMsg};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientPhase {
    /// Waiting for the host's welcome
    Connecting,
    Lobby,
    InGame,
    /// The game ended or the host went away
    GameOver,
}

/// Everything needed to draw one frame
pub struct RenderFrame<'a> {
    pub my_id: PeerId,
    pub world: &'a World,
    pub camera: Camera,
    pub players: &'a [PlayerSnapshot],
    pub enemies: &'a [EnemySnapshot],
    pub pickups: &'a [PickupSnapshot],
    pub enemy_bullets: &'a [BulletSnapshot],
    pub score: u32,
    pub kill_count: u32,
    pub build_mode: bool,
    /// Events of the last simulated tick; empty on clients
    pub events: &'a [GameEvent],
    pub ping_ms: Option<u64>,
}

/// Capability that draws frames
pub trait RenderSink {
    fn render(&mut self, frame: &RenderFrame<'_>);
}

pub struct ClientSession {
    name: String,
    my_id: Option<PeerId>,
    room_code: Option<String>,
    color: Option<String>,
    roster: Vec<RosterEntry>,
    phase: ClientPhase,
    mirror: Option<ClientMirror>,
    controls: LocalControls,
    ping_timer: RateTimer,
    ping_ms: Option<u64>,
}

impl ClientSession {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            my_id: None,
            room_code: None,
            color: None,
            roster: Vec::new(),
            phase: ClientPhase::Connecting,
            mirror: None,
            controls: LocalControls::default(),
            ping_timer: RateTimer::from_period(PING_INTERVAL_SECS),
            ping_ms: None,
        }
    }

    /// Apply a host message; returns the replies to send back
    pub fn handle(&mut self, msg: ServerMsg, now_ms: u64) -> Vec<ClientMsg> {
        match msg {
            ServerMsg::Welcome {
                peer_id, room, seed, ..
            } => {
                info!(room = %room, peer_id = %peer_id, "Connected to host");
                self.my_id = Some(peer_id);
                self.room_code = Some(room);
                self.phase = ClientPhase::Lobby;
                // Mid-game arrivals watch until the next start
                self.mirror = seed.map(|seed| ClientMirror::new(peer_id, seed));
                vec![ClientMsg::JoinInfo {
                    name: self.name.clone(),
                    color: None,
                }]
            }

            ServerMsg::LobbyInfo { players, color } => {
                self.roster = players;
                self.color = Some(color.clone());
                vec![ClientMsg::JoinInfo {
                    name: self.name.clone(),
                    color: Some(color),
                }]
            }

            ServerMsg::LobbyUpdate { players } => {
                self.roster = players;
                let own = self
                    .my_id
                    .and_then(|id| self.roster.iter().find(|e| e.id == id));
                if let Some(entry) = own {
                    self.color = Some(entry.color.clone());
                }
                Vec::new()
            }

            ServerMsg::PlayerLeft { peer_id } => {
                self.roster.retain(|e| e.id != peer_id);
                if let Some(mirror) = self.mirror.as_mut() {
                    mirror.players.retain(|p| p.id != peer_id);
                }
                Vec::new()
            }

            ServerMsg::Start { player_colors, seed } => {
                let Some(my_id) = self.my_id else {
                    warn!("Start before welcome");
                    return Vec::new();
                };
                let mut mirror = ClientMirror::new(my_id, seed);
                if let Some(color) = player_colors.get(&my_id) {
                    self.color = Some(color.clone());
                    mirror.insert_local_player(self.name.clone(), color.clone());
                }
                self.mirror = Some(mirror);
                self.controls = LocalControls::default();
                self.phase = ClientPhase::InGame;
                info!(seed, players = player_colors.len(), "Game started");
                Vec::new()
            }

            ServerMsg::State(snapshot) => {
                if let Some(mirror) = self.mirror.as_mut() {
                    if !mirror.merge(snapshot) {
                        debug!("Stale snapshot ignored");
                    }
                }
                Vec::new()
            }

            ServerMsg::Ping { t } => vec![ClientMsg::Pong { t }],

            ServerMsg::Pong { t } => {
                self.ping_ms = Some(now_ms.saturating_sub(t));
                Vec::new()
            }

            ServerMsg::GameOver => {
                info!("Game over");
                self.phase = ClientPhase::GameOver;
                Vec::new()
            }

            ServerMsg::Error { code, message } => {
                warn!(code = %code, message = %message, "Host reported an error");
                Vec::new()
            }
        }
    }

    /// The host went away; treated as game over
    pub fn on_disconnected(&mut self) {
        if self.phase != ClientPhase::GameOver {
            warn!("Host connection lost");
            self.phase = ClientPhase::GameOver;
        }
    }

    /// One local frame: sample input, move the own player ahead of the host
    /// and return what should be sent
    pub fn frame(&mut self, dt: f32, input: &mut dyn InputSource, now_ms: u64) -> Vec<ClientMsg> {
        let mut out = Vec::new();
        if matches!(self.phase, ClientPhase::Connecting | ClientPhase::GameOver) {
            return out;
        }

        if self.ping_timer.advance(dt) {
            out.push(ClientMsg::Ping { t: now_ms });
        }

        if self.phase == ClientPhase::InGame {
            if let Some(mirror) = self.mirror.as_mut() {
                let staged = self.controls.stage(&input.sample());
                mirror.predict_local(&staged, dt);
                mirror.follow_camera(dt);
                out.push(ClientMsg::Inputs(staged));
            }
        }
        out
    }

    pub fn render(&self, sink: &mut dyn RenderSink) {
        let Some(mirror) = self.mirror.as_ref() else {
            return;
        };
        sink.render(&RenderFrame {
            my_id: mirror.my_id(),
            world: mirror.world(),
            camera: mirror.camera,
            players: &mirror.players,
            enemies: &mirror.enemies,
            pickups: &mirror.pickups,
            enemy_bullets: &mirror.enemy_bullets,
            score: mirror.score,
            kill_count: mirror.kill_count,
            build_mode: self.controls.build_mode(),
            events: &[],
            ping_ms: self.ping_ms,
        });
    }

    pub fn phase(&self) -> ClientPhase {
        self.phase
    }

    pub fn my_id(&self) -> Option<PeerId> {
        self.my_id
    }

    pub fn room_code(&self) -> Option<&str> {
        self.room_code.as_deref()
    }

    pub fn color(&self) -> Option<&str> {
        self.color.as_deref()
    }

    pub fn roster(&self) -> &[RosterEntry] {
        &self.roster
    }

    pub fn mirror(&self) -> Option<&ClientMirror> {
        self.mirror.as_ref()
    }

    pub fn ping_ms(&self) -> Option<u64> {
        self.ping_ms
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::game::input::{IdleInput, InputFrame};
    use crate::game::snapshot::Snapshot;
    use uuid::Uuid;

    fn welcomed(name: &str) -> (ClientSession, PeerId) {
        let mut client = ClientSession::new(name);
        let id = Uuid::new_v4();
        let replies = client.handle(
            ServerMsg::Welcome {
                peer_id: id,
                room: "ROOM42".into(),
                host_id: Uuid::new_v4(),
                server_time: 0,
                seed: None,
            },
            0,
        );
        assert_eq!(
            replies,
            vec![ClientMsg::JoinInfo {
                name: name.into(),
                color: None
            }]
        );
        (client, id)
    }

    fn started(name: &str) -> (ClientSession, PeerId) {
        let (mut client, id) = welcomed(name);
        client.handle(
            ServerMsg::Start {
                player_colors: BTreeMap::from([(id, "#44ff88".to_string())]),
                seed: 5,
            },
            0,
        );
        (client, id)
    }

    struct Scripted(InputFrame);

    impl InputSource for Scripted {
        fn sample(&mut self) -> InputFrame {
            self.0.clone()
        }
    }

    #[test]
    fn lobby_info_is_reconfirmed_with_color() {
        let (mut client, id) = welcomed("ada");
        assert_eq!(client.phase(), ClientPhase::Lobby);
        assert_eq!(client.room_code(), Some("ROOM42"));

        let entry = RosterEntry {
            id,
            name: "ada".into(),
            color: "#ff6644".into(),
        };
        let replies = client.handle(
            ServerMsg::LobbyInfo {
                players: vec![entry],
                color: "#ff6644".into(),
            },
            0,
        );
        assert_eq!(
            replies,
            vec![ClientMsg::JoinInfo {
                name: "ada".into(),
                color: Some("#ff6644".into())
            }]
        );
        assert_eq!(client.color(), Some("#ff6644"));
        assert_eq!(client.roster().len(), 1);
    }

    #[test]
    fn start_takes_color_from_the_map() {
        let (client, id) = started("ada");
        assert_eq!(client.phase(), ClientPhase::InGame);
        assert_eq!(client.color(), Some("#44ff88"));
        let own = client
            .mirror()
            .and_then(|m| m.own_player())
            .expect("local player inserted");
        assert_eq!(own.id, id);
        assert_eq!(own.color, "#44ff88");
    }

    #[test]
    fn late_joiner_spectates_without_own_player() {
        let (mut client, _) = welcomed("late");
        client.handle(
            ServerMsg::Start {
                player_colors: BTreeMap::from([(Uuid::new_v4(), "#4adeff".to_string())]),
                seed: 5,
            },
            0,
        );
        assert!(client.mirror().is_some_and(|m| m.own_player().is_none()));
    }

    #[test]
    fn frames_send_inputs_and_move_locally() {
        let (mut client, _) = started("ada");
        let start_x = client.mirror().and_then(|m| m.own_player()).map(|p| p.x);

        let mut input = Scripted(InputFrame {
            move_x: 1.0,
            ..InputFrame::default()
        });
        let out = client.frame(0.05, &mut input, 1_000);
        assert!(matches!(&out[..], [ClientMsg::Inputs(staged)] if staged.move_x == 1.0));

        let x = client.mirror().and_then(|m| m.own_player()).map(|p| p.x);
        assert!(x > start_x);
    }

    #[test]
    fn pings_every_two_seconds_and_measures_pong() {
        let (mut client, _) = welcomed("ada");
        let mut pings = 0;
        for i in 0..90 {
            pings += client
                .frame(0.05, &mut IdleInput, i * 50)
                .iter()
                .filter(|m| matches!(m, ClientMsg::Ping { .. }))
                .count();
        }
        assert_eq!(pings, 2);

        assert_eq!(client.handle(ServerMsg::Ping { t: 9 }, 0), vec![ClientMsg::Pong { t: 9 }]);
        client.handle(ServerMsg::Pong { t: 1_000 }, 1_080);
        assert_eq!(client.ping_ms(), Some(80));
    }

    #[test]
    fn stale_snapshots_do_not_rewind() {
        let (mut client, _) = started("ada");
        client.handle(
            ServerMsg::State(Snapshot {
                tick: 10,
                score: 50,
                ..Default::default()
            }),
            0,
        );
        client.handle(
            ServerMsg::State(Snapshot {
                tick: 4,
                score: 10,
                ..Default::default()
            }),
            0,
        );
        let mirror = client.mirror().expect("game running");
        assert_eq!(mirror.score, 50);
        assert_eq!(mirror.last_tick(), Some(10));
    }

    #[test]
    fn gameover_and_disconnect_end_the_session() {
        let (mut client, _) = started("ada");
        client.handle(ServerMsg::GameOver, 0);
        assert_eq!(client.phase(), ClientPhase::GameOver);
        assert!(client.frame(0.05, &mut IdleInput, 0).is_empty());

        let (mut other, _) = started("bo");
        other.on_disconnected();
        assert_eq!(other.phase(), ClientPhase::GameOver);
    }

    #[test]
    fn player_left_prunes_roster_and_mirror() {
        let (mut client, id) = started("ada");
        let gone = Uuid::new_v4();
        client.handle(
            ServerMsg::LobbyUpdate {
                players: vec![
                    RosterEntry {
                        id,
                        name: "ada".into(),
                        color: "#44ff88".into(),
                    },
                    RosterEntry {
                        id: gone,
                        name: "bo".into(),
                        color: "#ff6644".into(),
                    },
                ],
            },
            0,
        );
        client.handle(ServerMsg::PlayerLeft { peer_id: gone }, 0);
        assert_eq!(client.roster().len(), 1);
        assert_eq!(client.color(), Some("#44ff88"));
    }
}
