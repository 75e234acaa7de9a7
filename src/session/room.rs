//! Room roster, color pool and lifecycle

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::SessionError;
use crate::game::PeerId;

/// Ordered player color pool
pub const PLAYER_COLORS: [&str; 8] = [
    "#4adeff", "#ff6644", "#44ff88", "#ffdd44", "#cc88ff", "#ff88cc", "#88ffdd", "#ff4488",
];

/// Room lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomPhase {
    Lobby,
    Starting,
    InProgress,
    Ended,
}

/// A named, colored participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: PeerId,
    pub name: String,
    pub color: String,
}

/// Result of a `join_info`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// First join; a color was assigned
    Joined { color: String },
    /// Re-confirmation of an existing entry
    Updated,
}

pub struct Room {
    code: String,
    host_id: PeerId,
    /// Host's own player when the host also plays
    host_player: Option<RosterEntry>,
    /// Connected peers in connection order
    connected: Vec<PeerId>,
    /// Peers that sent `join_info`, in join order
    roster: Vec<RosterEntry>,
    leader: Option<PeerId>,
    phase: RoomPhase,
    max_peers: usize,
}

impl Room {
    pub fn new(code: String, host_id: PeerId, host_name: Option<String>, max_peers: usize) -> Self {
        let host_player = host_name.map(|name| RosterEntry {
            id: host_id,
            name,
            color: PLAYER_COLORS[0].to_string(),
        });
        Self {
            code,
            host_id,
            host_player,
            connected: Vec::new(),
            roster: Vec::new(),
            leader: None,
            phase: RoomPhase::Lobby,
            max_peers,
        }
    }

    /// Admit a connection. The first peer to arrive leads the room.
    pub fn connect(&mut self, peer: PeerId) -> Result<(), SessionError> {
        if self.connected.contains(&peer) {
            return Ok(());
        }
        if self.connected.len() >= self.max_peers {
            return Err(SessionError::RoomFull);
        }
        self.connected.push(peer);
        if self.leader.is_none() {
            self.leader = Some(peer);
        }
        Ok(())
    }

    /// Record a peer's display name. Unknown peers are ignored.
    pub fn join(&mut self, peer: PeerId, name: String, color: Option<String>) -> Option<JoinOutcome> {
        if !self.connected.contains(&peer) {
            return None;
        }

        if let Some(idx) = self.roster.iter().position(|e| e.id == peer) {
            if let Some(color) = color {
                if self.color_free_for(&color, peer) {
                    self.roster[idx].color = color;
                }
            }
            self.roster[idx].name = name;
            return Some(JoinOutcome::Updated);
        }

        let color = self.next_free_color();
        self.roster.push(RosterEntry {
            id: peer,
            name,
            color: color.clone(),
        });
        Some(JoinOutcome::Joined { color })
    }

    /// Drop a peer; repeated calls are no-ops
    pub fn leave(&mut self, peer: PeerId) -> bool {
        let before = self.connected.len();
        self.connected.retain(|p| *p != peer);
        self.roster.retain(|e| e.id != peer);
        if self.leader == Some(peer) {
            self.leader = self.connected.first().copied();
        }
        before != self.connected.len()
    }

    fn color_free_for(&self, color: &str, peer: PeerId) -> bool {
        self.entries().all(|e| e.id == peer || e.color != color)
    }

    /// First pool color nobody holds; cycles once the pool is exhausted
    fn next_free_color(&self) -> String {
        PLAYER_COLORS
            .iter()
            .find(|c| self.entries().all(|e| e.color != **c))
            .unwrap_or(&PLAYER_COLORS[self.roster.len() % PLAYER_COLORS.len()])
            .to_string()
    }

    fn entries(&self) -> impl Iterator<Item = &RosterEntry> {
        self.host_player.iter().chain(self.roster.iter())
    }

    /// Host player first, then peers in join order
    pub fn roster(&self) -> Vec<RosterEntry> {
        self.entries().cloned().collect()
    }

    /// Authoritative colors for a new game: pool order by roster position.
    /// Roster entries are updated to match.
    pub fn assign_start_colors(&mut self) -> BTreeMap<PeerId, String> {
        let mut colors = BTreeMap::new();
        let entries = self.host_player.iter_mut().chain(self.roster.iter_mut());
        for (i, entry) in entries.enumerate() {
            entry.color = PLAYER_COLORS[i % PLAYER_COLORS.len()].to_string();
            colors.insert(entry.id, entry.color.clone());
        }
        colors
    }

    /// Lobby or ended → starting; needs at least one player on the roster
    pub fn begin_start(&mut self) -> Result<(), SessionError> {
        match self.phase {
            RoomPhase::Lobby | RoomPhase::Ended if self.entries().next().is_none() => {
                Err(SessionError::NoPlayers)
            }
            RoomPhase::Lobby | RoomPhase::Ended => {
                self.phase = RoomPhase::Starting;
                info!(room = %self.code, "Room starting");
                Ok(())
            }
            RoomPhase::Starting | RoomPhase::InProgress => Err(SessionError::GameAlreadyRunning),
        }
    }

    pub fn mark_in_progress(&mut self) {
        if self.phase == RoomPhase::Starting {
            self.phase = RoomPhase::InProgress;
        } else {
            warn!(room = %self.code, phase = ?self.phase, "Ignoring in-progress transition");
        }
    }

    pub fn mark_ended(&mut self) {
        if matches!(self.phase, RoomPhase::Starting | RoomPhase::InProgress) {
            self.phase = RoomPhase::Ended;
            info!(room = %self.code, "Game ended");
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn host_id(&self) -> PeerId {
        self.host_id
    }

    pub fn host_plays(&self) -> bool {
        self.host_player.is_some()
    }

    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    pub fn leader(&self) -> Option<PeerId> {
        self.leader
    }

    pub fn is_connected(&self, peer: PeerId) -> bool {
        self.connected.contains(&peer)
    }

    pub fn connected(&self) -> &[PeerId] {
        &self.connected
    }

    pub fn peer_count(&self) -> usize {
        self.connected.len()
    }

    pub fn entry(&self, peer: PeerId) -> Option<&RosterEntry> {
        self.entries().find(|e| e.id == peer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn room(max_peers: usize) -> Room {
        Room::new("ABC123".into(), Uuid::new_v4(), None, max_peers)
    }

    #[test]
    fn colors_come_from_pool_in_order() {
        let mut room = room(8);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        room.connect(a).expect("room has space");
        room.connect(b).expect("room has space");

        assert_eq!(
            room.join(a, "ada".into(), None),
            Some(JoinOutcome::Joined {
                color: PLAYER_COLORS[0].into()
            })
        );
        assert_eq!(
            room.join(b, "bo".into(), None),
            Some(JoinOutcome::Joined {
                color: PLAYER_COLORS[1].into()
            })
        );

        // A freed color is handed out again before later ones
        room.leave(a);
        let c = Uuid::new_v4();
        room.connect(c).expect("room has space");
        assert_eq!(
            room.join(c, "cy".into(), None),
            Some(JoinOutcome::Joined {
                color: PLAYER_COLORS[0].into()
            })
        );
    }

    #[test]
    fn host_player_holds_first_color() {
        let host = Uuid::new_v4();
        let mut room = Room::new("HOST01".into(), host, Some("host".into()), 8);
        let peer = Uuid::new_v4();
        room.connect(peer).expect("room has space");
        assert_eq!(
            room.join(peer, "p".into(), None),
            Some(JoinOutcome::Joined {
                color: PLAYER_COLORS[1].into()
            })
        );
        assert_eq!(room.roster()[0].id, host);
    }

    #[test]
    fn reconfirm_updates_entry_without_stealing_colors() {
        let mut room = room(8);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        room.connect(a).expect("room has space");
        room.connect(b).expect("room has space");
        room.join(a, "ada".into(), None);
        room.join(b, "bo".into(), None);

        assert_eq!(
            room.join(b, "bobby".into(), Some(PLAYER_COLORS[0].into())),
            Some(JoinOutcome::Updated)
        );
        let entry = room.entry(b).cloned().expect("b joined");
        assert_eq!(entry.name, "bobby");
        assert_eq!(entry.color, PLAYER_COLORS[1]);

        room.join(b, "bobby".into(), Some(PLAYER_COLORS[5].into()));
        assert_eq!(room.entry(b).map(|e| e.color.as_str()), Some(PLAYER_COLORS[5]));
    }

    #[test]
    fn join_requires_connection_and_full_rooms_reject() {
        let mut room = room(1);
        let stranger = Uuid::new_v4();
        assert_eq!(room.join(stranger, "x".into(), None), None);

        room.connect(Uuid::new_v4()).expect("room has space");
        assert_eq!(room.connect(stranger), Err(SessionError::RoomFull));
    }

    #[test]
    fn leader_passes_to_next_connection() {
        let mut room = room(8);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        room.connect(a).expect("room has space");
        room.connect(b).expect("room has space");
        assert_eq!(room.leader(), Some(a));
        assert!(room.leave(a));
        assert!(!room.leave(a));
        assert_eq!(room.leader(), Some(b));
    }

    #[test]
    fn lifecycle_allows_restart_after_end() {
        let mut room = room(8);
        let a = Uuid::new_v4();
        room.connect(a).expect("room has space");
        room.join(a, "ada".into(), None);
        assert!(room.begin_start().is_ok());
        assert_eq!(room.begin_start(), Err(SessionError::GameAlreadyRunning));
        room.mark_in_progress();
        assert_eq!(room.phase(), RoomPhase::InProgress);
        room.mark_ended();
        assert_eq!(room.phase(), RoomPhase::Ended);
        assert!(room.begin_start().is_ok());
    }

    #[test]
    fn empty_roster_cannot_start() {
        let mut room = room(8);
        let a = Uuid::new_v4();
        room.connect(a).expect("room has space");
        assert_eq!(room.begin_start(), Err(SessionError::NoPlayers));
        assert_eq!(room.phase(), RoomPhase::Lobby);

        room.join(a, "ada".into(), None);
        assert!(room.begin_start().is_ok());
    }

    #[test]
    fn start_colors_follow_roster_order() {
        let host = Uuid::new_v4();
        let mut room = Room::new("HOST01".into(), host, Some("host".into()), 8);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        for peer in [a, b] {
            room.connect(peer).expect("room has space");
        }
        room.join(a, "a".into(), None);
        room.join(b, "b".into(), None);
        room.join(a, "a".into(), Some(PLAYER_COLORS[6].into()));

        let colors = room.assign_start_colors();
        assert_eq!(colors.len(), 3);
        assert_eq!(colors[&host], PLAYER_COLORS[0]);
        assert_eq!(colors[&a], PLAYER_COLORS[1]);
        assert_eq!(colors[&b], PLAYER_COLORS[2]);
        assert_eq!(room.entry(a).map(|e| e.color.clone()), Some(colors[&a].clone()));
    }
}
