//! WebSocket protocol message definitions
//! These are the wire types between a room host and its peers

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::game::snapshot::Snapshot;
use crate::game::{PeerId, StagedInput};
use crate::session::room::RosterEntry;

/// How a message must be carried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Ordered and never dropped
    Reliable,
    /// Only the newest value matters; older ones may be overwritten or dropped
    Latest,
}

/// Messages sent from a peer to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Display name, plus the assigned color when re-confirming
    JoinInfo {
        name: String,
        #[serde(default)]
        color: Option<String>,
    },

    /// Latest intent of the sender's player
    Inputs(StagedInput),

    /// Room leader asks the host to start a game
    StartRequest,

    Ping {
        t: u64,
    },

    Pong {
        t: u64,
    },
}

impl ClientMsg {
    pub fn delivery(&self) -> Delivery {
        match self {
            ClientMsg::Inputs(_) => Delivery::Latest,
            _ => Delivery::Reliable,
        }
    }
}

/// Messages sent from the host to peers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// First message on every connection
    Welcome {
        peer_id: PeerId,
        room: String,
        host_id: PeerId,
        server_time: u64,
        /// Seed of the game in progress, for peers joining mid-game
        #[serde(default)]
        seed: Option<u64>,
    },

    /// Reply to a first `join_info`
    LobbyInfo {
        players: Vec<RosterEntry>,
        /// Color assigned to the recipient
        color: String,
    },

    /// Roster changed
    LobbyUpdate {
        players: Vec<RosterEntry>,
    },

    PlayerLeft {
        peer_id: PeerId,
    },

    /// A game begins with this authoritative color assignment
    Start {
        player_colors: BTreeMap<PeerId, String>,
        seed: u64,
    },

    /// Full game snapshot
    State(Snapshot),

    Ping {
        t: u64,
    },

    Pong {
        t: u64,
    },

    /// Every player is dead
    #[serde(rename = "gameover")]
    GameOver,

    /// Error message
    Error {
        code: String,
        message: String,
    },
}

impl ServerMsg {
    pub fn delivery(&self) -> Delivery {
        match self {
            ServerMsg::State(_) => Delivery::Latest,
            _ => Delivery::Reliable,
        }
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        ServerMsg::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn tags_match_wire_names() {
        let msg = serde_json::to_value(ServerMsg::GameOver).expect("serialize");
        assert_eq!(msg["type"], "gameover");

        let msg = serde_json::to_value(ClientMsg::StartRequest).expect("serialize");
        assert_eq!(msg["type"], "start_request");

        let join: ClientMsg =
            serde_json::from_str(r#"{"type":"join_info","name":"ada"}"#).expect("parse");
        assert_eq!(
            join,
            ClientMsg::JoinInfo {
                name: "ada".into(),
                color: None
            }
        );
    }

    #[test]
    fn state_flattens_snapshot_fields() {
        let msg = ServerMsg::State(Snapshot {
            tick: 9,
            score: 40,
            ..Default::default()
        });
        let value = serde_json::to_value(&msg).expect("serialize");
        assert_eq!(value["type"], "state");
        assert_eq!(value["tick"], 9);
        assert_eq!(msg.delivery(), Delivery::Latest);
    }

    #[test]
    fn inputs_parse_from_flat_object() {
        let raw = r#"{"type":"inputs","move_x":1.0,"move_y":0.0,"angle":0.5,"shoot":true,
            "melee":false,"reload":false,"build_mode":false,"place_wall":false,
            "remove_wall":false,"target":{"x":3,"y":-2},"switch_weapon":"shotgun"}"#;
        match serde_json::from_str::<ClientMsg>(raw).expect("parse") {
            ClientMsg::Inputs(input) => {
                assert!(input.shoot);
                assert_eq!(input.target.y, -2);
                assert_eq!(
                    input.switch_weapon,
                    Some(crate::game::combat::WeaponKind::Shotgun)
                );
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn start_color_map_keys_are_peer_ids() {
        let id = Uuid::new_v4();
        let msg = ServerMsg::Start {
            player_colors: BTreeMap::from([(id, "#4adeff".to_string())]),
            seed: 7,
        };
        let json = serde_json::to_string(&msg).expect("serialize");
        let back: ServerMsg = serde_json::from_str(&json).expect("parse");
        assert_eq!(back, msg);
    }

    #[test]
    fn unknown_tags_are_rejected() {
        assert!(serde_json::from_str::<ClientMsg>(r#"{"type":"teleport"}"#).is_err());
    }
}
