//! Registry of live rooms and the per-room tick task

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::Rng;
use serde::Serialize;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::interval;
use tracing::{debug, error, info};

use super::host::{HostConfig, HostSession, Outbound};
use super::SessionError;
use crate::config::Config;
use crate::game::PeerId;
use crate::util::time::{unix_millis, FrameClock, DEFAULT_TICK_HZ, MAX_TICK_HZ};
use crate::ws::protocol::{ClientMsg, Delivery, ServerMsg};

pub const ROOM_CODE_LEN: usize = 6;
const ROOM_CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
/// Inbound commands buffered per room before inputs start being dropped
const COMMAND_QUEUE: usize = 256;
/// Rooms nobody ever joined are closed after this long
const UNCLAIMED_ROOM_SECS: f32 = 60.0;

/// Outbound half of one peer's connection
pub struct PeerLink {
    /// Control messages, ordered and never dropped while the peer is alive
    pub control: mpsc::UnboundedSender<Arc<str>>,
    /// Newest serialized snapshot; older ones are overwritten
    pub state: watch::Sender<Option<Arc<str>>>,
}

impl PeerLink {
    /// Create a link plus the receiving ends for the connection's writer
    pub fn channel() -> (
        Self,
        mpsc::UnboundedReceiver<Arc<str>>,
        watch::Receiver<Option<Arc<str>>>,
    ) {
        let (control, control_rx) = mpsc::unbounded_channel();
        let (state, state_rx) = watch::channel(None);
        (Self { control, state }, control_rx, state_rx)
    }
}

/// Work queued for a room task
pub enum RoomCommand {
    Connect {
        peer: PeerId,
        link: PeerLink,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Message {
        peer: PeerId,
        msg: ClientMsg,
    },
    Disconnect {
        peer: PeerId,
    },
}

/// Handle to a running room
#[derive(Clone)]
pub struct RoomHandle {
    pub code: String,
    pub created_at: u64,
    commands: mpsc::Sender<RoomCommand>,
    peer_count: Arc<AtomicUsize>,
}

impl RoomHandle {
    pub fn peer_count(&self) -> usize {
        self.peer_count.load(Ordering::Relaxed)
    }

    /// Register a peer with the room and wait for it to be admitted
    pub async fn connect(&self, peer: PeerId, link: PeerLink) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(RoomCommand::Connect { peer, link, reply })
            .await
            .map_err(|_| SessionError::RoomClosed)?;
        rx.await.map_err(|_| SessionError::RoomClosed)?
    }

    /// Queue a message from a peer. Latest-value messages are dropped when the
    /// room is backed up; control messages wait for space.
    pub async fn send(&self, peer: PeerId, msg: ClientMsg) -> Result<(), SessionError> {
        match msg.delivery() {
            Delivery::Latest => match self.commands.try_send(RoomCommand::Message { peer, msg }) {
                Ok(()) => Ok(()),
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!(room = %self.code, peer_id = %peer, "Input dropped");
                    Ok(())
                }
                Err(mpsc::error::TrySendError::Closed(_)) => Err(SessionError::RoomClosed),
            },
            Delivery::Reliable => self
                .commands
                .send(RoomCommand::Message { peer, msg })
                .await
                .map_err(|_| SessionError::RoomClosed),
        }
    }

    pub async fn disconnect(&self, peer: PeerId) {
        let _ = self.commands.send(RoomCommand::Disconnect { peer }).await;
    }

    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            code: self.code.clone(),
            peers: self.peer_count(),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomSummary {
    pub code: String,
    pub peers: usize,
    pub created_at: u64,
}

/// All rooms currently running, keyed by code
pub struct RoomRegistry {
    rooms: DashMap<String, RoomHandle>,
    host_config: HostConfig,
    tick_hz: u32,
}

impl RoomRegistry {
    pub fn new(host_config: HostConfig, tick_hz: u32) -> Self {
        Self {
            rooms: DashMap::new(),
            host_config,
            tick_hz: tick_hz.clamp(1, MAX_TICK_HZ),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(HostConfig::from_config(config), config.tick_hz)
    }

    /// Open a new room under a fresh code and start its task
    pub fn create(self: &Arc<Self>) -> RoomHandle {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
        let peer_count = Arc::new(AtomicUsize::new(0));

        let handle = loop {
            match self.rooms.entry(generate_code()) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => {
                    let handle = RoomHandle {
                        code: slot.key().clone(),
                        created_at: unix_millis(),
                        commands: tx,
                        peer_count: peer_count.clone(),
                    };
                    slot.insert(handle.clone());
                    break handle;
                }
            }
        };

        let task = RoomTask {
            host: HostSession::new(handle.code.clone(), self.host_config.clone(), None),
            commands: rx,
            links: HashMap::new(),
            peer_count,
            tick_hz: self.tick_hz,
            max_frame_secs: self.host_config.max_frame_secs,
        };
        tokio::spawn(task.run(Arc::clone(self)));
        handle
    }

    pub fn get(&self, code: &str) -> Option<RoomHandle> {
        self.rooms
            .get(&code.to_ascii_uppercase())
            .map(|r| r.value().clone())
    }

    pub fn remove(&self, code: &str) -> Option<RoomHandle> {
        self.rooms.remove(code).map(|(_, h)| h)
    }

    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }

    pub fn total_peers(&self) -> usize {
        self.rooms.iter().map(|r| r.value().peer_count()).sum()
    }

    pub fn list(&self) -> Vec<RoomSummary> {
        let mut rooms: Vec<RoomSummary> = self.rooms.iter().map(|r| r.value().summary()).collect();
        rooms.sort_by_key(|r| r.created_at);
        rooms
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(HostConfig::default(), DEFAULT_TICK_HZ)
    }
}

fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..ROOM_CODE_LEN)
        .map(|_| ROOM_CODE_ALPHABET[rng.gen_range(0..ROOM_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Single owner of a room's host session
struct RoomTask {
    host: HostSession,
    commands: mpsc::Receiver<RoomCommand>,
    links: HashMap<PeerId, PeerLink>,
    peer_count: Arc<AtomicUsize>,
    tick_hz: u32,
    max_frame_secs: f32,
}

impl RoomTask {
    async fn run(mut self, registry: Arc<RoomRegistry>) {
        let code = self.host.room().code().to_string();
        info!(room = %code, "Room opened");

        let tick_duration = Duration::from_micros(1_000_000 / self.tick_hz as u64);
        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut clock = FrameClock::new(self.max_frame_secs);
        let mut had_peers = false;
        let mut unclaimed_secs = 0.0;

        loop {
            tick_interval.tick().await;
            let dt = clock.tick();

            let open = self.drain_commands();

            let out = self.host.tick(dt);
            self.dispatch(out);

            if !open {
                break;
            }
            if self.links.is_empty() {
                if had_peers {
                    break;
                }
                unclaimed_secs += dt;
                if unclaimed_secs >= UNCLAIMED_ROOM_SECS {
                    info!(room = %code, "Room never claimed");
                    break;
                }
            } else {
                had_peers = true;
            }
        }

        registry.remove(&code);
        let stats = self.host.snapshot_stats();
        info!(
            room = %code,
            snapshots = stats.total_snapshots,
            avg_snapshot_bytes = stats.avg_bytes(),
            "Room closed"
        );
    }

    /// Apply everything queued since the last tick; false once every handle
    /// is gone
    fn drain_commands(&mut self) -> bool {
        loop {
            match self.commands.try_recv() {
                Ok(command) => self.apply(command),
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    fn apply(&mut self, command: RoomCommand) {
        match command {
            RoomCommand::Connect { peer, link, reply } => match self.host.connect(peer) {
                Ok(out) => {
                    self.links.insert(peer, link);
                    self.peer_count.store(self.links.len(), Ordering::Relaxed);
                    let _ = reply.send(Ok(()));
                    self.dispatch(out);
                }
                Err(e) => {
                    let _ = reply.send(Err(e));
                }
            },
            RoomCommand::Message { peer, msg } => {
                let out = self.host.handle(peer, msg);
                self.dispatch(out);
            }
            RoomCommand::Disconnect { peer } => {
                self.links.remove(&peer);
                self.peer_count.store(self.links.len(), Ordering::Relaxed);
                let out = self.host.disconnect(peer);
                self.dispatch(out);
            }
        }
    }

    /// Serialize each message once and hand it to every recipient
    fn dispatch(&mut self, out: Vec<Outbound>) {
        let mut out = out.into_iter().peekable();
        while let Some(Outbound { to, msg }) = out.next() {
            let text: Arc<str> = match serde_json::to_string(&msg) {
                Ok(text) => text.into(),
                Err(e) => {
                    error!(error = %e, "Failed to serialize message");
                    continue;
                }
            };
            if matches!(msg, ServerMsg::State(_)) {
                self.host.record_snapshot_size(text.len());
            }

            // A state followed by a control message in the same batch travels
            // with it so the pair stays ordered
            let delivery = match out.peek() {
                Some(next) if next.msg.delivery() == Delivery::Reliable => Delivery::Reliable,
                _ => msg.delivery(),
            };

            for (peer, link) in &self.links {
                if !to.includes(*peer) {
                    continue;
                }
                match delivery {
                    Delivery::Reliable => {
                        if link.control.send(Arc::clone(&text)).is_err() {
                            debug!(peer_id = %peer, "Control message to closed connection");
                        }
                    }
                    Delivery::Latest => {
                        link.state.send_replace(Some(Arc::clone(&text)));
                    }
                }
            }
        }
    }
}
