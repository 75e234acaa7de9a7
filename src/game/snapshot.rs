//! Snapshot building, stats and the client-side mirror merge

use serde::{Deserialize, Serialize};

use super::combat::WeaponKind;
use super::enemy::EnemyKind;
use super::input::StagedInput;
use super::physics::PhysicsSystem;
use super::pickup::PickupKind;
use super::player::{PlayerState, PLAYER_RADIUS, PLAYER_SPEED};
use super::simulation::Simulation;
use super::world::{WallEntry, World};
use super::PeerId;
use crate::util::time::RateTimer;

/// Share of the remaining error removed per snapshot for the own player
pub const OWN_POSITION_BLEND: f32 = 0.35;
/// Camera follow rate per second
pub const CAMERA_LERP: f32 = 8.0;

/// Public player state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: PeerId,
    pub name: String,
    pub color: String,
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub hp: f32,
    pub max_hp: f32,
    pub weapon: WeaponKind,
    pub ammo: u32,
    pub max_ammo: u32,
    pub reload_timer: f32,
    pub dead: bool,
    pub build_mode: bool,
    pub melee_active: bool,
    pub melee_angle: f32,
    pub foot_anim: f32,
    pub bob_timer: f32,
    pub walls_placed: u32,
    pub max_walls: u32,
}

impl From<&PlayerState> for PlayerSnapshot {
    fn from(p: &PlayerState) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            color: p.color.clone(),
            x: p.x,
            y: p.y,
            angle: p.angle,
            hp: p.hp,
            max_hp: p.max_hp,
            weapon: p.weapon.kind,
            ammo: p.weapon.ammo,
            max_ammo: p.weapon.max_ammo,
            reload_timer: p.weapon.reload_timer,
            dead: p.dead,
            build_mode: p.build_mode,
            melee_active: p.melee_active,
            melee_angle: p.melee_angle,
            foot_anim: p.foot_anim,
            bob_timer: p.bob_timer,
            walls_placed: p.walls_placed,
            max_walls: p.max_walls,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemySnapshot {
    pub id: u32,
    pub kind: EnemyKind,
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub hp: f32,
    pub max_hp: f32,
    pub bob: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickupSnapshot {
    pub x: f32,
    pub y: f32,
    #[serde(flatten)]
    pub kind: PickupKind,
    pub bob: f32,
    pub life: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulletSnapshot {
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub life: f32,
    pub damage: f32,
    pub color: String,
    pub size: f32,
}

/// Everything a client needs to draw one frame of the shared game
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u64,
    pub score: u32,
    pub kill_count: u32,
    pub players: Vec<PlayerSnapshot>,
    pub enemies: Vec<EnemySnapshot>,
    pub pickups: Vec<PickupSnapshot>,
    pub enemy_bullets: Vec<BulletSnapshot>,
    pub walls: Vec<WallEntry>,
}

/// Builds snapshots for network transmission
pub struct SnapshotBuilder {
    timer: RateTimer,
    force: bool,
    stats: SnapshotStats,
}

impl SnapshotBuilder {
    pub fn new(broadcast_hz: u32) -> Self {
        Self {
            timer: RateTimer::from_hz(broadcast_hz),
            force: false,
            stats: SnapshotStats::default(),
        }
    }

    /// Advance the broadcast timer; true when a snapshot is due
    pub fn should_send(&mut self, dt: f32) -> bool {
        let due = self.timer.advance(dt);
        if self.force {
            self.force = false;
            self.timer.reset();
            return true;
        }
        due
    }

    /// Force snapshot on next check (used for important events)
    pub fn force_next(&mut self) {
        self.force = true;
    }

    pub fn build(&self, sim: &Simulation) -> Snapshot {
        Snapshot {
            tick: sim.tick_count(),
            score: sim.score(),
            kill_count: sim.kill_count(),
            players: sim.players().iter().map(PlayerSnapshot::from).collect(),
            enemies: sim
                .enemies()
                .iter()
                .map(|e| EnemySnapshot {
                    id: e.id,
                    kind: e.kind,
                    x: e.x,
                    y: e.y,
                    angle: e.angle,
                    hp: e.hp,
                    max_hp: e.max_hp,
                    bob: e.bob_timer,
                })
                .collect(),
            pickups: sim
                .pickups()
                .iter()
                .map(|p| PickupSnapshot {
                    x: p.x,
                    y: p.y,
                    kind: p.kind,
                    bob: p.bob,
                    life: p.life,
                })
                .collect(),
            enemy_bullets: sim
                .bullets()
                .iter()
                .filter(|b| b.side == super::combat::Side::Enemy)
                .map(|b| BulletSnapshot {
                    x: b.x,
                    y: b.y,
                    vel_x: b.vel_x,
                    vel_y: b.vel_y,
                    life: b.life,
                    damage: b.damage,
                    color: b.color.to_string(),
                    size: b.size,
                })
                .collect(),
            walls: sim.world().wall_entries(),
        }
    }

    pub fn record(&mut self, player_count: usize, bytes: usize) {
        self.stats.record(player_count, bytes);
    }

    pub fn stats(&self) -> &SnapshotStats {
        &self.stats
    }
}

/// Snapshot size stats for debugging
#[derive(Debug, Default, Clone)]
pub struct SnapshotStats {
    pub total_snapshots: u64,
    pub total_bytes: u64,
    pub avg_players_per_snapshot: f32,
}

impl SnapshotStats {
    pub fn record(&mut self, player_count: usize, bytes: usize) {
        self.total_snapshots += 1;
        self.total_bytes += bytes as u64;

        let n = self.total_snapshots as f32;
        self.avg_players_per_snapshot =
            self.avg_players_per_snapshot * ((n - 1.0) / n) + (player_count as f32 / n);
    }

    pub fn avg_bytes(&self) -> u64 {
        self.total_bytes.checked_div(self.total_snapshots).unwrap_or(0)
    }
}

/// Smoothed view position
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Camera {
    pub x: f32,
    pub y: f32,
}

/// A client's replica of the host state
pub struct ClientMirror {
    my_id: PeerId,
    world: World,
    pub players: Vec<PlayerSnapshot>,
    pub enemies: Vec<EnemySnapshot>,
    pub pickups: Vec<PickupSnapshot>,
    pub enemy_bullets: Vec<BulletSnapshot>,
    pub score: u32,
    pub kill_count: u32,
    pub camera: Camera,
    last_tick: Option<u64>,
}

impl ClientMirror {
    pub fn new(my_id: PeerId, seed: u64) -> Self {
        Self {
            my_id,
            world: World::new(seed),
            players: Vec::new(),
            enemies: Vec::new(),
            pickups: Vec::new(),
            enemy_bullets: Vec::new(),
            score: 0,
            kill_count: 0,
            camera: Camera::default(),
            last_tick: None,
        }
    }

    /// Seed the own player at a locally found spawn until the host's first
    /// snapshot arrives
    pub fn insert_local_player(&mut self, name: String, color: String) {
        let (x, y) = self.world.find_spawn(0.0, 0.0);
        let placeholder = PlayerState::new(self.my_id, name, color, x, y);
        self.players.retain(|p| p.id != self.my_id);
        self.players.push(PlayerSnapshot::from(&placeholder));
        self.camera = Camera { x, y };
    }

    /// Fold a host snapshot into the mirror. The own player's position is
    /// blended; everything else is taken as-is. Older snapshots are ignored.
    pub fn merge(&mut self, snapshot: Snapshot) -> bool {
        if self.last_tick.is_some_and(|t| snapshot.tick < t) {
            return false;
        }
        self.last_tick = Some(snapshot.tick);
        self.score = snapshot.score;
        self.kill_count = snapshot.kill_count;

        let previous_own = self.players.iter().find(|p| p.id == self.my_id).cloned();
        self.players = snapshot.players;
        if let (Some(prev), Some(own)) = (
            previous_own,
            self.players.iter_mut().find(|p| p.id == self.my_id),
        ) {
            let (target_x, target_y) = (own.x, own.y);
            own.x = prev.x + (target_x - prev.x) * OWN_POSITION_BLEND;
            own.y = prev.y + (target_y - prev.y) * OWN_POSITION_BLEND;
            // Local presentation state the host does not drive authoritatively
            own.angle = prev.angle;
            own.foot_anim = prev.foot_anim;
            own.bob_timer = prev.bob_timer;
        }

        self.enemies = snapshot.enemies;
        self.pickups = snapshot.pickups;
        self.enemy_bullets = snapshot.enemy_bullets;
        self.world.load_walls(&snapshot.walls);
        true
    }

    /// Move the own player locally with the same collision routine the host
    /// uses, ahead of the next snapshot
    pub fn predict_local(&mut self, input: &StagedInput, dt: f32) {
        let my_id = self.my_id;
        let Some(own) = self.players.iter_mut().find(|p| p.id == my_id) else {
            return;
        };
        if own.dead {
            return;
        }
        own.angle = input.angle;
        PhysicsSystem::move_circle(
            &mut self.world,
            &mut own.x,
            &mut own.y,
            input.move_x * PLAYER_SPEED * dt,
            input.move_y * PLAYER_SPEED * dt,
            PLAYER_RADIUS,
        );
        if input.move_x != 0.0 || input.move_y != 0.0 {
            own.bob_timer += dt * 8.0;
            own.foot_anim += dt * 6.0;
        }
    }

    /// Ease the camera toward the own player
    pub fn follow_camera(&mut self, dt: f32) {
        if let Some(own) = self.own_player() {
            let t = (CAMERA_LERP * dt).min(1.0);
            let (x, y) = (own.x, own.y);
            self.camera.x += (x - self.camera.x) * t;
            self.camera.y += (y - self.camera.y) * t;
        }
    }

    pub fn my_id(&self) -> PeerId {
        self.my_id
    }

    pub fn own_player(&self) -> Option<&PlayerSnapshot> {
        self.players.iter().find(|p| p.id == self.my_id)
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn last_tick(&self) -> Option<u64> {
        self.last_tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::simulation::SimConfig;
    use uuid::Uuid;

    fn running_sim() -> (Simulation, Vec<PeerId>) {
        let mut sim = Simulation::new(SimConfig {
            seed: 21,
            ..SimConfig::default()
        });
        let ids = vec![Uuid::new_v4(), Uuid::new_v4()];
        sim.spawn_players(&[
            (ids[0], "ada".into(), "#4adeff".into()),
            (ids[1], "bo".into(), "#ff6644".into()),
        ]);
        sim.spawn_enemy_at(EnemyKind::Grunt, 600.0, 0.0);
        sim.spawn_enemy_at(EnemyKind::Ranger, -600.0, 40.0);
        for _ in 0..5 {
            sim.tick(0.016);
        }
        (sim, ids)
    }

    fn over_the_wire(snapshot: &Snapshot) -> Snapshot {
        let json = serde_json::to_string(snapshot).expect("snapshot serializes");
        serde_json::from_str(&json).expect("snapshot deserializes")
    }

    #[test]
    fn merge_into_empty_mirror_reproduces_entities() {
        let (sim, ids) = running_sim();
        let builder = SnapshotBuilder::new(30);
        let received = over_the_wire(&builder.build(&sim));
        assert_eq!(received.enemies.len(), 2);

        let mut mirror = ClientMirror::new(ids[1], 21);
        assert!(mirror.merge(received.clone()));

        assert_eq!(mirror.enemies, received.enemies);
        assert_eq!(mirror.pickups, received.pickups);
        assert_eq!(mirror.enemy_bullets, received.enemy_bullets);
        assert_eq!(mirror.world().wall_entries(), received.walls);
        assert_eq!(mirror.players, received.players);
        assert_eq!(mirror.score, received.score);
    }

    #[test]
    fn own_position_converges_monotonically() {
        let (sim, ids) = running_sim();
        let me = ids[0];
        let snapshot = SnapshotBuilder::new(30).build(&sim);
        let target = snapshot
            .players
            .iter()
            .find(|p| p.id == me)
            .map(|p| (p.x, p.y))
            .expect("own player in snapshot");

        let mut mirror = ClientMirror::new(me, 21);
        mirror.players.push(PlayerSnapshot {
            x: target.0 + 100.0,
            y: target.1 - 60.0,
            hp: 1.0,
            ..snapshot.players[0].clone()
        });

        let mut last_error = f32::MAX;
        for _ in 0..20 {
            mirror.merge(snapshot.clone());
            let own = mirror.own_player().expect("own player kept");
            let error = PhysicsSystem::distance(own.x, own.y, target.0, target.1);
            assert!(error < last_error, "error {error} did not shrink from {last_error}");
            last_error = error;
            assert_eq!(own.hp, snapshot.players[0].hp);
            assert_eq!(own.ammo, snapshot.players[0].ammo);
        }
        assert!(last_error < 0.1);
    }

    #[test]
    fn absent_players_are_removed_and_stale_snapshots_ignored() {
        let (mut sim, ids) = running_sim();
        let builder = SnapshotBuilder::new(30);
        let mut mirror = ClientMirror::new(ids[0], 21);
        mirror.merge(builder.build(&sim));
        assert_eq!(mirror.players.len(), 2);

        let stale = builder.build(&sim);
        sim.remove_player(ids[1]);
        sim.tick(0.016);
        mirror.merge(builder.build(&sim));
        assert_eq!(mirror.players.len(), 1);

        assert!(!mirror.merge(stale));
        assert_eq!(mirror.players.len(), 1);
    }

    #[test]
    fn snapshot_carries_only_enemy_bullets() {
        let (mut sim, ids) = running_sim();
        sim.stage_input(
            ids[0],
            StagedInput {
                shoot: true,
                ..Default::default()
            },
        );
        sim.tick(0.001);
        sim.push_bullet(crate::game::combat::Bullet::enemy_shot(5_000.0, 5_000.0, 0.0));
        let snapshot = SnapshotBuilder::new(30).build(&sim);
        assert!(sim.bullets().len() > snapshot.enemy_bullets.len());
        assert_eq!(snapshot.enemy_bullets.len(), 1);
        assert_eq!(snapshot.enemy_bullets[0].color, "#dd44ff");
    }

    #[test]
    fn builder_paces_and_forces_snapshots() {
        let mut builder = SnapshotBuilder::new(30);
        assert!(!builder.should_send(0.01));
        builder.force_next();
        assert!(builder.should_send(0.0));
        assert!(!builder.should_send(0.01));
        assert!(builder.should_send(0.03));

        builder.record(2, 400);
        builder.record(4, 600);
        assert_eq!(builder.stats().avg_bytes(), 500);
        assert!((builder.stats().avg_players_per_snapshot - 3.0).abs() < 1e-5);
    }

    #[test]
    fn camera_follows_own_player() {
        let mut mirror = ClientMirror::new(Uuid::new_v4(), 3);
        mirror.insert_local_player("me".into(), "#4adeff".into());
        let own = mirror.own_player().cloned().expect("placeholder inserted");
        mirror.camera = Camera::default();
        for _ in 0..120 {
            mirror.follow_camera(1.0 / 60.0);
        }
        assert!((mirror.camera.x - own.x).abs() < 1.0);
        assert!((mirror.camera.y - own.y).abs() < 1.0);
    }
}
