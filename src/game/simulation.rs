//! Authoritative game simulation - one instance per game

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::combat::{Bullet, Side, WeaponKind, PLAYER_BULLET_HIT_RADIUS};
use super::enemy::{
    spawn_position, Enemy, EnemyAction, EnemyKind, SpawnTable, Spawner, BULLET_STUN_SECS,
};
use super::input::StagedInput;
use super::pickup::{roll_drops, Pickup, PickupKind};
use super::player::{DamageOutcome, PlayerState};
use super::world::{TileCoord, WallHit, World};
use super::PeerId;
use crate::util::time::clamp_dt;

/// Radius of the ring players are spread over at game start
const SPAWN_RING_RADIUS: f32 = 80.0;
/// Chunks generated around the origin before the first tick
const PREGEN_CHUNK_RADIUS: i32 = 3;

/// Tunables carried into every simulation
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// World and RNG seed
    pub seed: u64,
    pub max_enemies: usize,
    /// Longest step a single tick may advance
    pub max_frame_secs: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            max_enemies: 30,
            max_frame_secs: crate::util::time::DEFAULT_MAX_FRAME_SECS,
        }
    }
}

/// Things that happened during a tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    ShotFired {
        player_id: PeerId,
        weapon: WeaponKind,
        pellets: u32,
    },
    MeleeSwing {
        player_id: PeerId,
        hits: u32,
    },
    EnemySpawned {
        enemy_id: u32,
        kind: EnemyKind,
    },
    EnemyKilled {
        enemy_id: u32,
        kind: EnemyKind,
        x: f32,
        y: f32,
        score: u32,
        drops: u32,
    },
    PlayerHit {
        player_id: PeerId,
        damage: f32,
        hp: f32,
    },
    PlayerDied {
        player_id: PeerId,
    },
    WallPlaced {
        tile: TileCoord,
        owner: Option<PeerId>,
    },
    WallRemoved {
        tile: TileCoord,
        by: PeerId,
    },
    WallDestroyed {
        tile: TileCoord,
        owner: Option<PeerId>,
    },
    PickupTaken {
        player_id: PeerId,
        pickup: PickupKind,
    },
    GameOver {
        score: u32,
        kills: u32,
    },
}

/// Owns every piece of game state. A new game is a new `Simulation`.
pub struct Simulation {
    config: SimConfig,
    world: World,
    players: Vec<PlayerState>,
    enemies: Vec<Enemy>,
    bullets: Vec<Bullet>,
    pickups: Vec<Pickup>,
    spawner: Spawner,
    spawn_table: SpawnTable,
    rng: ChaCha8Rng,
    next_enemy_id: u32,
    score: u32,
    kill_count: u32,
    tick: u64,
    game_over: bool,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Self {
        let mut world = World::new(config.seed);
        world.pregenerate_around(0.0, 0.0, PREGEN_CHUNK_RADIUS);
        Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            world,
            config,
            players: Vec::new(),
            enemies: Vec::new(),
            bullets: Vec::new(),
            pickups: Vec::new(),
            spawner: Spawner::new(),
            spawn_table: SpawnTable::default(),
            next_enemy_id: 0,
            score: 0,
            kill_count: 0,
            tick: 0,
            game_over: false,
        }
    }

    /// Spread the roster over a ring around the origin, each on an open tile
    pub fn spawn_players(&mut self, roster: &[(PeerId, String, String)]) {
        let n = roster.len().max(1) as f32;
        for (i, (id, name, color)) in roster.iter().enumerate() {
            let angle = i as f32 / n * std::f32::consts::TAU;
            let (x, y) = self
                .world
                .find_spawn(angle.cos() * SPAWN_RING_RADIUS, angle.sin() * SPAWN_RING_RADIUS);
            self.players
                .push(PlayerState::new(*id, name.clone(), color.clone(), x, y));
        }
    }

    /// Remove a player's entity; repeated calls are no-ops
    pub fn remove_player(&mut self, id: PeerId) -> bool {
        let before = self.players.len();
        self.players.retain(|p| p.id != id);
        before != self.players.len()
    }

    /// Overwrite a player's staged input. Unknown or dead players are ignored.
    pub fn stage_input(&mut self, id: PeerId, input: StagedInput) -> bool {
        match self.player_mut(id) {
            Some(player) if player.is_alive() => {
                player.stage_input(input);
                true
            }
            _ => false,
        }
    }

    /// Advance the world by one tick
    pub fn tick(&mut self, dt: f32) -> Vec<GameEvent> {
        let mut events = Vec::new();
        if self.game_over {
            return events;
        }
        let dt = clamp_dt(dt, self.config.max_frame_secs);
        self.tick += 1;

        for player in self.players.iter_mut() {
            player.update(
                dt,
                &mut self.world,
                &mut self.enemies,
                &mut self.bullets,
                &mut self.rng,
                &mut events,
            );
        }

        let mut bullets = std::mem::take(&mut self.bullets);
        bullets.retain_mut(|bullet| self.resolve_bullet(bullet, dt, &mut events));
        self.bullets = bullets;

        if self
            .spawner
            .tick(dt, self.enemies.len(), self.config.max_enemies)
        {
            self.spawn_enemy(&mut events);
        }

        self.update_enemies(dt, &mut events);
        self.update_pickups(dt, &mut events);

        if !self.players.is_empty() && self.players.iter().all(|p| p.dead) {
            self.game_over = true;
            events.push(GameEvent::GameOver {
                score: self.score,
                kills: self.kill_count,
            });
        }

        events
    }

    /// Move a bullet and resolve collisions; false when it is consumed
    fn resolve_bullet(&mut self, bullet: &mut Bullet, dt: f32, events: &mut Vec<GameEvent>) -> bool {
        if !bullet.update(dt) {
            return false;
        }

        let tile = TileCoord::containing(bullet.x, bullet.y);
        if self.world.is_solid(tile) {
            if let WallHit::Destroyed { owner } = self.world.damage_wall(tile, bullet.damage) {
                self.release_wall(owner);
                debug!(tile_x = tile.x, tile_y = tile.y, "Wall destroyed");
                events.push(GameEvent::WallDestroyed { tile, owner });
            }
            return false;
        }

        match bullet.side {
            Side::Player => {
                let hit = self
                    .enemies
                    .iter_mut()
                    .find(|e| !e.is_dead() && bullet.check_hit(e.x, e.y, e.stats().hit_radius));
                if let Some(enemy) = hit {
                    enemy.hp -= bullet.damage;
                    enemy.stun(BULLET_STUN_SECS);
                    return false;
                }
            }
            Side::Enemy => {
                let hit = self.players.iter_mut().find(|p| {
                    p.is_alive() && bullet.check_hit(p.x, p.y, PLAYER_BULLET_HIT_RADIUS)
                });
                if let Some(player) = hit {
                    Self::record_damage(player, bullet.damage, events);
                    return false;
                }
            }
        }
        true
    }

    /// Decrement the placing player's wall count
    fn release_wall(&mut self, owner: Option<PeerId>) {
        let Some(id) = owner else { return };
        if let Some(player) = self.player_mut(id) {
            player.walls_placed = player.walls_placed.saturating_sub(1);
        }
    }

    fn record_damage(player: &mut PlayerState, amount: f32, events: &mut Vec<GameEvent>) {
        match player.damage(amount) {
            DamageOutcome::Ignored => {}
            DamageOutcome::Hurt => events.push(GameEvent::PlayerHit {
                player_id: player.id,
                damage: amount,
                hp: player.hp,
            }),
            DamageOutcome::Killed => {
                events.push(GameEvent::PlayerHit {
                    player_id: player.id,
                    damage: amount,
                    hp: player.hp,
                });
                events.push(GameEvent::PlayerDied {
                    player_id: player.id,
                });
            }
        }
    }

    fn spawn_enemy(&mut self, events: &mut Vec<GameEvent>) {
        let alive: Vec<(f32, f32)> = self
            .players
            .iter()
            .filter(|p| p.is_alive())
            .map(|p| (p.x, p.y))
            .collect();
        let Some(&(ref_x, ref_y)) = alive.choose(&mut self.rng) else {
            return;
        };
        let (x, y) = spawn_position(&mut self.rng, ref_x, ref_y);
        let kind = self.spawn_table.sample(&mut self.rng);
        let enemy_id = self.spawn_enemy_at(kind, x, y);
        events.push(GameEvent::EnemySpawned { enemy_id, kind });
    }

    /// Place an enemy of `kind` at a position, returning its id
    pub fn spawn_enemy_at(&mut self, kind: EnemyKind, x: f32, y: f32) -> u32 {
        let id = self.next_enemy_id;
        self.next_enemy_id += 1;
        self.enemies.push(Enemy::spawn(id, kind, x, y, &mut self.rng));
        id
    }

    /// Add an in-flight bullet
    pub fn push_bullet(&mut self, bullet: Bullet) {
        self.bullets.push(bullet);
    }

    fn update_enemies(&mut self, dt: f32, events: &mut Vec<GameEvent>) {
        let (dead, alive): (Vec<Enemy>, Vec<Enemy>) =
            std::mem::take(&mut self.enemies).into_iter().partition(|e| e.is_dead());
        self.enemies = alive;

        for enemy in dead {
            let stats = enemy.stats();
            self.score += stats.score;
            self.kill_count += 1;
            let drops = roll_drops(enemy.x, enemy.y, &mut self.rng);
            debug!(enemy_id = enemy.id, kind = ?enemy.kind, drops = drops.len(), "Enemy killed");
            events.push(GameEvent::EnemyKilled {
                enemy_id: enemy.id,
                kind: enemy.kind,
                x: enemy.x,
                y: enemy.y,
                score: stats.score,
                drops: drops.len() as u32,
            });
            self.pickups.extend(drops);
        }

        let (indices, targets): (Vec<usize>, Vec<(f32, f32)>) = self
            .players
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_alive())
            .map(|(i, p)| (i, (p.x, p.y)))
            .unzip();

        for enemy in self.enemies.iter_mut() {
            match enemy.update(dt, &mut self.world, &targets) {
                EnemyAction::Idle => {}
                EnemyAction::Strike { target, damage } => {
                    let player = &mut self.players[indices[target]];
                    Self::record_damage(player, damage, events);
                }
                EnemyAction::Shoot(bullet) => self.bullets.push(bullet),
            }
        }
    }

    fn update_pickups(&mut self, dt: f32, events: &mut Vec<GameEvent>) {
        let players = &mut self.players;
        self.pickups.retain_mut(|pickup| {
            if !pickup.update(dt) {
                return false;
            }
            match players
                .iter_mut()
                .find(|p| p.is_alive() && pickup.in_reach(p.x, p.y))
            {
                Some(player) => {
                    player.apply_pickup(pickup.kind);
                    events.push(GameEvent::PickupTaken {
                        player_id: player.id,
                        pickup: pickup.kind,
                    });
                    false
                }
                None => true,
            }
        });
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.config.seed
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn players(&self) -> &[PlayerState] {
        &self.players
    }

    pub fn player(&self, id: PeerId) -> Option<&PlayerState> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: PeerId) -> Option<&mut PlayerState> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn enemies(&self) -> &[Enemy] {
        &self.enemies
    }

    pub fn bullets(&self) -> &[Bullet] {
        &self.bullets
    }

    pub fn pickups(&self) -> &[Pickup] {
        &self.pickups
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn kill_count(&self) -> u32 {
        self.kill_count
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }
}
