//! Enemy archetypes, weighted spawning and chase AI

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::combat::Bullet;
use super::physics::PhysicsSystem;
use super::world::World;

/// Extra reach beyond an enemy's size for contact attacks
const MELEE_REACH: f32 = 20.0;
/// Ranged enemies fire when the target is within standoff + this margin
const RANGED_FIRE_MARGIN: f32 = 50.0;
/// Seconds an enemy is stunned by a bullet hit
pub const BULLET_STUN_SECS: f32 = 0.1;

/// Distance band around the reference player where new enemies appear
const SPAWN_DISTANCE_MIN: f32 = 500.0;
const SPAWN_DISTANCE_SPREAD: f32 = 250.0;

const SPAWN_INTERVAL_START: f32 = 4.0;
const SPAWN_INTERVAL_STEP: f32 = 0.05;
const SPAWN_INTERVAL_FLOOR: f32 = 1.2;

/// Enemy archetypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnemyKind {
    Grunt,
    Brute,
    Speeder,
    Ranger,
}

impl EnemyKind {
    pub const ALL: [EnemyKind; 4] = [
        EnemyKind::Grunt,
        EnemyKind::Brute,
        EnemyKind::Speeder,
        EnemyKind::Ranger,
    ];
}

/// Enemy stats per archetype
#[derive(Debug, Clone, Copy)]
pub struct EnemyStats {
    pub hp: f32,
    pub speed: f32,
    /// Body radius
    pub size: f32,
    /// Radius within which player bullets connect
    pub hit_radius: f32,
    pub attack_damage: f32,
    pub attack_cooldown: f32,
    pub score: u32,
    /// Relative spawn probability
    pub spawn_weight: f32,
    pub color: &'static str,
    /// Standoff distance for archetypes that shoot instead of touching
    pub standoff: Option<f32>,
}

impl EnemyStats {
    pub fn for_kind(kind: EnemyKind) -> Self {
        match kind {
            EnemyKind::Grunt => Self {
                hp: 60.0,
                speed: 100.0,
                size: 16.0,
                hit_radius: 16.0,
                attack_damage: 12.0,
                attack_cooldown: 1.0,
                score: 20,
                spawn_weight: 0.55,
                color: "#2a6030",
                standoff: None,
            },
            EnemyKind::Brute => Self {
                hp: 180.0,
                speed: 65.0,
                size: 22.0,
                hit_radius: 22.0,
                attack_damage: 22.0,
                attack_cooldown: 1.6,
                score: 60,
                spawn_weight: 0.20,
                color: "#8B1515",
                standoff: None,
            },
            EnemyKind::Speeder => Self {
                hp: 40.0,
                speed: 170.0,
                size: 13.0,
                hit_radius: 16.0,
                attack_damage: 8.0,
                attack_cooldown: 0.4,
                score: 30,
                spawn_weight: 0.18,
                color: "#15558B",
                standoff: None,
            },
            EnemyKind::Ranger => Self {
                hp: 55.0,
                speed: 55.0,
                size: 15.0,
                hit_radius: 16.0,
                attack_damage: 0.0,
                attack_cooldown: 2.0,
                score: 40,
                spawn_weight: 0.07,
                color: "#8B4588",
                standoff: Some(280.0),
            },
        }
    }

    /// Distance at which the enemy stops closing in
    pub fn stop_range(&self) -> f32 {
        self.standoff.unwrap_or(self.size + MELEE_REACH)
    }
}

/// Cumulative-weight table for sampling archetypes
#[derive(Debug, Clone)]
pub struct SpawnTable {
    kinds: Vec<EnemyKind>,
    cumulative: Vec<f32>,
}

impl SpawnTable {
    /// Build a table; rejects empty input and non-positive or non-finite weights
    pub fn from_weights(weights: &[(EnemyKind, f32)]) -> Option<Self> {
        if weights.is_empty() {
            return None;
        }
        let mut kinds = Vec::with_capacity(weights.len());
        let mut cumulative = Vec::with_capacity(weights.len());
        let mut total = 0.0;
        for &(kind, weight) in weights {
            if !weight.is_finite() || weight <= 0.0 {
                return None;
            }
            total += weight;
            kinds.push(kind);
            cumulative.push(total);
        }
        Some(Self { kinds, cumulative })
    }

    pub fn total_weight(&self) -> f32 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    /// Archetype whose cumulative band contains `roll` in `[0, total)`
    pub fn pick(&self, roll: f32) -> EnemyKind {
        let idx = self
            .cumulative
            .partition_point(|&c| c <= roll)
            .min(self.kinds.len() - 1);
        self.kinds[idx]
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> EnemyKind {
        self.pick(rng.gen_range(0.0..self.total_weight()))
    }
}

impl Default for SpawnTable {
    fn default() -> Self {
        let weights: Vec<(EnemyKind, f32)> = EnemyKind::ALL
            .iter()
            .map(|&k| (k, EnemyStats::for_kind(k).spawn_weight))
            .collect();
        // Built-in weights are all positive
        match Self::from_weights(&weights) {
            Some(table) => table,
            None => Self {
                kinds: vec![EnemyKind::Grunt],
                cumulative: vec![1.0],
            },
        }
    }
}

/// Paces enemy spawns, tightening the interval after every trigger
#[derive(Debug, Clone)]
pub struct Spawner {
    timer: f32,
    interval: f32,
}

impl Spawner {
    pub fn new() -> Self {
        Self {
            timer: 0.0,
            interval: SPAWN_INTERVAL_START,
        }
    }

    pub fn interval(&self) -> f32 {
        self.interval
    }

    /// Advance by `dt`; true when a spawn should happen now
    pub fn tick(&mut self, dt: f32, population: usize, cap: usize) -> bool {
        self.timer += dt;
        if self.timer < self.interval {
            return false;
        }
        self.timer = 0.0;
        self.interval = (self.interval - SPAWN_INTERVAL_STEP).max(SPAWN_INTERVAL_FLOOR);
        population < cap
    }
}

impl Default for Spawner {
    fn default() -> Self {
        Self::new()
    }
}

/// Random spawn position around a reference point
pub fn spawn_position<R: Rng>(rng: &mut R, ref_x: f32, ref_y: f32) -> (f32, f32) {
    let angle = rng.gen_range(0.0..std::f32::consts::TAU);
    let dist = SPAWN_DISTANCE_MIN + rng.gen::<f32>() * SPAWN_DISTANCE_SPREAD;
    (ref_x + angle.cos() * dist, ref_y + angle.sin() * dist)
}

/// What an enemy decided to do this tick
#[derive(Debug, Clone)]
pub enum EnemyAction {
    Idle,
    /// Contact damage against the player at this index of the target list
    Strike { target: usize, damage: f32 },
    Shoot(Bullet),
}

/// A live enemy
#[derive(Debug, Clone)]
pub struct Enemy {
    pub id: u32,
    pub kind: EnemyKind,
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub hp: f32,
    pub max_hp: f32,
    pub attack_timer: f32,
    pub stun_timer: f32,
    pub bob_timer: f32,
}

impl Enemy {
    pub fn spawn<R: Rng>(id: u32, kind: EnemyKind, x: f32, y: f32, rng: &mut R) -> Self {
        let stats = EnemyStats::for_kind(kind);
        Self {
            id,
            kind,
            x,
            y,
            angle: 0.0,
            hp: stats.hp,
            max_hp: stats.hp,
            attack_timer: rng.gen::<f32>() * stats.attack_cooldown,
            stun_timer: 0.0,
            bob_timer: rng.gen::<f32>() * std::f32::consts::TAU,
        }
    }

    pub fn stats(&self) -> EnemyStats {
        EnemyStats::for_kind(self.kind)
    }

    pub fn is_dead(&self) -> bool {
        self.hp <= 0.0
    }

    pub fn stun(&mut self, secs: f32) {
        self.stun_timer = secs;
    }

    /// Chase the nearest target and attack on cooldown. `targets` holds the
    /// positions of living players.
    pub fn update(&mut self, dt: f32, world: &mut World, targets: &[(f32, f32)]) -> EnemyAction {
        if self.stun_timer > 0.0 {
            self.stun_timer -= dt;
            self.bob_timer += dt * 5.0;
            return EnemyAction::Idle;
        }

        let nearest = targets
            .iter()
            .enumerate()
            .map(|(i, &(tx, ty))| (i, PhysicsSystem::distance_sq(self.x, self.y, tx, ty)))
            .min_by(|a, b| a.1.total_cmp(&b.1));
        let Some((target, dist_sq)) = nearest else {
            return EnemyAction::Idle;
        };

        let stats = self.stats();
        let dist = dist_sq.sqrt();
        let (tx, ty) = targets[target];
        self.angle = (ty - self.y).atan2(tx - self.x);

        if dist > stats.stop_range() {
            PhysicsSystem::move_circle(
                world,
                &mut self.x,
                &mut self.y,
                self.angle.cos() * stats.speed * dt,
                self.angle.sin() * stats.speed * dt,
                stats.size - 2.0,
            );
        }

        self.bob_timer += dt * 5.0;
        self.attack_timer -= dt;
        if self.attack_timer > 0.0 {
            return EnemyAction::Idle;
        }
        self.attack_timer = stats.attack_cooldown;

        match stats.standoff {
            Some(standoff) if dist < standoff + RANGED_FIRE_MARGIN => {
                EnemyAction::Shoot(Bullet::enemy_shot(self.x, self.y, self.angle))
            }
            Some(_) => EnemyAction::Idle,
            None if dist < stats.size + MELEE_REACH => EnemyAction::Strike {
                target,
                damage: stats.attack_damage,
            },
            None => EnemyAction::Idle,
        }
    }
}
