//! Authoritative player state, per-tick update and damage

use rand::Rng;

use super::combat::{
    Bullet, CombatSystem, WeaponKind, WeaponState, MELEE_COOLDOWN, MELEE_DAMAGE,
    MELEE_SWING_DURATION,
};
use super::enemy::Enemy;
use super::input::StagedInput;
use super::physics::PhysicsSystem;
use super::pickup::PickupKind;
use super::simulation::GameEvent;
use super::world::World;
use super::PeerId;

pub const PLAYER_RADIUS: f32 = 14.0;
pub const PLAYER_SPEED: f32 = 180.0;
pub const PLAYER_MAX_HP: f32 = 100.0;
pub const MAX_WALLS: u32 = 15;
/// Farthest a wall may be placed, measured to the tile center
pub const WALL_PLACE_RANGE: f32 = 130.0;
/// Damage immunity after taking a hit
pub const INVINCIBILITY_SECS: f32 = 0.3;

pub const AMMO_PICKUP_ROUNDS: u32 = 10;
pub const HEALTH_PICKUP_HP: f32 = 25.0;

/// Outcome of a damage application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageOutcome {
    /// Dead or within the invincibility window
    Ignored,
    Hurt,
    Killed,
}

/// A player entity as simulated by the host
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub id: PeerId,
    pub name: String,
    pub color: String,
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub hp: f32,
    pub max_hp: f32,
    pub weapon: WeaponState,
    pub melee_cooldown: f32,
    pub melee_active: bool,
    pub melee_angle: f32,
    pub melee_timer: f32,
    pub invincible_timer: f32,
    pub walls_placed: u32,
    pub max_walls: u32,
    pub build_mode: bool,
    pub foot_anim: f32,
    pub bob_timer: f32,
    pub dead: bool,
    /// Latest staged intent for the next tick
    pub input: StagedInput,
}

impl PlayerState {
    pub fn new(id: PeerId, name: String, color: String, x: f32, y: f32) -> Self {
        Self {
            id,
            name,
            color,
            x,
            y,
            angle: 0.0,
            hp: PLAYER_MAX_HP,
            max_hp: PLAYER_MAX_HP,
            weapon: WeaponState::new(WeaponKind::default()),
            melee_cooldown: 0.0,
            melee_active: false,
            melee_angle: 0.0,
            melee_timer: 0.0,
            invincible_timer: 0.0,
            walls_placed: 0,
            max_walls: MAX_WALLS,
            build_mode: false,
            foot_anim: 0.0,
            bob_timer: 0.0,
            dead: false,
            input: StagedInput::default(),
        }
    }

    pub fn is_alive(&self) -> bool {
        !self.dead
    }

    /// Overwrite the staged input; dead players ignore input
    pub fn stage_input(&mut self, input: StagedInput) {
        if self.dead {
            return;
        }
        self.input = input.sanitized();
    }

    /// Advance this player by one tick: movement, timers, then the gated
    /// actions (fire, melee, walls). One-shot actions are cleared afterwards.
    pub fn update<R: Rng>(
        &mut self,
        dt: f32,
        world: &mut World,
        enemies: &mut [Enemy],
        bullets: &mut Vec<Bullet>,
        rng: &mut R,
        events: &mut Vec<GameEvent>,
    ) {
        if self.dead {
            return;
        }

        self.angle = self.input.angle;
        self.build_mode = self.input.build_mode;

        let (dx, dy) = (self.input.move_x, self.input.move_y);
        PhysicsSystem::move_circle(
            world,
            &mut self.x,
            &mut self.y,
            dx * PLAYER_SPEED * dt,
            dy * PLAYER_SPEED * dt,
            PLAYER_RADIUS,
        );
        if dx != 0.0 || dy != 0.0 {
            self.bob_timer += dt * 8.0;
            self.foot_anim += dt * 6.0;
        }

        if let Some(kind) = self.input.switch_weapon {
            self.switch_weapon(kind);
        }

        self.weapon.update(dt);
        if self.input.reload {
            self.weapon.start_reload();
        }

        if self.melee_cooldown > 0.0 {
            self.melee_cooldown -= dt;
        }
        if self.melee_timer > 0.0 {
            self.melee_timer -= dt;
            if self.melee_timer <= 0.0 {
                self.melee_active = false;
            }
        }
        if self.invincible_timer > 0.0 {
            self.invincible_timer -= dt;
        }

        if self.input.shoot && !self.build_mode && self.weapon.try_fire() {
            let stats = self.weapon.stats();
            let pellets =
                CombatSystem::fire_pellets(self.id, self.x, self.y, self.angle, &stats, rng);
            events.push(GameEvent::ShotFired {
                player_id: self.id,
                weapon: self.weapon.kind,
                pellets: pellets.len() as u32,
            });
            bullets.extend(pellets);
        }

        if self.input.melee && self.melee_cooldown <= 0.0 {
            self.swing_melee(enemies, events);
        }

        if self.build_mode {
            let target = self.input.target;
            if self.input.place_wall && self.try_place_wall(world, target) {
                events.push(GameEvent::WallPlaced {
                    tile: target,
                    owner: Some(self.id),
                });
            }
            if self.input.remove_wall && self.try_remove_wall(world, target) {
                events.push(GameEvent::WallRemoved {
                    tile: target,
                    by: self.id,
                });
            }
        }

        self.input.clear_actions();
    }

    fn swing_melee(&mut self, enemies: &mut [Enemy], events: &mut Vec<GameEvent>) {
        self.melee_cooldown = MELEE_COOLDOWN;
        self.melee_active = true;
        self.melee_angle = self.angle;
        self.melee_timer = MELEE_SWING_DURATION;

        let mut hits = 0;
        for enemy in enemies.iter_mut() {
            if CombatSystem::melee_hits(self.x, self.y, self.melee_angle, enemy.x, enemy.y) {
                enemy.hp -= MELEE_DAMAGE;
                hits += 1;
            }
        }
        events.push(GameEvent::MeleeSwing {
            player_id: self.id,
            hits,
        });
    }

    /// Place a wall at `tile` if under the cap, within range and the tile is open
    pub fn try_place_wall(&mut self, world: &mut World, tile: super::TileCoord) -> bool {
        if self.walls_placed >= self.max_walls {
            return false;
        }
        if PhysicsSystem::distance_to_tile(self.x, self.y, tile) > WALL_PLACE_RANGE {
            return false;
        }
        if !world.place_wall(tile, Some(self.id)) {
            return false;
        }
        self.walls_placed += 1;
        true
    }

    /// Remove a wall this player owns, or an unowned one. Only the owner's
    /// placed count is decremented.
    pub fn try_remove_wall(&mut self, world: &mut World, tile: super::TileCoord) -> bool {
        match world.wall(tile) {
            Some(wall) if wall.owner.is_none() || wall.owner == Some(self.id) => {}
            _ => return false,
        }
        if let Some(wall) = world.remove_wall(tile) {
            if wall.owner == Some(self.id) {
                self.walls_placed = self.walls_placed.saturating_sub(1);
            }
        }
        true
    }

    /// Replace the equipped weapon with a fresh one of `kind`
    pub fn switch_weapon(&mut self, kind: WeaponKind) {
        self.weapon = WeaponState::new(kind);
    }

    /// Apply damage unless dead or invincible. A hit grants a short window of
    /// invincibility; hp never drops below zero.
    pub fn damage(&mut self, amount: f32) -> DamageOutcome {
        if self.dead || self.invincible_timer > 0.0 {
            return DamageOutcome::Ignored;
        }
        let (hp, killed) = CombatSystem::apply_damage(self.hp, amount);
        self.hp = hp;
        self.invincible_timer = INVINCIBILITY_SECS;
        if killed {
            self.dead = true;
            DamageOutcome::Killed
        } else {
            DamageOutcome::Hurt
        }
    }

    /// Apply a collected pickup
    pub fn apply_pickup(&mut self, kind: PickupKind) {
        match kind {
            PickupKind::Ammo => self.weapon.add_ammo(AMMO_PICKUP_ROUNDS),
            PickupKind::Health => self.hp = (self.hp + HEALTH_PICKUP_HP).min(self.max_hp),
            PickupKind::Weapon { weapon } => self.switch_weapon(weapon),
        }
    }
}
