//! Combat system - weapons, bullets, melee and damage

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::physics::PhysicsSystem;
use super::PeerId;

/// Distance ahead of the shooter where bullets appear
pub const MUZZLE_OFFSET: f32 = 24.0;

pub const MELEE_RANGE: f32 = 70.0;
pub const MELEE_DAMAGE: f32 = 45.0;
pub const MELEE_COOLDOWN: f32 = 0.6;
/// Half-width of the melee swing arc in radians
pub const MELEE_HALF_ARC: f32 = 1.2;
/// How long the swing stays visible
pub const MELEE_SWING_DURATION: f32 = 0.25;

/// Enemy-fired bullet parameters
pub const ENEMY_BULLET_SPEED: f32 = 380.0;
pub const ENEMY_BULLET_LIFE: f32 = 1.6;
pub const ENEMY_BULLET_DAMAGE: f32 = 14.0;
pub const ENEMY_BULLET_SIZE: f32 = 4.0;
pub const ENEMY_BULLET_COLOR: &str = "#dd44ff";
/// Radius around a player that an enemy bullet must enter to hit
pub const PLAYER_BULLET_HIT_RADIUS: f32 = 18.0;

/// Firearm kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponKind {
    Pistol,
    #[default]
    Smg,
    Shotgun,
    Sniper,
}

impl WeaponKind {
    pub const ALL: [WeaponKind; 4] = [
        WeaponKind::Pistol,
        WeaponKind::Smg,
        WeaponKind::Shotgun,
        WeaponKind::Sniper,
    ];
}

/// Weapon stats per weapon kind
#[derive(Debug, Clone, Copy)]
pub struct WeaponStats {
    /// Damage per pellet
    pub damage: f32,
    /// Seconds between shots
    pub cooldown: f32,
    /// Magazine size
    pub max_ammo: u32,
    /// Seconds to refill the magazine
    pub reload_time: f32,
    pub bullet_speed: f32,
    /// Width of the pellet cone in radians, centered on the aim
    pub spread: f32,
    pub pellets: u32,
    /// Bullet lifetime in seconds
    pub bullet_life: f32,
    pub bullet_color: &'static str,
    pub bullet_size: f32,
}

impl WeaponStats {
    pub fn for_kind(kind: WeaponKind) -> Self {
        match kind {
            WeaponKind::Pistol => Self {
                damage: 25.0,
                cooldown: 0.30,
                max_ammo: 12,
                reload_time: 1.5,
                bullet_speed: 580.0,
                spread: 0.06,
                pellets: 1,
                bullet_life: 1.2,
                bullet_color: "#ffe866",
                bullet_size: 3.5,
            },
            WeaponKind::Smg => Self {
                damage: 14.0,
                cooldown: 0.08,
                max_ammo: 30,
                reload_time: 2.0,
                bullet_speed: 620.0,
                spread: 0.14,
                pellets: 1,
                bullet_life: 1.0,
                bullet_color: "#ffe866",
                bullet_size: 3.0,
            },
            WeaponKind::Shotgun => Self {
                damage: 18.0,
                cooldown: 0.75,
                max_ammo: 6,
                reload_time: 2.5,
                bullet_speed: 500.0,
                spread: 0.35,
                pellets: 6,
                bullet_life: 0.5,
                bullet_color: "#ffaa44",
                bullet_size: 4.0,
            },
            WeaponKind::Sniper => Self {
                damage: 90.0,
                cooldown: 1.2,
                max_ammo: 5,
                reload_time: 3.0,
                bullet_speed: 1200.0,
                spread: 0.01,
                pellets: 1,
                bullet_life: 2.0,
                bullet_color: "#88ffff",
                bullet_size: 2.5,
            },
        }
    }
}

/// Magazine, cooldown and reload state of the equipped weapon
#[derive(Debug, Clone, PartialEq)]
pub struct WeaponState {
    pub kind: WeaponKind,
    pub ammo: u32,
    pub max_ammo: u32,
    pub cooldown: f32,
    /// Seconds left on an active reload, zero when idle
    pub reload_timer: f32,
}

impl WeaponState {
    pub fn new(kind: WeaponKind) -> Self {
        let stats = WeaponStats::for_kind(kind);
        Self {
            kind,
            ammo: stats.max_ammo,
            max_ammo: stats.max_ammo,
            cooldown: 0.0,
            reload_timer: 0.0,
        }
    }

    pub fn stats(&self) -> WeaponStats {
        WeaponStats::for_kind(self.kind)
    }

    pub fn is_reloading(&self) -> bool {
        self.reload_timer > 0.0
    }

    /// Advance cooldown and reload timers
    pub fn update(&mut self, dt: f32) {
        self.cooldown = (self.cooldown - dt).max(0.0);
        if self.reload_timer > 0.0 {
            self.reload_timer -= dt;
            if self.reload_timer <= 0.0 {
                self.reload_timer = 0.0;
                self.ammo = self.max_ammo;
            }
        }
    }

    /// Begin a reload unless one is running or the magazine is full
    pub fn start_reload(&mut self) -> bool {
        if self.is_reloading() || self.ammo >= self.max_ammo {
            return false;
        }
        self.reload_timer = self.stats().reload_time;
        true
    }

    /// Spend one round if the weapon is ready. An empty magazine starts a
    /// reload instead of firing.
    pub fn try_fire(&mut self) -> bool {
        if self.cooldown > 0.0 {
            return false;
        }
        if self.ammo == 0 {
            self.start_reload();
            return false;
        }
        self.ammo -= 1;
        self.cooldown = self.stats().cooldown;
        true
    }

    /// Add rounds, never above the magazine size
    pub fn add_ammo(&mut self, rounds: u32) {
        self.ammo = (self.ammo + rounds).min(self.max_ammo);
    }
}

/// Which side fired a bullet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Player,
    Enemy,
}

/// Active bullet in the world
#[derive(Debug, Clone)]
pub struct Bullet {
    pub side: Side,
    /// Firing player, `None` for enemy bullets
    pub owner: Option<PeerId>,
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub damage: f32,
    /// Seconds left before the bullet expires
    pub life: f32,
    pub color: &'static str,
    pub size: f32,
}

impl Bullet {
    /// Bullet fired by an enemy toward `angle`
    pub fn enemy_shot(x: f32, y: f32, angle: f32) -> Self {
        Self {
            side: Side::Enemy,
            owner: None,
            x,
            y,
            vel_x: angle.cos() * ENEMY_BULLET_SPEED,
            vel_y: angle.sin() * ENEMY_BULLET_SPEED,
            damage: ENEMY_BULLET_DAMAGE,
            life: ENEMY_BULLET_LIFE,
            color: ENEMY_BULLET_COLOR,
            size: ENEMY_BULLET_SIZE,
        }
    }

    /// Advance the bullet, returns false once expired
    pub fn update(&mut self, dt: f32) -> bool {
        self.x += self.vel_x * dt;
        self.y += self.vel_y * dt;
        self.life -= dt;
        self.life > 0.0
    }

    /// Check if the bullet center is within `radius` of a target
    pub fn check_hit(&self, target_x: f32, target_y: f32, radius: f32) -> bool {
        PhysicsSystem::distance_sq(self.x, self.y, target_x, target_y) < radius * radius
    }
}

/// Combat system for firing and melee resolution
pub struct CombatSystem;

impl CombatSystem {
    /// Spawn the pellets of one trigger pull. Each pellet deviates by up to
    /// half of `spread` from `angle` and starts at the muzzle.
    pub fn fire_pellets<R: Rng>(
        owner: PeerId,
        x: f32,
        y: f32,
        angle: f32,
        stats: &WeaponStats,
        rng: &mut R,
    ) -> Vec<Bullet> {
        (0..stats.pellets)
            .map(|_| {
                let heading = angle + rng.gen_range(-0.5f32..0.5) * stats.spread;
                Bullet {
                    side: Side::Player,
                    owner: Some(owner),
                    x: x + angle.cos() * MUZZLE_OFFSET,
                    y: y + angle.sin() * MUZZLE_OFFSET,
                    vel_x: heading.cos() * stats.bullet_speed,
                    vel_y: heading.sin() * stats.bullet_speed,
                    damage: stats.damage,
                    life: stats.bullet_life,
                    color: stats.bullet_color,
                    size: stats.bullet_size,
                }
            })
            .collect()
    }

    /// True if a target at `(tx, ty)` is inside the swing arc of an attacker
    /// at `(x, y)` facing `facing`
    pub fn melee_hits(x: f32, y: f32, facing: f32, tx: f32, ty: f32) -> bool {
        let dx = tx - x;
        let dy = ty - y;
        if dx * dx + dy * dy >= MELEE_RANGE * MELEE_RANGE {
            return false;
        }
        let offset = PhysicsSystem::normalize_angle(dy.atan2(dx) - facing);
        offset.abs() < MELEE_HALF_ARC
    }

    /// Apply damage to health, returns (new_health, is_dead)
    pub fn apply_damage(current_health: f32, damage: f32) -> (f32, bool) {
        let new_health = (current_health - damage).max(0.0);
        (new_health, new_health <= 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use uuid::Uuid;

    #[test]
    fn empty_magazine_starts_reload_instead_of_firing() {
        let mut weapon = WeaponState::new(WeaponKind::Pistol);
        weapon.ammo = 0;

        assert!(!weapon.try_fire());
        assert_eq!(weapon.ammo, 0);
        assert!((weapon.reload_timer - 1.5).abs() < 1e-6);

        // Partial progress keeps the magazine empty
        weapon.update(1.0);
        assert_eq!(weapon.ammo, 0);
        assert!(!weapon.try_fire());
        assert!((weapon.reload_timer - 0.5).abs() < 1e-5, "reload must not restart");

        weapon.update(0.6);
        assert_eq!(weapon.ammo, 12);
        assert!(!weapon.is_reloading());
    }

    #[test]
    fn cooldown_gates_consecutive_shots() {
        let mut weapon = WeaponState::new(WeaponKind::Smg);
        assert!(weapon.try_fire());
        assert!(!weapon.try_fire());
        weapon.update(0.1);
        assert!(weapon.try_fire());
        assert_eq!(weapon.ammo, 28);
    }

    #[test]
    fn full_magazine_does_not_reload() {
        let mut weapon = WeaponState::new(WeaponKind::Shotgun);
        assert!(!weapon.start_reload());
        weapon.ammo = 3;
        assert!(weapon.start_reload());
        assert!(!weapon.start_reload());
    }

    #[test]
    fn ammo_stays_within_magazine() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        for kind in WeaponKind::ALL {
            let mut weapon = WeaponState::new(kind);
            for step in 0..2_000 {
                match rng.gen_range(0..4) {
                    0 => {
                        weapon.try_fire();
                    }
                    1 => {
                        weapon.start_reload();
                    }
                    2 => weapon.add_ammo(10),
                    _ => weapon.update(rng.gen_range(0.0..0.05)),
                }
                assert!(weapon.ammo <= weapon.max_ammo, "{kind:?} step {step}");
            }
        }
    }

    #[test]
    fn shotgun_fires_six_pellets_within_spread() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let stats = WeaponStats::for_kind(WeaponKind::Shotgun);
        let owner = Uuid::new_v4();
        let mut widest = 0.0f32;
        for _ in 0..200 {
            let pellets = CombatSystem::fire_pellets(owner, 0.0, 0.0, 0.0, &stats, &mut rng);
            assert_eq!(pellets.len(), 6);
            for bullet in &pellets {
                assert_eq!(bullet.side, Side::Player);
                assert!((bullet.x - MUZZLE_OFFSET).abs() < 1e-4);
                widest = widest.max(bullet.vel_y.atan2(bullet.vel_x).abs());
            }
        }
        // The cone is `spread` wide in total, half on each side of the aim
        assert!(widest <= stats.spread / 2.0 + 1e-4, "widest {widest}");
        assert!(widest > stats.spread / 4.0, "widest {widest}");
    }

    #[test]
    fn melee_arc_excludes_targets_behind() {
        assert!(CombatSystem::melee_hits(0.0, 0.0, 0.0, 50.0, 10.0));
        assert!(!CombatSystem::melee_hits(0.0, 0.0, 0.0, -50.0, 0.0));
        assert!(!CombatSystem::melee_hits(0.0, 0.0, 0.0, 80.0, 0.0));
    }

    #[test]
    fn bullet_expires_after_life() {
        let mut bullet = Bullet::enemy_shot(0.0, 0.0, 0.0);
        let mut frames = 0;
        while bullet.update(0.25) {
            frames += 1;
        }
        assert_eq!(frames, 6);
        assert!(bullet.x > 0.0);
    }
}
