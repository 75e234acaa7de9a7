//! Item drops: ammo, health and weapons

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::combat::WeaponKind;

/// Seconds before an uncollected pickup despawns
pub const PICKUP_LIFETIME: f32 = 20.0;
/// Collection radius around a pickup
pub const PICKUP_RADIUS: f32 = 24.0;

const AMMO_DROP_CHANCE: f32 = 0.35;
const HEALTH_DROP_CHANCE: f32 = 0.15;
const WEAPON_DROP_CHANCE: f32 = 0.04;

/// Weapons that can drop; the pistol never does
const DROPPABLE_WEAPONS: [WeaponKind; 3] =
    [WeaponKind::Smg, WeaponKind::Shotgun, WeaponKind::Sniper];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PickupKind {
    Ammo,
    Health,
    Weapon { weapon: WeaponKind },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pickup {
    pub x: f32,
    pub y: f32,
    pub kind: PickupKind,
    pub bob: f32,
    /// Seconds left before despawn
    pub life: f32,
}

impl Pickup {
    pub fn new<R: Rng>(x: f32, y: f32, kind: PickupKind, rng: &mut R) -> Self {
        Self {
            x,
            y,
            kind,
            bob: rng.gen::<f32>() * std::f32::consts::TAU,
            life: PICKUP_LIFETIME,
        }
    }

    /// Advance bob and lifetime; false once expired
    pub fn update(&mut self, dt: f32) -> bool {
        self.bob += dt * 3.0;
        self.life -= dt;
        self.life > 0.0
    }

    pub fn in_reach(&self, x: f32, y: f32) -> bool {
        let dx = x - self.x;
        let dy = y - self.y;
        dx * dx + dy * dy <= PICKUP_RADIUS * PICKUP_RADIUS
    }
}

/// Roll the drops for an enemy killed at `(x, y)`. A single roll decides ammo
/// and health, so a health drop always comes with ammo; weapons roll apart.
pub fn roll_drops<R: Rng>(x: f32, y: f32, rng: &mut R) -> Vec<Pickup> {
    let mut drops = Vec::new();
    let roll: f32 = rng.gen();
    if roll < AMMO_DROP_CHANCE {
        drops.push(Pickup::new(x, y, PickupKind::Ammo, rng));
    }
    if roll < HEALTH_DROP_CHANCE {
        drops.push(Pickup::new(x, y, PickupKind::Health, rng));
    }
    if rng.gen::<f32>() < WEAPON_DROP_CHANCE {
        if let Some(&weapon) = DROPPABLE_WEAPONS.choose(rng) {
            drops.push(Pickup::new(x, y, PickupKind::Weapon { weapon }, rng));
        }
    }
    drops
}
