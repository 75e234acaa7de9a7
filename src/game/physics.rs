//! Circle-vs-tile movement and shared geometry helpers

use super::world::{TileCoord, World};

/// Which axes of a requested move were applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Full,
    XOnly,
    YOnly,
    Blocked,
}

/// Physics system for moving circular bodies through the tile grid
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// True if any of the four axis-aligned probe points of the circle lies in
    /// a solid tile. Probes sit one unit inside the radius.
    pub fn circle_blocked(world: &mut World, x: f32, y: f32, radius: f32) -> bool {
        let r = radius - 1.0;
        [(x - r, y), (x + r, y), (x, y - r), (x, y + r)]
            .into_iter()
            .any(|(px, py)| world.is_solid(TileCoord::containing(px, py)))
    }

    /// Move a circle by `(dx, dy)`, sliding along walls: the full move is tried
    /// first, then X only, then Y only. Position is untouched when all fail.
    pub fn move_circle(
        world: &mut World,
        x: &mut f32,
        y: &mut f32,
        dx: f32,
        dy: f32,
        radius: f32,
    ) -> MoveOutcome {
        if !Self::circle_blocked(world, *x + dx, *y + dy, radius) {
            *x += dx;
            *y += dy;
            MoveOutcome::Full
        } else if !Self::circle_blocked(world, *x + dx, *y, radius) {
            *x += dx;
            MoveOutcome::XOnly
        } else if !Self::circle_blocked(world, *x, *y + dy, radius) {
            *y += dy;
            MoveOutcome::YOnly
        } else {
            MoveOutcome::Blocked
        }
    }

    /// Strict circle overlap test
    pub fn circles_overlap(x1: f32, y1: f32, r1: f32, x2: f32, y2: f32, r2: f32) -> bool {
        Self::distance_sq(x1, y1, x2, y2) < (r1 + r2) * (r1 + r2)
    }

    pub fn distance_sq(x1: f32, y1: f32, x2: f32, y2: f32) -> f32 {
        let dx = x2 - x1;
        let dy = y2 - y1;
        dx * dx + dy * dy
    }

    pub fn distance(x1: f32, y1: f32, x2: f32, y2: f32) -> f32 {
        Self::distance_sq(x1, y1, x2, y2).sqrt()
    }

    /// Wrap an angle into `(-π, π]`
    pub fn normalize_angle(angle: f32) -> f32 {
        use std::f32::consts::{PI, TAU};
        let wrapped = (angle + PI).rem_euclid(TAU) - PI;
        if wrapped <= -PI {
            wrapped + TAU
        } else {
            wrapped
        }
    }

    /// Distance from a point to the center of a tile
    pub fn distance_to_tile(x: f32, y: f32, tile: TileCoord) -> f32 {
        let (cx, cy) = tile.center();
        Self::distance(x, y, cx, cy)
    }
}
