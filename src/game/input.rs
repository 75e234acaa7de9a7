//! Player intent: raw input frames, latched local controls and staged input

use serde::{Deserialize, Serialize};

use super::combat::WeaponKind;
use super::world::TileCoord;

/// One frame of abstract input, as produced by whatever device drives a player
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputFrame {
    pub move_x: f32,
    pub move_y: f32,
    /// World-space aim angle in radians
    pub aim_angle: f32,
    /// Tile under the cursor
    pub target_tile: TileCoord,
    /// Trigger held
    pub shoot: bool,
    /// Edge: melee pressed this frame
    pub melee: bool,
    /// Edge: reload pressed this frame
    pub reload: bool,
    /// Edge: build mode toggled this frame
    pub toggle_build: bool,
    /// Edge: primary action pressed this frame (wall placement in build mode)
    pub primary: bool,
    /// Edge: secondary action pressed this frame (wall removal in build mode)
    pub secondary: bool,
    /// Edge: weapon selected this frame
    pub switch_weapon: Option<WeaponKind>,
}

/// Capability that yields the local player's input once per frame
pub trait InputSource: Send {
    fn sample(&mut self) -> InputFrame;
}

/// Input source that never does anything
#[derive(Debug, Default, Clone, Copy)]
pub struct IdleInput;

impl InputSource for IdleInput {
    fn sample(&mut self) -> InputFrame {
        InputFrame::default()
    }
}

/// Per-player input as staged on the host for the next tick.
///
/// Movement, aim, shoot and build mode are levels. Melee, reload, wall
/// placement/removal and weapon switching are one-shot actions cleared by the
/// tick that consumes them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagedInput {
    pub move_x: f32,
    pub move_y: f32,
    pub angle: f32,
    pub shoot: bool,
    pub melee: bool,
    pub reload: bool,
    pub build_mode: bool,
    pub place_wall: bool,
    pub remove_wall: bool,
    pub target: TileCoord,
    pub switch_weapon: Option<WeaponKind>,
}

impl StagedInput {
    /// Clamp untrusted values so the simulation never sees NaN or boosted
    /// movement
    pub fn sanitized(mut self) -> Self {
        if !self.move_x.is_finite() || !self.move_y.is_finite() {
            self.move_x = 0.0;
            self.move_y = 0.0;
        }
        let len = (self.move_x * self.move_x + self.move_y * self.move_y).sqrt();
        if len > 1.0 {
            self.move_x /= len;
            self.move_y /= len;
        }
        if !self.angle.is_finite() {
            self.angle = 0.0;
        }
        self
    }

    /// Drop the one-shot actions after a tick consumed them
    pub fn clear_actions(&mut self) {
        self.melee = false;
        self.reload = false;
        self.place_wall = false;
        self.remove_wall = false;
        self.switch_weapon = None;
    }
}

/// Latches build mode across frames and turns raw frames into staged input
#[derive(Debug, Default, Clone)]
pub struct LocalControls {
    build_mode: bool,
}

impl LocalControls {
    pub fn build_mode(&self) -> bool {
        self.build_mode
    }

    pub fn stage(&mut self, frame: &InputFrame) -> StagedInput {
        if frame.toggle_build {
            self.build_mode = !self.build_mode;
        }
        StagedInput {
            move_x: frame.move_x,
            move_y: frame.move_y,
            angle: frame.aim_angle,
            shoot: frame.shoot && !self.build_mode,
            melee: frame.melee,
            reload: frame.reload,
            build_mode: self.build_mode,
            place_wall: self.build_mode && frame.primary,
            remove_wall: self.build_mode && frame.secondary,
            target: frame.target_tile,
            switch_weapon: frame.switch_weapon,
        }
        .sanitized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_mode_gates_shooting_and_walls() {
        let mut controls = LocalControls::default();
        let frame = InputFrame {
            shoot: true,
            primary: true,
            ..Default::default()
        };
        let staged = controls.stage(&frame);
        assert!(staged.shoot);
        assert!(!staged.place_wall);

        let toggle = InputFrame {
            toggle_build: true,
            ..frame.clone()
        };
        let staged = controls.stage(&toggle);
        assert!(staged.build_mode);
        assert!(!staged.shoot);
        assert!(staged.place_wall);

        // Stays latched without another toggle
        assert!(controls.stage(&frame).build_mode);
    }

    #[test]
    fn sanitize_caps_movement_and_rejects_nan() {
        let staged = StagedInput {
            move_x: 3.0,
            move_y: 4.0,
            angle: f32::NAN,
            ..Default::default()
        }
        .sanitized();
        assert!((staged.move_x - 0.6).abs() < 1e-6);
        assert!((staged.move_y - 0.8).abs() < 1e-6);
        assert_eq!(staged.angle, 0.0);

        let nan = StagedInput {
            move_x: f32::INFINITY,
            ..Default::default()
        }
        .sanitized();
        assert_eq!((nan.move_x, nan.move_y), (0.0, 0.0));
    }
}
