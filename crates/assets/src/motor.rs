use serde::{Deserialize, Serialize};
use worldquat_kernel::{Asset, Capability, NodeContext};
use worldquat_math::{DVec3, Transform, Vec3Ext};

/// Frame in which translation intent is applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotionSpace {
    /// Along the host entity's own axes.
    #[default]
    Local,
    /// Along world axes.
    World,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotorConfig {
    /// Units per second for a unit move intent.
    pub linear_speed: f64,
    /// Radians per second for a unit turn intent.
    pub angular_speed: f64,
    pub space: MotionSpace,
    /// Yaw about world +Y instead of local +Y.
    pub world_up_yaw: bool,
    pub clear_intent_each_frame: bool,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            linear_speed: 3.0,
            angular_speed: 1.8,
            space: MotionSpace::Local,
            world_up_yaw: false,
            clear_intent_each_frame: true,
        }
    }
}

/// Accumulated requests. Axes: x = right / pitch, y = up / yaw, z = forward / roll.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotorIntent {
    /// Unitless translation, scaled by `linear_speed * dt`.
    pub translate: DVec3,
    /// Unitless turn, scaled by `angular_speed * dt`.
    pub turn: DVec3,
    /// Turn in radians, applied as-is.
    pub turn_rad: DVec3,
}

/// Moves and turns its host entity from accumulated intent.
#[derive(Debug, Clone, Default)]
pub struct Motor {
    pub config: MotorConfig,
    intent: MotorIntent,
}

impl Motor {
    pub fn new(config: MotorConfig) -> Self {
        Self {
            config,
            intent: MotorIntent::default(),
        }
    }

    pub fn intent(&self) -> &MotorIntent {
        &self.intent
    }

    /// Request movement: `dx` right, `dy` up, `dz` forward.
    pub fn add_move(&mut self, dx: f64, dy: f64, dz: f64) {
        self.intent.translate.add_in_place(DVec3::new(dx, dy, dz));
    }

    /// Request a unitless turn about local X (pitch), Y (yaw), Z (roll).
    pub fn add_turn(&mut self, pitch: f64, yaw: f64, roll: f64) {
        self.intent.turn.add_in_place(DVec3::new(pitch, yaw, roll));
    }

    pub fn add_turn_radians(&mut self, pitch: f64, yaw: f64, roll: f64) {
        self.intent.turn_rad.add_in_place(DVec3::new(pitch, yaw, roll));
    }

    pub fn zero_intent(&mut self) {
        self.intent = MotorIntent::default();
    }

    /// Apply the pending intent to `host` over `dt` seconds.
    pub fn apply(&mut self, dt: f64, host: &mut Transform) {
        let mv = self.intent.translate;
        if mv != DVec3::ZERO {
            let step = mv * (self.config.linear_speed * dt);
            match self.config.space {
                MotionSpace::Local => host.translate_local(step),
                MotionSpace::World => host.pos += step,
            }
        }

        let scaled = self.intent.turn * (self.config.angular_speed * dt);
        self.turn(host, scaled);
        self.turn(host, self.intent.turn_rad);

        if self.config.clear_intent_each_frame {
            self.zero_intent();
        }
    }

    /// Pitch, then roll, then yaw.
    fn turn(&self, host: &mut Transform, r: DVec3) {
        if r.x != 0.0 {
            host.rotate_around_local(DVec3::X, r.x);
        }
        if r.z != 0.0 {
            host.rotate_around_local(DVec3::Z, r.z);
        }
        if r.y != 0.0 {
            if self.config.world_up_yaw {
                host.rotate_around_world(DVec3::Y, r.y);
            } else {
                host.rotate_around_local(DVec3::Y, r.y);
            }
        }
    }
}

impl Asset for Motor {
    fn kind(&self) -> &str {
        "motor"
    }

    fn capabilities(&self) -> Vec<Capability> {
        vec![Capability::MOTOR]
    }

    fn update(&mut self, dt: f64, node: &mut NodeContext<'_>) {
        let host = node.host_entity().and_then(|e| node.local_mut_of(e));
        match host {
            Some(pose) => self.apply(dt, pose),
            None if self.config.clear_intent_each_frame => self.zero_intent(),
            None => {}
        }
    }
}
