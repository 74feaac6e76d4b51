use serde::{Deserialize, Serialize};
use worldquat_kernel::{Asset, Capability, NodeContext};
use worldquat_math::DVec3;

use crate::motor::Motor;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Per-axis turn limit in radians per second. The sign is ignored.
    pub turn_rate: f64,
    /// Errors below this many radians are ignored.
    pub deadband: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            turn_rate: 0.8,
            deadband: 0.0005,
        }
    }
}

/// Steers its host entity toward a world point by feeding turn requests
/// to the host's first motor.
#[derive(Debug, Clone, Default)]
pub struct Tracker {
    pub config: TrackerConfig,
    target: Option<DVec3>,
}

impl Tracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            target: None,
        }
    }

    pub fn target(&self) -> Option<DVec3> {
        self.target
    }

    pub fn set_target(&mut self, point: DVec3) {
        self.target = Some(point);
    }

    pub fn clear_target(&mut self) {
        self.target = None;
    }

    /// Pitch and yaw errors in radians toward `local`, a target expressed in
    /// the host's frame. Forward is +Z.
    pub fn aim_error(local: DVec3) -> (f64, f64) {
        let yaw = local.x.atan2(local.z);
        let pitch = (-local.y).atan2(local.x.hypot(local.z));
        (pitch, yaw)
    }

    /// Turn to request this frame, after deadband and rate clamp.
    /// `None` when both axes fall inside the deadband.
    pub fn turn_step(&self, local: DVec3, dt: f64) -> Option<(f64, f64)> {
        let (pitch, yaw) = Self::aim_error(local);
        let band = |e: f64| if e.abs() < self.config.deadband { 0.0 } else { e };
        let (pitch, yaw) = (band(pitch), band(yaw));
        if pitch == 0.0 && yaw == 0.0 {
            return None;
        }
        let max = (self.config.turn_rate * dt).abs();
        let limit = |e: f64| e.max(-max).min(max);
        Some((limit(pitch), limit(yaw)))
    }
}

impl Asset for Tracker {
    fn kind(&self) -> &str {
        "tracker"
    }

    fn capabilities(&self) -> Vec<Capability> {
        vec![Capability::TRACKER]
    }

    fn update(&mut self, dt: f64, node: &mut NodeContext<'_>) {
        let Some(target) = self.target else { return };
        if dt <= 0.0 {
            return;
        }
        let Some(host) = node.host_entity() else { return };
        let Some(pose) = node.world_transform_of(host) else { return };
        let Some(motor) = node.graph().find_first_asset_by_kind(host, "motor") else {
            return;
        };

        let local = pose.inverse_transform_point(target);
        if let Some((dpitch, dyaw)) = self.turn_step(local, dt) {
            if let Some(m) = node.asset_mut::<Motor>(motor) {
                m.add_turn_radians(dpitch, dyaw, 0.0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;
    use worldquat_common::NodeId;
    use worldquat_kernel::{MountConfig, NodeSpec, World};
    use worldquat_math::{Transform, from_axis_angle};

    struct Rig {
        world: World,
        body: NodeId,
        motor: NodeId,
        tracker: NodeId,
    }

    fn rig(cfg: TrackerConfig) -> Rig {
        let mut world = World::new();
        let body = world.spawn(NodeSpec::new("cube"));
        world.add_mount(body, MountConfig::new("motor")).unwrap();
        world.add_mount(body, MountConfig::new("aim")).unwrap();
        let motor = world.create_node(NodeSpec::asset(Motor::default()));
        let tracker = world.create_node(NodeSpec::asset(Tracker::new(cfg)));
        world.fit_asset(body, &"motor".into(), motor).unwrap();
        world.fit_asset(body, &"aim".into(), tracker).unwrap();
        Rig {
            world,
            body,
            motor,
            tracker,
        }
    }

    /// Run only the tracker and report what it asked of the motor.
    fn requested(r: &mut Rig, dt: f64) -> DVec3 {
        r.world.with_asset::<Tracker, _>(r.tracker, |t, ctx| t.update(dt, ctx));
        r.world.asset::<Motor>(r.motor).unwrap().intent().turn_rad
    }

    fn aim_at(r: &mut Rig, p: DVec3) {
        r.world.asset_mut::<Tracker>(r.tracker).unwrap().set_target(p);
    }

    #[test]
    fn straight_ahead_requests_nothing() {
        let mut r = rig(TrackerConfig {
            turn_rate: 1.0,
            ..TrackerConfig::default()
        });
        aim_at(&mut r, DVec3::new(0.0, 0.0, 10.0));
        assert_eq!(requested(&mut r, 0.1), DVec3::ZERO);
    }

    #[test]
    fn yaw_is_clamped_to_rate() {
        let mut r = rig(TrackerConfig {
            turn_rate: 1.0,
            deadband: 0.0,
        });
        aim_at(&mut r, DVec3::new(10.0, 0.0, 10.0));
        let turn = requested(&mut r, 0.1);
        assert!(turn.x.abs() < 1e-12);
        assert!((turn.y - 0.1).abs() < 1e-12);
        assert_eq!(turn.z, 0.0);
    }

    #[test]
    fn target_above_pitches_negative() {
        let mut r = rig(TrackerConfig {
            turn_rate: 10.0,
            deadband: 0.0,
        });
        aim_at(&mut r, DVec3::new(0.0, 1.0, 1.0));
        let turn = requested(&mut r, 1.0);
        assert!((turn.x + std::f64::consts::FRAC_PI_4).abs() < 1e-12);
        assert!(turn.y.abs() < 1e-12);
    }

    #[test]
    fn deadband_suppresses_small_errors() {
        let mut r = rig(TrackerConfig {
            turn_rate: 1.0,
            deadband: 0.01,
        });
        aim_at(&mut r, DVec3::new(0.001, 0.0, 1.0));
        assert_eq!(requested(&mut r, 0.1), DVec3::ZERO);
    }

    #[test]
    fn error_is_taken_in_host_frame() {
        let mut r = rig(TrackerConfig {
            turn_rate: 5.0,
            deadband: 0.0,
        });
        // Facing +X, so a target on +X is dead ahead.
        *r.world.local_mut(r.body).unwrap() =
            Transform::from_rotation(from_axis_angle(DVec3::Y, FRAC_PI_2));
        aim_at(&mut r, DVec3::new(5.0, 0.0, 0.0));
        let turn = requested(&mut r, 0.1);
        assert!(turn.length() < 1e-9);
    }

    #[test]
    fn idle_without_target_or_time() {
        let mut r = rig(TrackerConfig::default());
        assert_eq!(requested(&mut r, 0.1), DVec3::ZERO);
        aim_at(&mut r, DVec3::new(10.0, 0.0, 0.0));
        assert_eq!(requested(&mut r, 0.0), DVec3::ZERO);
        r.world.asset_mut::<Tracker>(r.tracker).unwrap().clear_target();
        assert_eq!(r.world.asset::<Tracker>(r.tracker).unwrap().target(), None);
    }

    #[test]
    fn negative_rate_limits_by_magnitude() {
        let t = Tracker::new(TrackerConfig {
            turn_rate: -0.5,
            deadband: 0.0,
        });
        let (pitch, yaw) = t.turn_step(DVec3::new(1.0, 0.0, 1.0), 0.016).unwrap();
        assert!(pitch.abs() < 1e-12);
        assert!((yaw - 0.008).abs() < 1e-12);
    }

    #[test]
    fn zero_rate_requests_no_turn() {
        let t = Tracker::new(TrackerConfig {
            turn_rate: 0.0,
            ..TrackerConfig::default()
        });
        assert_eq!(t.turn_step(DVec3::new(-3.0, 2.0, 1.0), 0.1), Some((0.0, 0.0)));
    }

    #[test]
    fn negative_rate_from_json_survives_frames() {
        let cfg: TrackerConfig = serde_json::from_str(r#"{"turn_rate": -1.0}"#).unwrap();
        assert_eq!(cfg.deadband, 0.0005);
        let mut r = rig(cfg);
        aim_at(&mut r, DVec3::new(10.0, 0.0, 0.0));
        for _ in 0..10 {
            r.world.step(0.05, None);
        }
        let pose = r.world.world_transform(r.body).unwrap();
        assert!(pose.rot.is_finite());
        assert!(pose.forward().x > 0.0);
    }

    #[test]
    fn full_frames_turn_host_toward_target() {
        let mut r = rig(TrackerConfig::default());
        let target = DVec3::new(10.0, 0.0, 0.0);
        aim_at(&mut r, target);
        for _ in 0..200 {
            r.world.step(0.05, None);
        }
        let pose = r.world.world_transform(r.body).unwrap();
        let ahead = pose.forward().dot((target - pose.pos).normalize());
        assert!(ahead > 0.999, "forward·dir = {ahead}");
    }
}
