use serde::{Deserialize, Serialize};
use worldquat_kernel::{Asset, Capability, NodeContext};
use worldquat_math::{Transform, nlerp};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub name: String,
    /// Overrides the render camera's zoom while this feed is active.
    pub zoom: Option<f64>,
    pub near: Option<f64>,
    /// Position smoothing time constant in seconds; 0 snaps.
    pub lag_pos: f64,
    /// Rotation smoothing time constant in seconds; 0 snaps.
    pub lag_rot: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            name: "Camera".to_string(),
            zoom: None,
            near: None,
            lag_pos: 0.0,
            lag_rot: 0.0,
        }
    }
}

/// Camera feed mounted on an entity. Keeps a smoothed copy of its mounted
/// world pose.
#[derive(Debug, Clone, Default)]
pub struct Camera {
    pub config: CameraConfig,
    view: Option<Transform>,
}

/// Fraction of the remaining distance covered in `dt` with time constant `lag`.
fn blend(dt: f64, lag: f64) -> f64 {
    if lag <= 0.0 { 1.0 } else { 1.0 - (-dt / lag).exp() }
}

impl Camera {
    pub fn new(config: CameraConfig) -> Self {
        Self { config, view: None }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::new(CameraConfig {
            name: name.into(),
            ..CameraConfig::default()
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Smoothed view pose. Identity until the first update.
    pub fn view_transform(&self) -> Transform {
        self.view.unwrap_or_default()
    }

    /// The smoothed view, when this feed smooths at all and has been updated.
    pub fn lagged_view(&self) -> Option<Transform> {
        let lagged = self.config.lag_pos > 0.0 || self.config.lag_rot > 0.0;
        self.view.filter(|_| lagged)
    }

    /// Move the smoothed view toward `target` over `dt` seconds.
    pub fn follow(&mut self, target: Transform, dt: f64) {
        let Some(view) = self.view.as_mut() else {
            self.view = Some(target);
            return;
        };
        if dt <= 0.0 {
            return;
        }
        let a = blend(dt, self.config.lag_pos);
        view.pos = view.pos.lerp(target.pos, a);
        let b = blend(dt, self.config.lag_rot);
        view.rot = nlerp(view.rot, target.rot, b);
    }
}

impl Asset for Camera {
    fn kind(&self) -> &str {
        "camera"
    }

    fn capabilities(&self) -> Vec<Capability> {
        vec![Capability::CAMERA_FEED]
    }

    fn update(&mut self, dt: f64, node: &mut NodeContext<'_>) {
        let target = node.world_transform();
        self.follow(target, dt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_3};
    use worldquat_common::NodeId;
    use worldquat_kernel::{MountConfig, NodeSpec, World};
    use worldquat_math::{DQuat, DVec3, QuatExt, from_axis_angle};

    fn approx_vec(a: DVec3, b: DVec3, eps: f64) -> bool {
        (a - b).abs().max_element() <= eps
    }

    fn approx_quat(a: DQuat, b: DQuat, eps: f64) -> bool {
        (a - b).length() <= eps || (a + b).length() <= eps
    }

    fn mounted(cfg: CameraConfig, at: DVec3) -> (World, NodeId, NodeId) {
        let mut w = World::new();
        let e = w.spawn(NodeSpec::new("rig").at(at));
        w.add_mount(e, MountConfig::new("cam")).unwrap();
        let cam = w.create_node(NodeSpec::asset(Camera::new(cfg)));
        w.fit_asset(e, &"cam".into(), cam).unwrap();
        (w, e, cam)
    }

    #[test]
    fn no_lag_snaps_to_mounted_pose() {
        let (mut w, _, cam) = mounted(CameraConfig::default(), DVec3::new(10.0, -5.0, 2.0));
        w.step(0.016, None);
        let t = w.asset::<Camera>(cam).unwrap().view_transform();
        assert_eq!(t.pos, DVec3::new(10.0, -5.0, 2.0));
        assert_eq!(t.rot, DQuat::IDENTITY);
    }

    #[test]
    fn lag_converges_on_moved_host() {
        let cfg = CameraConfig {
            lag_pos: 0.2,
            lag_rot: 0.2,
            ..CameraConfig::default()
        };
        let (mut w, rig, cam) = mounted(cfg, DVec3::ZERO);
        w.step(0.016, None);

        let target_pos = DVec3::new(3.0, -4.0, 2.0);
        let target_rot = from_axis_angle(DVec3::Y, FRAC_PI_3);
        *w.local_mut(rig).unwrap() = Transform::new(target_pos, target_rot);

        w.step(0.05, None);
        let first = w.asset::<Camera>(cam).unwrap().view_transform();
        assert!(first.pos.distance(target_pos) > 0.5);

        for _ in 0..29 {
            w.step(0.05, None);
        }
        let t = w.asset::<Camera>(cam).unwrap().view_transform();
        assert!(approx_vec(t.pos, target_pos, 1e-2));
        assert!(approx_quat(t.rot, target_rot, 1e-3));
        assert!(t.rot.is_canonical());
    }

    #[test]
    fn lagged_view_only_for_smoothing_feeds() {
        let mut snap = Camera::default();
        snap.follow(Transform::from_position(DVec3::X), 0.016);
        assert_eq!(snap.lagged_view(), None);

        let mut smooth = Camera::new(CameraConfig {
            lag_rot: 0.1,
            ..CameraConfig::default()
        });
        assert_eq!(smooth.lagged_view(), None);
        smooth.follow(Transform::from_position(DVec3::X), 0.016);
        assert_eq!(smooth.lagged_view(), Some(Transform::from_position(DVec3::X)));
    }

    #[test]
    fn zero_dt_keeps_view() {
        let mut c = Camera::new(CameraConfig {
            lag_pos: 0.2,
            lag_rot: 0.2,
            ..CameraConfig::default()
        });
        c.follow(Transform::from_position(DVec3::new(1.0, 2.0, 3.0)), 0.016);
        let before = c.view_transform();
        let moved = Transform::new(DVec3::new(9.0, 8.0, 7.0), from_axis_angle(DVec3::Z, FRAC_PI_2));
        c.follow(moved, 0.0);
        assert_eq!(c.view_transform(), before);
    }

    #[test]
    fn advertises_camera_feed() {
        let c = Camera::named("Chase");
        assert_eq!(c.kind(), "camera");
        assert_eq!(c.name(), "Chase");
        assert_eq!(c.capabilities(), vec![Capability::CAMERA_FEED]);
        assert_eq!(c.view_transform(), Transform::IDENTITY);
    }
}
