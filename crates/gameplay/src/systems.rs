use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::{debug, info};
use worldquat_assets::{Camera, Lens};
use worldquat_common::{NodeId, PlayerId};
use worldquat_kernel::{EventKind, EventPayload, System, World};
use worldquat_math::{DVec3, Transform, shortest_arc_step};

use crate::controllers::TRACK_ENABLED;
use crate::tuning::Tuning;

/// Stand-in for a zero `dt` when estimating velocity.
const MIN_DT: f64 = 1e-6;

/// Pre-system: puts the render camera where the active camera feed is,
/// and applies the feed's zoom and near overrides. Idle in free-camera mode.
///
/// Feeds with lag are followed through their smoothed view, which was
/// updated in the previous frame's node pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct CameraFollowSystem;

impl System for CameraFollowSystem {
    fn step(&mut self, world: &mut World, _dt: f64) {
        let view = *world.view();
        if !view.follow {
            return;
        }
        let (Some(active), Some(render)) = (view.active_camera, view.render_camera) else {
            return;
        };
        let feed = world.asset::<Camera>(active);
        let overrides = feed.map(|c| (c.config.zoom, c.config.near));
        let Some(pose) = feed
            .and_then(Camera::lagged_view)
            .or_else(|| world.world_transform(active))
        else {
            return;
        };

        if let Some(local) = world.local_mut(render) {
            *local = pose;
        }
        if let (Some((zoom, near)), Some(lens)) = (overrides, world.asset_mut::<Lens>(render)) {
            if let Some(z) = zoom {
                lens.config.zoom = z;
            }
            if let Some(n) = near {
                lens.config.near = n;
            }
        }
    }
}

/// Turns an entity to face the free camera, leading its motion.
///
/// Camera velocity is estimated every frame, but the entity only turns while
/// `trackEnabled` is on, the view is not following a feed, and the active
/// feed is not one of the entity's own cameras.
#[derive(Debug, Clone)]
pub struct TrackingSystem {
    entity: NodeId,
    tune: Tuning,
    prev_cam_pos: Option<DVec3>,
    cam_vel: DVec3,
}

impl TrackingSystem {
    pub fn new(entity: NodeId, tune: Tuning) -> Self {
        Self {
            entity,
            tune,
            prev_cam_pos: None,
            cam_vel: DVec3::ZERO,
        }
    }

    pub fn camera_velocity(&self) -> DVec3 {
        self.cam_vel
    }

    fn self_view(&self, world: &World, active: Option<NodeId>) -> bool {
        active.is_some_and(|cam| world.graph().root_of(cam) == Some(self.entity))
    }
}

impl System for TrackingSystem {
    fn step(&mut self, world: &mut World, dt: f64) {
        let view = *world.view();
        let Some(cam_pos) = view
            .render_camera
            .and_then(|c| world.world_transform(c))
            .map(|t| t.pos)
        else {
            return;
        };

        let prev = self.prev_cam_pos.replace(cam_pos).unwrap_or(cam_pos);
        let h = if dt == 0.0 { MIN_DT } else { dt };
        self.cam_vel = (cam_pos - prev) / h;

        if !world.input().toggle(TRACK_ENABLED) || view.follow {
            return;
        }
        if self.self_view(world, view.active_camera) {
            return;
        }

        let target = cam_pos + self.cam_vel * self.tune.lead_time;
        let Some(pose) = world.local_mut(self.entity) else {
            return;
        };
        pose.rot = shortest_arc_step(
            pose.rot,
            DVec3::Z,
            target - pose.pos,
            self.tune.max_tracking_turn_rate * dt,
            DVec3::Y,
            self.tune.roll_stabilize * dt,
        );
    }
}

/// Keeps `follower`'s local pose at `offset` from `leader`'s local pose.
#[derive(Debug, Clone)]
pub struct AssetFollowerSystem {
    leader: NodeId,
    follower: NodeId,
    offset: Transform,
}

impl AssetFollowerSystem {
    pub fn new(leader: NodeId, follower: NodeId, offset: Transform) -> Self {
        Self {
            leader,
            follower,
            offset,
        }
    }
}

impl System for AssetFollowerSystem {
    fn step(&mut self, world: &mut World, _dt: f64) {
        let Some(lead) = world.graph().get(self.leader).map(|n| n.local) else {
            return;
        };
        if let Some(local) = world.local_mut(self.follower) {
            *local = lead.compose(&self.offset);
        }
    }
}

/// Per-owner weapon counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShotStats {
    pub shots: u64,
    pub dry_fires: u64,
}

/// Shared tally, keyed by the firing entity's owner (`None` for unowned).
pub type ShotTally = Rc<RefCell<BTreeMap<Option<PlayerId>, ShotStats>>>;

/// Post-system: consumes `weapon_fired` and `weapon_empty` each frame.
#[derive(Debug, Clone, Default)]
pub struct WeaponEventsSystem {
    tally: ShotTally,
}

impl WeaponEventsSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle that stays readable after the system is handed to the world.
    pub fn tally(&self) -> ShotTally {
        Rc::clone(&self.tally)
    }
}

fn owner_of(payload: &EventPayload) -> Option<PlayerId> {
    match payload {
        EventPayload::Weapon { owner, .. } => *owner,
        _ => None,
    }
}

impl System for WeaponEventsSystem {
    fn step(&mut self, world: &mut World, _dt: f64) {
        let fired = world.drain_events(&EventKind::WeaponFired);
        let empty = world.drain_events(&EventKind::WeaponEmpty);
        if fired.is_empty() && empty.is_empty() {
            return;
        }

        let mut tally = self.tally.borrow_mut();
        for ev in &fired {
            if let EventPayload::Weapon {
                weapon,
                transform,
                ammo,
                ..
            } = &ev.payload
            {
                info!(%weapon, pos = ?transform.pos, ammo, "weapon fired");
            }
            tally.entry(owner_of(&ev.payload)).or_default().shots += 1;
        }
        for ev in &empty {
            debug!(source = ?ev.source, "weapon empty");
            tally.entry(owner_of(&ev.payload)).or_default().dry_fires += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;
    use worldquat_assets::{CameraConfig, Weapon, WeaponConfig};
    use worldquat_input::InputSnapshot;
    use worldquat_kernel::{MountConfig, NodeSpec};
    use worldquat_math::{DQuat, QuatExt, from_axis_angle};

    fn approx_vec(a: DVec3, b: DVec3, eps: f64) -> bool {
        (a - b).abs().max_element() <= eps
    }

    fn approx_quat(a: DQuat, b: DQuat, eps: f64) -> bool {
        (a - b).length() <= eps || (a + b).length() <= eps
    }

    fn fit(world: &mut World, host: NodeId, mount: MountConfig, spec: NodeSpec) -> NodeId {
        let id = mount.id.clone();
        world.add_mount(host, mount).unwrap();
        let node = world.create_node(spec);
        world.fit_asset(host, &id, node).unwrap();
        node
    }

    fn with_render_camera(world: &mut World) -> NodeId {
        let cam = world.spawn(NodeSpec::asset(Lens::default()));
        world.view_mut().render_camera = Some(cam);
        cam
    }

    #[test]
    fn follow_copies_pose_and_lens_overrides() {
        let mut w = World::new();
        let render = with_render_camera(&mut w);
        let rig = w.spawn(NodeSpec::new("rig").at(DVec3::new(0.0, 0.0, 5.0)));
        let offset = Transform::new(DVec3::new(0.0, 1.0, -2.0), from_axis_angle(DVec3::Y, FRAC_PI_2));
        let cam = fit(
            &mut w,
            rig,
            MountConfig::new("chase").offset(offset),
            NodeSpec::asset(Camera::new(CameraConfig {
                zoom: Some(900.0),
                ..CameraConfig::default()
            })),
        );
        w.view_mut().active_camera = Some(cam);
        w.add_pre_system(CameraFollowSystem);

        w.step(0.016, None);
        let pose = w.graph().get(render).unwrap().local;
        let expected = w.world_transform(cam).unwrap();
        assert!(approx_vec(pose.pos, expected.pos, 1e-12));
        assert!(approx_quat(pose.rot, expected.rot, 1e-12));
        let lens = &w.asset::<Lens>(render).unwrap().config;
        assert_eq!(lens.zoom, 900.0);
        assert_eq!(lens.near, 0.01);
    }

    #[test]
    fn follow_trails_a_lagged_feed() {
        let mut w = World::new();
        let render = with_render_camera(&mut w);
        let rig = w.spawn(NodeSpec::new("rig"));
        let cam = fit(
            &mut w,
            rig,
            MountConfig::new("chase"),
            NodeSpec::asset(Camera::new(CameraConfig {
                lag_pos: 0.2,
                lag_rot: 0.2,
                ..CameraConfig::default()
            })),
        );
        w.view_mut().active_camera = Some(cam);
        w.add_pre_system(CameraFollowSystem);
        w.step(0.05, None);

        let target = DVec3::new(4.0, 0.0, 0.0);
        *w.local_mut(rig).unwrap() = Transform::from_position(target);
        w.step(0.05, None);
        assert_eq!(w.graph().get(render).unwrap().local.pos, DVec3::ZERO);
        w.step(0.05, None);
        let pos = w.graph().get(render).unwrap().local.pos;
        assert!(pos.x > 0.0 && pos.x < 4.0, "{pos}");

        for _ in 0..40 {
            w.step(0.05, None);
        }
        let pos = w.graph().get(render).unwrap().local.pos;
        assert!(approx_vec(pos, target, 1e-2), "{pos}");
    }

    #[test]
    fn follow_is_idle_in_free_camera_mode() {
        let mut w = World::new();
        let render = with_render_camera(&mut w);
        let rig = w.spawn(NodeSpec::new("rig").at(DVec3::new(3.0, 0.0, 0.0)));
        let cam = fit(&mut w, rig, MountConfig::new("cam"), NodeSpec::asset(Camera::default()));
        w.view_mut().active_camera = Some(cam);
        w.view_mut().follow = false;
        w.add_pre_system(CameraFollowSystem);

        w.step(0.016, None);
        assert_eq!(w.graph().get(render).unwrap().local, Transform::IDENTITY);
    }

    fn tracking_world() -> (World, NodeId, NodeId) {
        let mut w = World::new();
        let render = with_render_camera(&mut w);
        *w.local_mut(render).unwrap() = Transform::from_position(DVec3::new(5.0, 0.0, 5.0));
        let cube = w.spawn(NodeSpec::new("cube").at(DVec3::new(0.0, 0.0, 5.0)));
        w.view_mut().follow = false;
        w.add_pre_system(TrackingSystem::new(cube, Tuning::default()));
        (w, render, cube)
    }

    #[test]
    fn tracking_turns_toward_camera_when_enabled() {
        let (mut w, _, cube) = tracking_world();
        let on = InputSnapshot::new().set_toggle(TRACK_ENABLED, true);
        for _ in 0..300 {
            w.step(0.05, Some(&on));
        }
        // Camera straight off the cube's right side.
        let fwd = w.graph().get(cube).unwrap().local.forward();
        assert!(approx_vec(fwd, DVec3::X, 1e-3), "forward = {fwd}");
        assert!(w.graph().get(cube).unwrap().local.rot.is_canonical());
    }

    #[test]
    fn tracking_turn_is_rate_limited() {
        let (mut w, _, cube) = tracking_world();
        let on = InputSnapshot::new().set_toggle(TRACK_ENABLED, true);
        w.step(0.1, Some(&on));
        let rot = w.graph().get(cube).unwrap().local.rot;
        let turned = worldquat_math::angle_between(rot, DQuat::IDENTITY);
        assert!(turned <= 0.8 * 0.1 + 1e-9, "turned {turned}");
        assert!(turned > 0.0);
    }

    #[test]
    fn tracking_idle_when_disabled_or_following() {
        let (mut w, _, cube) = tracking_world();
        w.step(0.1, Some(&InputSnapshot::new()));
        assert_eq!(w.graph().get(cube).unwrap().local.rot, DQuat::IDENTITY);

        w.view_mut().follow = true;
        w.step(0.1, Some(&InputSnapshot::new().set_toggle(TRACK_ENABLED, true)));
        assert_eq!(w.graph().get(cube).unwrap().local.rot, DQuat::IDENTITY);
    }

    #[test]
    fn tracking_estimates_camera_velocity() {
        let mut w = World::new();
        let render = with_render_camera(&mut w);
        let cube = w.spawn(NodeSpec::new("cube"));
        let tracking = Rc::new(RefCell::new(TrackingSystem::new(cube, Tuning::default())));
        let sys = Rc::clone(&tracking);
        w.add_pre_system(move |w: &mut World, dt: f64| sys.borrow_mut().step(w, dt));

        w.step(0.5, None);
        assert_eq!(tracking.borrow().camera_velocity(), DVec3::ZERO);
        w.local_mut(render).unwrap().pos = DVec3::new(1.0, 0.0, 0.0);
        w.step(0.5, None);
        assert!(approx_vec(tracking.borrow().camera_velocity(), DVec3::new(2.0, 0.0, 0.0), 1e-12));
    }

    #[test]
    fn follower_tracks_leader_with_offset() {
        let mut w = World::new();
        let leader = w.spawn(NodeSpec::new("lead"));
        let follower = w.spawn(NodeSpec::new("wing"));
        let offset = Transform::from_position(DVec3::new(2.0, 0.0, 0.0));
        w.add_pre_system(AssetFollowerSystem::new(leader, follower, offset));

        *w.local_mut(leader).unwrap() =
            Transform::new(DVec3::new(0.0, 0.0, 10.0), from_axis_angle(DVec3::Y, FRAC_PI_2));
        w.step(0.016, None);
        let local = w.graph().get(follower).unwrap().local;
        assert!(approx_vec(local.pos, DVec3::new(0.0, 0.0, 8.0), 1e-12));
        assert!(approx_quat(local.rot, from_axis_angle(DVec3::Y, FRAC_PI_2), 1e-12));
    }

    #[test]
    fn weapon_events_are_drained_and_tallied() {
        let mut w = World::new();
        let owner = PlayerId::new();
        let cube = w.spawn(NodeSpec::new("cube").owned_by(owner));
        let gun = fit(
            &mut w,
            cube,
            MountConfig::new("gun"),
            NodeSpec::asset(Weapon::new(WeaponConfig {
                mag_size: 1,
                fire_rate: 10.0,
                ..WeaponConfig::default()
            })),
        );
        let events = WeaponEventsSystem::new();
        let tally = events.tally();
        w.add_post_system(events);
        w.asset_mut::<Weapon>(gun).unwrap().trigger_held = true;

        w.step(0.0, None);
        w.step(0.1, None);
        assert_eq!(w.events().count(&EventKind::WeaponFired), 0);
        assert_eq!(w.events().count(&EventKind::WeaponEmpty), 0);

        let stats = tally.borrow().get(&Some(owner)).copied().unwrap();
        assert_eq!(stats, ShotStats { shots: 1, dry_fires: 1 });
    }
}
