use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;
use worldquat_assets::{
    Camera, CameraConfig, Lens, LensConfig, Motor, MotorConfig, Tracker, TrackerConfig, Weapon,
    WeaponConfig,
};
use worldquat_common::{MeshRef, NodeId, PlayerId};
use worldquat_gameplay::{
    BotConfig, BotController, CameraController, CameraFollowSystem, PlayerController, ShotTally,
    TrackerController, TrackingSystem, Tuning, WeaponEventsSystem, install_view_bindings,
};
use worldquat_kernel::{Accept, Capability, MountConfig, NodeSpec, World};
use worldquat_math::{DVec3, Transform, from_axis_angle};

/// Mesh id of the demo cube's wireframe.
pub const CUBE_MESH: MeshRef = MeshRef(1);

/// Scene tuning, loadable from JSON. Missing fields keep their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub tuning: Tuning,
    pub cube_position: DVec3,
    /// Motor settings; derived from `tuning` when absent.
    pub motor: Option<MotorConfig>,
    pub left_weapon: WeaponConfig,
    pub right_weapon: WeaponConfig,
    pub chase_camera: CameraConfig,
    pub tracker: TrackerConfig,
    pub lens: LensConfig,
    pub bot: BotConfig,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            tuning: Tuning::default(),
            cube_position: DVec3::new(0.0, 0.0, 5.0),
            motor: None,
            left_weapon: WeaponConfig::default(),
            right_weapon: WeaponConfig {
                fire_rate: 2.0,
                mag_size: 6,
                spin_rate: 3.0,
                ..WeaponConfig::default()
            },
            chase_camera: CameraConfig {
                name: "Chase".to_string(),
                zoom: Some(450.0),
                lag_pos: 0.2,
                lag_rot: 0.2,
                ..CameraConfig::default()
            },
            tracker: TrackerConfig::default(),
            lens: LensConfig::default(),
            bot: BotConfig::default(),
        }
    }
}

impl DemoConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    fn motor_config(&self) -> MotorConfig {
        self.motor.clone().unwrap_or_else(|| MotorConfig {
            linear_speed: self.tuning.cube_move_rate,
            angular_speed: self.tuning.cube_turn_rate,
            ..MotorConfig::default()
        })
    }
}

/// How the cube is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    Player,
    Bot,
}

/// Handles into a built demo world.
pub struct Scene {
    pub world: World,
    pub player: PlayerId,
    pub cube: NodeId,
    pub render_camera: NodeId,
    pub tracker: NodeId,
    pub shots: ShotTally,
}

fn fit(world: &mut World, host: NodeId, mount: MountConfig, spec: NodeSpec) -> Result<NodeId> {
    let id = mount.id.clone();
    world.add_mount(host, mount)?;
    let node = world.create_node(spec);
    world.fit_asset(host, &id, node)?;
    Ok(node)
}

/// Build the armed cube, the render camera and the frame pipeline.
pub fn build(cfg: &DemoConfig, driver: Driver, track: bool) -> Result<Scene> {
    let mut world = World::new();
    let player = PlayerId::new();

    let cube = world.create_entity(
        NodeSpec::new("cube")
            .named("Cube")
            .at(cfg.cube_position)
            .with_mesh(CUBE_MESH)
            .owned_by(player),
    );
    fit(
        &mut world,
        cube,
        MountConfig::new("drive").accept(Accept::Kind("motor".into())),
        NodeSpec::asset(Motor::new(cfg.motor_config())),
    )?;
    fit(
        &mut world,
        cube,
        MountConfig::new("left_gun")
            .slot("hardpoint")
            .offset(Transform::from_position(DVec3::new(-1.2, 0.0, 0.5)))
            .accept(Accept::Capability(Capability::WEAPON)),
        NodeSpec::asset(Weapon::new(cfg.left_weapon.clone())).named("Left gun"),
    )?;
    fit(
        &mut world,
        cube,
        MountConfig::new("right_gun")
            .slot("hardpoint")
            .offset(Transform::from_position(DVec3::new(1.2, 0.0, 0.5)))
            .accept(Accept::Capability(Capability::WEAPON)),
        NodeSpec::asset(Weapon::new(cfg.right_weapon.clone())).named("Right gun"),
    )?;
    fit(
        &mut world,
        cube,
        MountConfig::new("nose_cam")
            .offset(Transform::from_position(DVec3::new(0.0, 0.5, 1.6)))
            .accept(Accept::Capability(Capability::CAMERA_FEED)),
        NodeSpec::asset(Camera::named("Nose")).named("Nose"),
    )?;
    fit(
        &mut world,
        cube,
        MountConfig::new("chase_cam")
            .offset(Transform::new(
                DVec3::new(0.0, 2.0, -6.0),
                from_axis_angle(DVec3::X, 0.25),
            ))
            .accept(Accept::Capability(Capability::CAMERA_FEED)),
        NodeSpec::asset(Camera::new(cfg.chase_camera.clone())).named(cfg.chase_camera.name.clone()),
    )?;
    let tracker = fit(
        &mut world,
        cube,
        MountConfig::new("aim").accept(Accept::Kind("tracker".into())),
        NodeSpec::asset(Tracker::new(cfg.tracker.clone())),
    )?;
    world.add_entity(cube);

    let render_camera = world.spawn(NodeSpec::asset(Lens::new(cfg.lens.clone())).named("RenderCamera"));
    world.view_mut().render_camera = Some(render_camera);
    world.cycle_camera();

    install_view_bindings(&mut world);
    match driver {
        Driver::Player => {
            world.add_controller(PlayerController::new(cube));
            world.add_controller(CameraController::new(render_camera, cfg.tuning.clone()));
            world.add_controller(TrackerController::new(tracker));
        }
        Driver::Bot => {
            world.add_controller(BotController::new(cube, cfg.bot.clone()));
        }
    }
    world.add_pre_system(CameraFollowSystem);
    if track {
        world.view_mut().follow = false;
        world.add_pre_system(TrackingSystem::new(cube, cfg.tuning.clone()));
    }
    let events = WeaponEventsSystem::new();
    let shots = events.tally();
    world.add_post_system(events);

    info!(%cube, %render_camera, nodes = world.graph().len(), ?driver, track, "demo scene built");
    Ok(Scene {
        world,
        player,
        cube,
        render_camera,
        tracker,
        shots,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use worldquat_input::InputSnapshot;
    use worldquat_kernel::EventKind;

    #[test]
    fn builds_full_rig() {
        let scene = build(&DemoConfig::default(), Driver::Player, false).unwrap();
        let w = &scene.world;
        assert_eq!(w.entities(), &[scene.cube, scene.render_camera]);
        assert_eq!(w.assets_by_capability(&Capability::WEAPON).len(), 2);
        assert_eq!(w.assets_by_capability(&Capability::CAMERA_FEED).len(), 2);
        assert_eq!(w.assets_by_capability(&Capability::TRACKER), vec![scene.tracker]);
        assert!(w.view().active_camera.is_some());
        assert_eq!(w.events().count(&EventKind::CameraChanged), 1);
        assert_eq!(w.events().count(&EventKind::AssetFitted), 6);
    }

    #[test]
    fn player_frames_fire_and_follow() {
        let mut scene = build(&DemoConfig::default(), Driver::Player, false).unwrap();
        let input = InputSnapshot::with_held(["ArrowUp", "Space"]);
        for _ in 0..20 {
            scene.world.step(0.05, Some(&input));
        }
        let shots = scene.shots.borrow();
        let stats = shots.get(&Some(scene.player)).copied().unwrap_or_default();
        assert!(stats.shots >= 4, "{stats:?}");

        let cube = scene.world.world_transform(scene.cube).unwrap();
        assert!(cube.pos.z > 5.5);
        let active = scene.world.view().active_camera.unwrap();
        let feed = scene.world.world_transform(active).unwrap();
        let view = scene.world.world_transform(scene.render_camera).unwrap();
        // Follow runs before the cube moves, so the view trails by one frame.
        assert!(view.pos.distance(feed.pos) < 0.1);
        assert_eq!(scene.world.events().count(&EventKind::WeaponFired), 0);
    }

    #[test]
    fn partial_config_json() {
        let cfg: DemoConfig =
            serde_json::from_str(r#"{"cube_position": [1.0, 2.0, 3.0], "tuning": {"lead_time": 0.5}}"#).unwrap();
        assert_eq!(cfg.cube_position, DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(cfg.tuning.lead_time, 0.5);
        assert_eq!(cfg.right_weapon.mag_size, 6);
        assert_eq!(cfg.motor_config().linear_speed, 1.0);
    }
}
