//! Controllers turn the frame's input snapshot into asset intents.
//!
//! They run in the controller stage, after action dispatch and before any
//! node updates, so everything they request is applied the same frame.

use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::rc::Rc;
use tracing::debug;
use worldquat_assets::{Lens, Motor, Tracker, Weapon};
use worldquat_common::NodeId;
use worldquat_input::{Action, ActionContext, ActionType, InputSnapshot, PointerKind};
use worldquat_kernel::{EventKind, EventPayload, System, World};
use worldquat_math::{DVec3, QuatExt, from_axis_angle};

use crate::tuning::Tuning;

/// Toggle that switches the camera controller to world-up yaw.
pub const FPS_MODE: &str = "fpsMode";
/// Toggle that lets the host entity track the free camera.
pub const TRACK_ENABLED: &str = "trackEnabled";

/// Smallest zoom the camera controller allows.
pub const MIN_ZOOM: f64 = 10.0;

fn shift_held(input: &InputSnapshot) -> bool {
    input.shift || input.is_held("ShiftLeft") || input.is_held("ShiftRight")
}

/// Sum of the vectors bound to held keys.
fn held_vector(input: &InputSnapshot, map: &[(&str, DVec3)]) -> DVec3 {
    map.iter()
        .filter(|(key, _)| input.is_held(key))
        .map(|(_, v)| *v)
        .sum()
}

const ENTITY_MOVE_KEYS: [(&str, DVec3); 6] = [
    ("ArrowUp", DVec3::Z),
    ("ArrowDown", DVec3::NEG_Z),
    ("ArrowLeft", DVec3::NEG_X),
    ("ArrowRight", DVec3::X),
    ("PageUp", DVec3::Y),
    ("PageDown", DVec3::NEG_Y),
];

const ENTITY_TURN_KEYS: [(&str, DVec3); 3] = [
    ("KeyP", DVec3::X),
    ("KeyY", DVec3::Y),
    ("KeyR", DVec3::Z),
];

const CAMERA_MOVE_KEYS: [(&str, DVec3); 6] = [
    ("KeyW", DVec3::Z),
    ("KeyS", DVec3::NEG_Z),
    ("KeyA", DVec3::NEG_X),
    ("KeyD", DVec3::X),
    ("KeyQ", DVec3::NEG_Y),
    ("KeyE", DVec3::Y),
];

/// Keyboard driving of an entity through its first motor.
///
/// Arrows and PageUp/PageDown move along local axes (Shift sprints ×1.5);
/// P, Y and R pitch, yaw and roll (Shift reverses). Speeds come from the
/// motor's config. Without a motor the controller does nothing.
#[derive(Debug, Clone)]
pub struct PlayerController {
    entity: NodeId,
}

impl PlayerController {
    pub const SPRINT: f64 = 1.5;

    pub fn new(entity: NodeId) -> Self {
        Self { entity }
    }
}

impl System for PlayerController {
    fn step(&mut self, world: &mut World, _dt: f64) {
        let Some(motor) = world.graph().find_first_asset_by_kind(self.entity, "motor") else {
            return;
        };

        let input = world.input();
        let shift = shift_held(input);
        let sprint = if shift { Self::SPRINT } else { 1.0 };
        let sign = if shift { -1.0 } else { 1.0 };
        let mv = held_vector(input, &ENTITY_MOVE_KEYS) * sprint;
        let turn = held_vector(input, &ENTITY_TURN_KEYS) * sign;

        let Some(m) = world.asset_mut::<Motor>(motor) else {
            return;
        };
        if mv != DVec3::ZERO {
            m.add_move(mv.x, mv.y, mv.z);
        }
        if turn != DVec3::ZERO {
            m.add_turn(turn.x, turn.y, turn.z);
        }
    }
}

/// Pointer look, WASD/QE flying and `KeyZ` zoom for the render camera entity.
///
/// With the `fpsMode` toggle on, yaw is about world up and pitch about the
/// camera's right; otherwise both are about the camera's own axes.
#[derive(Debug, Clone)]
pub struct CameraController {
    camera: NodeId,
    tune: Tuning,
}

impl CameraController {
    pub fn new(camera: NodeId, tune: Tuning) -> Self {
        Self { camera, tune }
    }
}

impl System for CameraController {
    fn step(&mut self, world: &mut World, dt: f64) {
        let input = world.input();
        let fps = input.toggle(FPS_MODE);
        let sens = match input.pointer.kind {
            PointerKind::Mouse => self.tune.mouse_sensitivity,
            PointerKind::Touch | PointerKind::Pen => self.tune.touch_sensitivity,
        };
        let yaw = input.pointer.dx * sens;
        let pitch = -input.pointer.dy * sens;
        let local_move = held_vector(input, &CAMERA_MOVE_KEYS) * (self.tune.cam_move_rate * dt);
        let zoom_sign = input
            .is_held("KeyZ")
            .then(|| if shift_held(input) { -1.0 } else { 1.0 });

        let Some(pose) = world.local_mut(self.camera) else {
            return;
        };

        if yaw != 0.0 || pitch != 0.0 {
            let q = if fps {
                let q = from_axis_angle(DVec3::Y, yaw) * pose.rot;
                let right = q.rotate(DVec3::NEG_X);
                from_axis_angle(right, pitch) * q
            } else {
                pose.rot * from_axis_angle(DVec3::Y, yaw) * from_axis_angle(DVec3::NEG_X, pitch)
            };
            pose.rot = q.canonicalized();
        }

        if local_move != DVec3::ZERO {
            pose.pos += pose.rot.rotate(local_move);
        }

        if let Some(sign) = zoom_sign {
            let rate = self.tune.zoom_rate;
            if let Some(lens) = world.asset_mut::<Lens>(self.camera) {
                lens.config.zoom = (lens.config.zoom + sign * rate * dt).max(MIN_ZOOM);
            }
        }
    }
}

/// Points a tracker at the free camera.
///
/// The target is cleared while `trackEnabled` is off or while the view
/// follows a mounted camera.
#[derive(Debug, Clone)]
pub struct TrackerController {
    tracker: NodeId,
}

impl TrackerController {
    pub fn new(tracker: NodeId) -> Self {
        Self { tracker }
    }
}

impl System for TrackerController {
    fn step(&mut self, world: &mut World, _dt: f64) {
        let view = *world.view();
        let target = if !world.input().toggle(TRACK_ENABLED) || view.follow {
            None
        } else {
            view.render_camera
                .and_then(|cam| world.world_transform(cam))
                .map(|pose| pose.pos)
                .filter(|p| p.is_finite())
        };

        if let Some(tracker) = world.asset_mut::<Tracker>(self.tracker) {
            match target {
                Some(p) => tracker.set_target(p),
                None => tracker.clear_target(),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Unit yaw intent per frame through the motor; radians per second
    /// about world up when the entity has no motor.
    pub turn_rate: f64,
    /// Seconds the trigger stays held per burst.
    pub burst_on: f64,
    pub burst_off: f64,
    /// Seconds between camera switches.
    pub cycle_every: f64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            turn_rate: 0.6,
            burst_on: 0.7,
            burst_off: 0.9,
            cycle_every: 4.0,
        }
    }
}

/// Scripted driver: spins its entity, fires its first weapon in bursts,
/// reloads when dry and rotates through the entity's cameras.
#[derive(Debug, Clone)]
pub struct BotController {
    pub config: BotConfig,
    entity: NodeId,
    weapon: Option<NodeId>,
    burst_timer: Option<f64>,
    firing: bool,
    cycle_timer: f64,
    started: bool,
}

impl BotController {
    pub fn new(entity: NodeId, config: BotConfig) -> Self {
        Self {
            config,
            entity,
            weapon: None,
            burst_timer: None,
            firing: true,
            cycle_timer: 0.0,
            started: false,
        }
    }

    pub fn is_firing(&self) -> bool {
        self.firing
    }

    fn turn(&self, world: &mut World, dt: f64) {
        if self.config.turn_rate == 0.0 {
            return;
        }
        let motor = world.graph().find_first_asset_by_kind(self.entity, "motor");
        match motor.and_then(|m| world.asset_mut::<Motor>(m)) {
            Some(m) => m.add_turn(0.0, 1.0, 0.0),
            None => {
                if let Some(pose) = world.local_mut(self.entity) {
                    pose.rotate_around_world(DVec3::Y, self.config.turn_rate * dt);
                }
            }
        }
    }

    fn weapon(&mut self, world: &World) -> Option<NodeId> {
        let still_ours = self
            .weapon
            .is_some_and(|w| world.graph().root_of(w) == Some(self.entity));
        if !still_ours {
            self.weapon = world.graph().find_first_asset_by_kind(self.entity, "weapon");
        }
        self.weapon
    }

    fn run_burst(&mut self, dt: f64) -> bool {
        let timer = self.burst_timer.get_or_insert_with(|| {
            self.firing = true;
            self.config.burst_on
        });
        *timer -= dt;
        if *timer <= 0.0 {
            self.firing = !self.firing;
            *timer = if self.firing {
                self.config.burst_on
            } else {
                self.config.burst_off
            };
        }
        self.firing
    }

    fn cycle_camera(&self, world: &mut World) {
        let cams = world.graph().find_assets_by_kind(self.entity, "camera");
        if cams.is_empty() {
            return;
        }
        let current = world.view().active_camera;
        let next = match cams.iter().position(|c| Some(*c) == current) {
            Some(i) => cams[(i + 1) % cams.len()],
            None => cams[0],
        };
        world.view_mut().active_camera = Some(next);
        world.emit(EventKind::CameraChanged, EventPayload::Camera { camera: Some(next) });
        debug!(camera = %next, "bot switched camera");
    }
}

impl System for BotController {
    fn step(&mut self, world: &mut World, dt: f64) {
        if !world.is_alive(self.entity) {
            return;
        }
        if !self.started {
            self.started = true;
            if let Some(cam) = world.graph().find_first_asset_by_kind(self.entity, "camera") {
                world.view_mut().active_camera = Some(cam);
            }
        }

        self.turn(world, dt);

        if let Some(weapon) = self.weapon(world) {
            let dry = world
                .asset::<Weapon>(weapon)
                .is_some_and(|w| w.ammo == 0 && w.cooldown <= 0.0);
            if dry {
                world.with_asset::<Weapon, _>(weapon, |w, ctx| w.reload(ctx));
            }
            let firing = self.run_burst(dt);
            if let Some(w) = world.asset_mut::<Weapon>(weapon) {
                w.trigger_held = firing;
            }
        }

        self.cycle_timer += dt;
        if self.cycle_timer >= self.config.cycle_every {
            self.cycle_timer = 0.0;
            self.cycle_camera(world);
        }
    }
}

/// Global id of the camera-cycle action.
pub const CYCLE_CAMERA: &str = "cycle_camera";
/// Global id of the free-camera toggle.
pub const FREE_CAMERA: &str = "free_camera";

/// Bind `KeyC` to cycle the active camera and `KeyV` to toggle free camera
/// (the view stops following while it is on).
pub fn install_view_bindings(world: &mut World) {
    let cycle = Rc::new(Cell::new(false));
    let free = Rc::new(Cell::new(None::<bool>));

    let flag = Rc::clone(&cycle);
    world.register_global_action(
        Action::new(CYCLE_CAMERA, ActionType::Press)
            .label("Cycle camera")
            .keys(["KeyC"]),
        Box::new(move |_: &ActionContext<'_>| flag.set(true)),
        None,
    );
    let state = Rc::clone(&free);
    world.register_global_action(
        Action::new(FREE_CAMERA, ActionType::Toggle)
            .label("Free camera")
            .keys(["KeyV"]),
        Box::new(move |ctx: &ActionContext<'_>| state.set(ctx.toggled)),
        None,
    );

    world.add_controller(move |world: &mut World, _dt: f64| {
        if cycle.replace(false) {
            world.cycle_camera();
        }
        if let Some(on) = free.take() {
            world.view_mut().follow = !on;
            debug!(free = on, "free camera toggled");
        }
    });
}
