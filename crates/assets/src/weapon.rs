use serde::{Deserialize, Serialize};
use tracing::debug;
use worldquat_common::NodeId;
use worldquat_input::{Action, ActionContext, ActionId, ActionPhase, ActionType};
use worldquat_kernel::{Asset, Capability, EventKind, EventPayload, NodeContext};
use worldquat_math::DVec3;

/// Cooldown after pulling the trigger on an empty magazine.
pub const DRY_FIRE_COOLDOWN: f64 = 0.3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaponConfig {
    /// Shots per second.
    pub fire_rate: f64,
    pub mag_size: u32,
    /// Starting rounds; a full magazine when unset.
    pub ammo: Option<u32>,
    /// Radians per second of cosmetic spin about `spin_axis` (local).
    pub spin_rate: f64,
    pub spin_axis: DVec3,
}

impl Default for WeaponConfig {
    fn default() -> Self {
        Self {
            fire_rate: 4.0,
            mag_size: 12,
            ammo: None,
            spin_rate: 0.0,
            spin_axis: DVec3::Z,
        }
    }
}

/// Magazine-fed weapon. Fires while the trigger is held and cooled down.
#[derive(Debug, Clone)]
pub struct Weapon {
    pub config: WeaponConfig,
    pub ammo: u32,
    pub cooldown: f64,
    pub trigger_held: bool,
}

impl Default for Weapon {
    fn default() -> Self {
        Self::new(WeaponConfig::default())
    }
}

impl Weapon {
    pub fn new(config: WeaponConfig) -> Self {
        Self {
            ammo: config.ammo.unwrap_or(config.mag_size),
            config,
            cooldown: 0.0,
            trigger_held: false,
        }
    }

    pub fn fire_action(node: NodeId) -> ActionId {
        ActionId::new(format!("{node}_fire"))
    }

    pub fn reload_action(node: NodeId) -> ActionId {
        ActionId::new(format!("{node}_reload"))
    }

    /// Refill the magazine. Returns false (and emits nothing) when already full.
    pub fn reload(&mut self, node: &mut NodeContext<'_>) -> bool {
        if self.ammo >= self.config.mag_size {
            return false;
        }
        self.ammo = self.config.mag_size;
        debug!(weapon = %node.node(), "reloaded");
        let payload = self.payload(node);
        node.emit(EventKind::WeaponReloaded, payload);
        true
    }

    fn payload(&self, node: &NodeContext<'_>) -> EventPayload {
        EventPayload::Weapon {
            weapon: node.node(),
            owner: node.entity_owner(),
            transform: node.world_transform(),
            ammo: self.ammo,
        }
    }

    fn shot_interval(&self) -> f64 {
        1.0 / self.config.fire_rate.max(f64::EPSILON)
    }
}

impl Asset for Weapon {
    fn kind(&self) -> &str {
        "weapon"
    }

    fn capabilities(&self) -> Vec<Capability> {
        vec![Capability::WEAPON]
    }

    fn actions(&self, node: NodeId) -> Vec<Action> {
        vec![
            Action::new(Self::fire_action(node), ActionType::Hold)
                .label("Fire")
                .keys(["Space"]),
            Action::new(Self::reload_action(node), ActionType::Press)
                .label("Reload")
                .keys(["KeyL"]),
        ]
    }

    fn on_action(&mut self, action: &ActionContext<'_>, node: &mut NodeContext<'_>) {
        if *action.action == Self::fire_action(node.node()) {
            self.trigger_held = action.phase != ActionPhase::Release;
        } else if *action.action == Self::reload_action(node.node()) {
            self.reload(node);
        }
    }

    fn update(&mut self, dt: f64, node: &mut NodeContext<'_>) {
        if self.config.spin_rate != 0.0 {
            let (axis, angle) = (self.config.spin_axis, self.config.spin_rate * dt);
            if let Some(local) = node.local_mut() {
                local.rotate_around_local(axis, angle);
            }
        }

        self.cooldown = (self.cooldown - dt).max(0.0);
        if !self.trigger_held || self.cooldown > 0.0 {
            return;
        }

        if self.ammo > 0 {
            self.ammo -= 1;
            self.cooldown = self.shot_interval();
            let payload = self.payload(node);
            node.emit(EventKind::WeaponFired, payload);
        } else {
            self.cooldown = DRY_FIRE_COOLDOWN;
            let payload = self.payload(node);
            node.emit(EventKind::WeaponEmpty, payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use worldquat_common::PlayerId;
    use worldquat_input::InputSnapshot;
    use worldquat_kernel::{MountConfig, NodeSpec, World};
    use worldquat_math::{QuatExt, from_axis_angle};

    fn armed_world(config: WeaponConfig, owner: Option<PlayerId>) -> (World, NodeId, NodeId) {
        let mut w = World::new();
        let mut spec = NodeSpec::new("cube").at(DVec3::new(0.0, 0.0, 5.0));
        if let Some(owner) = owner {
            spec = spec.owned_by(owner);
        }
        let cube = w.spawn(spec);
        w.add_mount(cube, MountConfig::new("left")).unwrap();
        let gun = w.create_node(NodeSpec::asset(Weapon::new(config)));
        w.fit_asset(cube, &"left".into(), gun).unwrap();
        w.drain_all_events();
        (w, cube, gun)
    }

    fn pull_trigger(w: &mut World, gun: NodeId) {
        w.asset_mut::<Weapon>(gun).unwrap().trigger_held = true;
    }

    #[test]
    fn fires_then_cools_down_then_runs_dry() {
        let owner = PlayerId::new();
        let cfg = WeaponConfig {
            fire_rate: 5.0,
            mag_size: 2,
            ..WeaponConfig::default()
        };
        let (mut w, _, gun) = armed_world(cfg, Some(owner));
        pull_trigger(&mut w, gun);

        w.step(0.0, None);
        assert_eq!(w.asset::<Weapon>(gun).unwrap().ammo, 1);
        let fired = w.drain_events(&EventKind::WeaponFired);
        assert_eq!(fired.len(), 1);
        match &fired[0].payload {
            EventPayload::Weapon {
                weapon,
                owner: o,
                transform,
                ammo,
            } => {
                assert_eq!(*weapon, gun);
                assert_eq!(*o, Some(owner));
                assert_eq!(transform.pos, DVec3::new(0.0, 0.0, 5.0));
                assert_eq!(*ammo, 1);
            }
            other => panic!("unexpected payload {other:?}"),
        }

        w.step(0.1, None);
        assert_eq!(w.events().count(&EventKind::WeaponFired), 0);
        w.step(0.1, None);
        assert_eq!(w.events().count(&EventKind::WeaponFired), 1);
        assert_eq!(w.asset::<Weapon>(gun).unwrap().ammo, 0);

        w.step(0.2, None);
        assert_eq!(w.events().count(&EventKind::WeaponEmpty), 1);
        assert_eq!(w.asset::<Weapon>(gun).unwrap().cooldown, DRY_FIRE_COOLDOWN);
    }

    #[test]
    fn space_drives_trigger_and_release_stops_fire() {
        let (mut w, _, gun) = armed_world(WeaponConfig::default(), None);
        let space = InputSnapshot::with_held(["Space"]);
        w.step(0.0, Some(&space));
        assert!(w.asset::<Weapon>(gun).unwrap().trigger_held);
        assert_eq!(w.events().count(&EventKind::WeaponFired), 1);

        w.step(0.25, Some(&space));
        assert_eq!(w.events().count(&EventKind::WeaponFired), 2);

        w.step(0.25, Some(&InputSnapshot::new()));
        assert!(!w.asset::<Weapon>(gun).unwrap().trigger_held);
        assert_eq!(w.events().count(&EventKind::WeaponFired), 2);
    }

    #[test]
    fn reload_key_refills_and_reports() {
        let cfg = WeaponConfig {
            mag_size: 3,
            ammo: Some(1),
            ..WeaponConfig::default()
        };
        let (mut w, _, gun) = armed_world(cfg, None);
        w.step(0.1, Some(&InputSnapshot::with_held(["KeyL"])));
        assert_eq!(w.asset::<Weapon>(gun).unwrap().ammo, 3);
        assert_eq!(w.drain_events(&EventKind::WeaponReloaded).len(), 1);

        // Full magazine: nothing to do.
        w.step(0.1, Some(&InputSnapshot::new()));
        w.step(0.1, Some(&InputSnapshot::with_held(["KeyL"])));
        assert!(w.drain_events(&EventKind::WeaponReloaded).is_empty());
    }

    #[test]
    fn actions_are_namespaced_by_node() {
        let w = Weapon::default();
        let actions = w.actions(NodeId(7));
        assert_eq!(actions[0].id.as_str(), "node_7_fire");
        assert_eq!(actions[0].kind, ActionType::Hold);
        assert_eq!(actions[1].id.as_str(), "node_7_reload");
        assert_eq!(actions[1].suggested_keys, vec!["KeyL".to_string()]);
        assert_eq!(w.ammo, 12);
    }

    #[test]
    fn spin_rotates_local_about_axis() {
        let cfg = WeaponConfig {
            spin_rate: 2.0,
            spin_axis: DVec3::Z,
            ..WeaponConfig::default()
        };
        let (mut w, _, gun) = armed_world(cfg, None);
        w.step(0.5, None);
        let rot = w.graph().get(gun).unwrap().local.rot;
        let expected = from_axis_angle(DVec3::Z, 1.0);
        assert!((rot.canonicalized() - expected).length() < 1e-12);
    }
}
