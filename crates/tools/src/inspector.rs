use std::fmt;
use worldquat_common::NodeId;
use worldquat_kernel::{Capability, World};

/// World inspector for developer tooling.
///
/// Read-only queries against the world state for debugging and headless runs.
pub struct WorldInspector;

impl WorldInspector {
    /// Produce a summary of the world state.
    pub fn summary(world: &World) -> WorldSummary {
        WorldSummary {
            frame: world.frame(),
            time: world.time(),
            entity_count: world.entities().len(),
            live_entities: world.live_entities().count(),
            node_count: world.graph().len(),
            registered: world.registered_nodes().len(),
            pending_events: world.events().len(),
            active_camera: world.view().active_camera,
        }
    }

    /// Pose and wiring of a single node.
    pub fn inspect_node(world: &World, id: NodeId) -> Option<NodeInfo> {
        let node = world.graph().get(id)?;
        let pose = world.world_transform(id)?;
        let r = pose.rot;
        Some(NodeInfo {
            id,
            kind: node.kind.clone(),
            name: node.name.clone(),
            host: node.host(),
            position: pose.pos.to_array(),
            rotation: [r.w, r.x, r.y, r.z],
            capabilities: node.capabilities(),
            mounts: node.mounts().len(),
            registered: world.is_registered(id),
        })
    }

    /// Entity ids in the order they were added, dead ones included.
    pub fn list_entities(world: &World) -> Vec<NodeId> {
        world.entities().to_vec()
    }
}

/// Summary of world state for the inspector.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldSummary {
    pub frame: u64,
    pub time: f64,
    pub entity_count: usize,
    pub live_entities: usize,
    pub node_count: usize,
    pub registered: usize,
    pub pending_events: usize,
    pub active_camera: Option<NodeId>,
}

impl fmt::Display for WorldSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "World: frame={} time={:.3} entities={} live={} nodes={} registered={} pending_events={}",
            self.frame,
            self.time,
            self.entity_count,
            self.live_entities,
            self.node_count,
            self.registered,
            self.pending_events
        )?;
        if let Some(cam) = self.active_camera {
            write!(f, " camera={cam}")?;
        }
        Ok(())
    }
}

/// Detailed info about a single node, in world space.
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub id: NodeId,
    pub kind: String,
    pub name: Option<String>,
    pub host: Option<NodeId>,
    pub position: [f64; 3],
    /// `[w, x, y, z]`.
    pub rotation: [f64; 4],
    pub capabilities: Vec<Capability>,
    pub mounts: usize,
    pub registered: bool,
}

impl fmt::Display for NodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.id, self.kind)?;
        if let Some(name) = &self.name {
            write!(f, " \"{name}\"")?;
        }
        write!(
            f,
            " pos=({:.2}, {:.2}, {:.2}) rot=({:.3}, {:.3}, {:.3}, {:.3}) mounts={}",
            self.position[0],
            self.position[1],
            self.position[2],
            self.rotation[0],
            self.rotation[1],
            self.rotation[2],
            self.rotation[3],
            self.mounts,
        )?;
        if !self.capabilities.is_empty() {
            let caps: Vec<&str> = self.capabilities.iter().map(Capability::as_str).collect();
            write!(f, " caps=[{}]", caps.join(", "))?;
        }
        if !self.registered {
            f.write_str(" (unregistered)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use worldquat_assets::Weapon;
    use worldquat_kernel::{MountConfig, NodeSpec};
    use worldquat_math::DVec3;

    #[test]
    fn summary_empty_world() {
        let world = World::new();
        let summary = WorldInspector::summary(&world);
        assert_eq!(summary.frame, 0);
        assert_eq!(summary.entity_count, 0);
        assert_eq!(summary.node_count, 0);
    }

    #[test]
    fn summary_counts_live_and_dead() {
        let mut world = World::new();
        let a = world.spawn(NodeSpec::new("cube"));
        world.spawn(NodeSpec::new("cube"));
        world.kill(a);
        world.step(0.5, None);

        let summary = WorldInspector::summary(&world);
        assert_eq!(summary.frame, 1);
        assert_eq!(summary.time, 0.5);
        assert_eq!(summary.entity_count, 2);
        assert_eq!(summary.live_entities, 1);
        assert_eq!(summary.registered, 1);
    }

    #[test]
    fn inspect_node_reports_world_pose() {
        let mut world = World::new();
        let cube = world.spawn(NodeSpec::new("cube").at(DVec3::new(1.0, 2.0, 3.0)));
        world.add_mount(cube, MountConfig::new("gun")).unwrap();
        let gun = world.create_node(NodeSpec::asset(Weapon::default()).named("Blaster"));
        world.fit_asset(cube, &"gun".into(), gun).unwrap();

        let info = WorldInspector::inspect_node(&world, gun).unwrap();
        assert_eq!(info.position, [1.0, 2.0, 3.0]);
        assert_eq!(info.rotation, [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(info.host, Some(cube));
        assert_eq!(info.capabilities, vec![Capability::WEAPON]);
        assert!(info.registered);

        let s = info.to_string();
        assert!(s.contains("<weapon>"));
        assert!(s.contains("\"Blaster\""));
        assert!(s.contains("caps=[weapon]"));
    }

    #[test]
    fn inspect_node_not_found() {
        let world = World::new();
        assert!(WorldInspector::inspect_node(&world, NodeId(99)).is_none());
    }

    #[test]
    fn list_entities_in_insertion_order() {
        let mut world = World::new();
        let id1 = world.spawn(NodeSpec::new("cube"));
        let id2 = world.spawn(NodeSpec::new("cube"));
        assert_eq!(WorldInspector::list_entities(&world), vec![id1, id2]);
    }

    #[test]
    fn summary_display() {
        let world = World::new();
        let s = WorldInspector::summary(&world).to_string();
        assert!(s.contains("frame=0"));
        assert!(!s.contains("camera="));
    }
}
