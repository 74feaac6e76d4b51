use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, info_span, trace, warn};
use worldquat_common::{MountId, NodeId};
use worldquat_input::{
    Action, ActionContext, ActionId, ActionMap, ActionTarget, GlobalHandler, InputSnapshot,
};
use worldquat_math::Transform;

use crate::asset::{Asset, Capability, NodeContext};
use crate::events::{EmitOptions, Event, EventKind, EventPayload, EventQueue};
use crate::graph::{AssetGraph, MountConfig, MountError, NodeSpec};

/// A per-frame stage participant: controller, pre-system or post-system.
///
/// Systems get the whole world. Any `FnMut(&mut World, f64)` is a system.
pub trait System {
    fn step(&mut self, world: &mut World, dt: f64);
}

impl<F> System for F
where
    F: FnMut(&mut World, f64),
{
    fn step(&mut self, world: &mut World, dt: f64) {
        self(world, dt)
    }
}

/// Per-world camera selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct View {
    /// Node with the `cameraFeed` capability the view follows.
    pub active_camera: Option<NodeId>,
    /// Entity that stands for the rendered viewpoint.
    pub render_camera: Option<NodeId>,
    /// Whether the render camera tracks `active_camera`.
    pub follow: bool,
}

impl Default for View {
    fn default() -> Self {
        Self {
            active_camera: None,
            render_camera: None,
            follow: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Controllers,
    Pre,
    Post,
}

/// Entities, their asset graphs, and the per-frame pipeline.
///
/// # Invariants
/// - The registered set (capability index and node-owned actions) is exactly
///   the union of subtrees of live entities in `entities`.
/// - `step` runs: input dispatch, controllers, pre-systems, node updates
///   (each live entity's tree in pre-order), post-systems.
pub struct World {
    graph: AssetGraph,
    entities: Vec<NodeId>,
    registered: BTreeSet<NodeId>,
    by_capability: BTreeMap<Capability, BTreeSet<NodeId>>,
    actions: ActionMap,
    events: EventQueue,
    controllers: Vec<Box<dyn System>>,
    pre_systems: Vec<Box<dyn System>>,
    post_systems: Vec<Box<dyn System>>,
    input: InputSnapshot,
    view: View,
    frame: u64,
    time: f64,
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("frame", &self.frame)
            .field("time", &self.time)
            .field("entities", &self.entities)
            .field("nodes", &self.graph.len())
            .field("registered", &self.registered.len())
            .field("actions", &self.actions.len())
            .field("events", &self.events.len())
            .field("view", &self.view)
            .finish()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        Self {
            graph: AssetGraph::new(),
            entities: Vec::new(),
            registered: BTreeSet::new(),
            by_capability: BTreeMap::new(),
            actions: ActionMap::new(),
            events: EventQueue::new(),
            controllers: Vec::new(),
            pre_systems: Vec::new(),
            post_systems: Vec::new(),
            input: InputSnapshot::default(),
            view: View::default(),
            frame: 0,
            time: 0.0,
        }
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Sum of every `dt` stepped so far.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn graph(&self) -> &AssetGraph {
        &self.graph
    }

    /// Input snapshot of the current frame.
    pub fn input(&self) -> &InputSnapshot {
        &self.input
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut View {
        &mut self.view
    }

    pub fn actions(&self) -> &ActionMap {
        &self.actions
    }

    // ── Nodes and entities ─────────────────────────────────────────────

    /// Create a standalone asset node, not yet attached anywhere.
    pub fn create_node(&mut self, spec: NodeSpec) -> NodeId {
        self.graph.create_node(spec)
    }

    /// Create an entity root without adding it to the world, so its tree
    /// can be assembled first.
    pub fn create_entity(&mut self, spec: NodeSpec) -> NodeId {
        self.graph.create_entity(spec)
    }

    /// Add a created entity to the world and register its current tree.
    /// Returns false for unknown ids, non-entities, or entities already added.
    pub fn add_entity(&mut self, id: NodeId) -> bool {
        let is_entity = self.graph.get(id).is_some_and(|n| n.is_entity());
        if !is_entity || self.entities.contains(&id) {
            return false;
        }
        self.entities.push(id);
        if self.is_alive(id) {
            self.register_tree(id);
        }
        debug!(entity = %id, "entity added");
        true
    }

    /// Create an entity root and add it in one go.
    pub fn spawn(&mut self, spec: NodeSpec) -> NodeId {
        let id = self.graph.create_entity(spec);
        self.add_entity(id);
        id
    }

    /// Mark an entity dead and unregister its tree. It stays in `entities`
    /// (skipped by `step`) until [`World::compact`].
    pub fn kill(&mut self, id: NodeId) -> bool {
        if !self.entities.contains(&id) {
            warn!(entity = %id, "kill of unknown entity");
            return false;
        }
        match self.graph.entity_mut(id) {
            Some(state) if state.alive => state.alive = false,
            _ => return false,
        }
        self.unregister_tree(id);
        debug!(entity = %id, "entity killed");
        true
    }

    /// Drop dead entities and their trees. Returns how many were removed.
    pub fn compact(&mut self) -> usize {
        let dead: Vec<NodeId> = self
            .entities
            .iter()
            .copied()
            .filter(|id| !self.is_alive(*id))
            .collect();
        for id in &dead {
            self.graph.remove_subtree(*id);
        }
        self.entities.retain(|id| !dead.contains(id));
        if !dead.is_empty() {
            debug!(removed = dead.len(), "compacted entities");
        }
        dead.len()
    }

    /// Remove an entity and its whole tree now, live or not.
    pub fn remove_entity(&mut self, id: NodeId) -> bool {
        let Some(pos) = self.entities.iter().position(|e| *e == id) else {
            return false;
        };
        self.unregister_tree(id);
        self.entities.remove(pos);
        self.graph.remove_subtree(id);
        debug!(entity = %id, "entity removed");
        true
    }

    /// Entity roots in insertion order, dead ones included.
    pub fn entities(&self) -> &[NodeId] {
        &self.entities
    }

    pub fn live_entities(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.entities.iter().copied().filter(|id| self.is_alive(*id))
    }

    pub fn is_alive(&self, id: NodeId) -> bool {
        self.graph
            .get(id)
            .and_then(|n| n.entity())
            .is_some_and(|e| e.alive)
    }

    pub fn local_mut(&mut self, id: NodeId) -> Option<&mut Transform> {
        self.graph.local_mut(id)
    }

    pub fn world_transform(&self, id: NodeId) -> Option<Transform> {
        self.graph.world_transform(id)
    }

    pub fn asset<T: Asset>(&self, id: NodeId) -> Option<&T> {
        self.graph.asset::<T>(id)
    }

    pub fn asset_mut<T: Asset>(&mut self, id: NodeId) -> Option<&mut T> {
        self.graph.asset_mut::<T>(id)
    }

    /// Run `f` against the asset on `id` with a full [`NodeContext`], as the
    /// frame loop would. `None` if the node has no asset of type `T`.
    pub fn with_asset<T, R>(&mut self, id: NodeId, f: impl FnOnce(&mut T, &mut NodeContext<'_>) -> R) -> Option<R>
    where
        T: Asset,
    {
        let mut asset = self.graph.take_asset(id)?;
        let result = match (*asset).as_any_mut().downcast_mut::<T>() {
            Some(concrete) => {
                let mut ctx = NodeContext::new(id, &mut self.graph, &mut self.events, self.frame, self.time);
                Some(f(concrete, &mut ctx))
            }
            None => None,
        };
        self.graph.restore_asset(id, asset);
        result
    }

    // ── Mounting ───────────────────────────────────────────────────────

    pub fn add_mount(&mut self, node: NodeId, cfg: MountConfig) -> Result<(), MountError> {
        self.graph.add_mount(node, cfg).map(|_| ())
    }

    /// Fit `node` into `mount` on `host`. When the host's tree belongs to a
    /// live entity, `node` and everything under it are registered.
    pub fn fit_asset(&mut self, host: NodeId, mount: &MountId, node: NodeId) -> Result<(), MountError> {
        self.graph.fit_asset(host, mount, node)?;
        let live_root = self
            .graph
            .root_of(host)
            .is_some_and(|root| self.registered.contains(&root));
        if live_root {
            self.register_tree(node);
        }
        self.emit_from(
            host,
            EventKind::AssetFitted,
            EventPayload::Mount {
                host,
                node,
                mount: mount.clone(),
            },
        );
        Ok(())
    }

    /// Detach the occupant of `mount` on `host` and unregister its subtree.
    pub fn unfit_asset(&mut self, host: NodeId, mount: &MountId) -> Result<Option<NodeId>, MountError> {
        let Some(node) = self.graph.unfit_asset(host, mount)? else {
            return Ok(None);
        };
        self.unregister_tree(node);
        self.emit_from(
            host,
            EventKind::AssetUnfitted,
            EventPayload::Mount {
                host,
                node,
                mount: mount.clone(),
            },
        );
        Ok(Some(node))
    }

    // ── Registration ───────────────────────────────────────────────────

    fn register_tree(&mut self, root: NodeId) {
        for id in self.graph.subtree(root) {
            if !self.registered.insert(id) {
                continue;
            }
            let Some(node) = self.graph.get(id) else {
                continue;
            };
            let caps = node.capabilities();
            for cap in &caps {
                self.by_capability.entry(cap.clone()).or_default().insert(id);
            }
            if let Some(asset) = node.asset() {
                let actions = asset.actions(id);
                if !actions.is_empty() {
                    self.actions.register_node(id, actions);
                }
            }
            debug!(node = %id, kind = %node.kind, caps = caps.len(), "registered node");
        }
    }

    fn unregister_tree(&mut self, root: NodeId) {
        for id in self.graph.subtree(root) {
            if !self.registered.remove(&id) {
                continue;
            }
            self.by_capability.retain(|_, ids| {
                ids.remove(&id);
                !ids.is_empty()
            });
            self.actions.unregister_node(id);
            if self.view.active_camera == Some(id) {
                self.view.active_camera = None;
            }
            debug!(node = %id, "unregistered node");
        }
    }

    pub fn is_registered(&self, id: NodeId) -> bool {
        self.registered.contains(&id)
    }

    pub fn registered_nodes(&self) -> &BTreeSet<NodeId> {
        &self.registered
    }

    /// Registered nodes advertising `cap`, in id order. Empty when none.
    pub fn assets_by_capability(&self, cap: &Capability) -> Vec<NodeId> {
        self.by_capability
            .get(cap)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Register an action that belongs to no node.
    pub fn register_global_action(
        &mut self,
        action: Action,
        handler: GlobalHandler,
        enabled: Option<Box<dyn Fn() -> bool>>,
    ) {
        self.actions.register_global(action, handler, enabled);
    }

    pub fn unregister_global_action(&mut self, id: &ActionId) -> bool {
        self.actions.unregister(id)
    }

    // ── Systems ────────────────────────────────────────────────────────

    pub fn add_controller(&mut self, system: impl System + 'static) {
        self.controllers.push(Box::new(system));
    }

    pub fn add_pre_system(&mut self, system: impl System + 'static) {
        self.pre_systems.push(Box::new(system));
    }

    pub fn add_post_system(&mut self, system: impl System + 'static) {
        self.post_systems.push(Box::new(system));
    }

    fn stage_mut(&mut self, stage: Stage) -> &mut Vec<Box<dyn System>> {
        match stage {
            Stage::Controllers => &mut self.controllers,
            Stage::Pre => &mut self.pre_systems,
            Stage::Post => &mut self.post_systems,
        }
    }

    fn run_stage(&mut self, stage: Stage, dt: f64) {
        let mut systems = std::mem::take(self.stage_mut(stage));
        for system in systems.iter_mut() {
            system.step(self, dt);
        }
        // Systems added while the stage ran go after the existing ones.
        let added = std::mem::replace(self.stage_mut(stage), systems);
        self.stage_mut(stage).extend(added);
    }

    // ── Events ─────────────────────────────────────────────────────────

    pub fn emit(&mut self, kind: EventKind, payload: EventPayload) {
        self.events.emit(kind, payload, EmitOptions::default());
    }

    pub fn emit_from(&mut self, source: NodeId, kind: EventKind, payload: EventPayload) {
        self.events.emit(kind, payload, EmitOptions::from_source(source));
    }

    pub fn drain_events(&mut self, kind: &EventKind) -> Vec<Event> {
        self.events.drain(kind)
    }

    pub fn drain_all_events(&mut self) -> Vec<Event> {
        self.events.drain_all()
    }

    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    // ── Cameras ────────────────────────────────────────────────────────

    /// Advance the active camera to the next registered `cameraFeed` node
    /// (wrapping), emit `camera_changed`, and return the new selection.
    pub fn cycle_camera(&mut self) -> Option<NodeId> {
        let cams = self.assets_by_capability(&Capability::CAMERA_FEED);
        let current = self
            .view
            .active_camera
            .and_then(|c| cams.iter().position(|x| *x == c));
        let next = match current {
            Some(i) => cams.get((i + 1) % cams.len()).copied(),
            None => cams.first().copied(),
        };
        self.view.active_camera = next;
        self.emit(EventKind::CameraChanged, EventPayload::Camera { camera: next });
        debug!(camera = ?next, "camera cycled");
        next
    }

    // ── Frame loop ─────────────────────────────────────────────────────

    /// Advance one frame. `dt` is used as given.
    ///
    /// With `None` the controllers see an idle snapshot and the action map
    /// is not processed, so edge state carries over to the next real input.
    pub fn step(&mut self, dt: f64, input: Option<&InputSnapshot>) {
        self.frame += 1;
        self.time += dt;
        let span = info_span!("world_step", frame = self.frame);
        let _enter = span.enter();
        self.events.set_clock(self.frame, self.time);

        match input {
            Some(snapshot) => {
                self.input = snapshot.clone();
                let mut router = ActionRouter {
                    graph: &mut self.graph,
                    events: &mut self.events,
                    frame: self.frame,
                    time: self.time,
                };
                self.actions.process(&self.input, &mut router);
            }
            None => self.input = InputSnapshot::default(),
        }

        self.run_stage(Stage::Controllers, dt);
        self.run_stage(Stage::Pre, dt);

        let mut updated = 0usize;
        for entity in self.entities.clone() {
            if !self.is_alive(entity) {
                continue;
            }
            for id in self.graph.subtree(entity) {
                if self.update_node(id, dt) {
                    updated += 1;
                }
            }
        }

        self.run_stage(Stage::Post, dt);
        trace!(dt, updated, pending_events = self.events.len(), "frame done");
    }

    fn update_node(&mut self, id: NodeId, dt: f64) -> bool {
        let Some(mut asset) = self.graph.take_asset(id) else {
            return false;
        };
        let mut ctx = NodeContext::new(id, &mut self.graph, &mut self.events, self.frame, self.time);
        asset.update(dt, &mut ctx);
        self.graph.restore_asset(id, asset);
        true
    }
}

/// Routes node-owned actions from the action map to the owning asset.
struct ActionRouter<'a> {
    graph: &'a mut AssetGraph,
    events: &'a mut EventQueue,
    frame: u64,
    time: f64,
}

impl ActionTarget for ActionRouter<'_> {
    fn is_enabled(&self, owner: NodeId, action: &ActionId) -> bool {
        self.graph
            .get(owner)
            .and_then(|n| n.asset())
            .is_some_and(|a| a.action_enabled(action))
    }

    fn invoke(&mut self, owner: NodeId, ctx: &ActionContext<'_>) {
        let Some(mut asset) = self.graph.take_asset(owner) else {
            return;
        };
        let mut node = NodeContext::new(owner, self.graph, self.events, self.frame, self.time);
        asset.on_action(ctx, &mut node);
        self.graph.restore_asset(owner, asset);
    }
}
