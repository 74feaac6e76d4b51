use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use worldquat_common::{NodeId, PlayerId};
use worldquat_input::{Action, ActionContext, ActionId};
use worldquat_math::Transform;

use crate::events::{EmitOptions, EventKind, EventPayload, EventQueue};
use crate::graph::AssetGraph;

/// Capability tag advertised by an asset, e.g. `"weapon"` or `"cameraFeed"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Capability(Cow<'static, str>);

impl Capability {
    pub const CAMERA_FEED: Capability = Capability(Cow::Borrowed("cameraFeed"));
    pub const WEAPON: Capability = Capability(Cow::Borrowed("weapon"));
    pub const MOTOR: Capability = Capability(Cow::Borrowed("motor"));
    pub const TRACKER: Capability = Capability(Cow::Borrowed("tracker"));

    pub fn new(tag: impl Into<String>) -> Self {
        Self(Cow::Owned(tag.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Upcast to `Any` so graph lookups can hand back concrete asset types.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Behaviour attached to a node.
///
/// This is the only extension point for gameplay: the graph and the world
/// never branch on concrete asset types. Every method but `kind` has an
/// empty default.
pub trait Asset: AsAny {
    /// Kind string matched by [`crate::Accept::Kind`] and kind queries.
    fn kind(&self) -> &str;

    fn capabilities(&self) -> Vec<Capability> {
        Vec::new()
    }

    /// Actions to register while this node is part of a live entity.
    /// `node` is the node this asset is attached to, for unique ids.
    fn actions(&self, node: NodeId) -> Vec<Action> {
        let _ = node;
        Vec::new()
    }

    fn action_enabled(&self, action: &ActionId) -> bool {
        let _ = action;
        true
    }

    fn on_action(&mut self, action: &ActionContext<'_>, node: &mut NodeContext<'_>) {
        let _ = (action, node);
    }

    fn update(&mut self, dt: f64, node: &mut NodeContext<'_>) {
        let _ = (dt, node);
    }
}

/// What an asset may touch while it runs.
///
/// Gives read access to the whole graph and write access to transforms and
/// other assets, but no way to attach, detach or remove nodes.
pub struct NodeContext<'a> {
    node: NodeId,
    graph: &'a mut AssetGraph,
    events: &'a mut EventQueue,
    frame: u64,
    time: f64,
}

impl<'a> NodeContext<'a> {
    pub fn new(
        node: NodeId,
        graph: &'a mut AssetGraph,
        events: &'a mut EventQueue,
        frame: u64,
        time: f64,
    ) -> Self {
        Self {
            node,
            graph,
            events,
            frame,
            time,
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn graph(&self) -> &AssetGraph {
        self.graph
    }

    /// Direct host of this node, if attached.
    pub fn host(&self) -> Option<NodeId> {
        self.graph.get(self.node)?.host()
    }

    /// Root of the tree this node lives in.
    pub fn root(&self) -> NodeId {
        self.graph.root_of(self.node).unwrap_or(self.node)
    }

    /// Entity owning this node's tree; `None` while the tree has no entity root.
    pub fn host_entity(&self) -> Option<NodeId> {
        self.graph.host_entity_of(self.node)
    }

    /// Player association of the owning entity.
    pub fn entity_owner(&self) -> Option<PlayerId> {
        let root = self.graph.get(self.host_entity()?)?;
        root.entity()?.owner
    }

    pub fn local(&self) -> Transform {
        self.graph
            .get(self.node)
            .map(|n| n.local)
            .unwrap_or_default()
    }

    pub fn local_mut(&mut self) -> Option<&mut Transform> {
        self.graph.local_mut(self.node)
    }

    pub fn local_mut_of(&mut self, id: NodeId) -> Option<&mut Transform> {
        self.graph.local_mut(id)
    }

    pub fn world_transform(&self) -> Transform {
        self.graph
            .world_transform(self.node)
            .unwrap_or_default()
    }

    pub fn world_transform_of(&self, id: NodeId) -> Option<Transform> {
        self.graph.world_transform(id)
    }

    /// Another node's asset. The running asset itself is not reachable here.
    pub fn asset<T: Asset>(&self, id: NodeId) -> Option<&T> {
        self.graph.asset::<T>(id)
    }

    pub fn asset_mut<T: Asset>(&mut self, id: NodeId) -> Option<&mut T> {
        self.graph.asset_mut::<T>(id)
    }

    /// First node of `kind` in this node's tree, in traversal order.
    pub fn find_first_asset_by_kind(&self, kind: &str) -> Option<NodeId> {
        self.graph.find_first_asset_by_kind(self.root(), kind)
    }

    /// Queue an event sourced from this node, stamped with the current frame
    /// and world time.
    pub fn emit(&mut self, kind: EventKind, payload: EventPayload) {
        self.events.emit(
            kind,
            payload,
            EmitOptions {
                source: Some(self.node),
                frame: Some(self.frame),
                t: Some(self.time),
            },
        );
    }
}
