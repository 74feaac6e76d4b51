use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;
use worldquat_common::{MeshRef, MountId, NodeId, PlayerId};
use worldquat_math::{DQuat, DVec3, Transform};

use crate::asset::{Asset, Capability};

/// Errors from mount authoring. Each is a wiring mistake in scene setup.
///
/// A failed call leaves the graph exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MountError {
    #[error("node {0} not found")]
    UnknownNode(NodeId),
    #[error("node {node} has no mount '{mount}'")]
    UnknownMount { node: NodeId, mount: MountId },
    #[error("mount '{mount}' already declared on {node}")]
    DuplicateMount { node: NodeId, mount: MountId },
    #[error("mount '{mount}' on {host} is occupied by {occupant}")]
    Occupied {
        host: NodeId,
        mount: MountId,
        occupant: NodeId,
    },
    #[error("mount '{mount}' on {host} rejects {node} of kind '{kind}'")]
    Rejected {
        host: NodeId,
        mount: MountId,
        node: NodeId,
        kind: String,
    },
    #[error("fitting {node} under {host} would create a cycle")]
    Cycle { host: NodeId, node: NodeId },
    #[error("{node} is already attached to {host}")]
    AlreadyAttached { node: NodeId, host: NodeId },
    #[error("{0} is an entity root and cannot be fitted")]
    EntityRoot(NodeId),
}

/// What a mount will take.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Accept {
    #[default]
    Any,
    Kind(String),
    Capability(Capability),
}

impl Accept {
    fn admits(&self, node: &Node) -> bool {
        match self {
            Accept::Any => true,
            Accept::Kind(kind) => node.kind == *kind,
            Accept::Capability(cap) => node.capabilities().contains(cap),
        }
    }
}

/// Declaration passed to [`AssetGraph::add_mount`].
#[derive(Debug, Clone)]
pub struct MountConfig {
    pub id: MountId,
    pub slot: String,
    pub offset: Transform,
    pub accept: Accept,
}

impl MountConfig {
    pub fn new(id: impl Into<MountId>) -> Self {
        Self {
            id: id.into(),
            slot: "any".into(),
            offset: Transform::IDENTITY,
            accept: Accept::Any,
        }
    }

    pub fn slot(mut self, slot: impl Into<String>) -> Self {
        self.slot = slot.into();
        self
    }

    pub fn offset(mut self, offset: Transform) -> Self {
        self.offset = offset;
        self
    }

    pub fn accept(mut self, accept: Accept) -> Self {
        self.accept = accept;
        self
    }
}

/// A declared slot and its occupant.
#[derive(Debug, Clone)]
pub struct Mount {
    pub id: MountId,
    pub slot: String,
    pub offset: Transform,
    pub accept: Accept,
    occupant: Option<NodeId>,
}

impl Mount {
    pub fn occupant(&self) -> Option<NodeId> {
        self.occupant
    }
}

/// State carried only by entity roots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityState {
    pub owner: Option<PlayerId>,
    pub alive: bool,
}

/// A node in the asset graph: an entity root or a fittable asset.
pub struct Node {
    pub id: NodeId,
    pub kind: String,
    pub name: Option<String>,
    pub local: Transform,
    pub mesh: Option<MeshRef>,
    host: Option<NodeId>,
    host_mount: Option<MountId>,
    mounts: Vec<Mount>,
    entity: Option<EntityState>,
    asset: Option<Box<dyn Asset>>,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("local", &self.local)
            .field("host", &self.host)
            .field("host_mount", &self.host_mount)
            .field("mounts", &self.mounts)
            .field("entity", &self.entity)
            .field("has_asset", &self.asset.is_some())
            .finish()
    }
}

impl Node {
    pub fn host(&self) -> Option<NodeId> {
        self.host
    }

    pub fn host_mount(&self) -> Option<&MountId> {
        self.host_mount.as_ref()
    }

    /// Mounts in declaration order.
    pub fn mounts(&self) -> &[Mount] {
        &self.mounts
    }

    pub fn mount(&self, id: &MountId) -> Option<&Mount> {
        self.mounts.iter().find(|m| m.id == *id)
    }

    pub fn entity(&self) -> Option<&EntityState> {
        self.entity.as_ref()
    }

    pub fn is_entity(&self) -> bool {
        self.entity.is_some()
    }

    pub fn is_root(&self) -> bool {
        self.host.is_none()
    }

    pub fn asset(&self) -> Option<&dyn Asset> {
        self.asset.as_deref()
    }

    pub fn capabilities(&self) -> Vec<Capability> {
        self.asset().map(|a| a.capabilities()).unwrap_or_default()
    }

    /// Occupied child ids in mount order.
    pub fn children(&self) -> impl DoubleEndedIterator<Item = NodeId> + '_ {
        self.mounts.iter().filter_map(|m| m.occupant)
    }
}

/// Builder for new nodes.
pub struct NodeSpec {
    kind: String,
    name: Option<String>,
    local: Transform,
    mesh: Option<MeshRef>,
    owner: Option<PlayerId>,
    asset: Option<Box<dyn Asset>>,
}

impl NodeSpec {
    /// Plain node with no behaviour.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: None,
            local: Transform::IDENTITY,
            mesh: None,
            owner: None,
            asset: None,
        }
    }

    /// Node driven by `asset`; the kind comes from the asset.
    pub fn asset<A: Asset>(asset: A) -> Self {
        let mut spec = Self::new(asset.kind());
        spec.asset = Some(Box::new(asset));
        spec
    }

    pub fn at(mut self, pos: DVec3) -> Self {
        self.local.pos = pos;
        self
    }

    pub fn rotated(mut self, rot: DQuat) -> Self {
        self.local.rot = rot;
        self
    }

    pub fn with_transform(mut self, local: Transform) -> Self {
        self.local = local;
        self
    }

    pub fn with_mesh(mut self, mesh: MeshRef) -> Self {
        self.mesh = Some(mesh);
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Player association; only meaningful for entity roots.
    pub fn owned_by(mut self, owner: PlayerId) -> Self {
        self.owner = Some(owner);
        self
    }
}

/// Traversal control returned by [`AssetGraph::iterate`] visitors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Descend,
    /// Skip this node's subtree.
    Prune,
    /// End the traversal.
    Stop,
}

/// Arena holding every node. Hosts are referenced by id, occupants by id.
///
/// # Invariants
/// - Every occupant's `host`/`host_mount` point back at the mount holding it.
/// - Following `host` from any node terminates at a root.
#[derive(Debug)]
pub struct AssetGraph {
    nodes: BTreeMap<NodeId, Node>,
    next_id: u64,
}

impl Default for AssetGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetGraph {
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Create a standalone, unattached node.
    pub fn create_node(&mut self, spec: NodeSpec) -> NodeId {
        self.insert(spec, None)
    }

    /// Create an entity root (alive, not attachable).
    pub fn create_entity(&mut self, spec: NodeSpec) -> NodeId {
        let state = EntityState {
            owner: spec.owner,
            alive: true,
        };
        self.insert(spec, Some(state))
    }

    fn insert(&mut self, spec: NodeSpec, entity: Option<EntityState>) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            Node {
                id,
                kind: spec.kind,
                name: spec.name,
                local: spec.local,
                mesh: spec.mesh,
                host: None,
                host_mount: None,
                mounts: Vec::new(),
                entity,
                asset: spec.asset,
            },
        );
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn local_mut(&mut self, id: NodeId) -> Option<&mut Transform> {
        self.nodes.get_mut(&id).map(|n| &mut n.local)
    }

    pub fn entity_mut(&mut self, id: NodeId) -> Option<&mut EntityState> {
        self.nodes.get_mut(&id)?.entity.as_mut()
    }

    pub fn asset<T: Asset>(&self, id: NodeId) -> Option<&T> {
        self.nodes
            .get(&id)?
            .asset
            .as_deref()?
            .as_any()
            .downcast_ref::<T>()
    }

    pub fn asset_mut<T: Asset>(&mut self, id: NodeId) -> Option<&mut T> {
        self.nodes
            .get_mut(&id)?
            .asset
            .as_deref_mut()?
            .as_any_mut()
            .downcast_mut::<T>()
    }

    pub(crate) fn take_asset(&mut self, id: NodeId) -> Option<Box<dyn Asset>> {
        self.nodes.get_mut(&id)?.asset.take()
    }

    pub(crate) fn restore_asset(&mut self, id: NodeId, asset: Box<dyn Asset>) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.asset = Some(asset);
        }
    }

    /// Declare a named slot on `node`. Nothing is attached.
    pub fn add_mount(&mut self, node: NodeId, cfg: MountConfig) -> Result<&Mount, MountError> {
        let n = self
            .nodes
            .get_mut(&node)
            .ok_or(MountError::UnknownNode(node))?;
        if n.mounts.iter().any(|m| m.id == cfg.id) {
            return Err(MountError::DuplicateMount {
                node,
                mount: cfg.id,
            });
        }
        n.mounts.push(Mount {
            id: cfg.id,
            slot: cfg.slot,
            offset: cfg.offset,
            accept: cfg.accept,
            occupant: None,
        });
        Ok(&n.mounts[n.mounts.len() - 1])
    }

    pub fn mounts(&self, node: NodeId) -> &[Mount] {
        self.nodes.get(&node).map(|n| n.mounts()).unwrap_or(&[])
    }

    pub fn mount_occupant(&self, host: NodeId, mount: &MountId) -> Option<NodeId> {
        self.nodes.get(&host)?.mount(mount)?.occupant
    }

    /// Attach `node` into `mount` on `host`.
    ///
    /// Checks, in order: both nodes exist, the mount exists, it is empty,
    /// its acceptance rule admits `node`, `host` is not inside `node`'s
    /// subtree, `node` is not already attached, `node` is not an entity root.
    pub fn fit_asset(&mut self, host: NodeId, mount: &MountId, node: NodeId) -> Result<(), MountError> {
        let h = self.nodes.get(&host).ok_or(MountError::UnknownNode(host))?;
        let n = self.nodes.get(&node).ok_or(MountError::UnknownNode(node))?;
        let m = h.mount(mount).ok_or_else(|| MountError::UnknownMount {
            node: host,
            mount: mount.clone(),
        })?;
        if let Some(occupant) = m.occupant {
            return Err(MountError::Occupied {
                host,
                mount: mount.clone(),
                occupant,
            });
        }
        if !m.accept.admits(n) {
            return Err(MountError::Rejected {
                host,
                mount: mount.clone(),
                node,
                kind: n.kind.clone(),
            });
        }
        if self.is_self_or_ancestor(node, host) {
            return Err(MountError::Cycle { host, node });
        }
        if let Some(current) = n.host {
            return Err(MountError::AlreadyAttached {
                node,
                host: current,
            });
        }
        if n.is_entity() {
            return Err(MountError::EntityRoot(node));
        }

        if let Some(m) = self
            .nodes
            .get_mut(&host)
            .and_then(|h| h.mounts.iter_mut().find(|m| m.id == *mount))
        {
            m.occupant = Some(node);
        }
        if let Some(n) = self.nodes.get_mut(&node) {
            n.host = Some(host);
            n.host_mount = Some(mount.clone());
        }
        debug!(%host, %mount, %node, "fitted asset");
        Ok(())
    }

    /// Detach whatever occupies `mount` on `host`. `Ok(None)` if empty.
    pub fn unfit_asset(&mut self, host: NodeId, mount: &MountId) -> Result<Option<NodeId>, MountError> {
        let h = self
            .nodes
            .get_mut(&host)
            .ok_or(MountError::UnknownNode(host))?;
        let m = h
            .mounts
            .iter_mut()
            .find(|m| m.id == *mount)
            .ok_or_else(|| MountError::UnknownMount {
                node: host,
                mount: mount.clone(),
            })?;
        let Some(node) = m.occupant.take() else {
            return Ok(None);
        };
        if let Some(n) = self.nodes.get_mut(&node) {
            n.host = None;
            n.host_mount = None;
        }
        debug!(%host, %mount, %node, "unfitted asset");
        Ok(Some(node))
    }

    /// True when `ancestor` is `node` or lies on `node`'s host chain.
    fn is_self_or_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cur = Some(node);
        while let Some(id) = cur {
            if id == ancestor {
                return true;
            }
            cur = self.nodes.get(&id).and_then(|n| n.host);
        }
        false
    }

    /// Root of the tree containing `node`.
    pub fn root_of(&self, node: NodeId) -> Option<NodeId> {
        let mut id = node;
        loop {
            match self.nodes.get(&id)?.host {
                Some(h) => id = h,
                None => return Some(id),
            }
        }
    }

    /// Root of `node`'s tree, if that root is an entity.
    pub fn host_entity_of(&self, node: NodeId) -> Option<NodeId> {
        let root = self.root_of(node)?;
        self.nodes.get(&root)?.is_entity().then_some(root)
    }

    /// Pose in world space: parent world ∘ mount offset ∘ local, from the root
    /// down. A root's world pose is its local pose.
    pub fn world_transform(&self, node: NodeId) -> Option<Transform> {
        let mut chain = Vec::new();
        let mut id = node;
        loop {
            let n = self.nodes.get(&id)?;
            chain.push(n);
            match n.host {
                Some(h) => id = h,
                None => break,
            }
        }

        let mut nodes = chain.into_iter().rev();
        let root = nodes.next()?;
        let mut world = root.local;
        let mut parent = root;
        for n in nodes {
            let offset = n
                .host_mount
                .as_ref()
                .and_then(|m| parent.mount(m))
                .map(|m| m.offset)
                .unwrap_or_default();
            world = world.compose(&offset).compose(&n.local);
            parent = n;
        }
        Some(world)
    }

    /// Depth-first pre-order walk from `start`; children in mount order.
    /// The visitor gets each node and its depth below `start`.
    pub fn iterate<F>(&self, start: NodeId, mut visit: F)
    where
        F: FnMut(&Node, usize) -> Visit,
    {
        let mut stack = vec![(start, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            match visit(node, depth) {
                Visit::Descend => {}
                Visit::Prune => continue,
                Visit::Stop => return,
            }
            for child in node.children().rev() {
                stack.push((child, depth + 1));
            }
        }
    }

    /// Every node id under `start`, `start` first, in traversal order.
    pub fn subtree(&self, start: NodeId) -> Vec<NodeId> {
        let mut ids = Vec::new();
        self.iterate(start, |n, _| {
            ids.push(n.id);
            Visit::Descend
        });
        ids
    }

    /// First node under `start` (inclusive) satisfying `pred`.
    pub fn find_asset<P>(&self, start: NodeId, mut pred: P) -> Option<NodeId>
    where
        P: FnMut(&Node) -> bool,
    {
        let mut found = None;
        self.iterate(start, |n, _| {
            if pred(n) {
                found = Some(n.id);
                Visit::Stop
            } else {
                Visit::Descend
            }
        });
        found
    }

    pub fn find_first_asset_by_kind(&self, start: NodeId, kind: &str) -> Option<NodeId> {
        self.find_asset(start, |n| n.kind == kind)
    }

    pub fn find_assets_by_kind(&self, start: NodeId, kind: &str) -> Vec<NodeId> {
        let mut ids = Vec::new();
        self.iterate(start, |n, _| {
            if n.kind == kind {
                ids.push(n.id);
            }
            Visit::Descend
        });
        ids
    }

    /// Detach `node` if attached, then delete it and everything under it.
    /// Returns the removed ids in traversal order.
    pub fn remove_subtree(&mut self, node: NodeId) -> Vec<NodeId> {
        let Some(n) = self.nodes.get(&node) else {
            return Vec::new();
        };
        if let (Some(host), Some(mount)) = (n.host, n.host_mount.clone()) {
            // Occupancy is consistent, so this cannot fail.
            let _ = self.unfit_asset(host, &mount);
        }
        let ids = self.subtree(node);
        for id in &ids {
            self.nodes.remove(id);
        }
        debug!(%node, removed = ids.len(), "removed subtree");
        ids
    }
}
