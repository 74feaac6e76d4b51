//! World kernel: the asset/mount graph, the event queue and the frame loop.
//!
//! Entities are roots of a tree of nodes. Each node may carry an [`Asset`]
//! behaviour and declare mounts that hold at most one child. A node's world
//! pose is its ancestors' poses and mount offsets composed down to it.
//!
//! # Invariants
//! - Attaching never creates a cycle; a failed attach changes nothing.
//! - Capabilities and actions are registered for exactly the nodes reachable
//!   from live entities.
//! - One `World::step` runs to completion before the next begins; assets
//!   cannot change graph structure while it runs.

pub mod asset;
pub mod events;
pub mod graph;
pub mod world;

pub use asset::{AsAny, Asset, Capability, NodeContext};
pub use events::{EmitOptions, Event, EventKind, EventPayload, EventQueue};
pub use graph::{
    Accept, AssetGraph, EntityState, Mount, MountConfig, MountError, Node, NodeSpec, Visit,
};
pub use world::{System, View, World};
