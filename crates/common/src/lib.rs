//! Shared identifiers used across the worldquat crates.

pub mod types;

pub use types::{MeshRef, MountId, NodeId, PlayerId};
