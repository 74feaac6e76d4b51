//! Input: per-frame snapshots and edge-detected action dispatch.
//!
//! The engine never sees raw device events. A host collaborator builds an
//! [`InputSnapshot`] each frame and the [`ActionMap`] turns the difference
//! between consecutive snapshots into press/hold/release/toggle invocations.
//!
//! # Invariants
//! - A key held across frames produces exactly one press, a hold on every
//!   frame it is held, then exactly one release.
//! - Dispatch does not depend on how many actions share a key or on how many
//!   owners registered or unregistered between frames.

pub mod action;
pub mod action_map;
pub mod snapshot;

pub use action::{Action, ActionContext, ActionId, ActionPhase, ActionType};
pub use action_map::{ActionMap, ActionTarget, GlobalHandler};
pub use snapshot::{InputSnapshot, PointerDelta, PointerKind};
