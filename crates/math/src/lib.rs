//! Math substrate: 3-vectors, unit quaternions, rigid transforms, shortest-arc tracking.
//!
//! Built on glam's double-precision types. The extension traits add the
//! engine's edge-case rules on top of glam's operators.
//!
//! # Invariants
//! - Every compose/integrate result is a unit quaternion with `w >= 0`.
//! - Normalizing a zero vector is a no-op; a zero quaternion becomes identity.
//! - No operation here produces NaN from finite input.
//!
//! # Conventions
//! - Quaternions are `[w, x, y, z]` at the array boundary.
//! - World-axis rotations pre-multiply, local-axis rotations post-multiply.
//! - Local forward is `+Z`, right is `+X`, up is `+Y`.

pub mod arc;
pub mod quat;
pub mod transform;
pub mod vec3;

pub use arc::shortest_arc_step;
pub use glam::{DMat3, DQuat, DVec3};
pub use quat::{QI, QuatExt, angle_between, from_axis_angle, nlerp, quat_from_wxyz};
pub use transform::Transform;
pub use vec3::{Vec3Ext, clamp, clamp_unit};
