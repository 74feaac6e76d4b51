use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};

use crate::quat::{QuatExt, from_axis_angle};

/// Rigid pose: position plus unit rotation, relative to some parent frame.
///
/// `Copy`, so constructing one never aliases the caller's values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub pos: DVec3,
    pub rot: DQuat,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        pos: DVec3::ZERO,
        rot: DQuat::IDENTITY,
    };

    pub fn new(pos: DVec3, rot: DQuat) -> Self {
        Self { pos, rot }
    }

    pub fn identity() -> Self {
        Self::IDENTITY
    }

    pub fn from_position(pos: DVec3) -> Self {
        Self {
            pos,
            ..Self::IDENTITY
        }
    }

    pub fn from_rotation(rot: DQuat) -> Self {
        Self {
            rot,
            ..Self::IDENTITY
        }
    }

    /// `self ∘ local`: rotations compose, the local offset is rotated into
    /// this frame and added.
    ///
    /// `a.compose(&b).transform_point(v) == a.transform_point(b.transform_point(v))`,
    /// which is what lets the mount graph add one compose per level.
    pub fn compose(&self, local: &Transform) -> Transform {
        Transform {
            pos: self.pos + self.rot.rotate(local.pos),
            rot: (self.rot * local.rot).canonicalized(),
        }
    }

    /// Map a point from this frame into the parent frame.
    pub fn transform_point(&self, v: DVec3) -> DVec3 {
        self.rot.rotate(v) + self.pos
    }

    /// Map a point from the parent frame into this frame.
    pub fn inverse_transform_point(&self, p: DVec3) -> DVec3 {
        self.rot.conjugated().rotate(p - self.pos)
    }

    /// Rotate a direction by this pose's rotation (no translation).
    pub fn rotate_vector_local(&self, v: DVec3) -> DVec3 {
        self.rot.rotate(v)
    }

    pub fn forward(&self) -> DVec3 {
        self.rot.rotate(DVec3::Z)
    }

    pub fn right(&self) -> DVec3 {
        self.rot.rotate(DVec3::X)
    }

    pub fn up(&self) -> DVec3 {
        self.rot.rotate(DVec3::Y)
    }

    /// Move along this pose's own axes.
    pub fn translate_local(&mut self, v: DVec3) {
        self.pos += self.rot.rotate(v);
    }

    /// Rotate about an axis expressed in this pose's frame (post-multiply).
    pub fn rotate_around_local(&mut self, axis: DVec3, angle: f64) {
        self.rot = (self.rot * from_axis_angle(axis, angle)).canonicalized();
    }

    /// Rotate about an axis expressed in the parent frame (pre-multiply).
    pub fn rotate_around_world(&mut self, axis: DVec3, angle: f64) {
        self.rot = (from_axis_angle(axis, angle) * self.rot).canonicalized();
    }
}
