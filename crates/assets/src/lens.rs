use serde::{Deserialize, Serialize};
use worldquat_kernel::Asset;
use worldquat_math::{DVec3, Transform};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LensConfig {
    /// Projection scale in pixels per unit at depth 1.
    pub zoom: f64,
    pub near: f64,
}

impl Default for LensConfig {
    fn default() -> Self {
        Self {
            zoom: 600.0,
            near: 0.01,
        }
    }
}

/// Optics of the render camera entity. The entity's pose is the viewpoint.
#[derive(Debug, Clone, Default)]
pub struct Lens {
    pub config: LensConfig,
}

impl Lens {
    pub fn new(config: LensConfig) -> Self {
        Self { config }
    }

    /// Express world point `p` in the frame of a camera at `pose`.
    pub fn world_to_camera(pose: &Transform, p: DVec3) -> DVec3 {
        pose.inverse_transform_point(p)
    }

    /// Whether a camera-space point lies beyond the near plane.
    pub fn in_front(&self, cam: DVec3) -> bool {
        cam.z > self.config.near
    }
}

impl Asset for Lens {
    fn kind(&self) -> &str {
        "render_camera"
    }
}
