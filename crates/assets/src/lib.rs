//! Concrete assets that plug into the kernel's [`Asset`] contract.
//!
//! Each asset is configured through a serde-friendly config struct whose
//! `Default` carries the tuned values.
//!
//! [`Asset`]: worldquat_kernel::Asset

pub mod camera;
pub mod lens;
pub mod motor;
pub mod tracker;
pub mod weapon;

pub use camera::{Camera, CameraConfig};
pub use lens::{Lens, LensConfig};
pub use motor::{MotionSpace, Motor, MotorConfig, MotorIntent};
pub use tracker::{Tracker, TrackerConfig};
pub use weapon::{Weapon, WeaponConfig};
