//! Controllers and frame systems built on the kernel's [`System`] stages.
//!
//! Controllers read the frame's input and write intent into assets; pre
//! systems position the view and aim entities; post systems consume the
//! events node updates produced.
//!
//! [`System`]: worldquat_kernel::System

pub mod controllers;
pub mod systems;
pub mod tuning;

pub use controllers::{
    BotConfig, BotController, CameraController, FPS_MODE, PlayerController, TRACK_ENABLED,
    TrackerController, install_view_bindings,
};
pub use systems::{
    AssetFollowerSystem, CameraFollowSystem, ShotStats, ShotTally, TrackingSystem,
    WeaponEventsSystem,
};
pub use tuning::Tuning;
