//! Developer tooling: world inspector and asset tree printer.
//!
//! # Invariants
//! - Tools only read the world; nothing here mutates it.

pub mod inspector;
pub mod tree;

pub use inspector::{NodeInfo, WorldInspector, WorldSummary};
pub use tree::{TreeOptions, format_tree};
