use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Which device produced the pointer delta.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointerKind {
    #[default]
    Mouse,
    Touch,
    Pen,
}

/// Pointer motion accumulated since the previous snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PointerDelta {
    pub dx: f64,
    pub dy: f64,
    pub kind: PointerKind,
}

/// Everything the engine learns about input for one frame.
///
/// Keys are device identifiers such as `"Space"`, `"KeyL"` or `"ArrowUp"`.
/// `toggles` carries host-side switches (e.g. `"trackEnabled"`) that are not
/// edge detected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputSnapshot {
    pub held: BTreeSet<String>,
    pub pointer: PointerDelta,
    pub shift: bool,
    pub toggles: BTreeMap<String, bool>,
}

impl InputSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot with exactly these keys held.
    pub fn with_held<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            held: keys.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn hold(mut self, key: impl Into<String>) -> Self {
        self.held.insert(key.into());
        self
    }

    pub fn pointer(mut self, dx: f64, dy: f64, kind: PointerKind) -> Self {
        self.pointer = PointerDelta { dx, dy, kind };
        self
    }

    pub fn shift(mut self, shift: bool) -> Self {
        self.shift = shift;
        self
    }

    pub fn set_toggle(mut self, name: impl Into<String>, on: bool) -> Self {
        self.toggles.insert(name.into(), on);
        self
    }

    pub fn is_held(&self, key: &str) -> bool {
        self.held.contains(key)
    }

    /// Host toggle state; missing toggles read as off.
    pub fn toggle(&self, name: &str) -> bool {
        self.toggles.get(name).copied().unwrap_or(false)
    }
}
