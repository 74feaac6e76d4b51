use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

use crate::snapshot::InputSnapshot;

/// Unique action identifier, e.g. `"node_4_fire"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActionId(pub String);

impl ActionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ActionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ActionId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for ActionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How an action reacts to key edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    /// Fires once on the frame a key goes down.
    Press,
    /// Fires every frame the key is held, and once more on release so the
    /// consumer can see the trigger let go.
    Hold,
    /// Fires once on the frame a key goes up.
    Release,
    /// Fires on press and flips a stored boolean.
    Toggle,
}

impl ActionType {
    /// Whether an action of this type fires for `phase`.
    pub fn accepts(self, phase: ActionPhase) -> bool {
        match self {
            ActionType::Press | ActionType::Toggle => phase == ActionPhase::Press,
            ActionType::Hold => matches!(phase, ActionPhase::Hold | ActionPhase::Release),
            ActionType::Release => phase == ActionPhase::Release,
        }
    }
}

/// Edge of a key transition being dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionPhase {
    Press,
    Hold,
    Release,
}

impl fmt::Display for ActionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionPhase::Press => "press",
            ActionPhase::Hold => "hold",
            ActionPhase::Release => "release",
        };
        f.write_str(s)
    }
}

/// An action contributed by a node (or registered globally).
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub id: ActionId,
    pub label: String,
    pub kind: ActionType,
    /// Keys bound to this action when it is registered.
    pub suggested_keys: Vec<String>,
}

impl Action {
    pub fn new(id: impl Into<ActionId>, kind: ActionType) -> Self {
        let id = id.into();
        Self {
            label: id.0.clone(),
            id,
            kind,
            suggested_keys: Vec::new(),
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suggested_keys.extend(keys.into_iter().map(Into::into));
        self
    }
}

/// What an invoked action learns about the dispatch that triggered it.
#[derive(Debug, Clone, Copy)]
pub struct ActionContext<'a> {
    pub action: &'a ActionId,
    pub key: &'a str,
    pub phase: ActionPhase,
    /// New state for toggle actions, `None` otherwise.
    pub toggled: Option<bool>,
    pub input: &'a InputSnapshot,
}
