use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, trace, warn};
use worldquat_common::NodeId;

use crate::action::{Action, ActionContext, ActionId, ActionPhase, ActionType};
use crate::snapshot::InputSnapshot;

/// Handler for an action that has no owning node.
pub type GlobalHandler = Box<dyn FnMut(&ActionContext<'_>)>;
/// Optional enabled guard for a global action.
pub type EnabledGuard = Box<dyn Fn() -> bool>;

/// Receiver for node-owned actions.
///
/// The map stores only the owning [`NodeId`]; whoever owns the nodes (the
/// kernel's world) routes the invocation to the right asset.
pub trait ActionTarget {
    /// Guard consulted before each dispatch. Disabled actions are skipped.
    fn is_enabled(&self, owner: NodeId, action: &ActionId) -> bool {
        let _ = (owner, action);
        true
    }

    fn invoke(&mut self, owner: NodeId, ctx: &ActionContext<'_>);
}

enum Owner {
    Node(NodeId),
    Global {
        handler: GlobalHandler,
        enabled: Option<EnabledGuard>,
    },
}

struct Registered {
    owner: Owner,
    action: Action,
}

/// Key bindings plus edge detection between consecutive input snapshots.
#[derive(Default)]
pub struct ActionMap {
    /// Per key, action ids in binding order.
    bindings: BTreeMap<String, Vec<ActionId>>,
    actions: BTreeMap<ActionId, Registered>,
    last_held: BTreeSet<String>,
    toggle_state: BTreeMap<ActionId, bool>,
}

impl fmt::Debug for ActionMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionMap")
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .field("bindings", &self.bindings)
            .field("last_held", &self.last_held)
            .field("toggle_state", &self.toggle_state)
            .finish()
    }
}

impl ActionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every action a node contributes and bind its suggested keys.
    pub fn register_node(&mut self, node: NodeId, actions: impl IntoIterator<Item = Action>) {
        for action in actions {
            self.insert(Owner::Node(node), action);
        }
    }

    /// Drop every action owned by `node`, with its bindings and toggle state.
    /// Returns how many actions were removed.
    pub fn unregister_node(&mut self, node: NodeId) -> usize {
        let owned: Vec<ActionId> = self
            .actions
            .iter()
            .filter(|(_, r)| matches!(r.owner, Owner::Node(n) if n == node))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &owned {
            self.remove(id);
        }
        if !owned.is_empty() {
            debug!(%node, count = owned.len(), "unregistered node actions");
        }
        owned.len()
    }

    /// Register an action with no owning node.
    pub fn register_global(
        &mut self,
        action: Action,
        handler: GlobalHandler,
        enabled: Option<EnabledGuard>,
    ) {
        self.insert(Owner::Global { handler, enabled }, action);
    }

    /// Remove one action by id. Returns whether it existed.
    pub fn unregister(&mut self, id: &ActionId) -> bool {
        self.remove(id)
    }

    pub fn bind(&mut self, key: impl Into<String>, id: ActionId) {
        let ids = self.bindings.entry(key.into()).or_default();
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    pub fn unbind(&mut self, key: &str, id: &ActionId) {
        if let Some(ids) = self.bindings.get_mut(key) {
            ids.retain(|x| x != id);
            if ids.is_empty() {
                self.bindings.remove(key);
            }
        }
    }

    /// Remove `id` from every key it is bound to.
    pub fn unbind_all_for(&mut self, id: &ActionId) {
        self.bindings.retain(|_, ids| {
            ids.retain(|x| x != id);
            !ids.is_empty()
        });
    }

    /// Run one frame of edge detection and dispatch.
    ///
    /// Order: press for keys newly held, hold for every held key, release for
    /// keys no longer held; within a key, actions run in binding order.
    /// Returns the number of invocations.
    pub fn process(&mut self, input: &InputSnapshot, target: &mut dyn ActionTarget) -> usize {
        let pressed: Vec<String> = input.held.difference(&self.last_held).cloned().collect();
        let released: Vec<String> = self.last_held.difference(&input.held).cloned().collect();

        let mut fired = 0;
        for key in &pressed {
            fired += self.dispatch(key, ActionPhase::Press, input, target);
        }
        for key in &input.held {
            fired += self.dispatch(key, ActionPhase::Hold, input, target);
        }
        for key in &released {
            fired += self.dispatch(key, ActionPhase::Release, input, target);
        }

        self.last_held = input.held.clone();
        trace!(
            pressed = pressed.len(),
            released = released.len(),
            fired,
            "action map processed"
        );
        fired
    }

    /// Forget the previous snapshot so currently held keys press again.
    pub fn reset_edges(&mut self) {
        self.last_held.clear();
    }

    pub fn contains(&self, id: &ActionId) -> bool {
        self.actions.contains_key(id)
    }

    pub fn action(&self, id: &ActionId) -> Option<&Action> {
        self.actions.get(id).map(|r| &r.action)
    }

    /// Owning node of a registered action; `None` for global or unknown ids.
    pub fn owner_of(&self, id: &ActionId) -> Option<NodeId> {
        match self.actions.get(id)?.owner {
            Owner::Node(n) => Some(n),
            Owner::Global { .. } => None,
        }
    }

    pub fn actions_of(&self, node: NodeId) -> Vec<&Action> {
        self.actions
            .values()
            .filter(|r| matches!(r.owner, Owner::Node(n) if n == node))
            .map(|r| &r.action)
            .collect()
    }

    /// Action ids bound to `key`, in binding order.
    pub fn bindings(&self, key: &str) -> &[ActionId] {
        self.bindings.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn toggle_state(&self, id: &ActionId) -> Option<bool> {
        self.toggle_state.get(id).copied()
    }

    pub fn last_held(&self) -> &BTreeSet<String> {
        &self.last_held
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    fn insert(&mut self, owner: Owner, action: Action) {
        let id = action.id.clone();
        if self.actions.contains_key(&id) {
            warn!(action = %id, "action id already registered, replacing");
            self.unbind_all_for(&id);
        }
        for key in &action.suggested_keys {
            self.bind(key.clone(), id.clone());
        }
        debug!(action = %id, keys = ?action.suggested_keys, "registered action");
        self.actions.insert(id, Registered { owner, action });
    }

    fn remove(&mut self, id: &ActionId) -> bool {
        let existed = self.actions.remove(id).is_some();
        self.unbind_all_for(id);
        self.toggle_state.remove(id);
        existed
    }

    fn dispatch(
        &mut self,
        key: &str,
        phase: ActionPhase,
        input: &InputSnapshot,
        target: &mut dyn ActionTarget,
    ) -> usize {
        let Some(ids) = self.bindings.get(key) else {
            return 0;
        };
        let ids = ids.clone();

        let mut fired = 0;
        for id in &ids {
            let Some(reg) = self.actions.get_mut(id) else {
                continue;
            };
            let enabled = match &reg.owner {
                Owner::Node(n) => target.is_enabled(*n, id),
                Owner::Global { enabled, .. } => enabled.as_ref().is_none_or(|guard| guard()),
            };
            if !enabled || !reg.action.kind.accepts(phase) {
                continue;
            }

            let toggled = if reg.action.kind == ActionType::Toggle {
                let state = self.toggle_state.entry(id.clone()).or_insert(false);
                *state = !*state;
                Some(*state)
            } else {
                None
            };

            let ctx = ActionContext {
                action: id,
                key,
                phase,
                toggled,
                input,
            };
            match &mut reg.owner {
                Owner::Node(n) => target.invoke(*n, &ctx),
                Owner::Global { handler, .. } => handler(&ctx),
            }
            fired += 1;
        }
        fired
    }
}
