use serde::{Deserialize, Serialize};
use std::fmt;
use worldquat_common::{MountId, NodeId, PlayerId};
use worldquat_math::Transform;

/// Event type tag. Drains filter on this.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    WeaponFired,
    WeaponEmpty,
    WeaponReloaded,
    AssetFitted,
    AssetUnfitted,
    CameraChanged,
    ProjectileSpawned,
    ProjectileHit,
    EntityDamaged,
    EntityDestroyed,
    ScoreAwarded,
    Custom(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::WeaponFired => "weapon_fired",
            EventKind::WeaponEmpty => "weapon_empty",
            EventKind::WeaponReloaded => "weapon_reloaded",
            EventKind::AssetFitted => "asset_fitted",
            EventKind::AssetUnfitted => "asset_unfitted",
            EventKind::CameraChanged => "camera_changed",
            EventKind::ProjectileSpawned => "projectile_spawned",
            EventKind::ProjectileHit => "projectile_hit",
            EventKind::EntityDamaged => "entity_damaged",
            EventKind::EntityDestroyed => "entity_destroyed",
            EventKind::ScoreAwarded => "score_awarded",
            EventKind::Custom(name) => name,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event body. The queue never looks inside.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum EventPayload {
    #[default]
    None,
    Weapon {
        weapon: NodeId,
        owner: Option<PlayerId>,
        transform: Transform,
        ammo: u32,
    },
    Mount {
        host: NodeId,
        node: NodeId,
        mount: MountId,
    },
    Camera {
        camera: Option<NodeId>,
    },
    Data(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub payload: EventPayload,
    /// World time at emission.
    pub t: f64,
    pub frame: u64,
    pub source: Option<NodeId>,
}

/// Overrides for [`EventQueue::emit`]. Unset fields come from the queue clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmitOptions {
    pub source: Option<NodeId>,
    pub frame: Option<u64>,
    pub t: Option<f64>,
}

impl EmitOptions {
    pub fn from_source(source: NodeId) -> Self {
        Self {
            source: Some(source),
            ..Self::default()
        }
    }
}

/// Buffered events, held until drained.
///
/// Nothing is cleared at frame end: a kind nobody drains accumulates. A
/// filtered drain leaves every other kind in place and in order.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    events: Vec<Event>,
    frame: u64,
    time: f64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the frame and time stamped onto events emitted without overrides.
    pub fn set_clock(&mut self, frame: u64, time: f64) {
        self.frame = frame;
        self.time = time;
    }

    pub fn emit(&mut self, kind: EventKind, payload: EventPayload, opts: EmitOptions) {
        self.events.push(Event {
            kind,
            payload,
            t: opts.t.unwrap_or(self.time),
            frame: opts.frame.unwrap_or(self.frame),
            source: opts.source,
        });
    }

    /// Remove and return every event of `kind`, oldest first.
    pub fn drain(&mut self, kind: &EventKind) -> Vec<Event> {
        let (taken, kept): (Vec<Event>, Vec<Event>) = std::mem::take(&mut self.events)
            .into_iter()
            .partition(|e| &e.kind == kind);
        self.events = kept;
        taken
    }

    /// Remove and return everything.
    pub fn drain_all(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn peek(&self, kind: &EventKind) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(move |e| &e.kind == kind)
    }

    pub fn peek_all(&self) -> &[Event] {
        &self.events
    }

    pub fn count(&self, kind: &EventKind) -> usize {
        self.peek(kind).count()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
