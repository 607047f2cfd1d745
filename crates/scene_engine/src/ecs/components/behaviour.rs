//! Behaviour components
//!
//! A behaviour is per-entity logic driven by the
//! [`BehaviourScheduler`](crate::ecs::systems::BehaviourScheduler): `start`
//! once, on the first frame the behaviour is observed, then `update` every
//! frame including that one. The started flag lives in [`BehaviourSlot`] and
//! is owned by the scheduler; `start` itself does not guard re-entry.

use crate::ecs::{Component, ComponentKind, EntityId};
use crate::ecs::components::Transform;

/// Behaviour kinds the scheduler knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BehaviourKind {
    /// Continuous rotation about an axis
    Rotate,
    /// Host-supplied closures
    Scripted,
}

impl BehaviourKind {
    /// Every kind, in scheduling order
    pub const ALL: [BehaviourKind; 2] = [BehaviourKind::Rotate, BehaviourKind::Scripted];
}

/// What a behaviour may touch while it runs
pub struct BehaviourContext<'a> {
    /// Entity the behaviour is attached to
    pub entity: EntityId,
    /// Index of the current frame, starting at 0
    pub frame: u64,
    transform: Option<&'a mut Transform>,
}

impl<'a> BehaviourContext<'a> {
    pub(crate) fn new(entity: EntityId, frame: u64, transform: Option<&'a mut Transform>) -> Self {
        Self { entity, frame, transform }
    }

    /// The owner's transform, if it has one
    pub fn transform(&mut self) -> Option<&mut Transform> {
        self.transform.as_deref_mut()
    }
}

/// Per-entity logic
pub trait Behaviour {
    /// Kind slot this behaviour occupies on its entity
    fn kind(&self) -> BehaviourKind;

    /// Called once before the first `update`
    fn start(&mut self, _ctx: &mut BehaviourContext<'_>) {}

    /// Called every frame with the frame's delta time in seconds
    fn update(&mut self, ctx: &mut BehaviourContext<'_>, delta_time: f32);
}

/// An attached behaviour plus its started flag
pub struct BehaviourSlot {
    owner: EntityId,
    behaviour: Box<dyn Behaviour>,
    started: bool,
}

impl BehaviourSlot {
    pub(crate) fn new(owner: EntityId, behaviour: Box<dyn Behaviour>) -> Self {
        Self { owner, behaviour, started: false }
    }

    /// Kind of the attached behaviour
    pub fn behaviour_kind(&self) -> BehaviourKind {
        self.behaviour.kind()
    }

    /// Whether `start` has already run
    pub fn is_started(&self) -> bool {
        self.started
    }

    pub(crate) fn start(&mut self, ctx: &mut BehaviourContext<'_>) {
        self.behaviour.start(ctx);
        self.started = true;
    }

    pub(crate) fn update(&mut self, ctx: &mut BehaviourContext<'_>, delta_time: f32) {
        self.behaviour.update(ctx, delta_time);
    }
}

impl Component for BehaviourSlot {
    fn owner(&self) -> EntityId {
        self.owner
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Behaviour(self.behaviour.kind())
    }
}

impl std::fmt::Debug for BehaviourSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BehaviourSlot")
            .field("owner", &self.owner)
            .field("kind", &self.behaviour.kind())
            .field("started", &self.started)
            .finish()
    }
}
