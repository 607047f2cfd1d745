//! Closure-backed behaviour for hosts and tests

use crate::ecs::components::{Behaviour, BehaviourContext, BehaviourKind};

type StartFn = dyn FnMut(&mut BehaviourContext<'_>);
type UpdateFn = dyn FnMut(&mut BehaviourContext<'_>, f32);

/// Behaviour whose start and update are host closures
pub struct ScriptedBehaviour {
    on_start: Option<Box<StartFn>>,
    on_update: Box<UpdateFn>,
}

impl ScriptedBehaviour {
    /// Behaviour that only updates
    pub fn new(on_update: impl FnMut(&mut BehaviourContext<'_>, f32) + 'static) -> Self {
        Self { on_start: None, on_update: Box::new(on_update) }
    }

    /// Add a start hook
    pub fn on_start(mut self, on_start: impl FnMut(&mut BehaviourContext<'_>) + 'static) -> Self {
        self.on_start = Some(Box::new(on_start));
        self
    }
}

impl Behaviour for ScriptedBehaviour {
    fn kind(&self) -> BehaviourKind {
        BehaviourKind::Scripted
    }

    fn start(&mut self, ctx: &mut BehaviourContext<'_>) {
        if let Some(on_start) = self.on_start.as_mut() {
            on_start(ctx);
        }
    }

    fn update(&mut self, ctx: &mut BehaviourContext<'_>, delta_time: f32) {
        (self.on_update)(ctx, delta_time);
    }
}
