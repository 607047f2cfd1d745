//! # Behaviour Scheduler
//!
//! Runs attached behaviours once per frame in two passes:
//!
//! 1. every behaviour not yet started gets `start`
//! 2. every behaviour, including the ones just started, gets `update(dt)`
//!
//! Within a pass the order is entity spawn order, then the scheduler's kind
//! order. The collected set is fixed at the start of the frame.

use crate::ecs::components::{BehaviourContext, BehaviourKind};
use crate::ecs::{EntityId, World};

/// Counts from one scheduler run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleStats {
    /// Behaviours started this frame
    pub started: usize,
    /// Behaviours updated this frame
    pub updated: usize,
}

/// Drives behaviour `start`/`update`
#[derive(Debug)]
pub struct BehaviourScheduler {
    kinds: Vec<BehaviourKind>,
    frame: u64,
}

impl Default for BehaviourScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl BehaviourScheduler {
    /// Scheduler over every behaviour kind
    pub fn new() -> Self {
        Self::with_kinds(BehaviourKind::ALL.to_vec())
    }

    /// Scheduler over a chosen set of kinds, run in the given order
    pub fn with_kinds(kinds: Vec<BehaviourKind>) -> Self {
        Self { kinds, frame: 0 }
    }

    /// Frames run so far
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Run one frame of behaviours with the shared delta time
    pub fn run(&mut self, world: &mut World, delta_time: f32) -> ScheduleStats {
        let collected = self.collect(world);
        let mut stats = ScheduleStats::default();

        for &(entity, kind) in &collected {
            let Some((slot, transform)) = world.get_mut(entity).and_then(|o| o.behaviour_parts(kind)) else {
                continue;
            };
            if !slot.is_started() {
                let mut ctx = BehaviourContext::new(entity, self.frame, transform);
                slot.start(&mut ctx);
                stats.started += 1;
            }
        }

        for &(entity, kind) in &collected {
            let Some((slot, transform)) = world.get_mut(entity).and_then(|o| o.behaviour_parts(kind)) else {
                continue;
            };
            let mut ctx = BehaviourContext::new(entity, self.frame, transform);
            slot.update(&mut ctx, delta_time);
            stats.updated += 1;
        }

        self.frame += 1;
        log::trace!("Behaviours: {} started, {} updated", stats.started, stats.updated);
        stats
    }

    fn collect(&self, world: &World) -> Vec<(EntityId, BehaviourKind)> {
        world
            .iter()
            .flat_map(|object| {
                self.kinds
                    .iter()
                    .filter(|kind| object.behaviour(**kind).is_some())
                    .map(move |kind| (object.id(), *kind))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::behaviours::{RotateBehaviour, ScriptedBehaviour};
    use crate::foundation::math::{utils, Vec3};
    use approx::assert_relative_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    fn scripted(log: &Log, tag: &'static str) -> ScriptedBehaviour {
        let start_log = Rc::clone(log);
        let update_log = Rc::clone(log);
        ScriptedBehaviour::new(move |_, _| update_log.borrow_mut().push(format!("update {}", tag)))
            .on_start(move |_| start_log.borrow_mut().push(format!("start {}", tag)))
    }

    #[test]
    fn test_start_runs_once_before_first_update() {
        let log: Log = Rc::default();
        let mut world = World::new();
        let id = world.spawn("scripted").expect("spawn");
        world.get_mut(id).expect("entity").attach_behaviour(scripted(&log, "a"));

        let mut scheduler = BehaviourScheduler::new();
        for _ in 0..100 {
            scheduler.run(&mut world, 1.0 / 60.0);
        }

        let entries = log.borrow();
        let starts = entries.iter().filter(|e| e.starts_with("start")).count();
        let updates = entries.iter().filter(|e| e.starts_with("update")).count();
        assert_eq!(starts, 1);
        assert_eq!(updates, 100);
        assert_eq!(entries[0], "start a");
        assert_eq!(entries[1], "update a");
        assert!(world.get(id).and_then(|o| o.behaviour(BehaviourKind::Scripted)).expect("slot").is_started());
    }

    #[test]
    fn test_all_starts_precede_all_updates_in_spawn_order() {
        let log: Log = Rc::default();
        let mut world = World::new();
        for tag in ["a", "b"] {
            let id = world.spawn(tag).expect("spawn");
            world.get_mut(id).expect("entity").attach_behaviour(scripted(&log, tag));
        }

        let stats = BehaviourScheduler::new().run(&mut world, 0.1);
        assert_eq!(stats, ScheduleStats { started: 2, updated: 2 });
        assert_eq!(*log.borrow(), ["start a", "start b", "update a", "update b"]);
    }

    #[test]
    fn test_late_attachment_starts_on_next_frame() {
        let log: Log = Rc::default();
        let mut world = World::new();
        let mut scheduler = BehaviourScheduler::new();
        scheduler.run(&mut world, 0.1);

        let id = world.spawn("late").expect("spawn");
        world.get_mut(id).expect("entity").attach_behaviour(scripted(&log, "late"));
        let stats = scheduler.run(&mut world, 0.1);
        assert_eq!(stats.started, 1);
        assert_eq!(*log.borrow(), ["start late", "update late"]);
    }

    #[test]
    fn test_kind_filter() {
        let log: Log = Rc::default();
        let mut world = World::new();
        let id = world.spawn_with_transform("both").expect("spawn");
        let object = world.get_mut(id).expect("entity");
        object.attach_behaviour(scripted(&log, "s"));
        object.attach_behaviour(RotateBehaviour::with_axis(Vec3::z()));

        let stats = BehaviourScheduler::with_kinds(vec![BehaviourKind::Rotate]).run(&mut world, 0.1);
        assert_eq!(stats.updated, 1);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_rotate_behaviour_advances_transform() {
        let mut world = World::new();
        let id = world.spawn_with_transform("spinner").expect("spawn");
        world
            .get_mut(id)
            .expect("entity")
            .attach_behaviour(RotateBehaviour::with_axis(Vec3::z()));

        let mut scheduler = BehaviourScheduler::new();
        scheduler.run(&mut world, 0.5);
        scheduler.run(&mut world, 0.5);

        let transform = world.get(id).and_then(|o| o.transform()).expect("transform");
        let (axis, angle) = transform.axis_angle();
        assert_relative_eq!(axis, Vec3::z(), epsilon = 1e-5);
        assert_relative_eq!(angle, utils::deg_to_rad(90.0), epsilon = 1e-5);
    }

    #[test]
    fn test_behaviour_without_transform_is_skipped_quietly() {
        let mut world = World::new();
        let id = world.spawn("no transform").expect("spawn");
        world.get_mut(id).expect("entity").attach_behaviour(RotateBehaviour::new());
        let stats = BehaviourScheduler::new().run(&mut world, 0.1);
        assert_eq!(stats.updated, 1);
        assert!(world.get(id).expect("entity").transform().is_none());
    }
}
