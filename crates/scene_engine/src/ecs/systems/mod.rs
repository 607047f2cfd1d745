//! Per-frame systems over the world

pub mod behaviour_system;
pub mod instance_collector;

pub use behaviour_system::{BehaviourScheduler, ScheduleStats};
pub use instance_collector::{collect_frame_instances, FrameInstances, IconInstance, RenderInstance};
