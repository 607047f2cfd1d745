//! # Scene Engine
//!
//! Core of a small 3D scene viewer with Vulkan rendering support.
//!
//! ## Features
//!
//! - **Scene Graph**: Entities with parented transforms and per-frame behaviours
//! - **Instanced Rendering**: One uniform slot per object, selected by dynamic offset
//! - **GPU Picking**: Object ids rendered to an offscreen target and read back asynchronously
//! - **Headless Device**: Deterministic in-memory backend for tests and tools
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scene_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ViewerConfig::default();
//!     let mut device = HeadlessDevice::new();
//!     let assets = EngineAssets::load(&mut device, &config)?;
//!     let mut engine = Engine::new(device, config, assets)?;
//!
//!     let id = engine.world_mut().spawn_with_transform("spinner")?;
//!     if let Some(object) = engine.world_mut().get_mut(id) {
//!         object.attach_behaviour(RotateBehaviour::with_axis(Vec3::y()));
//!     }
//!
//!     engine.request_pick(512, 384);
//!     for _ in 0..3 {
//!         engine.tick()?;
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod foundation;
pub mod config;
pub mod ecs;
pub mod assets;
pub mod render;
pub mod backend;

mod engine;

pub use engine::{
    Engine, EngineAssets, EngineError, FrameContext, FrameReport, LogSelectionSink, PickResolution,
    SelectionSink,
};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        Engine, EngineAssets, EngineError, FrameReport, PickResolution, SelectionSink,
        config::{Config, ViewerConfig},
        ecs::{
            behaviours::{RotateBehaviour, ScriptedBehaviour},
            components::{Behaviour, BehaviourContext, BehaviourKind, Transform},
            EntityId, GameObject, SceneError, World,
        },
        foundation::math::{Mat4, Quat, Vec3},
        render::{
            picking::PickPhase, Camera, GraphicsDevice, HeadlessDevice, MeshData, MeshResource,
            RenderError,
        },
    };
}

#[cfg(test)]
mod tests;
