//! # Instanced Pipelines
//!
//! Every pipeline here draws many instances of shared geometry from one
//! capacity-bounded dynamic uniform buffer. Instance `i` lives at
//! `i * stride`, where the stride is the payload size rounded up to the
//! 256-byte dynamic offset alignment. A second, shared uniform region holds
//! the per-frame camera data.
//!
//! - [`StandardPipeline`]: lit meshes, payload = model matrix
//! - [`PickerPipeline`]: object ids, payload = model matrix + id vector
//! - [`IconPipeline`]: camera-facing entity icons with alpha blending

pub mod base;
pub mod uniforms;
pub mod instanced;
pub mod standard;
pub mod picker;
pub mod icon;

pub use base::{aligned_stride, PipelineResources, DYNAMIC_OFFSET_ALIGNMENT};
pub use icon::IconPipeline;
pub use instanced::{InstancedPipeline, InstancedPipelineDesc};
pub use picker::PickerPipeline;
pub use standard::StandardPipeline;

use crate::render::api::ShaderHandle;

/// Vertex and fragment modules of one pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderPair {
    /// Vertex stage
    pub vertex: ShaderHandle,
    /// Fragment stage
    pub fragment: ShaderHandle,
}
