//! # Rendering
//!
//! Backend-agnostic rendering for the viewer: a narrow [`GraphicsDevice`]
//! interface with opaque handles, recorded [`CommandList`]s, the instanced
//! pipelines and the GPU picking service built on top of them.
//!
//! Two devices implement the interface: the Vulkan backend in
//! [`crate::backend::vulkan`] and the in-memory [`HeadlessDevice`].

pub mod api;
pub mod camera;
pub mod headless;
pub mod mesh;
pub mod target;
pub mod pipeline;
pub mod picking;

pub use api::{
    BindGroupHandle, BufferHandle, CommandEncoder, CommandList, GraphicsDevice, PipelineHandle,
    ReadbackStatus, ReadbackTicket, SamplerHandle, ShaderHandle, TextureHandle,
};
pub use camera::Camera;
pub use headless::HeadlessDevice;
pub use mesh::{MeshData, MeshResource, Vertex};
pub use target::RenderTarget;

use thiserror::Error;

/// High-level rendering error types
///
/// Abstracted from the graphics API so hosts can handle failures without
/// knowing which backend produced them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    /// Device, buffer, texture, shader or pipeline creation failed
    ///
    /// Fatal at startup; there is no retry.
    #[error("Resource creation failed: {0}")]
    ResourceCreationFailed(String),

    /// A named uniform buffer or bind group was never registered
    ///
    /// Always a programming error in the pipeline that asked for it.
    #[error("No {kind} named '{name}' is registered")]
    ResourceLookupFailed {
        /// Resource category, e.g. "uniform buffer"
        kind: &'static str,
        /// Name that was looked up
        name: String,
    },

    /// An instance slot outside the pipeline's capacity was addressed
    #[error("Instance slot {index} exceeds capacity {capacity}")]
    CapacityExceeded {
        /// Requested slot
        index: u32,
        /// Configured maximum
        capacity: u32,
    },

    /// A pipeline was used before its GPU objects were created
    #[error("{0} is not initialized")]
    NotInitialized(&'static str),

    /// A handle does not refer to a live resource on this device
    #[error("Invalid {kind} handle {id}")]
    InvalidHandle {
        /// Resource category
        kind: &'static str,
        /// Raw handle value
        id: u64,
    },

    /// Mapping the pick readback buffer failed
    #[error("Readback failed: {0}")]
    ReadbackFailed(String),

    /// Backend-specific error
    #[error("Backend error: {0}")]
    BackendError(String),
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;
