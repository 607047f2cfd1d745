//! Graphics device interface
//!
//! The core never touches API objects directly. Devices hand out opaque
//! handles, accept whole [`CommandList`]s for submission and expose buffer
//! readback as a ticket that is polled on later frames.

mod resources;
mod commands;
pub(crate) mod table;

pub use resources::*;
pub use commands::{Command, CommandEncoder, CommandList, RenderPassEncoder};

use crate::render::RenderResult;

/// Monotonic index of a submitted command list
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubmissionIndex(pub u64);

/// Pending asynchronous buffer read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReadbackTicket(pub u64);

/// Progress of a readback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadbackStatus {
    /// The GPU has not finished the work yet
    Pending,
    /// Mapped contents; the ticket is consumed
    Ready(Vec<u8>),
    /// Mapping failed; the ticket is consumed
    Failed(String),
}

/// Narrow device interface consumed by the pipelines and the orchestrator
///
/// Writes made with [`write_buffer`](GraphicsDevice::write_buffer) before a
/// [`submit`](GraphicsDevice::submit) are visible to every command in that
/// submission. Implementations must make [`begin_frame`](GraphicsDevice::begin_frame)
/// wait until the buffers written this frame are no longer being read.
pub trait GraphicsDevice {
    /// Human-readable backend name
    fn name(&self) -> &str;

    /// Color format of the viewer's render targets
    fn color_format(&self) -> TextureFormat;

    /// Depth format of the viewer's render targets
    fn depth_format(&self) -> TextureFormat;

    /// Create a buffer; contents start zeroed
    fn create_buffer(&mut self, desc: &BufferDesc) -> RenderResult<BufferHandle>;

    /// Copy bytes into a buffer at `offset`
    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) -> RenderResult<()>;

    /// Release a buffer
    fn destroy_buffer(&mut self, buffer: BufferHandle);

    /// Create a 2D texture
    fn create_texture(&mut self, desc: &TextureDesc) -> RenderResult<TextureHandle>;

    /// Upload tightly packed texel rows covering the whole texture
    fn write_texture(&mut self, texture: TextureHandle, data: &[u8]) -> RenderResult<()>;

    /// Release a texture
    fn destroy_texture(&mut self, texture: TextureHandle);

    /// Create a sampler
    fn create_sampler(&mut self, desc: &SamplerDesc) -> RenderResult<SamplerHandle>;

    /// Create a shader module from compiled code
    fn create_shader_module(&mut self, label: &str, code: &[u8]) -> RenderResult<ShaderHandle>;

    /// Create a graphics pipeline
    fn create_render_pipeline(&mut self, desc: &PipelineDesc) -> RenderResult<PipelineHandle>;

    /// Create a bind group for `group_index` of `pipeline`'s layout
    fn create_bind_group(
        &mut self,
        pipeline: PipelineHandle,
        group_index: u32,
        entries: &[BindGroupEntry],
    ) -> RenderResult<BindGroupHandle>;

    /// Wait for the previous frame's work before the CPU rewrites its buffers
    fn begin_frame(&mut self) -> RenderResult<()>;

    /// Submit recorded commands
    fn submit(&mut self, commands: CommandList) -> RenderResult<SubmissionIndex>;

    /// Start reading `size` bytes at `offset` once submitted work completes
    fn map_read_async(&mut self, buffer: BufferHandle, offset: u64, size: u64) -> RenderResult<ReadbackTicket>;

    /// Non-blocking check on a readback
    fn poll_readback(&mut self, ticket: ReadbackTicket) -> ReadbackStatus;

    /// Drop a readback that will never be polled again; unknown tickets are ignored
    fn cancel_readback(&mut self, ticket: ReadbackTicket);

    /// Block until the device is idle
    fn wait_idle(&mut self) -> RenderResult<()>;
}
