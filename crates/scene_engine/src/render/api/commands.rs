//! Recorded GPU commands
//!
//! Passes are recorded through [`RenderPassEncoder`], which closes its pass
//! when dropped, so a [`CommandList`] built with the encoder is always
//! balanced.

use super::{BindGroupHandle, BufferHandle, IndexFormat, PipelineHandle, TextureHandle};

/// One recorded command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Begin a pass that clears its attachments
    BeginRenderPass {
        /// Debug label
        label: &'static str,
        /// Color attachment
        color: TextureHandle,
        /// Optional depth attachment
        depth: Option<TextureHandle>,
        /// Color clear value
        clear_color: [f32; 4],
        /// Depth clear value
        clear_depth: f32,
    },
    /// End the current pass
    EndRenderPass,
    /// Bind a pipeline
    SetPipeline(PipelineHandle),
    /// Bind a group with its dynamic offsets
    SetBindGroup {
        /// Group number
        index: u32,
        /// Group to bind
        group: BindGroupHandle,
        /// One offset per dynamic binding, in binding order
        dynamic_offsets: Vec<u32>,
    },
    /// Bind a vertex buffer
    SetVertexBuffer {
        /// Binding slot
        slot: u32,
        /// Buffer to bind
        buffer: BufferHandle,
    },
    /// Bind an index buffer
    SetIndexBuffer {
        /// Buffer to bind
        buffer: BufferHandle,
        /// Index element type
        format: IndexFormat,
    },
    /// Set the viewport transform
    SetViewport {
        /// Left edge
        x: f32,
        /// Top edge
        y: f32,
        /// Width
        width: f32,
        /// Height
        height: f32,
    },
    /// Restrict rasterization to a rectangle
    SetScissor {
        /// Left edge
        x: u32,
        /// Top edge
        y: u32,
        /// Width
        width: u32,
        /// Height
        height: u32,
    },
    /// Indexed draw
    DrawIndexed {
        /// Indices to draw
        index_count: u32,
        /// Instances to draw
        instance_count: u32,
    },
    /// Copy a texel rectangle into a buffer
    CopyTextureToBuffer {
        /// Source texture
        texture: TextureHandle,
        /// Source origin in texels
        origin: (u32, u32),
        /// Rectangle size in texels
        extent: (u32, u32),
        /// Destination buffer
        buffer: BufferHandle,
        /// Destination row pitch
        bytes_per_row: u32,
    },
    /// Copy between buffers
    CopyBufferToBuffer {
        /// Source buffer
        src: BufferHandle,
        /// Source offset
        src_offset: u64,
        /// Destination buffer
        dst: BufferHandle,
        /// Destination offset
        dst_offset: u64,
        /// Bytes to copy
        size: u64,
    },
}

/// A finished list of commands ready for submission
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandList {
    commands: Vec<Command>,
}

impl CommandList {
    /// Recorded commands in order
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Number of indexed draws
    pub fn draw_count(&self) -> usize {
        self.commands.iter().filter(|c| matches!(c, Command::DrawIndexed { .. })).count()
    }

    /// Number of render passes
    pub fn pass_count(&self) -> usize {
        self.commands.iter().filter(|c| matches!(c, Command::BeginRenderPass { .. })).count()
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Records commands for one submission
#[derive(Debug, Default)]
pub struct CommandEncoder {
    commands: Vec<Command>,
}

impl CommandEncoder {
    /// Empty encoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a render pass that clears color and optional depth
    pub fn begin_render_pass(
        &mut self,
        label: &'static str,
        color: TextureHandle,
        depth: Option<TextureHandle>,
        clear_color: [f32; 4],
    ) -> RenderPassEncoder<'_> {
        self.commands.push(Command::BeginRenderPass { label, color, depth, clear_color, clear_depth: 1.0 });
        RenderPassEncoder { encoder: self }
    }

    /// Copy a texel rectangle into a buffer
    pub fn copy_texture_to_buffer(
        &mut self,
        texture: TextureHandle,
        origin: (u32, u32),
        extent: (u32, u32),
        buffer: BufferHandle,
        bytes_per_row: u32,
    ) {
        self.commands.push(Command::CopyTextureToBuffer { texture, origin, extent, buffer, bytes_per_row });
    }

    /// Copy between buffers
    pub fn copy_buffer_to_buffer(&mut self, src: BufferHandle, src_offset: u64, dst: BufferHandle, dst_offset: u64, size: u64) {
        self.commands.push(Command::CopyBufferToBuffer { src, src_offset, dst, dst_offset, size });
    }

    /// Finish recording
    pub fn finish(self) -> CommandList {
        CommandList { commands: self.commands }
    }
}

/// Records commands inside one render pass; ends the pass on drop
#[derive(Debug)]
pub struct RenderPassEncoder<'a> {
    encoder: &'a mut CommandEncoder,
}

impl RenderPassEncoder<'_> {
    fn push(&mut self, command: Command) {
        self.encoder.commands.push(command);
    }

    /// Bind a pipeline
    pub fn set_pipeline(&mut self, pipeline: PipelineHandle) {
        self.push(Command::SetPipeline(pipeline));
    }

    /// Bind a group with its dynamic offsets
    pub fn set_bind_group(&mut self, index: u32, group: BindGroupHandle, dynamic_offsets: &[u32]) {
        self.push(Command::SetBindGroup { index, group, dynamic_offsets: dynamic_offsets.to_vec() });
    }

    /// Bind a vertex buffer
    pub fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferHandle) {
        self.push(Command::SetVertexBuffer { slot, buffer });
    }

    /// Bind an index buffer
    pub fn set_index_buffer(&mut self, buffer: BufferHandle, format: IndexFormat) {
        self.push(Command::SetIndexBuffer { buffer, format });
    }

    /// Set the viewport
    pub fn set_viewport(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.push(Command::SetViewport { x, y, width, height });
    }

    /// Set the scissor rectangle
    pub fn set_scissor(&mut self, x: u32, y: u32, width: u32, height: u32) {
        self.push(Command::SetScissor { x, y, width, height });
    }

    /// Indexed draw
    pub fn draw_indexed(&mut self, index_count: u32, instance_count: u32) {
        self.push(Command::DrawIndexed { index_count, instance_count });
    }

    /// End the pass explicitly
    pub fn end(self) {}
}

impl Drop for RenderPassEncoder<'_> {
    fn drop(&mut self) {
        self.encoder.commands.push(Command::EndRenderPass);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_is_closed_on_drop() {
        let mut encoder = CommandEncoder::new();
        {
            let mut pass = encoder.begin_render_pass("test", TextureHandle(1), None, [0.0; 4]);
            pass.draw_indexed(3, 1);
        }
        let list = encoder.finish();
        assert_eq!(list.pass_count(), 1);
        assert_eq!(list.draw_count(), 1);
        assert_eq!(list.commands().last(), Some(&Command::EndRenderPass));
    }
}
