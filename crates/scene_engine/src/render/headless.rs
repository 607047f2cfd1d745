//! # Headless Device
//!
//! An in-memory [`GraphicsDevice`] with no GPU behind it. Buffers and
//! textures are byte vectors, copies are executed for real, and pipelines
//! whose [`FragmentOutput`] is an object id write that id into every texel of
//! the current scissor rectangle. There is no rasterizer: the last draw in a
//! pass wins. This is enough to drive the picking protocol end to end, and to
//! run the viewer on machines without Vulkan.
//!
//! Readbacks resolve after a configurable number of polls so callers see the
//! same multi-frame latency a real device has.

use std::collections::HashMap;

use slotmap::new_key_type;

use crate::render::api::table::ResourceTable;
use crate::render::api::{
    BindGroupEntry, BindGroupHandle, BindingResource, BufferDesc, BufferHandle, Command, CommandList, FragmentOutput,
    GraphicsDevice, PipelineDesc, PipelineHandle, ReadbackStatus, ReadbackTicket, SamplerDesc, SamplerHandle,
    ShaderHandle, SubmissionIndex, TextureDesc, TextureFormat, TextureHandle,
};
use crate::render::{RenderError, RenderResult};

new_key_type! {
    struct BufferKey;
    struct TextureKey;
    struct SamplerKey;
    struct ShaderKey;
    struct PipelineKey;
    struct BindGroupKey;
}

#[derive(Debug)]
struct HeadlessBuffer {
    desc: BufferDesc,
    data: Vec<u8>,
}

#[derive(Debug)]
struct HeadlessTexture {
    desc: TextureDesc,
    data: Vec<u8>,
}

#[derive(Debug)]
struct HeadlessBindGroup {
    entries: Vec<BindGroupEntry>,
}

#[derive(Debug)]
struct PendingReadback {
    buffer: BufferHandle,
    offset: u64,
    size: u64,
    polls_remaining: u32,
    fail: bool,
}

#[derive(Debug, Default)]
struct PassState {
    target: Option<TextureHandle>,
    pipeline: Option<PipelineHandle>,
    groups: HashMap<u32, (BindGroupHandle, Vec<u32>)>,
    scissor: Option<(u32, u32, u32, u32)>,
}

/// In-memory reference device
#[derive(Debug)]
pub struct HeadlessDevice {
    buffers: ResourceTable<BufferKey, HeadlessBuffer>,
    textures: ResourceTable<TextureKey, HeadlessTexture>,
    samplers: ResourceTable<SamplerKey, SamplerDesc>,
    shaders: ResourceTable<ShaderKey, String>,
    pipelines: ResourceTable<PipelineKey, PipelineDesc>,
    bind_groups: ResourceTable<BindGroupKey, HeadlessBindGroup>,
    submissions: Vec<CommandList>,
    readbacks: HashMap<u64, PendingReadback>,
    next_ticket: u64,
    readback_latency: u32,
    fail_next_readback: bool,
    frames_begun: u64,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDevice {
    /// Device whose readbacks resolve on the first poll after submission
    pub fn new() -> Self {
        log::info!("Created headless graphics device");
        Self {
            buffers: ResourceTable::new("buffer"),
            textures: ResourceTable::new("texture"),
            samplers: ResourceTable::new("sampler"),
            shaders: ResourceTable::new("shader"),
            pipelines: ResourceTable::new("pipeline"),
            bind_groups: ResourceTable::new("bind group"),
            submissions: Vec::new(),
            readbacks: HashMap::new(),
            next_ticket: 1,
            readback_latency: 0,
            fail_next_readback: false,
            frames_begun: 0,
        }
    }

    /// Number of `Pending` polls before each readback resolves
    pub fn set_readback_latency(&mut self, polls: u32) {
        self.readback_latency = polls;
    }

    /// Make the next `map_read_async` resolve as `Failed`
    pub fn fail_next_readback(&mut self) {
        self.fail_next_readback = true;
    }

    /// Readbacks mapped but not yet resolved or cancelled
    pub fn pending_readbacks(&self) -> usize {
        self.readbacks.len()
    }

    /// Current contents of a buffer
    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(buffer.0).ok().map(|b| b.data.as_slice())
    }

    /// Current texels of a texture
    pub fn texture_contents(&self, texture: TextureHandle) -> Option<&[u8]> {
        self.textures.get(texture.0).ok().map(|t| t.data.as_slice())
    }

    /// Every command list submitted so far
    pub fn submissions(&self) -> &[CommandList] {
        &self.submissions
    }

    /// Frames started with `begin_frame`
    pub fn frames_begun(&self) -> u64 {
        self.frames_begun
    }

    /// Live buffer count
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Live texture count
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    fn execute(&mut self, commands: &CommandList) -> RenderResult<()> {
        let mut pass = PassState::default();

        for command in commands.commands() {
            match command {
                Command::BeginRenderPass { color, depth, clear_color, clear_depth, .. } => {
                    let texture = self.textures.get_mut(color.0)?;
                    let texel = encode_clear(texture.desc.format, *clear_color);
                    for chunk in texture.data.chunks_exact_mut(texel.len()) {
                        chunk.copy_from_slice(&texel);
                    }
                    if let Some(depth) = depth {
                        let texture = self.textures.get_mut(depth.0)?;
                        let bytes = clear_depth.to_le_bytes();
                        for chunk in texture.data.chunks_exact_mut(4) {
                            chunk.copy_from_slice(&bytes);
                        }
                    }
                    pass = PassState { target: Some(*color), ..PassState::default() };
                }
                Command::EndRenderPass => pass = PassState::default(),
                Command::SetPipeline(pipeline) => {
                    self.pipelines.get(pipeline.0)?;
                    pass.pipeline = Some(*pipeline);
                }
                Command::SetBindGroup { index, group, dynamic_offsets } => {
                    self.bind_groups.get(group.0)?;
                    pass.groups.insert(*index, (*group, dynamic_offsets.clone()));
                }
                Command::SetVertexBuffer { buffer, .. } | Command::SetIndexBuffer { buffer, .. } => {
                    self.buffers.get(buffer.0)?;
                }
                Command::SetViewport { .. } => {}
                Command::SetScissor { x, y, width, height } => pass.scissor = Some((*x, *y, *width, *height)),
                Command::DrawIndexed { .. } => self.draw(&pass)?,
                Command::CopyTextureToBuffer { texture, origin, extent, buffer, bytes_per_row } => {
                    self.copy_texture_to_buffer(*texture, *origin, *extent, *buffer, *bytes_per_row)?;
                }
                Command::CopyBufferToBuffer { src, src_offset, dst, dst_offset, size } => {
                    let bytes = read_range(&self.buffers.get(src.0)?.data, *src_offset, *size)?.to_vec();
                    let dst = self.buffers.get_mut(dst.0)?;
                    write_range(&mut dst.data, *dst_offset, &bytes)?;
                }
            }
        }
        Ok(())
    }

    fn draw(&mut self, pass: &PassState) -> RenderResult<()> {
        let (Some(target), Some(pipeline)) = (pass.target, pass.pipeline) else {
            return Err(RenderError::BackendError("draw outside a pass or without a pipeline".to_string()));
        };
        let FragmentOutput::ObjectId { offset: id_offset } = self.pipelines.get(pipeline.0)?.fragment_output else {
            return Ok(());
        };

        let (group, dynamic_offsets) = pass
            .groups
            .get(&0)
            .ok_or_else(|| RenderError::BackendError("object id draw without bind group 0".to_string()))?;
        let (buffer, base_offset) = self
            .bind_groups
            .get(group.0)?
            .entries
            .iter()
            .find_map(|entry| match entry.resource {
                BindingResource::Buffer { buffer, offset, .. } => Some((buffer, offset)),
                BindingResource::TextureSampler { .. } => None,
            })
            .ok_or_else(|| RenderError::BackendError("bind group 0 has no buffer binding".to_string()))?;

        let dynamic = u64::from(dynamic_offsets.first().copied().unwrap_or(0));
        let id_at = base_offset + dynamic + u64::from(id_offset);
        let id_bytes = read_range(&self.buffers.get(buffer.0)?.data, id_at, 4)?.to_vec();

        let texture = self.textures.get_mut(target.0)?;
        let (width, height) = (texture.desc.width, texture.desc.height);
        let (x0, y0, w, h) = pass.scissor.unwrap_or((0, 0, width, height));
        let row_len = width as usize;
        for y in y0..y0.saturating_add(h).min(height) {
            for x in x0..x0.saturating_add(w).min(width) {
                let at = (y as usize * row_len + x as usize) * 4;
                if let Some(texel) = texture.data.get_mut(at..at + 4) {
                    texel.copy_from_slice(&id_bytes);
                }
            }
        }
        Ok(())
    }

    fn copy_texture_to_buffer(
        &mut self,
        texture: TextureHandle,
        origin: (u32, u32),
        extent: (u32, u32),
        buffer: BufferHandle,
        bytes_per_row: u32,
    ) -> RenderResult<()> {
        let source = self.textures.get(texture.0)?;
        let (width, height) = (source.desc.width, source.desc.height);
        let fits = |start: u32, len: u32, limit: u32| start.checked_add(len).is_some_and(|end| end <= limit);
        if !fits(origin.0, extent.0, width) || !fits(origin.1, extent.1, height) {
            return Err(RenderError::BackendError(format!(
                "copy region {:?}+{:?} outside {}x{} texture",
                origin, extent, width, height
            )));
        }
        let bpp = source.desc.format.bytes_per_pixel() as usize;
        let row_bytes = extent.0 as usize * bpp;
        let rows: Vec<Vec<u8>> = (0..extent.1)
            .map(|row| {
                let texel = (origin.1 + row) as usize * width as usize + origin.0 as usize;
                let start = texel * bpp;
                read_range(&source.data, start as u64, row_bytes as u64).map(<[u8]>::to_vec)
            })
            .collect::<RenderResult<_>>()?;

        let destination = self.buffers.get_mut(buffer.0)?;
        for (row, bytes) in rows.iter().enumerate() {
            write_range(&mut destination.data, row as u64 * u64::from(bytes_per_row), bytes)?;
        }
        Ok(())
    }
}

fn encode_clear(format: TextureFormat, color: [f32; 4]) -> Vec<u8> {
    let unorm = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    match format {
        TextureFormat::Rgba8Unorm => color.iter().map(|c| unorm(*c)).collect(),
        TextureFormat::Bgra8Unorm => [color[2], color[1], color[0], color[3]].iter().map(|c| unorm(*c)).collect(),
        TextureFormat::Depth32Float => color[0].to_le_bytes().to_vec(),
    }
}

fn read_range(data: &[u8], offset: u64, size: u64) -> RenderResult<&[u8]> {
    let start = offset as usize;
    let end = start.saturating_add(size as usize);
    data.get(start..end)
        .ok_or_else(|| RenderError::BackendError(format!("read {}..{} outside buffer of {} bytes", start, end, data.len())))
}

fn write_range(data: &mut [u8], offset: u64, bytes: &[u8]) -> RenderResult<()> {
    let start = offset as usize;
    let end = start.saturating_add(bytes.len());
    let len = data.len();
    data.get_mut(start..end)
        .ok_or_else(|| RenderError::BackendError(format!("write {}..{} outside buffer of {} bytes", start, end, len)))?
        .copy_from_slice(bytes);
    Ok(())
}

impl GraphicsDevice for HeadlessDevice {
    fn name(&self) -> &str {
        "headless"
    }

    fn color_format(&self) -> TextureFormat {
        TextureFormat::Rgba8Unorm
    }

    fn depth_format(&self) -> TextureFormat {
        TextureFormat::Depth32Float
    }

    fn create_buffer(&mut self, desc: &BufferDesc) -> RenderResult<BufferHandle> {
        if desc.size == 0 {
            return Err(RenderError::ResourceCreationFailed(format!("buffer '{}' has zero size", desc.label)));
        }
        let data = vec![0; desc.size as usize];
        Ok(BufferHandle(self.buffers.insert(HeadlessBuffer { desc: desc.clone(), data })))
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) -> RenderResult<()> {
        write_range(&mut self.buffers.get_mut(buffer.0)?.data, offset, data)
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if let Some(removed) = self.buffers.remove(buffer.0) {
            log::trace!("Destroyed buffer '{}'", removed.desc.label);
        }
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> RenderResult<TextureHandle> {
        let size = desc.byte_size()?;
        Ok(TextureHandle(self.textures.insert(HeadlessTexture { desc: desc.clone(), data: vec![0; size] })))
    }

    fn write_texture(&mut self, texture: TextureHandle, data: &[u8]) -> RenderResult<()> {
        let texture = self.textures.get_mut(texture.0)?;
        if data.len() != texture.data.len() {
            return Err(RenderError::BackendError(format!(
                "texture '{}' expects {} bytes, got {}",
                texture.desc.label,
                texture.data.len(),
                data.len()
            )));
        }
        texture.data.copy_from_slice(data);
        Ok(())
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(texture.0);
    }

    fn create_sampler(&mut self, desc: &SamplerDesc) -> RenderResult<SamplerHandle> {
        Ok(SamplerHandle(self.samplers.insert(*desc)))
    }

    fn create_shader_module(&mut self, label: &str, code: &[u8]) -> RenderResult<ShaderHandle> {
        log::trace!("Headless shader '{}' ({} bytes)", label, code.len());
        Ok(ShaderHandle(self.shaders.insert(label.to_string())))
    }

    fn create_render_pipeline(&mut self, desc: &PipelineDesc) -> RenderResult<PipelineHandle> {
        self.shaders.get(desc.vertex_shader.0)?;
        self.shaders.get(desc.fragment_shader.0)?;
        Ok(PipelineHandle(self.pipelines.insert(desc.clone())))
    }

    fn create_bind_group(
        &mut self,
        pipeline: PipelineHandle,
        group_index: u32,
        entries: &[BindGroupEntry],
    ) -> RenderResult<BindGroupHandle> {
        let desc = self.pipelines.get(pipeline.0)?;
        if desc.bind_group_layouts.get(group_index as usize).is_none() {
            return Err(RenderError::ResourceCreationFailed(format!(
                "pipeline '{}' has no bind group {}",
                desc.label, group_index
            )));
        }
        for entry in entries {
            match entry.resource {
                BindingResource::Buffer { buffer, .. } => {
                    self.buffers.get(buffer.0)?;
                }
                BindingResource::TextureSampler { texture, sampler } => {
                    self.textures.get(texture.0)?;
                    self.samplers.get(sampler.0)?;
                }
            }
        }
        Ok(BindGroupHandle(self.bind_groups.insert(HeadlessBindGroup { entries: entries.to_vec() })))
    }

    fn begin_frame(&mut self) -> RenderResult<()> {
        self.frames_begun += 1;
        Ok(())
    }

    fn submit(&mut self, commands: CommandList) -> RenderResult<SubmissionIndex> {
        self.execute(&commands)?;
        self.submissions.push(commands);
        Ok(SubmissionIndex(self.submissions.len() as u64))
    }

    fn map_read_async(&mut self, buffer: BufferHandle, offset: u64, size: u64) -> RenderResult<ReadbackTicket> {
        let data_len = self.buffers.get(buffer.0)?.data.len() as u64;
        if offset.checked_add(size).map_or(true, |end| end > data_len) {
            return Err(RenderError::ReadbackFailed(format!(
                "range {}+{} outside buffer of {} bytes",
                offset, size, data_len
            )));
        }
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.readbacks.insert(ticket, PendingReadback {
            buffer,
            offset,
            size,
            polls_remaining: self.readback_latency,
            fail: std::mem::take(&mut self.fail_next_readback),
        });
        Ok(ReadbackTicket(ticket))
    }

    fn poll_readback(&mut self, ticket: ReadbackTicket) -> ReadbackStatus {
        let Some(pending) = self.readbacks.get_mut(&ticket.0) else {
            return ReadbackStatus::Failed(format!("unknown readback ticket {}", ticket.0));
        };
        if pending.polls_remaining > 0 {
            pending.polls_remaining -= 1;
            return ReadbackStatus::Pending;
        }

        let Some(pending) = self.readbacks.remove(&ticket.0) else {
            return ReadbackStatus::Failed(format!("unknown readback ticket {}", ticket.0));
        };
        if pending.fail {
            return ReadbackStatus::Failed("buffer mapping failed".to_string());
        }
        match self.buffers.get(pending.buffer.0) {
            Ok(buffer) => match read_range(&buffer.data, pending.offset, pending.size) {
                Ok(bytes) => ReadbackStatus::Ready(bytes.to_vec()),
                Err(e) => ReadbackStatus::Failed(e.to_string()),
            },
            Err(e) => ReadbackStatus::Failed(e.to_string()),
        }
    }

    fn cancel_readback(&mut self, ticket: ReadbackTicket) {
        self.readbacks.remove(&ticket.0);
    }

    fn wait_idle(&mut self) -> RenderResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::api::{BufferUsages, CommandEncoder, TextureUsages};

    fn texture(device: &mut HeadlessDevice, width: u32, height: u32) -> TextureHandle {
        device
            .create_texture(&TextureDesc {
                label: "color".to_string(),
                width,
                height,
                format: TextureFormat::Rgba8Unorm,
                usage: TextureUsages::RENDER_ATTACHMENT | TextureUsages::COPY_SRC,
            })
            .expect("texture")
    }

    #[test]
    fn test_clear_and_copy_single_texel() {
        let mut device = HeadlessDevice::new();
        let color = texture(&mut device, 4, 4);
        let staging = device.create_buffer(&BufferDesc::new("staging", 256, BufferUsages::COPY_DST | BufferUsages::COPY_SRC)).expect("buffer");
        let readback = device.create_buffer(&BufferDesc::new("readback", 4, BufferUsages::COPY_DST | BufferUsages::MAP_READ)).expect("buffer");

        let mut encoder = CommandEncoder::new();
        encoder.begin_render_pass("clear", color, None, [1.0, 0.0, 0.0, 1.0]).end();
        encoder.copy_texture_to_buffer(color, (2, 3), (1, 1), staging, 256);
        encoder.copy_buffer_to_buffer(staging, 0, readback, 0, 4);
        device.submit(encoder.finish()).expect("submit");

        let ticket = device.map_read_async(readback, 0, 4).expect("map");
        assert_eq!(device.poll_readback(ticket), ReadbackStatus::Ready(vec![255, 0, 0, 255]));
    }

    #[test]
    fn test_readback_latency_and_failure() {
        let mut device = HeadlessDevice::new();
        let buffer = device.create_buffer(&BufferDesc::new("readback", 4, BufferUsages::MAP_READ)).expect("buffer");
        device.set_readback_latency(2);
        let ticket = device.map_read_async(buffer, 0, 4).expect("map");
        assert_eq!(device.poll_readback(ticket), ReadbackStatus::Pending);
        assert_eq!(device.poll_readback(ticket), ReadbackStatus::Pending);
        assert_eq!(device.poll_readback(ticket), ReadbackStatus::Ready(vec![0; 4]));

        device.set_readback_latency(0);
        device.fail_next_readback();
        let ticket = device.map_read_async(buffer, 0, 4).expect("map");
        assert!(matches!(device.poll_readback(ticket), ReadbackStatus::Failed(_)));
        assert_eq!(device.pending_readbacks(), 0);
    }

    #[test]
    fn test_cancelled_readback_is_forgotten() {
        let mut device = HeadlessDevice::new();
        let buffer = device.create_buffer(&BufferDesc::new("readback", 4, BufferUsages::MAP_READ)).expect("buffer");
        device.set_readback_latency(5);
        let ticket = device.map_read_async(buffer, 0, 4).expect("map");
        assert_eq!(device.pending_readbacks(), 1);

        device.cancel_readback(ticket);
        device.cancel_readback(ticket);
        assert_eq!(device.pending_readbacks(), 0);
        assert!(matches!(device.poll_readback(ticket), ReadbackStatus::Failed(_)));
    }

    #[test]
    fn test_destroyed_handles_are_rejected() {
        let mut device = HeadlessDevice::new();
        let buffer = device.create_buffer(&BufferDesc::new("b", 16, BufferUsages::UNIFORM)).expect("buffer");
        device.destroy_buffer(buffer);
        assert!(matches!(
            device.write_buffer(buffer, 0, &[1]),
            Err(RenderError::InvalidHandle { kind: "buffer", .. })
        ));
        let again = device.create_buffer(&BufferDesc::new("b", 16, BufferUsages::UNIFORM)).expect("buffer");
        assert_ne!(again, buffer);
    }

    #[test]
    fn test_out_of_range_write_fails() {
        let mut device = HeadlessDevice::new();
        let buffer = device.create_buffer(&BufferDesc::new("b", 8, BufferUsages::UNIFORM)).expect("buffer");
        assert!(device.write_buffer(buffer, 6, &[0; 4]).is_err());
    }

    #[test]
    fn test_huge_extents_fail_instead_of_overflowing() {
        let mut device = HeadlessDevice::new();
        let huge = device.create_texture(&TextureDesc {
            label: "huge".to_string(),
            width: 40000,
            height: 40000,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsages::RENDER_ATTACHMENT,
        });
        assert!(matches!(huge, Err(RenderError::ResourceCreationFailed(_))));

        let color = texture(&mut device, 4, 4);
        let staging = device.create_buffer(&BufferDesc::new("staging", 256, BufferUsages::COPY_DST)).expect("buffer");
        let mut encoder = CommandEncoder::new();
        encoder.copy_texture_to_buffer(color, (u32::MAX, 0), (2, 1), staging, 256);
        assert!(device.submit(encoder.finish()).is_err());
    }
}
