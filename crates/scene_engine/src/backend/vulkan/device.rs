//! [`GraphicsDevice`] implementation on Vulkan
//!
//! Command lists are translated into one primary command buffer per
//! submission. A single fence tracks the submission in flight;
//! [`begin_frame`](GraphicsDevice::begin_frame) waits on it, which is what
//! makes rewriting the mapped uniform buffers safe. Readbacks are resolved
//! by polling the same fence without blocking.

use std::collections::HashMap;
use std::fmt;

use ash::{vk, Device};
use slotmap::new_key_type;

use super::context::VulkanContext;
use super::descriptor::{DescriptorAllocator, ResolvedBinding, VulkanBindGroup};
use super::memory::{subresource_range, VulkanBuffer, VulkanTexture};
use super::pipeline::{create_render_pass, VulkanPipeline};
use super::VulkanError;
use crate::render::api::table::ResourceTable;
use crate::render::api::{
    AddressMode, BindGroupEntry, BindGroupHandle, BindingResource, BufferDesc, BufferHandle, BufferUsages, Command,
    CommandList, FilterMode, GraphicsDevice, IndexFormat, PipelineDesc, PipelineHandle, ReadbackStatus,
    ReadbackTicket, SamplerDesc, SamplerHandle, ShaderHandle, SubmissionIndex, TextureDesc, TextureFormat,
    TextureHandle,
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

struct PendingReadback {
    buffer: BufferHandle,
    offset: u64,
    size: u64,
    submission: u64,
}

/// Offscreen Vulkan device
pub struct VulkanDevice {
    name: String,
    command_pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
    fence: vk::Fence,
    in_flight: bool,
    submitted: u64,
    completed: u64,
    descriptors: DescriptorAllocator,
    buffers: ResourceTable<BufferKey, VulkanBuffer>,
    textures: ResourceTable<TextureKey, VulkanTexture>,
    samplers: ResourceTable<SamplerKey, vk::Sampler>,
    shaders: ResourceTable<ShaderKey, vk::ShaderModule>,
    pipelines: ResourceTable<PipelineKey, VulkanPipeline>,
    bind_groups: ResourceTable<BindGroupKey, VulkanBindGroup>,
    render_passes: HashMap<(TextureFormat, Option<TextureFormat>), vk::RenderPass>,
    framebuffers: HashMap<(TextureHandle, Option<TextureHandle>), vk::Framebuffer>,
    readbacks: HashMap<u64, PendingReadback>,
    next_ticket: u64,
    // Declared last so every Vulkan object above is released first
    context: VulkanContext,
}

impl fmt::Debug for VulkanDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VulkanDevice")
            .field("name", &self.name)
            .field("submitted", &self.submitted)
            .field("completed", &self.completed)
            .finish_non_exhaustive()
    }
}

impl VulkanDevice {
    /// Bootstrap a headless device; validation is on in debug builds
    pub fn new(app_name: &str) -> RenderResult<Self> {
        let context = VulkanContext::new(app_name, cfg!(debug_assertions))?;
        let device = &context.device;

        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(context.queue_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let command_pool = unsafe { device.create_command_pool(&pool_info, None)? };

        let allocate_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let allocated = unsafe { device.allocate_command_buffers(&allocate_info) };
        let command_buffer = match allocated.map(|buffers| buffers.into_iter().next()) {
            Ok(Some(buffer)) => buffer,
            Ok(None) | Err(_) => {
                unsafe { device.destroy_command_pool(command_pool, None) };
                return Err(RenderError::ResourceCreationFailed("command buffer allocation failed".to_string()));
            }
        };

        let fence = match unsafe { device.create_fence(&vk::FenceCreateInfo::builder(), None) } {
            Ok(fence) => fence,
            Err(e) => {
                unsafe { device.destroy_command_pool(command_pool, None) };
                return Err(e.into());
            }
        };

        let descriptors = match DescriptorAllocator::new(device) {
            Ok(descriptors) => descriptors,
            Err(e) => {
                unsafe {
                    device.destroy_fence(fence, None);
                    device.destroy_command_pool(command_pool, None);
                }
                return Err(e.into());
            }
        };

        let name = format!("vulkan ({})", context.device_name());
        log::info!("Created Vulkan device: {}", name);
        Ok(Self {
            name,
            command_pool,
            command_buffer,
            fence,
            in_flight: false,
            submitted: 0,
            completed: 0,
            descriptors,
            buffers: ResourceTable::new("buffer"),
            textures: ResourceTable::new("texture"),
            samplers: ResourceTable::new("sampler"),
            shaders: ResourceTable::new("shader"),
            pipelines: ResourceTable::new("pipeline"),
            bind_groups: ResourceTable::new("bind group"),
            render_passes: HashMap::new(),
            framebuffers: HashMap::new(),
            readbacks: HashMap::new(),
            next_ticket: 1,
            context,
        })
    }

    fn device(&self) -> &Device {
        &self.context.device
    }

    /// Block on the submission in flight, if any
    fn wait_for_submission(&mut self) -> RenderResult<()> {
        if self.in_flight {
            unsafe { self.context.device.wait_for_fences(&[self.fence], true, u64::MAX)? };
            self.in_flight = false;
            self.completed = self.submitted;
        }
        Ok(())
    }

    fn render_pass(&mut self, color: TextureFormat, depth: Option<TextureFormat>) -> RenderResult<vk::RenderPass> {
        if let Some(pass) = self.render_passes.get(&(color, depth)) {
            return Ok(*pass);
        }
        let pass = create_render_pass(&self.context.device, color, depth)?;
        self.render_passes.insert((color, depth), pass);
        Ok(pass)
    }

    fn framebuffer(
        &mut self,
        color: TextureHandle,
        depth: Option<TextureHandle>,
    ) -> RenderResult<(vk::RenderPass, vk::Framebuffer, vk::Extent2D)> {
        let target = self.textures.get(color.0)?;
        let (color_format, color_view) = (target.desc.format, target.view);
        let extent = vk::Extent2D { width: target.desc.width, height: target.desc.height };
        let (depth_format, depth_view) = match depth {
            Some(depth) => {
                let texture = self.textures.get(depth.0)?;
                (Some(texture.desc.format), Some(texture.view))
            }
            None => (None, None),
        };

        let render_pass = self.render_pass(color_format, depth_format)?;
        if let Some(framebuffer) = self.framebuffers.get(&(color, depth)) {
            return Ok((render_pass, *framebuffer, extent));
        }

        let attachments: Vec<vk::ImageView> = std::iter::once(color_view).chain(depth_view).collect();
        let info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(&attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);
        let framebuffer = unsafe { self.context.device.create_framebuffer(&info, None)? };
        self.framebuffers.insert((color, depth), framebuffer);
        Ok((render_pass, framebuffer, extent))
    }

    fn record(&mut self, commands: &CommandList) -> RenderResult<()> {
        let cmd = self.command_buffer;
        let mut layout: Option<vk::PipelineLayout> = None;

        for command in commands.commands() {
            match command {
                Command::BeginRenderPass { color, depth, clear_color, clear_depth, .. } => {
                    let (render_pass, framebuffer, extent) = self.framebuffer(*color, *depth)?;
                    let mut clears = vec![vk::ClearValue { color: vk::ClearColorValue { float32: *clear_color } }];
                    if depth.is_some() {
                        clears.push(vk::ClearValue {
                            depth_stencil: vk::ClearDepthStencilValue { depth: *clear_depth, stencil: 0 },
                        });
                    }
                    let area = vk::Rect2D { offset: vk::Offset2D::default(), extent };
                    let info = vk::RenderPassBeginInfo::builder()
                        .render_pass(render_pass)
                        .framebuffer(framebuffer)
                        .render_area(area)
                        .clear_values(&clears);
                    let viewport = vk::Viewport {
                        x: 0.0,
                        y: 0.0,
                        width: extent.width as f32,
                        height: extent.height as f32,
                        min_depth: 0.0,
                        max_depth: 1.0,
                    };
                    unsafe {
                        let device = self.device();
                        device.cmd_begin_render_pass(cmd, &info, vk::SubpassContents::INLINE);
                        device.cmd_set_viewport(cmd, 0, &[viewport]);
                        device.cmd_set_scissor(cmd, 0, &[area]);
                    }
                }
                Command::EndRenderPass => {
                    unsafe { self.device().cmd_end_render_pass(cmd) };
                    layout = None;
                }
                Command::SetPipeline(pipeline) => {
                    let pipeline = self.pipelines.get(pipeline.0)?;
                    unsafe { self.device().cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline.pipeline) };
                    layout = Some(pipeline.layout);
                }
                Command::SetBindGroup { index, group, dynamic_offsets } => {
                    let layout = layout
                        .ok_or_else(|| RenderError::BackendError("bind group set before a pipeline".to_string()))?;
                    let set = self.bind_groups.get(group.0)?.set;
                    unsafe {
                        self.device().cmd_bind_descriptor_sets(
                            cmd,
                            vk::PipelineBindPoint::GRAPHICS,
                            layout,
                            *index,
                            &[set],
                            dynamic_offsets,
                        );
                    }
                }
                Command::SetVertexBuffer { slot, buffer } => {
                    let buffer = self.buffers.get(buffer.0)?.buffer;
                    unsafe { self.device().cmd_bind_vertex_buffers(cmd, *slot, &[buffer], &[0]) };
                }
                Command::SetIndexBuffer { buffer, format } => {
                    let buffer = self.buffers.get(buffer.0)?.buffer;
                    let index_type = match format {
                        IndexFormat::Uint16 => vk::IndexType::UINT16,
                        IndexFormat::Uint32 => vk::IndexType::UINT32,
                    };
                    unsafe { self.device().cmd_bind_index_buffer(cmd, buffer, 0, index_type) };
                }
                Command::SetViewport { x, y, width, height } => {
                    let viewport =
                        vk::Viewport { x: *x, y: *y, width: *width, height: *height, min_depth: 0.0, max_depth: 1.0 };
                    unsafe { self.device().cmd_set_viewport(cmd, 0, &[viewport]) };
                }
                Command::SetScissor { x, y, width, height } => {
                    let scissor = vk::Rect2D {
                        offset: vk::Offset2D { x: *x as i32, y: *y as i32 },
                        extent: vk::Extent2D { width: *width, height: *height },
                    };
                    unsafe { self.device().cmd_set_scissor(cmd, 0, &[scissor]) };
                }
                Command::DrawIndexed { index_count, instance_count } => {
                    unsafe { self.device().cmd_draw_indexed(cmd, *index_count, *instance_count, 0, 0, 0) };
                }
                Command::CopyTextureToBuffer { texture, origin, extent, buffer, bytes_per_row } => {
                    let texture = self.textures.get(texture.0)?;
                    let buffer = self.buffers.get(buffer.0)?.buffer;
                    let region = vk::BufferImageCopy {
                        buffer_offset: 0,
                        buffer_row_length: bytes_per_row / texture.desc.format.bytes_per_pixel(),
                        buffer_image_height: 0,
                        image_subresource: vk::ImageSubresourceLayers {
                            aspect_mask: vk::ImageAspectFlags::COLOR,
                            mip_level: 0,
                            base_array_layer: 0,
                            layer_count: 1,
                        },
                        image_offset: vk::Offset3D { x: origin.0 as i32, y: origin.1 as i32, z: 0 },
                        image_extent: vk::Extent3D { width: extent.0, height: extent.1, depth: 1 },
                    };
                    unsafe {
                        self.device().cmd_copy_image_to_buffer(
                            cmd,
                            texture.image,
                            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                            buffer,
                            &[region],
                        );
                    }
                    self.transfer_barrier(buffer);
                }
                Command::CopyBufferToBuffer { src, src_offset, dst, dst_offset, size } => {
                    let src = self.buffers.get(src.0)?.buffer;
                    let dst = self.buffers.get(dst.0)?.buffer;
                    let region = vk::BufferCopy { src_offset: *src_offset, dst_offset: *dst_offset, size: *size };
                    unsafe { self.device().cmd_copy_buffer(cmd, src, dst, &[region]) };
                    self.transfer_barrier(dst);
                }
            }
        }
        Ok(())
    }

    /// Make a transfer write visible to later transfers and to host reads
    fn transfer_barrier(&self, buffer: vk::Buffer) {
        let barrier = vk::BufferMemoryBarrier::builder()
            .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .dst_access_mask(vk::AccessFlags::TRANSFER_READ | vk::AccessFlags::HOST_READ)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .buffer(buffer)
            .offset(0)
            .size(vk::WHOLE_SIZE)
            .build();
        unsafe {
            self.device().cmd_pipeline_barrier(
                self.command_buffer,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::TRANSFER | vk::PipelineStageFlags::HOST,
                vk::DependencyFlags::empty(),
                &[],
                &[barrier],
                &[],
            );
        }
    }

    /// Record and run a command buffer to completion outside the frame flow
    fn one_shot(&mut self, record: impl FnOnce(&Device, vk::CommandBuffer)) -> RenderResult<()> {
        self.wait_for_submission()?;
        let cmd = self.command_buffer;
        let device = &self.context.device;
        let begin = vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            device.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())?;
            device.begin_command_buffer(cmd, &begin)?;
            record(device, cmd);
            device.end_command_buffer(cmd)?;
            let buffers = [cmd];
            let submit = vk::SubmitInfo::builder().command_buffers(&buffers).build();
            device.queue_submit(self.context.queue, &[submit], vk::Fence::null())?;
            device.queue_wait_idle(self.context.queue)?;
        }
        Ok(())
    }

    fn destroy_framebuffers_using(&mut self, texture: TextureHandle) {
        let device = &self.context.device;
        self.framebuffers.retain(|(color, depth), framebuffer| {
            let uses = *color == texture || *depth == Some(texture);
            if uses {
                unsafe { device.destroy_framebuffer(*framebuffer, None) };
            }
            !uses
        });
    }
}

impl GraphicsDevice for VulkanDevice {
    fn name(&self) -> &str {
        &self.name
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
        let buffer = VulkanBuffer::new(&self.context, desc)?;
        Ok(BufferHandle(self.buffers.insert(buffer)))
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) -> RenderResult<()> {
        self.buffers.get(buffer.0)?.write(offset, data)
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if let Err(e) = self.wait_for_submission() {
            log::warn!("Waiting for the GPU before destroying a buffer failed: {}", e);
        }
        if let Some(removed) = self.buffers.remove(buffer.0) {
            removed.destroy(&self.context.device);
        }
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> RenderResult<TextureHandle> {
        desc.byte_size()?;
        let limit = self.context.properties.limits.max_image_dimension2_d;
        if desc.width > limit || desc.height > limit {
            return Err(RenderError::ResourceCreationFailed(format!(
                "texture '{}' {}x{} exceeds the device limit {}",
                desc.label, desc.width, desc.height, limit
            )));
        }
        let texture = VulkanTexture::new(&self.context, desc)?;
        Ok(TextureHandle(self.textures.insert(texture)))
    }

    fn write_texture(&mut self, texture: TextureHandle, data: &[u8]) -> RenderResult<()> {
        let target = self.textures.get(texture.0)?;
        let (image, desc) = (target.image, target.desc.clone());
        let expected = desc.byte_size()?;
        if data.len() != expected {
            return Err(RenderError::BackendError(format!(
                "texture '{}' expects {} bytes, got {}",
                desc.label,
                expected,
                data.len()
            )));
        }

        let staging = VulkanBuffer::new(
            &self.context,
            &BufferDesc::new("texture staging", data.len() as u64, BufferUsages::COPY_SRC),
        )?;
        let staging_buffer = staging.buffer;
        let range = subresource_range(desc.format);
        let result = staging.write(0, data).and_then(|()| {
            self.one_shot(|device, cmd| {
                let to_transfer = vk::ImageMemoryBarrier::builder()
                    .old_layout(vk::ImageLayout::UNDEFINED)
                    .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .image(image)
                    .subresource_range(range)
                    .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                    .build();
                let to_shader = vk::ImageMemoryBarrier::builder()
                    .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                    .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .image(image)
                    .subresource_range(range)
                    .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                    .dst_access_mask(vk::AccessFlags::SHADER_READ)
                    .build();
                let region = vk::BufferImageCopy {
                    buffer_offset: 0,
                    buffer_row_length: 0,
                    buffer_image_height: 0,
                    image_subresource: vk::ImageSubresourceLayers {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        mip_level: 0,
                        base_array_layer: 0,
                        layer_count: 1,
                    },
                    image_offset: vk::Offset3D::default(),
                    image_extent: vk::Extent3D { width: desc.width, height: desc.height, depth: 1 },
                };
                unsafe {
                    device.cmd_pipeline_barrier(
                        cmd,
                        vk::PipelineStageFlags::TOP_OF_PIPE,
                        vk::PipelineStageFlags::TRANSFER,
                        vk::DependencyFlags::empty(),
                        &[],
                        &[],
                        &[to_transfer],
                    );
                    device.cmd_copy_buffer_to_image(
                        cmd,
                        staging_buffer,
                        image,
                        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                        &[region],
                    );
                    device.cmd_pipeline_barrier(
                        cmd,
                        vk::PipelineStageFlags::TRANSFER,
                        vk::PipelineStageFlags::FRAGMENT_SHADER,
                        vk::DependencyFlags::empty(),
                        &[],
                        &[],
                        &[to_shader],
                    );
                }
            })
        });
        staging.destroy(&self.context.device);
        result
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if let Err(e) = self.wait_for_submission() {
            log::warn!("Waiting for the GPU before destroying a texture failed: {}", e);
        }
        self.destroy_framebuffers_using(texture);
        if let Some(removed) = self.textures.remove(texture.0) {
            removed.destroy(&self.context.device);
        }
    }

    fn create_sampler(&mut self, desc: &SamplerDesc) -> RenderResult<SamplerHandle> {
        let filter = match desc.filter {
            FilterMode::Nearest => vk::Filter::NEAREST,
            FilterMode::Linear => vk::Filter::LINEAR,
        };
        let address_mode = match desc.address_mode {
            AddressMode::Repeat => vk::SamplerAddressMode::REPEAT,
            AddressMode::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        };
        let info = vk::SamplerCreateInfo::builder()
            .mag_filter(filter)
            .min_filter(filter)
            .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
            .address_mode_u(address_mode)
            .address_mode_v(address_mode)
            .address_mode_w(address_mode)
            .max_lod(0.0);
        let sampler = unsafe { self.device().create_sampler(&info, None)? };
        Ok(SamplerHandle(self.samplers.insert(sampler)))
    }

    fn create_shader_module(&mut self, label: &str, code: &[u8]) -> RenderResult<ShaderHandle> {
        let words = ash::util::read_spv(&mut std::io::Cursor::new(code))
            .map_err(|e| RenderError::ResourceCreationFailed(format!("shader '{}': {}", label, e)))?;
        let info = vk::ShaderModuleCreateInfo::builder().code(&words);
        let module = unsafe { self.device().create_shader_module(&info, None)? };
        log::debug!("Created shader module '{}'", label);
        Ok(ShaderHandle(self.shaders.insert(module)))
    }

    fn create_render_pipeline(&mut self, desc: &PipelineDesc) -> RenderResult<PipelineHandle> {
        let vertex = *self.shaders.get(desc.vertex_shader.0)?;
        let fragment = *self.shaders.get(desc.fragment_shader.0)?;
        let render_pass = self.render_pass(desc.color_format, desc.depth_format)?;
        let pipeline = VulkanPipeline::new(&self.context.device, desc, vertex, fragment, render_pass)?;
        Ok(PipelineHandle(self.pipelines.insert(pipeline)))
    }

    fn create_bind_group(
        &mut self,
        pipeline: PipelineHandle,
        group_index: u32,
        entries: &[BindGroupEntry],
    ) -> RenderResult<BindGroupHandle> {
        let pipeline = self.pipelines.get(pipeline.0)?;
        let (Some(layout), Some(layout_entries)) = (
            pipeline.set_layouts.get(group_index as usize),
            pipeline.desc.bind_group_layouts.get(group_index as usize),
        ) else {
            return Err(RenderError::ResourceCreationFailed(format!(
                "pipeline '{}' has no bind group {}",
                pipeline.desc.label, group_index
            )));
        };

        let mut bindings = Vec::with_capacity(entries.len());
        for entry in entries {
            let resolved = match entry.resource {
                BindingResource::Buffer { buffer, offset, size } => {
                    ResolvedBinding::Buffer { buffer: self.buffers.get(buffer.0)?.buffer, offset, size }
                }
                BindingResource::TextureSampler { texture, sampler } => ResolvedBinding::TextureSampler {
                    view: self.textures.get(texture.0)?.view,
                    sampler: *self.samplers.get(sampler.0)?,
                },
            };
            bindings.push((entry.binding, resolved));
        }

        let group = self.descriptors.create_bind_group(&self.context.device, *layout, layout_entries, &bindings)?;
        Ok(BindGroupHandle(self.bind_groups.insert(group)))
    }

    fn begin_frame(&mut self) -> RenderResult<()> {
        self.wait_for_submission()
    }

    fn submit(&mut self, commands: CommandList) -> RenderResult<SubmissionIndex> {
        self.wait_for_submission()?;
        let cmd = self.command_buffer;
        let begin = vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            self.device().reset_fences(&[self.fence])?;
            self.device().reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())?;
            self.device().begin_command_buffer(cmd, &begin)?;
        }

        let recorded = self.record(&commands);
        unsafe { self.device().end_command_buffer(cmd)? };
        recorded?;

        let buffers = [cmd];
        let submit = vk::SubmitInfo::builder().command_buffers(&buffers).build();
        unsafe { self.device().queue_submit(self.context.queue, &[submit], self.fence)? };
        self.in_flight = true;
        self.submitted += 1;
        log::trace!("Submitted {} commands as #{}", commands.commands().len(), self.submitted);
        Ok(SubmissionIndex(self.submitted))
    }

    fn map_read_async(&mut self, buffer: BufferHandle, offset: u64, size: u64) -> RenderResult<ReadbackTicket> {
        let target = self.buffers.get(buffer.0)?;
        if offset.checked_add(size).map_or(true, |end| end > target.desc.size) {
            return Err(RenderError::ReadbackFailed(format!(
                "range {}+{} outside buffer '{}' of {} bytes",
                offset,
                size,
                target.desc.label,
                target.desc.size
            )));
        }
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.readbacks.insert(ticket, PendingReadback { buffer, offset, size, submission: self.submitted });
        Ok(ReadbackTicket(ticket))
    }

    fn poll_readback(&mut self, ticket: ReadbackTicket) -> ReadbackStatus {
        let Some(pending) = self.readbacks.get(&ticket.0) else {
            return ReadbackStatus::Failed(format!("unknown readback ticket {}", ticket.0));
        };
        if pending.submission > self.completed && self.in_flight {
            match unsafe { self.context.device.get_fence_status(self.fence) } {
                Ok(true) => {
                    self.in_flight = false;
                    self.completed = self.submitted;
                }
                Ok(false) => return ReadbackStatus::Pending,
                Err(e) => {
                    self.readbacks.remove(&ticket.0);
                    return ReadbackStatus::Failed(VulkanError::Api(e).to_string());
                }
            }
        }

        let Some(pending) = self.readbacks.remove(&ticket.0) else {
            return ReadbackStatus::Failed(format!("unknown readback ticket {}", ticket.0));
        };
        match self.buffers.get(pending.buffer.0).and_then(|b| b.read(pending.offset, pending.size)) {
            Ok(bytes) => ReadbackStatus::Ready(bytes),
            Err(e) => ReadbackStatus::Failed(e.to_string()),
        }
    }

    fn cancel_readback(&mut self, ticket: ReadbackTicket) {
        // Readback buffers are host visible; nothing to release on the GPU side
        if self.readbacks.remove(&ticket.0).is_some() {
            log::trace!("Cancelled readback {}", ticket.0);
        }
    }

    fn wait_idle(&mut self) -> RenderResult<()> {
        unsafe { self.device().device_wait_idle()? };
        self.in_flight = false;
        self.completed = self.submitted;
        Ok(())
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        let device = &self.context.device;
        unsafe {
            let _ = device.device_wait_idle();
            for (_, framebuffer) in self.framebuffers.drain() {
                device.destroy_framebuffer(framebuffer, None);
            }
            for (_, pass) in self.render_passes.drain() {
                device.destroy_render_pass(pass, None);
            }
            for pipeline in self.pipelines.drain() {
                pipeline.destroy(device);
            }
            for module in self.shaders.drain() {
                device.destroy_shader_module(module, None);
            }
            for sampler in self.samplers.drain() {
                device.destroy_sampler(sampler, None);
            }
        }
        for group in self.bind_groups.drain() {
            self.descriptors.free(device, &group);
        }
        self.descriptors.destroy(device);
        for texture in self.textures.drain() {
            texture.destroy(device);
        }
        for buffer in self.buffers.drain() {
            buffer.destroy(device);
        }
        unsafe {
            device.destroy_fence(self.fence, None);
            device.destroy_command_pool(self.command_pool, None);
        }
        log::info!("Vulkan device destroyed");
    }
}
