//! Capacity-bounded dynamic-offset instancing shared by all pipelines
//!
//! Bind group 0 is fixed: binding 0 is the per-instance region addressed
//! with a dynamic offset, binding 1 the per-frame region. Pipelines may add
//! further groups after it.

use super::base::{aligned_stride, PipelineResources};
use super::ShaderPair;
use crate::render::api::{
    BindGroupEntry, BindGroupLayoutEntry, BindingResource, BindingType, BlendMode, BufferHandle, CullMode,
    FragmentOutput, GraphicsDevice, PipelineDesc, PipelineHandle, RenderPassEncoder, ShaderStages, TextureFormat,
};
use crate::render::{MeshResource, RenderError, RenderResult, Vertex};

const INSTANCE_BUFFER: &str = "instances";
const FRAME_BUFFER: &str = "frame";
const INSTANCE_GROUP: &str = "instances";

/// Creation parameters of an instanced pipeline
#[derive(Debug, Clone)]
pub struct InstancedPipelineDesc<'a> {
    /// Debug label
    pub label: &'a str,
    /// Shader modules
    pub shaders: ShaderPair,
    /// Byte size of one instance's payload
    pub payload_size: u64,
    /// Byte size of the per-frame region
    pub frame_uniform_size: u64,
    /// Number of instance slots
    pub capacity: u32,
    /// Layouts of bind groups 1..
    pub extra_bind_groups: Vec<Vec<BindGroupLayoutEntry>>,
    /// Color target format
    pub color_format: TextureFormat,
    /// Depth target format
    pub depth_format: Option<TextureFormat>,
    /// Face culling
    pub cull_mode: CullMode,
    /// Color blending
    pub blend: BlendMode,
    /// Fragment output
    pub fragment_output: FragmentOutput,
}

/// Pipeline with one dynamic-offset slot per instance
#[derive(Debug)]
pub struct InstancedPipeline {
    resources: PipelineResources,
    capacity: u32,
    payload_size: u64,
    stride: u64,
}

impl InstancedPipeline {
    /// Create the pipeline, its uniform buffers and bind group 0
    pub fn new(device: &mut dyn GraphicsDevice, desc: InstancedPipelineDesc<'_>) -> RenderResult<Self> {
        if desc.capacity == 0 {
            return Err(RenderError::ResourceCreationFailed(format!("pipeline '{}' needs at least one instance slot", desc.label)));
        }
        let stride = aligned_stride(desc.payload_size);

        let mut bind_group_layouts = vec![vec![
            BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::VERTEX | ShaderStages::FRAGMENT,
                ty: BindingType::UniformBuffer { dynamic: true },
            },
            BindGroupLayoutEntry {
                binding: 1,
                visibility: ShaderStages::VERTEX,
                ty: BindingType::UniformBuffer { dynamic: false },
            },
        ]];
        bind_group_layouts.extend(desc.extra_bind_groups);

        let mut resources = PipelineResources::new(desc.label);
        let pipeline = device.create_render_pipeline(&PipelineDesc {
            label: desc.label.to_string(),
            vertex_shader: desc.shaders.vertex,
            fragment_shader: desc.shaders.fragment,
            vertex_layout: Vertex::layout(),
            bind_group_layouts,
            color_format: desc.color_format,
            depth_format: desc.depth_format,
            cull_mode: desc.cull_mode,
            blend: desc.blend,
            fragment_output: desc.fragment_output,
        })?;
        resources.set_pipeline(pipeline);

        let instances = resources.create_uniform_buffer(device, INSTANCE_BUFFER, stride * u64::from(desc.capacity))?;
        let frame = resources.create_uniform_buffer(device, FRAME_BUFFER, desc.frame_uniform_size)?;
        resources.create_bind_group(
            device,
            INSTANCE_GROUP,
            0,
            &[
                BindGroupEntry {
                    binding: 0,
                    resource: BindingResource::Buffer { buffer: instances, offset: 0, size: desc.payload_size },
                },
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::Buffer { buffer: frame, offset: 0, size: desc.frame_uniform_size },
                },
            ],
        )?;

        log::info!(
            "Created instanced pipeline '{}': {} slots x {} bytes (payload {})",
            desc.label,
            desc.capacity,
            stride,
            desc.payload_size
        );

        Ok(Self { resources, capacity: desc.capacity, payload_size: desc.payload_size, stride })
    }

    /// Number of instance slots
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Bytes between consecutive slots
    pub fn stride(&self) -> u64 {
        self.stride
    }

    /// The graphics pipeline
    pub fn pipeline(&self) -> RenderResult<PipelineHandle> {
        self.resources.pipeline()
    }

    /// Named resources, for pipelines that add their own groups
    pub fn resources(&self) -> &PipelineResources {
        &self.resources
    }

    /// Mutable named resources
    pub fn resources_mut(&mut self) -> &mut PipelineResources {
        &mut self.resources
    }

    /// Buffer holding every instance slot
    pub fn instance_buffer(&self) -> RenderResult<BufferHandle> {
        self.resources.uniform_buffer(INSTANCE_BUFFER)
    }

    /// Reject slots outside the capacity
    pub fn check_slot(&self, index: u32) -> RenderResult<()> {
        if index >= self.capacity {
            return Err(RenderError::CapacityExceeded { index, capacity: self.capacity });
        }
        Ok(())
    }

    /// Dynamic offset of a slot
    pub fn dynamic_offset(&self, index: u32) -> RenderResult<u32> {
        self.check_slot(index)?;
        u32::try_from(u64::from(index) * self.stride)
            .map_err(|_| RenderError::CapacityExceeded { index, capacity: self.capacity })
    }

    /// Overwrite exactly one slot
    pub fn write_instance(&self, device: &mut dyn GraphicsDevice, index: u32, payload: &[u8]) -> RenderResult<()> {
        self.check_slot(index)?;
        debug_assert!(payload.len() as u64 <= self.payload_size, "payload larger than its slot");
        self.resources
            .write_uniform_buffer(device, INSTANCE_BUFFER, u64::from(index) * self.stride, payload)
    }

    /// Overwrite the per-frame region
    pub fn write_frame(&self, device: &mut dyn GraphicsDevice, data: &[u8]) -> RenderResult<()> {
        self.resources.write_uniform_buffer(device, FRAME_BUFFER, 0, data)
    }

    /// Bind the pipeline for this pass
    pub fn begin(&self, pass: &mut RenderPassEncoder<'_>) -> RenderResult<()> {
        pass.set_pipeline(self.pipeline()?);
        Ok(())
    }

    /// Bind group 0 at a slot's dynamic offset
    pub fn bind_instance(&self, pass: &mut RenderPassEncoder<'_>, index: u32) -> RenderResult<()> {
        let offset = self.dynamic_offset(index)?;
        pass.set_bind_group(0, self.resources.bind_group(INSTANCE_GROUP)?, &[offset]);
        Ok(())
    }

    /// Bind the pipeline, then draw each `(slot, mesh)` pair
    ///
    /// Geometry buffers are only rebound when the mesh changes between
    /// consecutive draws. Returns the number of draws recorded.
    pub fn draw_batch<'m>(
        &self,
        pass: &mut RenderPassEncoder<'_>,
        draws: impl IntoIterator<Item = (u32, &'m MeshResource)>,
    ) -> RenderResult<u32> {
        self.begin(pass)?;
        self.draw_instances(pass, draws)
    }

    /// Draw each `(slot, mesh)` pair with the pipeline already bound
    pub fn draw_instances<'m>(
        &self,
        pass: &mut RenderPassEncoder<'_>,
        draws: impl IntoIterator<Item = (u32, &'m MeshResource)>,
    ) -> RenderResult<u32> {
        let mut bound: Option<(BufferHandle, BufferHandle)> = None;
        let mut count = 0;
        for (slot, mesh) in draws {
            self.bind_instance(pass, slot)?;
            let geometry = (mesh.vertex_buffer, mesh.index_buffer);
            if bound != Some(geometry) {
                pass.set_vertex_buffer(0, mesh.vertex_buffer);
                pass.set_index_buffer(mesh.index_buffer, mesh.index_format);
                bound = Some(geometry);
            }
            pass.draw_indexed(mesh.index_count, 1);
            count += 1;
        }
        Ok(count)
    }

    /// Release the uniform buffers
    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        self.resources.destroy(device);
    }
}
