//! Object id pipeline
//!
//! Renders each instance with its entity id packed little-endian into the
//! RGBA8 channels (R = low byte). The id travels in the `x` lane of a
//! `uvec4` after the model matrix, giving an 80 byte payload and a 256 byte
//! slot.

use super::instanced::{InstancedPipeline, InstancedPipelineDesc};
use super::uniforms::{FrameUniform, PickUniform};
use super::ShaderPair;
use crate::ecs::systems::RenderInstance;
use crate::foundation::math::Mat4;
use crate::render::api::{BlendMode, CullMode, FragmentOutput, GraphicsDevice, RenderPassEncoder, TextureFormat};
use crate::render::RenderResult;

/// Color format of the pick target; ids must survive unconverted
pub const PICK_COLOR_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;

/// Draws object ids into the pick target
#[derive(Debug)]
pub struct PickerPipeline {
    inner: InstancedPipeline,
}

impl PickerPipeline {
    /// Default number of instance slots
    pub const DEFAULT_CAPACITY: u32 = 1000;

    /// Create the pipeline with `capacity` instance slots
    pub fn new(device: &mut dyn GraphicsDevice, shaders: ShaderPair, capacity: u32) -> RenderResult<Self> {
        let desc = InstancedPipelineDesc {
            label: "picker",
            shaders,
            payload_size: std::mem::size_of::<PickUniform>() as u64,
            frame_uniform_size: std::mem::size_of::<FrameUniform>() as u64,
            capacity,
            extra_bind_groups: Vec::new(),
            color_format: PICK_COLOR_FORMAT,
            depth_format: Some(device.depth_format()),
            cull_mode: CullMode::Back,
            blend: BlendMode::Replace,
            fragment_output: FragmentOutput::ObjectId { offset: PickUniform::OBJECT_ID_OFFSET },
        };
        Ok(Self { inner: InstancedPipeline::new(device, desc)? })
    }

    /// Shared instancing core
    pub fn instanced(&self) -> &InstancedPipeline {
        &self.inner
    }

    /// Write one instance's model matrix and object id
    pub fn update_instance(&self, device: &mut dyn GraphicsDevice, index: u32, model: &Mat4, object_id: u32) -> RenderResult<()> {
        self.inner.write_instance(device, index, bytemuck::bytes_of(&PickUniform::new(model, object_id)))
    }

    /// Write this frame's camera matrices
    pub fn update_frame_uniforms(&self, device: &mut dyn GraphicsDevice, view: &Mat4, projection: &Mat4) -> RenderResult<()> {
        self.inner.write_frame(device, bytemuck::bytes_of(&FrameUniform::new(view, projection)))
    }

    /// Upload every instance's matrix and id
    pub fn upload_instances(&self, device: &mut dyn GraphicsDevice, instances: &[RenderInstance]) -> RenderResult<()> {
        for instance in instances {
            self.update_instance(device, instance.slot, &instance.world_matrix, instance.object_id())?;
        }
        Ok(())
    }

    /// Record one draw per instance
    pub fn draw(&self, pass: &mut RenderPassEncoder<'_>, instances: &[RenderInstance]) -> RenderResult<u32> {
        self.inner.draw_batch(pass, instances.iter().map(|i| (i.slot, i.mesh.as_ref())))
    }

    /// Release GPU buffers
    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        self.inner.destroy(device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{HeadlessDevice, RenderError};

    fn pipeline(device: &mut HeadlessDevice, capacity: u32) -> PickerPipeline {
        let shaders = ShaderPair {
            vertex: device.create_shader_module("picker.vert", &[]).expect("shader"),
            fragment: device.create_shader_module("picker.frag", &[]).expect("shader"),
        };
        PickerPipeline::new(device, shaders, capacity).expect("pipeline")
    }

    #[test]
    fn test_out_of_range_slot_is_rejected() {
        let mut device = HeadlessDevice::new();
        let pipeline = pipeline(&mut device, 4);
        pipeline.update_instance(&mut device, 3, &Mat4::identity(), 7).expect("last slot");
        assert!(matches!(
            pipeline.update_instance(&mut device, 4, &Mat4::identity(), 8),
            Err(RenderError::CapacityExceeded { index: 4, capacity: 4 })
        ));
    }
}
