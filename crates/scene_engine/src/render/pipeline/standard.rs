//! Lit mesh pipeline

use super::instanced::{InstancedPipeline, InstancedPipelineDesc};
use super::uniforms::{FrameUniform, ModelUniform};
use super::ShaderPair;
use crate::ecs::systems::RenderInstance;
use crate::foundation::math::Mat4;
use crate::render::api::{BlendMode, CullMode, FragmentOutput, GraphicsDevice, RenderPassEncoder};
use crate::render::RenderResult;

/// Draws every mesh instance with a simple directional light
#[derive(Debug)]
pub struct StandardPipeline {
    inner: InstancedPipeline,
}

impl StandardPipeline {
    /// Create the pipeline with `capacity` instance slots
    pub fn new(device: &mut dyn GraphicsDevice, shaders: ShaderPair, capacity: u32) -> RenderResult<Self> {
        let desc = InstancedPipelineDesc {
            label: "standard",
            shaders,
            payload_size: std::mem::size_of::<ModelUniform>() as u64,
            frame_uniform_size: std::mem::size_of::<FrameUniform>() as u64,
            capacity,
            extra_bind_groups: Vec::new(),
            color_format: device.color_format(),
            depth_format: Some(device.depth_format()),
            cull_mode: CullMode::Back,
            blend: BlendMode::Replace,
            fragment_output: FragmentOutput::Shaded,
        };
        Ok(Self { inner: InstancedPipeline::new(device, desc)? })
    }

    /// Shared instancing core
    pub fn instanced(&self) -> &InstancedPipeline {
        &self.inner
    }

    /// Write one instance's model matrix
    pub fn update_instance(&self, device: &mut dyn GraphicsDevice, index: u32, model: &Mat4) -> RenderResult<()> {
        self.inner.write_instance(device, index, bytemuck::bytes_of(&ModelUniform::new(model)))
    }

    /// Write this frame's camera matrices
    pub fn update_frame_uniforms(&self, device: &mut dyn GraphicsDevice, view: &Mat4, projection: &Mat4) -> RenderResult<()> {
        self.inner.write_frame(device, bytemuck::bytes_of(&FrameUniform::new(view, projection)))
    }

    /// Upload every instance's world matrix into its slot
    pub fn upload_instances(&self, device: &mut dyn GraphicsDevice, instances: &[RenderInstance]) -> RenderResult<()> {
        for instance in instances {
            self.update_instance(device, instance.slot, &instance.world_matrix)?;
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
    use crate::render::api::{Command, CommandEncoder, TextureDesc, TextureFormat, TextureUsages};
    use crate::render::{HeadlessDevice, MeshData, RenderError};
    use crate::ecs::World;
    use crate::ecs::systems::collect_frame_instances;
    use std::sync::Arc;

    fn shaders(device: &mut HeadlessDevice) -> ShaderPair {
        ShaderPair {
            vertex: device.create_shader_module("vs", &[]).expect("vs"),
            fragment: device.create_shader_module("fs", &[]).expect("fs"),
        }
    }

    #[test]
    fn test_instance_written_at_stride_offset() {
        let mut device = HeadlessDevice::new();
        let shaders = shaders(&mut device);
        let pipeline = StandardPipeline::new(&mut device, shaders, 4).expect("pipeline");
        assert_eq!(pipeline.instanced().stride(), 256);

        let model = Mat4::new_translation(&crate::foundation::math::Vec3::new(7.0, 8.0, 9.0));
        pipeline.update_instance(&mut device, 2, &model).expect("write");

        let buffer = pipeline.instanced().instance_buffer().expect("buffer");
        let bytes = device.buffer_contents(buffer).expect("contents");
        assert_eq!(bytes.len(), 4 * 256);
        let slot: [f32; 16] = bytemuck::pod_read_unaligned(&bytes[512..512 + 64]);
        assert_eq!(&slot[12..15], &[7.0, 8.0, 9.0]);
        assert!(bytes[..512].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_capacity_is_enforced() {
        let mut device = HeadlessDevice::new();
        let shaders = shaders(&mut device);
        let pipeline = StandardPipeline::new(&mut device, shaders, 2).expect("pipeline");
        assert_eq!(
            pipeline.update_instance(&mut device, 2, &Mat4::identity()),
            Err(RenderError::CapacityExceeded { index: 2, capacity: 2 })
        );
        assert!(pipeline.instanced().dynamic_offset(5).is_err());
    }

    #[test]
    fn test_shared_mesh_bound_once() {
        let mut device = HeadlessDevice::new();
        let shaders = shaders(&mut device);
        let pipeline = StandardPipeline::new(&mut device, shaders, 8).expect("pipeline");
        let mesh = Arc::new(MeshData::cube().upload(&mut device, "cube").expect("mesh"));

        let mut world = World::new();
        for i in 0..3 {
            let id = world.spawn_with_transform(format!("cube {}", i)).expect("spawn");
            world.get_mut(id).expect("entity").attach_mesh(Arc::clone(&mesh));
        }
        let frame = collect_frame_instances(&world);

        let target = device
            .create_texture(&TextureDesc {
                label: "color".to_string(),
                width: 8,
                height: 8,
                format: TextureFormat::Rgba8Unorm,
                usage: TextureUsages::RENDER_ATTACHMENT,
            })
            .expect("texture");
        let mut encoder = CommandEncoder::new();
        {
            let mut pass = encoder.begin_render_pass("color", target, None, [0.0; 4]);
            assert_eq!(pipeline.draw(&mut pass, &frame.meshes).expect("draw"), 3);
        }
        let list = encoder.finish();

        let vertex_binds = list.commands().iter().filter(|c| matches!(c, Command::SetVertexBuffer { .. })).count();
        let offsets: Vec<u32> = list
            .commands()
            .iter()
            .filter_map(|c| match c {
                Command::SetBindGroup { dynamic_offsets, .. } => dynamic_offsets.first().copied(),
                _ => None,
            })
            .collect();
        assert_eq!(vertex_binds, 1);
        assert_eq!(offsets, vec![0, 256, 512]);
        assert_eq!(list.draw_count(), 3);
        device.submit(list).expect("submit");
    }
}
