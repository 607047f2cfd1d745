//! Entity icon billboards
//!
//! One camera-facing textured quad per entity with a transform, drawn with
//! alpha blending on top of the meshes. Each icon texture gets its own bind
//! group (group 1) so switching icons is a single rebind.

use super::instanced::{InstancedPipeline, InstancedPipelineDesc};
use super::uniforms::{IconFrameUniform, ModelUniform};
use super::ShaderPair;
use crate::ecs::systems::IconInstance;
use crate::foundation::math::{Mat4, Vec3};
use crate::render::api::{
    AddressMode, BindGroupEntry, BindGroupLayoutEntry, BindingResource, BindingType, BlendMode, CullMode, FilterMode,
    FragmentOutput, GraphicsDevice, RenderPassEncoder, SamplerDesc, SamplerHandle, ShaderStages, TextureHandle,
};
use crate::render::{MeshData, MeshResource, RenderResult};

/// Draws textured billboards at entity origins
#[derive(Debug)]
pub struct IconPipeline {
    inner: InstancedPipeline,
    quad: MeshResource,
    sampler: SamplerHandle,
    icon_size: f32,
}

impl IconPipeline {
    /// Create the pipeline, its quad and a nearest/repeat sampler
    pub fn new(device: &mut dyn GraphicsDevice, shaders: ShaderPair, capacity: u32, icon_size: f32) -> RenderResult<Self> {
        let desc = InstancedPipelineDesc {
            label: "icon",
            shaders,
            payload_size: std::mem::size_of::<ModelUniform>() as u64,
            frame_uniform_size: std::mem::size_of::<IconFrameUniform>() as u64,
            capacity,
            extra_bind_groups: vec![vec![BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::FRAGMENT,
                ty: BindingType::TextureSampler,
            }]],
            color_format: device.color_format(),
            depth_format: Some(device.depth_format()),
            cull_mode: CullMode::None,
            blend: BlendMode::AlphaBlend,
            fragment_output: FragmentOutput::Shaded,
        };
        let inner = InstancedPipeline::new(device, desc)?;
        let quad = MeshData::quad().upload(device, "icon quad")?;
        let sampler = device.create_sampler(&SamplerDesc { filter: FilterMode::Nearest, address_mode: AddressMode::Repeat })?;
        Ok(Self { inner, quad, sampler, icon_size })
    }

    fn group_name(icon: &str) -> String {
        format!("icon {}", icon)
    }

    /// Register a texture under `icon`
    pub fn add_icon(&mut self, device: &mut dyn GraphicsDevice, icon: &str, texture: TextureHandle) -> RenderResult<()> {
        let entry = BindGroupEntry {
            binding: 0,
            resource: BindingResource::TextureSampler { texture, sampler: self.sampler },
        };
        self.inner.resources_mut().create_bind_group(device, &Self::group_name(icon), 1, &[entry])?;
        log::debug!("Registered icon '{}'", icon);
        Ok(())
    }

    /// Shared instancing core
    pub fn instanced(&self) -> &InstancedPipeline {
        &self.inner
    }

    /// Write one icon's placement
    pub fn update_instance(&self, device: &mut dyn GraphicsDevice, index: u32, position: &Vec3) -> RenderResult<()> {
        let model = Mat4::new_translation(position) * Mat4::new_scaling(self.icon_size);
        self.inner.write_instance(device, index, bytemuck::bytes_of(&ModelUniform::new(&model)))
    }

    /// Write this frame's camera data
    pub fn update_frame_uniforms(
        &self,
        device: &mut dyn GraphicsDevice,
        view: &Mat4,
        projection: &Mat4,
        camera_position: &Vec3,
        fov: f32,
    ) -> RenderResult<()> {
        let frame = IconFrameUniform::new(view, projection, camera_position, fov);
        self.inner.write_frame(device, bytemuck::bytes_of(&frame))
    }

    /// Upload every icon's placement
    pub fn upload_instances(&self, device: &mut dyn GraphicsDevice, icons: &[IconInstance]) -> RenderResult<()> {
        for icon in icons {
            self.update_instance(device, icon.slot, &icon.position)?;
        }
        Ok(())
    }

    /// Draw every icon with the texture registered as `icon`
    pub fn draw(&self, pass: &mut RenderPassEncoder<'_>, icons: &[IconInstance], icon: &str) -> RenderResult<u32> {
        let texture_group = self.inner.resources().bind_group(&Self::group_name(icon))?;
        self.inner.begin(pass)?;
        pass.set_bind_group(1, texture_group, &[]);
        self.inner.draw_instances(pass, icons.iter().map(|i| (i.slot, &self.quad)))
    }

    /// Release GPU buffers
    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        self.inner.destroy(device);
        self.quad.destroy(device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::api::{CommandEncoder, TextureDesc, TextureFormat, TextureUsages};
    use crate::render::{HeadlessDevice, RenderError};

    #[test]
    fn test_unknown_icon_is_a_lookup_failure() {
        let mut device = HeadlessDevice::new();
        let shaders = ShaderPair {
            vertex: device.create_shader_module("vs", &[]).expect("vs"),
            fragment: device.create_shader_module("fs", &[]).expect("fs"),
        };
        let mut pipeline = IconPipeline::new(&mut device, shaders, 4, 0.5).expect("pipeline");
        let texture = device
            .create_texture(&TextureDesc {
                label: "icon".to_string(),
                width: 2,
                height: 2,
                format: TextureFormat::Rgba8Unorm,
                usage: TextureUsages::SAMPLED | TextureUsages::COPY_DST,
            })
            .expect("texture");
        pipeline.add_icon(&mut device, "entity", texture).expect("icon");

        let mut encoder = CommandEncoder::new();
        let mut pass = encoder.begin_render_pass("icons", texture, None, [0.0; 4]);
        assert!(pipeline.draw(&mut pass, &[], "entity").is_ok());
        assert!(matches!(
            pipeline.draw(&mut pass, &[], "camera"),
            Err(RenderError::ResourceLookupFailed { kind: "bind group", .. })
        ));
    }
}
