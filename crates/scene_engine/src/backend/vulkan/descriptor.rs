//! Descriptor pool and bind group writes

use ash::{vk, Device};

use super::pipeline::descriptor_type;
use super::VulkanResult;
use crate::render::api::{BindGroupLayoutEntry, BindingType};

/// Maximum bind groups alive at once
const MAX_SETS: u32 = 256;

/// A bind group resource already resolved to Vulkan objects
#[derive(Debug, Clone, Copy)]
pub(crate) enum ResolvedBinding {
    Buffer { buffer: vk::Buffer, offset: u64, size: u64 },
    TextureSampler { view: vk::ImageView, sampler: vk::Sampler },
}

/// Allocated descriptor set
pub(crate) struct VulkanBindGroup {
    pub set: vk::DescriptorSet,
}

/// One pool sized for the viewer's pipelines
pub(crate) struct DescriptorAllocator {
    pool: vk::DescriptorPool,
}

impl DescriptorAllocator {
    pub fn new(device: &Device) -> VulkanResult<Self> {
        let sizes = [
            vk::DescriptorPoolSize { ty: vk::DescriptorType::UNIFORM_BUFFER, descriptor_count: MAX_SETS },
            vk::DescriptorPoolSize { ty: vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC, descriptor_count: MAX_SETS },
            vk::DescriptorPoolSize { ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER, descriptor_count: MAX_SETS },
        ];
        let info = vk::DescriptorPoolCreateInfo::builder()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .max_sets(MAX_SETS)
            .pool_sizes(&sizes);
        let pool = unsafe { device.create_descriptor_pool(&info, None)? };
        Ok(Self { pool })
    }

    /// Allocate a set for `layout` and point every binding at its resource
    pub fn create_bind_group(
        &self,
        device: &Device,
        layout: vk::DescriptorSetLayout,
        layout_entries: &[BindGroupLayoutEntry],
        bindings: &[(u32, ResolvedBinding)],
    ) -> VulkanResult<VulkanBindGroup> {
        let layouts = [layout];
        let info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);
        let set = unsafe { device.allocate_descriptor_sets(&info)? }
            .into_iter()
            .next()
            .ok_or(vk::Result::ERROR_OUT_OF_POOL_MEMORY)?;

        // Infos must stay put while the writes point into them
        let buffer_infos: Vec<vk::DescriptorBufferInfo> = bindings
            .iter()
            .map(|(_, resolved)| match *resolved {
                ResolvedBinding::Buffer { buffer, offset, size } => {
                    vk::DescriptorBufferInfo { buffer, offset, range: size }
                }
                ResolvedBinding::TextureSampler { .. } => vk::DescriptorBufferInfo::default(),
            })
            .collect();
        let image_infos: Vec<vk::DescriptorImageInfo> = bindings
            .iter()
            .map(|(_, resolved)| match *resolved {
                ResolvedBinding::TextureSampler { view, sampler } => vk::DescriptorImageInfo {
                    sampler,
                    image_view: view,
                    image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                },
                ResolvedBinding::Buffer { .. } => vk::DescriptorImageInfo::default(),
            })
            .collect();

        let writes: Vec<vk::WriteDescriptorSet> = bindings
            .iter()
            .enumerate()
            .map(|(i, (binding, resolved))| {
                let ty = layout_entries
                    .iter()
                    .find(|entry| entry.binding == *binding)
                    .map_or(BindingType::UniformBuffer { dynamic: false }, |entry| entry.ty);
                let write = vk::WriteDescriptorSet::builder()
                    .dst_set(set)
                    .dst_binding(*binding)
                    .descriptor_type(descriptor_type(ty));
                match resolved {
                    ResolvedBinding::Buffer { .. } => write.buffer_info(std::slice::from_ref(&buffer_infos[i])).build(),
                    ResolvedBinding::TextureSampler { .. } => {
                        write.image_info(std::slice::from_ref(&image_infos[i])).build()
                    }
                }
            })
            .collect();

        unsafe { device.update_descriptor_sets(&writes, &[]) };
        Ok(VulkanBindGroup { set })
    }

    pub fn free(&self, device: &Device, group: &VulkanBindGroup) {
        unsafe {
            let _ = device.free_descriptor_sets(self.pool, &[group.set]);
        }
    }

    pub fn destroy(&self, device: &Device) {
        unsafe { device.destroy_descriptor_pool(self.pool, None) };
    }
}
