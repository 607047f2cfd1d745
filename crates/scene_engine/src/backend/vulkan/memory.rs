//! Buffer and image allocation
//!
//! Buffers live in host-visible, host-coherent memory and stay mapped for
//! their whole lifetime, so uniform writes and readbacks are plain copies.
//! Images live in device-local memory.

use ash::{vk, Device};

use super::context::VulkanContext;
use super::{vk_buffer_usage, vk_format, vk_image_usage, VulkanResult};
use crate::render::api::{BufferDesc, TextureDesc, TextureFormat};
use crate::render::{RenderError, RenderResult};

fn allocate(
    context: &VulkanContext,
    requirements: vk::MemoryRequirements,
    flags: vk::MemoryPropertyFlags,
) -> VulkanResult<vk::DeviceMemory> {
    let memory_type = context.find_memory_type(requirements.memory_type_bits, flags)?;
    let info = vk::MemoryAllocateInfo::builder()
        .allocation_size(requirements.size)
        .memory_type_index(memory_type);
    Ok(unsafe { context.device.allocate_memory(&info, None)? })
}

/// Buffer wrapper with persistently mapped memory
pub(crate) struct VulkanBuffer {
    pub buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    mapped: *mut u8,
    pub desc: BufferDesc,
}

impl VulkanBuffer {
    pub fn new(context: &VulkanContext, desc: &BufferDesc) -> VulkanResult<Self> {
        let device = &context.device;
        let info = vk::BufferCreateInfo::builder()
            .size(desc.size)
            .usage(vk_buffer_usage(desc.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe { device.create_buffer(&info, None)? };

        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let flags = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        let memory = match allocate(context, requirements, flags) {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        let mapped = unsafe {
            device
                .bind_buffer_memory(buffer, memory, 0)
                .and_then(|()| device.map_memory(memory, 0, vk::WHOLE_SIZE, vk::MemoryMapFlags::empty()))
        };
        let mapped = match mapped {
            Ok(ptr) => ptr.cast::<u8>(),
            Err(e) => {
                unsafe {
                    device.destroy_buffer(buffer, None);
                    device.free_memory(memory, None);
                }
                return Err(e.into());
            }
        };
        unsafe { std::ptr::write_bytes(mapped, 0, desc.size as usize) };

        Ok(Self { buffer, memory, mapped, desc: desc.clone() })
    }

    fn check_range(&self, offset: u64, len: u64) -> RenderResult<()> {
        if offset.checked_add(len).map_or(true, |end| end > self.desc.size) {
            return Err(RenderError::BackendError(format!(
                "range {}+{} outside buffer '{}' of {} bytes",
                offset, len, self.desc.label, self.desc.size
            )));
        }
        Ok(())
    }

    pub fn write(&self, offset: u64, data: &[u8]) -> RenderResult<()> {
        self.check_range(offset, data.len() as u64)?;
        unsafe { std::ptr::copy_nonoverlapping(data.as_ptr(), self.mapped.add(offset as usize), data.len()) };
        Ok(())
    }

    pub fn read(&self, offset: u64, size: u64) -> RenderResult<Vec<u8>> {
        self.check_range(offset, size)?;
        let mut out = vec![0; size as usize];
        unsafe { std::ptr::copy_nonoverlapping(self.mapped.add(offset as usize), out.as_mut_ptr(), out.len()) };
        Ok(out)
    }

    pub fn destroy(&self, device: &Device) {
        unsafe {
            device.unmap_memory(self.memory);
            device.destroy_buffer(self.buffer, None);
            device.free_memory(self.memory, None);
        }
    }
}

/// 2D image with one mip level and a full view
pub(crate) struct VulkanTexture {
    pub image: vk::Image,
    memory: vk::DeviceMemory,
    pub view: vk::ImageView,
    pub desc: TextureDesc,
}

impl VulkanTexture {
    pub fn new(context: &VulkanContext, desc: &TextureDesc) -> VulkanResult<Self> {
        let device = &context.device;
        let format = vk_format(desc.format);
        let info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D { width: desc.width, height: desc.height, depth: 1 })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk_image_usage(desc.usage, desc.format))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let image = unsafe { device.create_image(&info, None)? };

        let requirements = unsafe { device.get_image_memory_requirements(image) };
        let memory = match allocate(context, requirements, vk::MemoryPropertyFlags::DEVICE_LOCAL) {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_image(image, None) };
                return Err(e);
            }
        };

        let view_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(subresource_range(desc.format));
        let view = unsafe {
            device
                .bind_image_memory(image, memory, 0)
                .and_then(|()| device.create_image_view(&view_info, None))
        };
        match view {
            Ok(view) => Ok(Self { image, memory, view, desc: desc.clone() }),
            Err(e) => {
                unsafe {
                    device.destroy_image(image, None);
                    device.free_memory(memory, None);
                }
                Err(e.into())
            }
        }
    }

    pub fn destroy(&self, device: &Device) {
        unsafe {
            device.destroy_image_view(self.view, None);
            device.destroy_image(self.image, None);
            device.free_memory(self.memory, None);
        }
    }
}

pub(crate) fn subresource_range(format: TextureFormat) -> vk::ImageSubresourceRange {
    let aspect_mask = if format.is_depth() { vk::ImageAspectFlags::DEPTH } else { vk::ImageAspectFlags::COLOR };
    vk::ImageSubresourceRange { aspect_mask, base_mip_level: 0, level_count: 1, base_array_layer: 0, layer_count: 1 }
}
