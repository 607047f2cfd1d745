//! Vulkan context management
//!
//! Instance, physical device selection and a logical device with a single
//! graphics queue. No window system extensions are requested.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use ash::{vk, Device, Entry, Instance};

use super::{VulkanError, VulkanResult};

const VALIDATION_LAYER: &[u8] = b"VK_LAYER_KHRONOS_validation\0";

/// Loaded Vulkan instance, chosen GPU and logical device
pub struct VulkanContext {
    /// Vulkan entry point
    pub entry: Entry,
    /// Vulkan instance handle
    pub instance: Instance,
    /// Selected GPU
    pub physical_device: vk::PhysicalDevice,
    /// Device properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Memory heaps and types
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Logical device
    pub device: Device,
    /// Graphics queue
    pub queue: vk::Queue,
    /// Family of `queue`
    pub queue_family: u32,
}

impl VulkanContext {
    /// Load Vulkan and create a device on the best available GPU
    pub fn new(app_name: &str, enable_validation: bool) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }.map_err(|e| VulkanError::Loading(e.to_string()))?;

        let app_name = CString::new(app_name).map_err(|e| VulkanError::InitializationFailed(e.to_string()))?;
        let engine_name = CString::new("SceneEngine").map_err(|e| VulkanError::InitializationFailed(e.to_string()))?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let layers: Vec<*const c_char> = if enable_validation && Self::validation_available(&entry) {
            vec![VALIDATION_LAYER.as_ptr().cast()]
        } else {
            if enable_validation {
                log::warn!("Validation requested but VK_LAYER_KHRONOS_validation is not installed");
            }
            Vec::new()
        };

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_layer_names(&layers);
        let instance = unsafe { entry.create_instance(&create_info, None)? };

        let (physical_device, queue_family) = match Self::select_physical_device(&instance) {
            Ok(selection) => selection,
            Err(e) => {
                unsafe { instance.destroy_instance(None) };
                return Err(e);
            }
        };

        let priorities = [1.0];
        let queue_infos = [vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(queue_family)
            .queue_priorities(&priorities)
            .build()];
        let device_info = vk::DeviceCreateInfo::builder().queue_create_infos(&queue_infos);
        let device = match unsafe { instance.create_device(physical_device, &device_info, None) } {
            Ok(device) => device,
            Err(e) => {
                unsafe { instance.destroy_instance(None) };
                return Err(e.into());
            }
        };

        let queue = unsafe { device.get_device_queue(queue_family, 0) };
        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let memory_properties = unsafe { instance.get_physical_device_memory_properties(physical_device) };

        let context = Self {
            entry,
            instance,
            physical_device,
            properties,
            memory_properties,
            device,
            queue,
            queue_family,
        };
        log::info!("Selected GPU: {}", context.device_name());
        Ok(context)
    }

    fn validation_available(entry: &Entry) -> bool {
        #[allow(unused_unsafe)]
        let layers = unsafe { entry.enumerate_instance_layer_properties() };
        layers
            .map(|layers| {
                layers.iter().any(|layer| {
                    let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
                    name.to_bytes_with_nul() == VALIDATION_LAYER
                })
            })
            .unwrap_or(false)
    }

    /// Prefer a discrete GPU, then integrated, then anything with graphics
    fn select_physical_device(instance: &Instance) -> VulkanResult<(vk::PhysicalDevice, u32)> {
        let devices = unsafe { instance.enumerate_physical_devices()? };

        let rank = |kind: vk::PhysicalDeviceType| match kind {
            vk::PhysicalDeviceType::DISCRETE_GPU => 0,
            vk::PhysicalDeviceType::INTEGRATED_GPU => 1,
            vk::PhysicalDeviceType::VIRTUAL_GPU => 2,
            _ => 3,
        };

        devices
            .into_iter()
            .filter_map(|device| {
                let families = unsafe { instance.get_physical_device_queue_family_properties(device) };
                let family = families
                    .iter()
                    .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))?;
                let properties = unsafe { instance.get_physical_device_properties(device) };
                Some((rank(properties.device_type), device, family as u32))
            })
            .min_by_key(|(rank, _, _)| *rank)
            .map(|(_, device, family)| (device, family))
            .ok_or_else(|| VulkanError::InitializationFailed("No GPU with a graphics queue found".to_string()))
    }

    /// Name reported by the driver
    pub fn device_name(&self) -> String {
        unsafe { CStr::from_ptr(self.properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned()
    }

    /// Index of a memory type allowed by `type_bits` with all of `flags`
    pub fn find_memory_type(&self, type_bits: u32, flags: vk::MemoryPropertyFlags) -> VulkanResult<u32> {
        (0..self.memory_properties.memory_type_count)
            .find(|&i| {
                type_bits & (1 << i) != 0
                    && self.memory_properties.memory_types[i as usize].property_flags.contains(flags)
            })
            .ok_or(VulkanError::NoSuitableMemoryType)
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}
