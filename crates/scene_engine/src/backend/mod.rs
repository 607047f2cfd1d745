//! GPU backends implementing [`GraphicsDevice`](crate::render::GraphicsDevice)
//!
//! The in-memory reference device lives in [`crate::render::HeadlessDevice`];
//! backends here talk to real hardware.

pub mod vulkan;

pub use vulkan::{VulkanDevice, VulkanError};
