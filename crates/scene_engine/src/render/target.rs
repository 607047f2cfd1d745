//! Offscreen color + depth render target

use crate::render::api::{GraphicsDevice, TextureDesc, TextureFormat, TextureHandle, TextureUsages};
use crate::render::RenderResult;

/// A color attachment with a matching depth attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    /// Color attachment
    pub color: TextureHandle,
    /// Depth attachment
    pub depth: TextureHandle,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl RenderTarget {
    /// Create both attachments in the device's color format
    pub fn new(device: &mut dyn GraphicsDevice, label: &str, width: u32, height: u32) -> RenderResult<Self> {
        let format = device.color_format();
        Self::with_format(device, label, width, height, format)
    }

    /// Create both attachments; the color texture can also be copied from
    pub fn with_format(
        device: &mut dyn GraphicsDevice,
        label: &str,
        width: u32,
        height: u32,
        color_format: TextureFormat,
    ) -> RenderResult<Self> {
        let color = device.create_texture(&TextureDesc {
            label: format!("{} color", label),
            width,
            height,
            format: color_format,
            usage: TextureUsages::RENDER_ATTACHMENT | TextureUsages::COPY_SRC,
        })?;
        let depth = match device.create_texture(&TextureDesc {
            label: format!("{} depth", label),
            width,
            height,
            format: device.depth_format(),
            usage: TextureUsages::RENDER_ATTACHMENT,
        }) {
            Ok(depth) => depth,
            Err(e) => {
                device.destroy_texture(color);
                return Err(e);
            }
        };
        log::debug!("Created render target '{}' {}x{}", label, width, height);
        Ok(Self { color, depth, width, height })
    }

    /// Release both attachments
    pub fn destroy(&self, device: &mut dyn GraphicsDevice) {
        device.destroy_texture(self.color);
        device.destroy_texture(self.depth);
    }
}
