//! Offscreen pick target and its readback buffers

use crate::render::api::{BufferDesc, BufferHandle, BufferUsages, CommandEncoder, GraphicsDevice, RenderPassEncoder};
use crate::render::pipeline::picker::PICK_COLOR_FORMAT;
use crate::render::{RenderResult, RenderTarget};

/// Row pitch of the staging copy; texture-to-buffer copies want 256-byte rows
pub const STAGING_ROW_PITCH: u32 = 256;

/// Bytes of one RGBA8 texel
pub const PICK_TEXEL_SIZE: u64 = 4;

/// Id texture, depth buffer, staging buffer and the mappable readback buffer
#[derive(Debug)]
pub struct PickTarget {
    target: RenderTarget,
    staging: BufferHandle,
    readback: BufferHandle,
}

impl PickTarget {
    /// Allocate everything at the viewport size
    pub fn new(device: &mut dyn GraphicsDevice, width: u32, height: u32) -> RenderResult<Self> {
        let target = RenderTarget::with_format(device, "pick", width, height, PICK_COLOR_FORMAT)?;
        let staging = match device.create_buffer(&BufferDesc::new(
            "pick staging",
            u64::from(STAGING_ROW_PITCH),
            BufferUsages::COPY_SRC | BufferUsages::COPY_DST,
        )) {
            Ok(staging) => staging,
            Err(e) => {
                target.destroy(device);
                return Err(e);
            }
        };
        let readback = match device.create_buffer(&BufferDesc::new(
            "pick readback",
            PICK_TEXEL_SIZE,
            BufferUsages::COPY_DST | BufferUsages::MAP_READ,
        )) {
            Ok(readback) => readback,
            Err(e) => {
                device.destroy_buffer(staging);
                target.destroy(device);
                return Err(e);
            }
        };
        Ok(Self { target, staging, readback })
    }

    /// Color and depth attachments
    pub fn render_target(&self) -> &RenderTarget {
        &self.target
    }

    /// Buffer mapped to read the picked texel
    pub fn readback_buffer(&self) -> BufferHandle {
        self.readback
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.target.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.target.height
    }

    /// Clamp cursor coordinates to a valid texel
    pub fn clamp_cursor(&self, x: i32, y: i32) -> (u32, u32) {
        let clamp = |v: i32, extent: u32| (v.max(0) as u32).min(extent.saturating_sub(1));
        (clamp(x, self.target.width), clamp(y, self.target.height))
    }

    /// Open the id pass: clear to "no object" and restrict rasterization to one pixel
    pub fn begin_pass<'e>(&self, encoder: &'e mut CommandEncoder, pixel: (u32, u32)) -> RenderPassEncoder<'e> {
        let mut pass = encoder.begin_render_pass("pick", self.target.color, Some(self.target.depth), [0.0; 4]);
        pass.set_viewport(0.0, 0.0, self.target.width as f32, self.target.height as f32);
        pass.set_scissor(pixel.0, pixel.1, 1, 1);
        pass
    }

    /// Copy the picked texel to the staging buffer, then into the readback buffer
    pub fn encode_readback(&self, encoder: &mut CommandEncoder, pixel: (u32, u32)) {
        encoder.copy_texture_to_buffer(self.target.color, pixel, (1, 1), self.staging, STAGING_ROW_PITCH);
        encoder.copy_buffer_to_buffer(self.staging, 0, self.readback, 0, PICK_TEXEL_SIZE);
    }

    /// Release everything
    pub fn destroy(&self, device: &mut dyn GraphicsDevice) {
        self.target.destroy(device);
        device.destroy_buffer(self.staging);
        device.destroy_buffer(self.readback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HeadlessDevice;

    #[test]
    fn test_clamp_cursor() {
        let mut device = HeadlessDevice::new();
        let target = PickTarget::new(&mut device, 800, 600).expect("pick target");
        assert_eq!(target.clamp_cursor(-5, -1), (0, 0));
        assert_eq!(target.clamp_cursor(812, 600), (799, 599));
        assert_eq!(target.clamp_cursor(400, 300), (400, 300));
    }

    #[test]
    fn test_destroy_releases_resources() {
        let mut device = HeadlessDevice::new();
        let target = PickTarget::new(&mut device, 16, 16).expect("pick target");
        assert_eq!(device.texture_count(), 2);
        assert_eq!(device.buffer_count(), 2);
        target.destroy(&mut device);
        assert_eq!(device.texture_count(), 0);
        assert_eq!(device.buffer_count(), 0);
    }
}
