//! Image loading for texture data
//!
//! PNG and JPEG files are decoded with the `image` crate and converted to
//! RGBA8 before upload.

use std::path::Path;

use super::{AssetError, TextureLoader};
use crate::render::api::{GraphicsDevice, TextureDesc, TextureFormat, TextureHandle, TextureUsages};

/// Decoded RGBA8 pixels
#[derive(Debug, Clone)]
pub struct ImageData {
    /// Tightly packed RGBA rows
    pub data: Vec<u8>,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl ImageData {
    /// Decode an image file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let rgba = image::open(path)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        log::info!("Loaded image {}x{} from {:?}", width, height, path);
        Ok(Self { data: rgba.into_raw(), width, height })
    }

    /// Decode an in-memory image
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AssetError> {
        let rgba = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Self { data: rgba.into_raw(), width, height })
    }

    /// Single-color image, handy as a fallback icon
    pub fn solid_color(width: u32, height: u32, color: [u8; 4]) -> Self {
        let data = color.repeat(width as usize * height as usize);
        Self { data, width, height }
    }

    /// Create a sampled texture holding these pixels
    pub fn upload(&self, device: &mut dyn GraphicsDevice, label: &str) -> Result<TextureHandle, AssetError> {
        let texture = device.create_texture(&TextureDesc {
            label: label.to_string(),
            width: self.width,
            height: self.height,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsages::SAMPLED | TextureUsages::COPY_DST,
        })?;
        if let Err(e) = device.write_texture(texture, &self.data) {
            device.destroy_texture(texture);
            return Err(e.into());
        }
        Ok(texture)
    }
}

/// Loads PNG/JPEG files into sampled textures
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageTextureLoader;

impl TextureLoader for ImageTextureLoader {
    fn load_texture(&self, device: &mut dyn GraphicsDevice, path: &Path) -> Result<TextureHandle, AssetError> {
        let image = ImageData::from_file(path)?;
        image.upload(device, &path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HeadlessDevice;

    #[test]
    fn test_solid_color_upload() {
        let mut device = HeadlessDevice::new();
        let image = ImageData::solid_color(2, 2, [255, 0, 0, 255]);
        assert_eq!(image.data.len(), 16);
        let texture = image.upload(&mut device, "red").expect("upload");
        assert_eq!(device.texture_contents(texture).map(|t| &t[0..4]), Some(&[255, 0, 0, 255][..]));
    }

    #[test]
    fn test_png_from_memory() {
        let mut png = Vec::new();
        let pixels = image::RgbaImage::from_pixel(3, 1, image::Rgba([1, 2, 3, 4]));
        pixels
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .expect("encode");
        let decoded = ImageData::from_bytes(&png).expect("decode");
        assert_eq!((decoded.width, decoded.height), (3, 1));
        assert_eq!(&decoded.data[8..12], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_garbage_is_image_error() {
        assert!(matches!(ImageData::from_bytes(b"not an image"), Err(AssetError::Image(_))));
    }
}
