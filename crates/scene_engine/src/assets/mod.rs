//! Asset loading collaborators
//!
//! Meshes, shaders and textures are loaded through small traits so hosts can
//! swap in their own sources. The default implementations read OBJ meshes,
//! compiled SPIR-V and PNG/JPEG images from disk and create the matching GPU
//! resources on whichever [`GraphicsDevice`] they are handed.

pub mod obj_loader;
pub mod image_loader;
pub mod shader_loader;

pub use image_loader::{ImageData, ImageTextureLoader};
pub use obj_loader::ObjMeshLoader;
pub use shader_loader::SpirvShaderLoader;

use std::path::Path;

use thiserror::Error;

use crate::render::api::{GraphicsDevice, ShaderHandle, TextureHandle};
use crate::render::{MeshResource, RenderError};

/// Asset loading errors
#[derive(Error, Debug)]
pub enum AssetError {
    /// IO error during asset loading
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed asset contents
    #[error("Parse error in {path}: {message}")]
    Parse {
        /// Offending file
        path: String,
        /// What was wrong
        message: String,
    },

    /// Image decoding failed
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Creating the GPU resource failed
    #[error("Render error: {0}")]
    Render(#[from] RenderError),
}

/// Loads a mesh file into GPU buffers
pub trait MeshLoader {
    /// Load `path` onto `device`
    fn load_mesh(&self, device: &mut dyn GraphicsDevice, path: &Path) -> Result<MeshResource, AssetError>;
}

/// Loads a compiled shader module
pub trait ShaderLoader {
    /// Load `path` onto `device`
    fn load_shader(&self, device: &mut dyn GraphicsDevice, path: &Path) -> Result<ShaderHandle, AssetError>;
}

/// Loads an image into a sampled texture
pub trait TextureLoader {
    /// Load `path` onto `device`
    fn load_texture(&self, device: &mut dyn GraphicsDevice, path: &Path) -> Result<TextureHandle, AssetError>;
}
