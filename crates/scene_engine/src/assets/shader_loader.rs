//! SPIR-V shader loading

use std::path::Path;

use super::{AssetError, ShaderLoader};
use crate::render::api::{GraphicsDevice, ShaderHandle};

const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Reads `.spv` files produced by the build script
#[derive(Debug, Clone, Copy, Default)]
pub struct SpirvShaderLoader;

impl SpirvShaderLoader {
    /// Check the SPIR-V header of already loaded bytes
    pub fn validate(path: &Path, code: &[u8]) -> Result<(), AssetError> {
        let parse_error = |message: String| AssetError::Parse { path: path.display().to_string(), message };
        if code.len() < 4 || code.len() % 4 != 0 {
            return Err(parse_error(format!("SPIR-V size {} is not a non-zero multiple of 4", code.len())));
        }
        let magic = u32::from_le_bytes([code[0], code[1], code[2], code[3]]);
        if magic != SPIRV_MAGIC {
            return Err(parse_error(format!("bad SPIR-V magic {:#010x}", magic)));
        }
        Ok(())
    }
}

impl ShaderLoader for SpirvShaderLoader {
    fn load_shader(&self, device: &mut dyn GraphicsDevice, path: &Path) -> Result<ShaderHandle, AssetError> {
        let code = std::fs::read(path)?;
        Self::validate(path, &code)?;
        let label = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        log::debug!("Loaded shader {:?} ({} bytes)", path, code.len());
        Ok(device.create_shader_module(&label, &code)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_header() {
        let path = Path::new("bad.spv");
        assert!(SpirvShaderLoader::validate(path, &[1, 2, 3]).is_err());
        assert!(SpirvShaderLoader::validate(path, &[0, 0, 0, 0]).is_err());
        assert!(SpirvShaderLoader::validate(path, &SPIRV_MAGIC.to_le_bytes()).is_ok());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let mut device = crate::render::HeadlessDevice::new();
        let result = SpirvShaderLoader.load_shader(&mut device, Path::new("does/not/exist.spv"));
        assert!(matches!(result, Err(AssetError::Io(_))));
    }
}
