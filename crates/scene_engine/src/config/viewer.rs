//! # Viewer Configuration
//!
//! Everything the frame orchestrator needs at startup: viewport size,
//! instance capacities, camera, clear color, shader locations and the icon
//! overlay settings.

use super::{Config, ConfigError};
use crate::foundation::math::Vec3;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Viewport resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Resolution {
    /// 800 x 600
    R800x600,
    /// 1024 x 768
    #[default]
    R1024x768,
    /// Any other size
    Custom {
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
    },
}

impl Resolution {
    /// Presets offered to hosts
    pub const PRESETS: [Resolution; 2] = [Resolution::R800x600, Resolution::R1024x768];

    /// Width and height in pixels
    pub fn dimensions(&self) -> (u32, u32) {
        match *self {
            Resolution::R800x600 => (800, 600),
            Resolution::R1024x768 => (1024, 768),
            Resolution::Custom { width, height } => (width, height),
        }
    }

    /// Width divided by height
    pub fn aspect_ratio(&self) -> f32 {
        let (width, height) = self.dimensions();
        width as f32 / height.max(1) as f32
    }
}

/// # Shader Configuration
///
/// Paths to the compiled SPIR-V stages of one pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderConfig {
    /// Path to the vertex shader SPIR-V file
    pub vertex_shader_path: String,
    /// Path to the fragment shader SPIR-V file
    pub fragment_shader_path: String,
}

impl ShaderConfig {
    /// Create a new shader configuration
    pub fn new(vertex_path: impl Into<String>, fragment_path: impl Into<String>) -> Self {
        Self {
            vertex_shader_path: vertex_path.into(),
            fragment_shader_path: fragment_path.into(),
        }
    }

    /// Create shader config with automatic path resolution
    ///
    /// Tries the usual output directories so hosts can run from the workspace
    /// root or from a crate directory. Falls back to `target/shaders/`.
    pub fn with_path_resolution(base_vertex: &str, base_fragment: &str) -> Self {
        const SHADER_DIRS: [&str; 4] = ["target/shaders/", "../target/shaders/", "../../target/shaders/", "shaders/"];

        let resolve = |file: &str| {
            SHADER_DIRS
                .iter()
                .map(|dir| format!("{}{}", dir, file))
                .find(|candidate| Path::new(candidate).exists())
                .unwrap_or_else(|| format!("{}{}", SHADER_DIRS[0], file))
        };

        Self::new(resolve(base_vertex), resolve(base_fragment))
    }
}

/// Shader locations for every pipeline the viewer builds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderPaths {
    /// Lit mesh pipeline
    pub standard: ShaderConfig,
    /// Object id pipeline
    pub picker: ShaderConfig,
    /// Billboard icon pipeline
    pub icon: ShaderConfig,
}

impl Default for ShaderPaths {
    fn default() -> Self {
        Self {
            standard: ShaderConfig::with_path_resolution("standard.vert.spv", "standard.frag.spv"),
            picker: ShaderConfig::with_path_resolution("picker.vert.spv", "picker.frag.spv"),
            icon: ShaderConfig::with_path_resolution("icon.vert.spv", "icon.frag.spv"),
        }
    }
}

/// Main camera placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Eye position
    pub position: [f32; 3],
    /// Look-at point
    pub target: [f32; 3],
    /// Vertical field of view in degrees
    pub fov_degrees: f32,
    /// Near clip plane distance
    pub near: f32,
    /// Far clip plane distance
    pub far: f32,
}

impl CameraConfig {
    /// Eye position as a vector
    pub fn position(&self) -> Vec3 {
        Vec3::from(self.position)
    }

    /// Look-at point as a vector
    pub fn target(&self) -> Vec3 {
        Vec3::from(self.target)
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 20.0],
            target: [0.0, 0.0, 0.0],
            fov_degrees: 60.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

/// Entity icon overlay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IconConfig {
    /// Draw icons on startup
    pub enabled: bool,
    /// Icon image, loaded through the texture loader
    pub texture_path: String,
    /// Billboard edge length in world units
    pub size: f32,
}

impl Default for IconConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            texture_path: "resources/textures/entity_icon.png".to_string(),
            size: 0.5,
        }
    }
}

/// Top-level viewer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Viewport size
    pub resolution: Resolution,
    /// Instance slots in the mesh and picker pipelines
    pub max_instances: u32,
    /// Instance slots in the icon pipeline
    pub max_icons: u32,
    /// Color pass clear value
    pub clear_color: [f32; 4],
    /// Main camera
    pub camera: CameraConfig,
    /// SPIR-V locations
    pub shaders: ShaderPaths,
    /// Icon overlay
    pub icons: IconConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            max_instances: 1000,
            max_icons: 1000,
            clear_color: [0.1, 0.1, 0.12, 1.0],
            camera: CameraConfig::default(),
            shaders: ShaderPaths::default(),
            icons: IconConfig::default(),
        }
    }
}

impl Config for ViewerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let (width, height) = self.resolution.dimensions();
        if width == 0 || height == 0 {
            return Err(ConfigError::Invalid(format!("resolution {}x{} has a zero dimension", width, height)));
        }
        if self.max_instances == 0 {
            return Err(ConfigError::Invalid("max_instances must be at least 1".to_string()));
        }
        if self.max_icons == 0 {
            return Err(ConfigError::Invalid("max_icons must be at least 1".to_string()));
        }
        if self.camera.near <= 0.0 || self.camera.near >= self.camera.far {
            return Err(ConfigError::Invalid(format!(
                "camera clip planes near={} far={} are not ordered",
                self.camera.near, self.camera.far
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_resolution_is_1024x768() {
        let config = ViewerConfig::default();
        assert_eq!(config.resolution.dimensions(), (1024, 768));
        assert_eq!(config.max_instances, 1000);
        assert!(config.icons.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ViewerConfig::default();
        config.resolution = Resolution::Custom { width: 0, height: 10 };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = ViewerConfig::default();
        config.max_instances = 0;
        assert!(config.validate().is_err());

        let mut config = ViewerConfig::default();
        config.camera.near = 10.0;
        config.camera.far = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip_through_file() {
        let dir = std::env::temp_dir().join(format!("scene_engine_cfg_{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join("viewer.toml");

        let mut config = ViewerConfig::default();
        config.resolution = Resolution::R800x600;
        config.max_instances = 64;
        config.save_to_file(&path).expect("save");

        let loaded = ViewerConfig::load_from_file(&path).expect("load");
        assert_eq!(loaded.resolution, Resolution::R800x600);
        assert_eq!(loaded.max_instances, 64);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config: ViewerConfig = ron::from_str("(max_instances: 10)").expect("parse");
        assert_eq!(config.max_instances, 10);
        assert_eq!(config.resolution, Resolution::R1024x768);
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let result = ViewerConfig::load_from_file("viewer.json");
        assert!(result.is_err());
    }

    #[test]
    fn test_shipped_viewer_config_parses() {
        let text = include_str!("../../../../resources/config/viewer.toml");
        let config: ViewerConfig = toml::from_str(text).expect("parse");
        assert_eq!(config, ViewerConfig {
            shaders: config.shaders.clone(),
            ..ViewerConfig::default()
        });
        assert_eq!(config.shaders.picker.fragment_shader_path, "target/shaders/picker.frag.spv");
        assert!(config.validate().is_ok());
    }
}
