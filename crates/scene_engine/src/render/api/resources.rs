//! Opaque handles and resource descriptors

use bitflags::bitflags;

use crate::render::{RenderError, RenderResult};

/// Handle to a device buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u64);

/// Handle to a device texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u64);

/// Handle to a sampler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerHandle(pub u64);

/// Handle to a compiled shader module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderHandle(pub u64);

/// Handle to a graphics pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineHandle(pub u64);

/// Handle to a bind group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindGroupHandle(pub u64);

bitflags! {
    /// How a buffer will be used
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsages: u32 {
        /// Vertex input
        const VERTEX = 1 << 0;
        /// Index input
        const INDEX = 1 << 1;
        /// Uniform binding
        const UNIFORM = 1 << 2;
        /// Source of a copy
        const COPY_SRC = 1 << 3;
        /// Destination of a copy
        const COPY_DST = 1 << 4;
        /// Host-mappable for readback
        const MAP_READ = 1 << 5;
    }
}

bitflags! {
    /// How a texture will be used
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsages: u32 {
        /// Color or depth attachment
        const RENDER_ATTACHMENT = 1 << 0;
        /// Sampled in a shader
        const SAMPLED = 1 << 1;
        /// Source of a copy
        const COPY_SRC = 1 << 2;
        /// Destination of a copy
        const COPY_DST = 1 << 3;
    }
}

bitflags! {
    /// Shader stages a binding is visible to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStages: u32 {
        /// Vertex stage
        const VERTEX = 1 << 0;
        /// Fragment stage
        const FRAGMENT = 1 << 1;
    }
}

/// Texel formats used by the viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit RGBA, linear
    Rgba8Unorm,
    /// 8-bit BGRA, linear
    Bgra8Unorm,
    /// 32-bit float depth
    Depth32Float,
}

impl TextureFormat {
    /// Size of one texel
    pub fn bytes_per_pixel(&self) -> u32 {
        4
    }

    /// Whether this is a depth format
    pub fn is_depth(&self) -> bool {
        matches!(self, TextureFormat::Depth32Float)
    }
}

/// Index element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    /// 16-bit indices
    Uint16,
    /// 32-bit indices
    Uint32,
}

impl IndexFormat {
    /// Size of one index
    pub fn size(&self) -> u64 {
        match self {
            IndexFormat::Uint16 => 2,
            IndexFormat::Uint32 => 4,
        }
    }
}

/// Vertex attribute element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    /// Two floats
    Float32x2,
    /// Three floats
    Float32x3,
    /// Four floats
    Float32x4,
}

/// One vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// Shader input location
    pub location: u32,
    /// Byte offset inside a vertex
    pub offset: u32,
    /// Element type
    pub format: VertexFormat,
}

/// Layout of a single interleaved vertex buffer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexLayout {
    /// Bytes between consecutive vertices
    pub stride: u32,
    /// Attributes in location order
    pub attributes: Vec<VertexAttribute>,
}

/// Buffer creation parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferDesc {
    /// Debug label
    pub label: String,
    /// Size in bytes
    pub size: u64,
    /// Intended usage
    pub usage: BufferUsages,
}

impl BufferDesc {
    /// Describe a buffer
    pub fn new(label: impl Into<String>, size: u64, usage: BufferUsages) -> Self {
        Self { label: label.into(), size, usage }
    }
}

/// Texture creation parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureDesc {
    /// Debug label
    pub label: String,
    /// Width in texels
    pub width: u32,
    /// Height in texels
    pub height: u32,
    /// Texel format
    pub format: TextureFormat,
    /// Intended usage
    pub usage: TextureUsages,
}

impl TextureDesc {
    /// Largest width or height any device accepts
    pub const MAX_DIMENSION: u32 = 16384;

    /// Bytes of tightly packed texel data
    ///
    /// Rejects zero extents, extents past [`MAX_DIMENSION`](Self::MAX_DIMENSION)
    /// and sizes that do not fit in memory.
    pub fn byte_size(&self) -> RenderResult<usize> {
        let invalid = |reason: &str| {
            RenderError::ResourceCreationFailed(format!(
                "texture '{}' {}x{} {}",
                self.label, self.width, self.height, reason
            ))
        };
        if self.width == 0 || self.height == 0 {
            return Err(invalid("has a zero extent"));
        }
        if self.width > Self::MAX_DIMENSION || self.height > Self::MAX_DIMENSION {
            return Err(invalid("exceeds the maximum dimension"));
        }
        u64::from(self.width)
            .checked_mul(u64::from(self.height))
            .and_then(|texels| texels.checked_mul(u64::from(self.format.bytes_per_pixel())))
            .and_then(|bytes| usize::try_from(bytes).ok())
            .ok_or_else(|| invalid("is too large"))
    }
}

/// Texture filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    /// Nearest texel
    Nearest,
    /// Bilinear
    Linear,
}

/// Texture coordinate wrapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    /// Wrap around
    Repeat,
    /// Clamp to the edge texel
    ClampToEdge,
}

/// Sampler creation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerDesc {
    /// Magnification and minification filter
    pub filter: FilterMode,
    /// Wrapping on both axes
    pub address_mode: AddressMode,
}

/// Resource type of one binding in a group layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingType {
    /// Uniform buffer, optionally addressed with a dynamic offset
    UniformBuffer {
        /// Whether a dynamic offset is supplied at bind time
        dynamic: bool,
    },
    /// Combined texture and sampler
    TextureSampler,
}

/// One binding in a bind group layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindGroupLayoutEntry {
    /// Binding number in the shader
    pub binding: u32,
    /// Stages that read it
    pub visibility: ShaderStages,
    /// Resource type
    pub ty: BindingType,
}

/// Resource bound to one binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingResource {
    /// A window `offset..offset + size` of a buffer
    Buffer {
        /// Buffer to bind
        buffer: BufferHandle,
        /// Base offset
        offset: u64,
        /// Size visible to the shader
        size: u64,
    },
    /// Texture sampled through a sampler
    TextureSampler {
        /// Texture to sample
        texture: TextureHandle,
        /// Sampler to use
        sampler: SamplerHandle,
    },
}

/// One entry of a bind group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindGroupEntry {
    /// Binding number
    pub binding: u32,
    /// Bound resource
    pub resource: BindingResource,
}

/// Face culling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    /// Draw both faces
    None,
    /// Drop back faces
    Back,
}

/// Color blending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// Overwrite the target
    Replace,
    /// Source-over alpha blending
    AlphaBlend,
}

/// Payload a pipeline writes into its color target
///
/// Devices that cannot execute shaders (the headless device) use this to
/// emulate the fragment output of pipelines whose result the core reads back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FragmentOutput {
    /// Shaded color
    Shaded,
    /// The 4 bytes at `offset` within the bound uniform window of group 0
    ObjectId {
        /// Byte offset of the id inside the instance payload
        offset: u32,
    },
}

/// Graphics pipeline creation parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineDesc {
    /// Debug label
    pub label: String,
    /// Vertex stage
    pub vertex_shader: ShaderHandle,
    /// Fragment stage
    pub fragment_shader: ShaderHandle,
    /// Single vertex buffer layout
    pub vertex_layout: VertexLayout,
    /// Bind group layouts, indexed by group number
    pub bind_group_layouts: Vec<Vec<BindGroupLayoutEntry>>,
    /// Color attachment format
    pub color_format: TextureFormat,
    /// Depth attachment format; depth test is `Less` with writes enabled
    pub depth_format: Option<TextureFormat>,
    /// Face culling
    pub cull_mode: CullMode,
    /// Color blending
    pub blend: BlendMode,
    /// What the fragment stage produces
    pub fragment_output: FragmentOutput,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(width: u32, height: u32) -> TextureDesc {
        TextureDesc {
            label: "target".to_string(),
            width,
            height,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsages::RENDER_ATTACHMENT,
        }
    }

    #[test]
    fn test_byte_size_is_computed_without_overflow() {
        assert_eq!(desc(64, 48).byte_size(), Ok(64 * 48 * 4));
        assert_eq!(desc(16384, 16384).byte_size(), Ok(16384 * 16384 * 4));
    }

    #[test]
    fn test_byte_size_rejects_zero_and_oversized_extents() {
        assert!(matches!(desc(0, 10).byte_size(), Err(RenderError::ResourceCreationFailed(_))));
        assert!(matches!(desc(40000, 40000).byte_size(), Err(RenderError::ResourceCreationFailed(_))));
    }
}
