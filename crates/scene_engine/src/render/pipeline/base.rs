//! Named GPU resources owned by a pipeline
//!
//! Pipelines register their uniform buffers and bind groups under string
//! names and look them up when recording. Asking for a name that was never
//! registered is a programming error and fails with
//! [`RenderError::ResourceLookupFailed`].

use std::collections::HashMap;

use crate::render::api::{BindGroupEntry, BindGroupHandle, BufferDesc, BufferHandle, BufferUsages, GraphicsDevice, PipelineHandle};
use crate::render::{RenderError, RenderResult};

/// Required alignment of dynamic uniform offsets
pub const DYNAMIC_OFFSET_ALIGNMENT: u64 = 256;

/// Round a payload size up to the dynamic offset alignment
pub fn aligned_stride(payload_size: u64) -> u64 {
    payload_size.div_ceil(DYNAMIC_OFFSET_ALIGNMENT) * DYNAMIC_OFFSET_ALIGNMENT
}

#[derive(Debug, Clone, Copy)]
struct UniformBuffer {
    handle: BufferHandle,
    size: u64,
}

/// Pipeline handle plus its named uniform buffers and bind groups
#[derive(Debug)]
pub struct PipelineResources {
    label: String,
    pipeline: Option<PipelineHandle>,
    uniform_buffers: HashMap<String, UniformBuffer>,
    bind_groups: HashMap<String, BindGroupHandle>,
}

impl PipelineResources {
    /// Empty resource set
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            pipeline: None,
            uniform_buffers: HashMap::new(),
            bind_groups: HashMap::new(),
        }
    }

    /// Pipeline label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Record the created pipeline
    pub fn set_pipeline(&mut self, pipeline: PipelineHandle) {
        self.pipeline = Some(pipeline);
    }

    /// The pipeline handle
    pub fn pipeline(&self) -> RenderResult<PipelineHandle> {
        self.pipeline.ok_or(RenderError::NotInitialized("pipeline"))
    }

    /// Create a uniform buffer of at least `size` bytes, rounded up to the
    /// dynamic offset alignment, and register it under `name`
    pub fn create_uniform_buffer(&mut self, device: &mut dyn GraphicsDevice, name: &str, size: u64) -> RenderResult<BufferHandle> {
        let size = aligned_stride(size);
        let handle = device.create_buffer(&BufferDesc::new(
            format!("{} {}", self.label, name),
            size,
            BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        ))?;
        if let Some(old) = self.uniform_buffers.insert(name.to_string(), UniformBuffer { handle, size }) {
            device.destroy_buffer(old.handle);
        }
        log::debug!("Pipeline '{}' created uniform buffer '{}' ({} bytes)", self.label, name, size);
        Ok(handle)
    }

    /// Registered uniform buffer
    pub fn uniform_buffer(&self, name: &str) -> RenderResult<BufferHandle> {
        self.lookup_buffer(name).map(|b| b.handle)
    }

    /// Size of a registered uniform buffer
    pub fn uniform_buffer_size(&self, name: &str) -> RenderResult<u64> {
        self.lookup_buffer(name).map(|b| b.size)
    }

    /// Write into a registered uniform buffer
    pub fn write_uniform_buffer(&self, device: &mut dyn GraphicsDevice, name: &str, offset: u64, data: &[u8]) -> RenderResult<()> {
        let buffer = self.lookup_buffer(name)?;
        device.write_buffer(buffer.handle, offset, data)
    }

    /// Create a bind group for `group_index` and register it under `name`
    pub fn create_bind_group(
        &mut self,
        device: &mut dyn GraphicsDevice,
        name: &str,
        group_index: u32,
        entries: &[BindGroupEntry],
    ) -> RenderResult<BindGroupHandle> {
        let group = device.create_bind_group(self.pipeline()?, group_index, entries)?;
        self.bind_groups.insert(name.to_string(), group);
        Ok(group)
    }

    /// Registered bind group
    pub fn bind_group(&self, name: &str) -> RenderResult<BindGroupHandle> {
        self.bind_groups.get(name).copied().ok_or_else(|| RenderError::ResourceLookupFailed {
            kind: "bind group",
            name: name.to_string(),
        })
    }

    /// Release every uniform buffer
    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        for (_, buffer) in self.uniform_buffers.drain() {
            device.destroy_buffer(buffer.handle);
        }
        self.bind_groups.clear();
    }

    fn lookup_buffer(&self, name: &str) -> RenderResult<UniformBuffer> {
        self.uniform_buffers.get(name).copied().ok_or_else(|| RenderError::ResourceLookupFailed {
            kind: "uniform buffer",
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HeadlessDevice;

    #[test]
    fn test_stride_rounds_up_to_256() {
        assert_eq!(aligned_stride(64), 256);
        assert_eq!(aligned_stride(80), 256);
        assert_eq!(aligned_stride(256), 256);
        assert_eq!(aligned_stride(260), 512);
    }

    #[test]
    fn test_uniform_buffer_size_is_aligned() {
        let mut device = HeadlessDevice::new();
        let mut resources = PipelineResources::new("test");
        resources.create_uniform_buffer(&mut device, "frame", 144).expect("buffer");
        assert_eq!(resources.uniform_buffer_size("frame"), Ok(256));
    }

    #[test]
    fn test_unknown_names_fail_loudly() {
        let mut device = HeadlessDevice::new();
        let resources = PipelineResources::new("test");
        assert_eq!(
            resources.uniform_buffer("missing"),
            Err(RenderError::ResourceLookupFailed { kind: "uniform buffer", name: "missing".to_string() })
        );
        assert!(matches!(
            resources.bind_group("missing"),
            Err(RenderError::ResourceLookupFailed { kind: "bind group", .. })
        ));
        assert!(resources.write_uniform_buffer(&mut device, "missing", 0, &[0; 4]).is_err());
        assert_eq!(resources.pipeline(), Err(RenderError::NotInitialized("pipeline")));
    }
}
