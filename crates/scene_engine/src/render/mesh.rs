//! Mesh data and GPU mesh resources

use crate::render::api::{
    BufferDesc, BufferHandle, BufferUsages, GraphicsDevice, IndexFormat, VertexAttribute, VertexFormat, VertexLayout,
};
use crate::render::RenderResult;

/// Interleaved vertex shared by every mesh in the viewer
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vertex {
    /// Object-space position
    pub position: [f32; 3],
    /// Object-space normal
    pub normal: [f32; 3],
    /// Texture coordinate
    pub tex_coord: [f32; 2],
}

unsafe impl bytemuck::Pod for Vertex {}
unsafe impl bytemuck::Zeroable for Vertex {}

impl Vertex {
    /// Build a vertex
    pub const fn new(position: [f32; 3], normal: [f32; 3], tex_coord: [f32; 2]) -> Self {
        Self { position, normal, tex_coord }
    }

    /// Layout matching the shader inputs (location 0, 1, 2)
    pub fn layout() -> VertexLayout {
        VertexLayout {
            stride: std::mem::size_of::<Vertex>() as u32,
            attributes: vec![
                VertexAttribute { location: 0, offset: 0, format: VertexFormat::Float32x3 },
                VertexAttribute { location: 1, offset: 12, format: VertexFormat::Float32x3 },
                VertexAttribute { location: 2, offset: 24, format: VertexFormat::Float32x2 },
            ],
        }
    }
}

/// CPU-side mesh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    /// Vertices
    pub vertices: Vec<Vertex>,
    /// Triangle list indices
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Unit cube centred on the origin with per-face normals
    pub fn cube() -> Self {
        let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ];

        let mut mesh = MeshData::default();
        for (normal, right, up) in faces {
            let base = mesh.vertices.len() as u32;
            for (u, v) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
                let (sx, sy) = (u - 0.5, v - 0.5);
                let position = [
                    normal[0] * 0.5 + right[0] * sx + up[0] * sy,
                    normal[1] * 0.5 + right[1] * sx + up[1] * sy,
                    normal[2] * 0.5 + right[2] * sx + up[2] * sy,
                ];
                mesh.vertices.push(Vertex::new(position, normal, [u, 1.0 - v]));
            }
            mesh.indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        mesh
    }

    /// Unit quad in the XY plane facing +Z, used for billboards
    pub fn quad() -> Self {
        let normal = [0.0, 0.0, 1.0];
        MeshData {
            vertices: vec![
                Vertex::new([-0.5, -0.5, 0.0], normal, [0.0, 1.0]),
                Vertex::new([0.5, -0.5, 0.0], normal, [1.0, 1.0]),
                Vertex::new([0.5, 0.5, 0.0], normal, [1.0, 0.0]),
                Vertex::new([-0.5, 0.5, 0.0], normal, [0.0, 0.0]),
            ],
            indices: vec![0, 1, 2, 0, 2, 3],
        }
    }

    /// Smallest index format that can address every vertex
    pub fn index_format(&self) -> IndexFormat {
        if self.vertices.len() <= usize::from(u16::MAX) {
            IndexFormat::Uint16
        } else {
            IndexFormat::Uint32
        }
    }

    /// Create vertex and index buffers on `device`
    pub fn upload(&self, device: &mut dyn GraphicsDevice, label: &str) -> RenderResult<MeshResource> {
        let vertex_bytes: &[u8] = bytemuck::cast_slice(&self.vertices);
        let vertex_buffer = device.create_buffer(&BufferDesc::new(
            format!("{} vertices", label),
            vertex_bytes.len() as u64,
            BufferUsages::VERTEX | BufferUsages::COPY_DST,
        ))?;
        device.write_buffer(vertex_buffer, 0, vertex_bytes)?;

        let index_format = self.index_format();
        let index_bytes: Vec<u8> = match index_format {
            IndexFormat::Uint16 => {
                let narrow: Vec<u16> = self.indices.iter().map(|&i| i as u16).collect();
                bytemuck::cast_slice(&narrow).to_vec()
            }
            IndexFormat::Uint32 => bytemuck::cast_slice(&self.indices).to_vec(),
        };
        // Vulkan requires copy sizes in multiples of 4
        let padded_len = (index_bytes.len() as u64).div_ceil(4) * 4;
        let index_buffer = device.create_buffer(&BufferDesc::new(
            format!("{} indices", label),
            padded_len.max(4),
            BufferUsages::INDEX | BufferUsages::COPY_DST,
        ))?;
        device.write_buffer(index_buffer, 0, &index_bytes)?;

        log::debug!(
            "Uploaded mesh '{}': {} vertices, {} indices ({:?})",
            label,
            self.vertices.len(),
            self.indices.len(),
            index_format
        );

        Ok(MeshResource {
            label: label.to_string(),
            vertex_buffer,
            index_buffer,
            vertex_layout: Vertex::layout(),
            index_format,
            vertex_count: self.vertices.len() as u32,
            index_count: self.indices.len() as u32,
        })
    }
}

/// Immutable GPU mesh owned by whoever loaded it
#[derive(Debug, Clone, PartialEq)]
pub struct MeshResource {
    /// Debug label
    pub label: String,
    /// Interleaved vertices
    pub vertex_buffer: BufferHandle,
    /// Triangle list indices
    pub index_buffer: BufferHandle,
    /// Layout of `vertex_buffer`
    pub vertex_layout: VertexLayout,
    /// Element type of `index_buffer`
    pub index_format: IndexFormat,
    /// Number of vertices
    pub vertex_count: u32,
    /// Number of indices
    pub index_count: u32,
}

impl MeshResource {
    /// Release the buffers
    pub fn destroy(&self, device: &mut dyn GraphicsDevice) {
        device.destroy_buffer(self.vertex_buffer);
        device.destroy_buffer(self.index_buffer);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::render::HeadlessDevice;

    /// Mesh with fake handles for tests that never touch a device
    pub(crate) fn test_mesh() -> MeshResource {
        MeshResource {
            label: "test".to_string(),
            vertex_buffer: BufferHandle(u64::MAX - 1),
            index_buffer: BufferHandle(u64::MAX),
            vertex_layout: Vertex::layout(),
            index_format: IndexFormat::Uint16,
            vertex_count: 3,
            index_count: 3,
        }
    }

    #[test]
    fn test_vertex_stride_is_32_bytes() {
        assert_eq!(Vertex::layout().stride, 32);
    }

    #[test]
    fn test_cube_shape() {
        let cube = MeshData::cube();
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.indices.len(), 36);
        assert!(cube.vertices.iter().all(|v| v.position.iter().all(|c| c.abs() <= 0.5 + 1e-6)));
        assert_eq!(cube.index_format(), IndexFormat::Uint16);
    }

    #[test]
    fn test_upload_narrows_indices() {
        let mut device = HeadlessDevice::new();
        let mesh = MeshData::quad().upload(&mut device, "quad").expect("upload");
        assert_eq!(mesh.index_count, 6);
        assert_eq!(mesh.index_format, IndexFormat::Uint16);
        let bytes = device.buffer_contents(mesh.index_buffer).expect("index buffer");
        assert_eq!(&bytes[..4], &[0, 0, 1, 0]);
        assert_eq!(bytes.len(), 12);
    }
}
