//! GPU uniform layouts
//!
//! Layouts match the `std140` blocks in `resources/shaders/`. Matrices are
//! column-major.

use crate::foundation::math::{utils, Mat4, Vec3};

/// Per-instance model matrix
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelUniform {
    /// Object-to-world matrix
    pub model: [[f32; 4]; 4],
}

unsafe impl bytemuck::Pod for ModelUniform {}
unsafe impl bytemuck::Zeroable for ModelUniform {}

impl ModelUniform {
    /// Payload for one instance
    pub fn new(model: &Mat4) -> Self {
        Self { model: utils::mat4_to_cols(model) }
    }
}

/// Per-instance picker payload: model matrix plus the object id in `x`
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickUniform {
    /// Object-to-world matrix
    pub model: [[f32; 4]; 4],
    /// Object id in `x`; `y..w` unused
    pub object_id: [u32; 4],
}

unsafe impl bytemuck::Pod for PickUniform {}
unsafe impl bytemuck::Zeroable for PickUniform {}

impl PickUniform {
    /// Byte offset of the id inside the payload
    pub const OBJECT_ID_OFFSET: u32 = 64;

    /// Payload for one instance
    pub fn new(model: &Mat4, object_id: u32) -> Self {
        Self { model: utils::mat4_to_cols(model), object_id: [object_id, 0, 0, 0] }
    }
}

/// Shared per-frame camera matrices
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameUniform {
    /// World-to-view
    pub view: [[f32; 4]; 4],
    /// View-to-clip
    pub projection: [[f32; 4]; 4],
}

unsafe impl bytemuck::Pod for FrameUniform {}
unsafe impl bytemuck::Zeroable for FrameUniform {}

impl FrameUniform {
    /// Frame data from camera matrices
    pub fn new(view: &Mat4, projection: &Mat4) -> Self {
        Self { view: utils::mat4_to_cols(view), projection: utils::mat4_to_cols(projection) }
    }
}

/// Per-frame data of the icon pipeline
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IconFrameUniform {
    /// World-to-view
    pub view: [[f32; 4]; 4],
    /// View-to-clip
    pub projection: [[f32; 4]; 4],
    /// Camera position in `xyz`, vertical field of view (radians) in `w`
    pub camera_position_fov: [f32; 4],
}

unsafe impl bytemuck::Pod for IconFrameUniform {}
unsafe impl bytemuck::Zeroable for IconFrameUniform {}

impl IconFrameUniform {
    /// Frame data from camera state
    pub fn new(view: &Mat4, projection: &Mat4, camera_position: &Vec3, fov: f32) -> Self {
        Self {
            view: utils::mat4_to_cols(view),
            projection: utils::mat4_to_cols(projection),
            camera_position_fov: [camera_position.x, camera_position.y, camera_position.z, fov],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn test_layout_sizes() {
        assert_eq!(size_of::<ModelUniform>(), 64);
        assert_eq!(size_of::<PickUniform>(), 80);
        assert_eq!(size_of::<FrameUniform>(), 128);
        assert_eq!(size_of::<IconFrameUniform>(), 144);
    }

    #[test]
    fn test_object_id_offset() {
        let payload = PickUniform::new(&Mat4::identity(), 42);
        let bytes = bytemuck::bytes_of(&payload);
        let at = PickUniform::OBJECT_ID_OFFSET as usize;
        assert_eq!(&bytes[at..at + 4], &42u32.to_le_bytes());
    }
}
