//! Transform component
//!
//! Local position, rotation and non-uniform scale of one entity. The local
//! matrix is cached and rebuilt eagerly on every mutation; world matrices are
//! composed on demand by [`World::world_transform`](crate::ecs::World::world_transform).

use crate::ecs::{Component, ComponentKind, EntityId};
use crate::foundation::math::{Mat4, Quat, Unit, Vec3};

/// Local transform of an entity
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    owner: EntityId,
    position: Vec3,
    scale: Vec3,
    rotation: Quat,
    local: Mat4,
}

impl Component for Transform {
    fn owner(&self) -> EntityId {
        self.owner
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Transform
    }
}

impl Transform {
    /// Identity transform owned by `owner`
    pub(crate) fn new(owner: EntityId) -> Self {
        Self {
            owner,
            position: Vec3::zeros(),
            scale: Vec3::new(1.0, 1.0, 1.0),
            rotation: Quat::identity(),
            local: Mat4::identity(),
        }
    }

    /// Set the local position
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.recompute();
    }

    /// Set the local non-uniform scale
    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
        self.recompute();
    }

    /// Set the rotation to `angle` radians about `axis`
    ///
    /// The axis is normalized first. A zero-length axis produces an undefined
    /// (NaN) rotation.
    pub fn set_rotation_from_angle_axis(&mut self, angle: f32, axis: Vec3) {
        self.rotation = Quat::from_axis_angle(&Unit::new_normalize(axis), angle);
        self.recompute();
    }

    /// Set the rotation directly
    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
        self.recompute();
    }

    /// Local position
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Local scale
    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    /// Local rotation
    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    /// Rotation as a unit axis and an angle in radians
    ///
    /// The identity rotation reads back as +X with angle 0.
    pub fn axis_angle(&self) -> (Vec3, f32) {
        self.rotation
            .axis_angle()
            .map_or((Vec3::x(), 0.0), |(axis, angle)| (axis.into_inner(), angle))
    }

    /// Cached `translate * rotate * scale` matrix
    pub fn local_matrix(&self) -> &Mat4 {
        &self.local
    }

    fn recompute(&mut self) {
        self.local = Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{utils, Point3};
    use approx::assert_relative_eq;

    fn transform() -> Transform {
        Transform::new(EntityId::new(1))
    }

    #[test]
    fn test_default_is_identity() {
        let t = transform();
        assert_eq!(*t.local_matrix(), Mat4::identity());
        assert_eq!(t.scale(), Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(t.owner().get(), 1);
    }

    #[test]
    fn test_set_position_is_bit_identical_when_repeated() {
        let mut t = transform();
        t.set_rotation_from_angle_axis(0.7, Vec3::new(1.0, 2.0, 3.0));
        t.set_position(Vec3::new(1.5, -2.25, 3.0));
        let first = *t.local_matrix();
        t.set_position(Vec3::new(1.5, -2.25, 3.0));
        let second = *t.local_matrix();
        let first_bits: Vec<u32> = first.iter().map(|v| v.to_bits()).collect();
        let second_bits: Vec<u32> = second.iter().map(|v| v.to_bits()).collect();
        assert_eq!(first_bits, second_bits);
    }

    #[test]
    fn test_matrix_applies_scale_then_rotation_then_translation() {
        let mut t = transform();
        t.set_scale(Vec3::new(2.0, 1.0, 1.0));
        t.set_rotation_from_angle_axis(utils::deg_to_rad(90.0), Vec3::z());
        t.set_position(Vec3::new(10.0, 0.0, 0.0));

        // (1,0,0) -> scale (2,0,0) -> rotate (0,2,0) -> translate (10,2,0)
        let p = t.local_matrix().transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p.coords, Vec3::new(10.0, 2.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn test_angle_axis_round_trip() {
        let mut t = transform();
        let axis = Vec3::new(0.0, 3.0, 4.0);
        t.set_rotation_from_angle_axis(1.2, axis);

        let (read_axis, read_angle) = t.axis_angle();
        let mut other = transform();
        other.set_rotation_from_angle_axis(read_angle, read_axis);

        let point = Vec3::new(0.3, -1.0, 2.0);
        assert_relative_eq!(t.rotation() * point, other.rotation() * point, epsilon = 1e-5);
        assert_relative_eq!(t.rotation().norm(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_identity_axis_angle() {
        let (axis, angle) = transform().axis_angle();
        assert_eq!(axis, Vec3::x());
        assert_eq!(angle, 0.0);
    }
}
