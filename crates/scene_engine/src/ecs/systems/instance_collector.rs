//! # Frame Instance Collector
//!
//! Walks the world once per frame and turns every drawable entity into a
//! positional instance. Slot numbers are assigned in spawn order over the
//! entities that qualify, so the mesh pipeline, the picker and the object-id
//! payload all agree on which slot belongs to which entity for this frame.
//! World matrices are computed here, once, and reused by every pass.

use std::sync::Arc;

use crate::ecs::{EntityId, World};
use crate::foundation::math::{Mat4, Vec3};
use crate::render::MeshResource;

/// One mesh draw for this frame
#[derive(Debug, Clone)]
pub struct RenderInstance {
    /// Owning entity
    pub entity: EntityId,
    /// Position in this frame's instance list
    pub slot: u32,
    /// Composed world matrix
    pub world_matrix: Mat4,
    /// Geometry to draw
    pub mesh: Arc<MeshResource>,
}

impl RenderInstance {
    /// Value the pick pass writes for this instance
    pub fn object_id(&self) -> u32 {
        self.entity.get()
    }
}

/// One icon billboard for this frame
#[derive(Debug, Clone, Copy)]
pub struct IconInstance {
    /// Owning entity
    pub entity: EntityId,
    /// Position in this frame's icon list
    pub slot: u32,
    /// World-space origin of the entity
    pub position: Vec3,
}

/// Everything the passes draw this frame
#[derive(Debug, Clone, Default)]
pub struct FrameInstances {
    /// Entities with both a transform and a mesh
    pub meshes: Vec<RenderInstance>,
    /// Entities with a transform
    pub icons: Vec<IconInstance>,
}

/// Collect this frame's instances
///
/// Entities without a transform are skipped entirely; entities with a
/// transform but no mesh only get an icon.
pub fn collect_frame_instances(world: &World) -> FrameInstances {
    let mut frame = FrameInstances::default();

    for object in world.iter() {
        let Some(world_matrix) = world.world_transform(object.id()) else {
            log::trace!("Entity {} has no transform, skipped", object.id());
            continue;
        };

        frame.icons.push(IconInstance {
            entity: object.id(),
            slot: frame.icons.len() as u32,
            position: world_matrix.fixed_view::<3, 1>(0, 3).into_owned(),
        });

        if let Some(mesh) = object.mesh() {
            frame.meshes.push(RenderInstance {
                entity: object.id(),
                slot: frame.meshes.len() as u32,
                world_matrix,
                mesh: Arc::clone(mesh.mesh()),
            });
        }
    }

    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::mesh::tests::test_mesh;
    use approx::assert_relative_eq;

    #[test]
    fn test_slots_are_positional_and_skip_incomplete_entities() {
        let mesh = Arc::new(test_mesh());
        let mut world = World::new();
        let a = world.spawn_with_transform("a").expect("spawn");
        let _bare = world.spawn("bare").expect("spawn");
        let icon_only = world.spawn_with_transform("icon only").expect("spawn");
        let b = world.spawn_with_transform("b").expect("spawn");
        for id in [a, b] {
            world.get_mut(id).expect("entity").attach_mesh(Arc::clone(&mesh));
        }
        if let Some(t) = world.get_mut(b).and_then(|o| o.transform_mut()) {
            t.set_position(Vec3::new(4.0, 5.0, 6.0));
        }

        let frame = collect_frame_instances(&world);
        let meshes: Vec<(EntityId, u32)> = frame.meshes.iter().map(|i| (i.entity, i.slot)).collect();
        assert_eq!(meshes, vec![(a, 0), (b, 1)]);
        assert_eq!(frame.meshes[1].object_id(), b.get());

        let icons: Vec<(EntityId, u32)> = frame.icons.iter().map(|i| (i.entity, i.slot)).collect();
        assert_eq!(icons, vec![(a, 0), (icon_only, 1), (b, 2)]);
        assert_relative_eq!(frame.icons[2].position, Vec3::new(4.0, 5.0, 6.0));
    }
}
