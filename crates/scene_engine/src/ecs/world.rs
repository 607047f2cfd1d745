//! Game objects and the world registry

use std::collections::HashMap;
use std::sync::Arc;

use super::components::{Behaviour, BehaviourKind, BehaviourSlot, MeshComponent, Transform};
use super::{ComponentKind, EntityId, EntityIdAllocator, SceneError};
use crate::foundation::math::Mat4;
use crate::render::MeshResource;

/// A node in the scene graph
///
/// Owns its components; the parent link is a plain id (the child does not own
/// its parent) and the children list is kept in attachment order.
#[derive(Debug)]
pub struct GameObject {
    id: EntityId,
    name: String,
    transform: Option<Transform>,
    mesh: Option<MeshComponent>,
    behaviours: Vec<BehaviourSlot>,
    parent: Option<EntityId>,
    children: Vec<EntityId>,
}

impl GameObject {
    fn new(id: EntityId, name: String) -> Self {
        Self {
            id,
            name,
            transform: None,
            mesh: None,
            behaviours: Vec::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    /// Permanent id
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent, if any
    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    /// Children in attachment order
    pub fn children(&self) -> &[EntityId] {
        &self.children
    }

    /// Attach an identity transform, replacing any existing one
    pub fn add_transform(&mut self) -> &mut Transform {
        self.transform.insert(Transform::new(self.id))
    }

    /// Transform component
    pub fn transform(&self) -> Option<&Transform> {
        self.transform.as_ref()
    }

    /// Mutable transform component
    pub fn transform_mut(&mut self) -> Option<&mut Transform> {
        self.transform.as_mut()
    }

    /// Attach a mesh reference, replacing any existing one
    pub fn attach_mesh(&mut self, mesh: Arc<MeshResource>) -> &mut MeshComponent {
        self.mesh.insert(MeshComponent::new(self.id, mesh))
    }

    /// Mesh component
    pub fn mesh(&self) -> Option<&MeshComponent> {
        self.mesh.as_ref()
    }

    /// Attach a behaviour
    ///
    /// A behaviour of the same kind is replaced in place; the newcomer starts
    /// unstarted and the old one is dropped without any callback.
    pub fn attach_behaviour(&mut self, behaviour: impl Behaviour + 'static) {
        let kind = behaviour.kind();
        let slot = BehaviourSlot::new(self.id, Box::new(behaviour));
        match self.behaviours.iter().position(|s| s.behaviour_kind() == kind) {
            Some(index) => self.behaviours[index] = slot,
            None => self.behaviours.push(slot),
        }
    }

    /// Behaviour slot of the given kind
    pub fn behaviour(&self, kind: BehaviourKind) -> Option<&BehaviourSlot> {
        self.behaviours.iter().find(|s| s.behaviour_kind() == kind)
    }

    /// Whether a component of this kind is attached
    pub fn has_component(&self, kind: ComponentKind) -> bool {
        match kind {
            ComponentKind::Transform => self.transform.is_some(),
            ComponentKind::Mesh => self.mesh.is_some(),
            ComponentKind::Behaviour(kind) => self.behaviour(kind).is_some(),
        }
    }

    /// Kinds of all attached components
    pub fn component_kinds(&self) -> Vec<ComponentKind> {
        let mut kinds = Vec::with_capacity(2 + self.behaviours.len());
        if self.transform.is_some() {
            kinds.push(ComponentKind::Transform);
        }
        if self.mesh.is_some() {
            kinds.push(ComponentKind::Mesh);
        }
        kinds.extend(self.behaviours.iter().map(|s| ComponentKind::Behaviour(s.behaviour_kind())));
        kinds
    }

    /// Split borrow of one behaviour slot and the transform it drives
    pub(crate) fn behaviour_parts(&mut self, kind: BehaviourKind) -> Option<(&mut BehaviourSlot, Option<&mut Transform>)> {
        let transform = self.transform.as_mut();
        let slot = self.behaviours.iter_mut().find(|s| s.behaviour_kind() == kind)?;
        Some((slot, transform))
    }
}

/// Registry of every live game object
///
/// Iteration order is spawn order.
#[derive(Debug, Default)]
pub struct World {
    ids: EntityIdAllocator,
    order: Vec<EntityId>,
    objects: HashMap<EntityId, GameObject>,
}

impl World {
    /// Empty world
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an entity with no components
    ///
    /// Fails once the world has handed out every id; ids are never reused.
    pub fn spawn(&mut self, name: impl Into<String>) -> Result<EntityId, SceneError> {
        let id = self.ids.allocate().ok_or(SceneError::IdsExhausted)?;
        let name = name.into();
        log::debug!("Spawned entity {} '{}'", id, name);
        self.order.push(id);
        self.objects.insert(id, GameObject::new(id, name));
        Ok(id)
    }

    /// Create an entity with an identity transform
    pub fn spawn_with_transform(&mut self, name: impl Into<String>) -> Result<EntityId, SceneError> {
        let id = self.spawn(name)?;
        if let Some(object) = self.objects.get_mut(&id) {
            object.add_transform();
        }
        Ok(id)
    }

    /// Look up an entity
    pub fn get(&self, id: EntityId) -> Option<&GameObject> {
        self.objects.get(&id)
    }

    /// Look up an entity mutably
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut GameObject> {
        self.objects.get_mut(&id)
    }

    /// Whether `id` is registered
    pub fn contains(&self, id: EntityId) -> bool {
        self.objects.contains_key(&id)
    }

    /// Number of entities
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the world has no entities
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Ids in spawn order
    pub fn ids(&self) -> &[EntityId] {
        &self.order
    }

    /// Entities in spawn order
    pub fn iter(&self) -> impl Iterator<Item = &GameObject> + '_ {
        self.order.iter().filter_map(|id| self.objects.get(id))
    }

    /// Map a decoded pick value back to a live entity
    pub fn find_by_object_id(&self, object_id: u32) -> Option<EntityId> {
        EntityId::from_object_id(object_id).filter(|id| self.contains(*id))
    }

    /// Change an entity's display name
    ///
    /// Blank names are rejected and the previous name is kept.
    pub fn rename(&mut self, id: EntityId, name: impl Into<String>) -> Result<(), SceneError> {
        let name = name.into();
        let object = self.objects.get_mut(&id).ok_or(SceneError::UnknownEntity(id))?;
        if name.trim().is_empty() {
            return Err(SceneError::EmptyName(id));
        }
        object.name = name;
        Ok(())
    }

    /// Make `parent` the parent of `child`
    ///
    /// The child is detached from its previous parent first. Self-parenting
    /// and parenting to a descendant are rejected, so the hierarchy is always
    /// a forest.
    pub fn set_parent(&mut self, child: EntityId, parent: EntityId) -> Result<(), SceneError> {
        if !self.contains(child) {
            return Err(SceneError::UnknownEntity(child));
        }
        if !self.contains(parent) {
            return Err(SceneError::UnknownEntity(parent));
        }
        if child == parent {
            return Err(SceneError::SelfParent(child));
        }
        if self.is_ancestor(child, parent) {
            return Err(SceneError::ParentCycle { child, parent });
        }

        self.clear_parent(child)?;
        if let Some(object) = self.objects.get_mut(&child) {
            object.parent = Some(parent);
        }
        if let Some(object) = self.objects.get_mut(&parent) {
            object.children.push(child);
        }
        log::trace!("Entity {} parented to {}", child, parent);
        Ok(())
    }

    /// Detach `child` from its parent, making it a root
    pub fn clear_parent(&mut self, child: EntityId) -> Result<(), SceneError> {
        let object = self.objects.get_mut(&child).ok_or(SceneError::UnknownEntity(child))?;
        if let Some(old_parent) = object.parent.take() {
            if let Some(parent) = self.objects.get_mut(&old_parent) {
                parent.children.retain(|c| *c != child);
            }
        }
        Ok(())
    }

    /// Whether `ancestor` appears on the parent chain of `entity`
    pub fn is_ancestor(&self, ancestor: EntityId, entity: EntityId) -> bool {
        let mut current = self.get(entity).and_then(GameObject::parent);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.get(id).and_then(GameObject::parent);
        }
        false
    }

    /// World matrix of an entity: its local matrix composed with its parent's
    /// world matrix, recursively
    ///
    /// Returns `None` for unknown entities and entities without a transform.
    /// Ancestors without a transform contribute identity.
    pub fn world_transform(&self, id: EntityId) -> Option<Mat4> {
        let object = self.get(id)?;
        let local = *object.transform()?.local_matrix();
        Some(self.parent_world(object) * local)
    }

    fn parent_world(&self, object: &GameObject) -> Mat4 {
        match object.parent.and_then(|parent| self.get(parent)) {
            Some(parent) => {
                let local = parent.transform().map_or_else(Mat4::identity, |t| *t.local_matrix());
                self.parent_world(parent) * local
            }
            None => Mat4::identity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::behaviours::RotateBehaviour;
    use crate::foundation::math::{utils, Vec3};
    use approx::assert_relative_eq;

    #[test]
    fn test_spawn_fails_instead_of_reusing_ids() {
        let mut world = World { ids: EntityIdAllocator::starting_at(u32::MAX), ..World::default() };
        let last = world.spawn("last").expect("spawn");
        assert_eq!(last.get(), u32::MAX);
        assert_eq!(world.spawn("overflow"), Err(SceneError::IdsExhausted));
        assert_eq!(world.len(), 1);
        assert_eq!(world.ids(), &[last]);
    }

    #[test]
    fn test_spawn_order_and_ids() {
        let mut world = World::new();
        let a = world.spawn("a").expect("spawn");
        let b = world.spawn("b").expect("spawn");
        assert_eq!(a.get(), 1);
        assert_eq!(b.get(), 2);
        let names: Vec<&str> = world.iter().map(GameObject::name).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn test_root_world_equals_local() {
        let mut world = World::new();
        let id = world.spawn_with_transform("root").expect("spawn");
        let t = world.get_mut(id).and_then(GameObject::transform_mut).expect("transform");
        t.set_position(Vec3::new(1.0, 2.0, 3.0));
        t.set_rotation_from_angle_axis(0.4, Vec3::y());
        let local = *t.local_matrix();
        assert_eq!(world.world_transform(id), Some(local));
    }

    #[test]
    fn test_child_world_is_parent_world_times_local() {
        let mut world = World::new();
        let grandparent = world.spawn_with_transform("gp").expect("spawn");
        let parent = world.spawn_with_transform("p").expect("spawn");
        let child = world.spawn_with_transform("c").expect("spawn");
        world.set_parent(parent, grandparent).expect("parent");
        world.set_parent(child, parent).expect("parent");

        if let Some(t) = world.get_mut(grandparent).and_then(GameObject::transform_mut) {
            t.set_position(Vec3::new(0.0, 5.0, 0.0));
            t.set_rotation_from_angle_axis(utils::deg_to_rad(30.0), Vec3::z());
        }
        if let Some(t) = world.get_mut(parent).and_then(GameObject::transform_mut) {
            t.set_scale(Vec3::new(2.0, 2.0, 2.0));
            t.set_position(Vec3::new(1.0, 0.0, 0.0));
        }
        if let Some(t) = world.get_mut(child).and_then(GameObject::transform_mut) {
            t.set_position(Vec3::new(0.0, 0.0, 3.0));
        }

        let parent_world = world.world_transform(parent).expect("parent world");
        let child_local = *world.get(child).and_then(GameObject::transform).expect("t").local_matrix();
        let child_world = world.world_transform(child).expect("child world");
        assert_relative_eq!(child_world, parent_world * child_local, epsilon = 1e-5);
    }

    #[test]
    fn test_ancestor_without_transform_contributes_identity() {
        let mut world = World::new();
        let group = world.spawn("group").expect("spawn");
        let child = world.spawn_with_transform("child").expect("spawn");
        world.set_parent(child, group).expect("parent");
        let local = *world.get(child).and_then(GameObject::transform).expect("t").local_matrix();
        assert_eq!(world.world_transform(child), Some(local));
        assert_eq!(world.world_transform(group), None);
    }

    #[test]
    fn test_reparent_detaches_from_old_parent() {
        let mut world = World::new();
        let a = world.spawn("a").expect("spawn");
        let b = world.spawn("b").expect("spawn");
        let c = world.spawn("c").expect("spawn");
        world.set_parent(c, a).expect("parent");
        world.set_parent(c, b).expect("parent");
        assert!(world.get(a).expect("a").children().is_empty());
        assert_eq!(world.get(b).expect("b").children(), &[c]);
        assert_eq!(world.get(c).expect("c").parent(), Some(b));
    }

    #[test]
    fn test_cycles_rejected() {
        let mut world = World::new();
        let a = world.spawn("a").expect("spawn");
        let b = world.spawn("b").expect("spawn");
        world.set_parent(b, a).expect("parent");
        assert_eq!(world.set_parent(a, a), Err(SceneError::SelfParent(a)));
        assert_eq!(world.set_parent(a, b), Err(SceneError::ParentCycle { child: a, parent: b }));
        assert_eq!(world.get(a).expect("a").parent(), None);
    }

    #[test]
    fn test_rename_rejects_blank() {
        let mut world = World::new();
        let id = world.spawn("cube").expect("spawn");
        assert_eq!(world.rename(id, "   "), Err(SceneError::EmptyName(id)));
        assert_eq!(world.get(id).expect("entity").name(), "cube");
        world.rename(id, "teapot").expect("rename");
        assert_eq!(world.get(id).expect("entity").name(), "teapot");
    }

    #[test]
    fn test_same_kind_behaviour_overwrites() {
        let mut world = World::new();
        let id = world.spawn_with_transform("spinner").expect("spawn");
        let object = world.get_mut(id).expect("entity");
        object.attach_behaviour(RotateBehaviour::with_axis(Vec3::x()));
        object.attach_behaviour(RotateBehaviour::with_axis(Vec3::y()));
        assert_eq!(
            object.component_kinds(),
            vec![ComponentKind::Transform, ComponentKind::Behaviour(BehaviourKind::Rotate)]
        );
    }

    #[test]
    fn test_find_by_object_id() {
        let mut world = World::new();
        let id = world.spawn("a").expect("spawn");
        assert_eq!(world.find_by_object_id(id.get()), Some(id));
        assert_eq!(world.find_by_object_id(0), None);
        assert_eq!(world.find_by_object_id(999), None);
    }
}
