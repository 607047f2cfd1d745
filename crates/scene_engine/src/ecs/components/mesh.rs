//! Mesh component

use std::sync::Arc;

use crate::ecs::{Component, ComponentKind, EntityId};
use crate::render::MeshResource;

/// Shared, read-only reference to a loaded mesh
///
/// Many entities may point at the same [`MeshResource`]; the resource outlives
/// any of them.
#[derive(Debug, Clone)]
pub struct MeshComponent {
    owner: EntityId,
    mesh: Arc<MeshResource>,
}

impl MeshComponent {
    pub(crate) fn new(owner: EntityId, mesh: Arc<MeshResource>) -> Self {
        Self { owner, mesh }
    }

    /// The referenced mesh
    pub fn mesh(&self) -> &Arc<MeshResource> {
        &self.mesh
    }
}

impl Component for MeshComponent {
    fn owner(&self) -> EntityId {
        self.owner
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Mesh
    }
}
