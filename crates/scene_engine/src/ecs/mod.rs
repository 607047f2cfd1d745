//! Entity/component scene graph
//!
//! Game objects own a fixed set of typed component slots (transform, mesh and
//! one slot per behaviour kind) and form a parent/child hierarchy. The
//! [`World`] is the registry of all live objects; there is no global state,
//! hosts create one world and pass it where it is needed.

pub mod entity;
pub mod component;
pub mod components;
pub mod behaviours;
pub mod world;
pub mod systems;

pub use entity::{EntityId, EntityIdAllocator};
pub use component::{Component, ComponentKind};
pub use world::{GameObject, World};

/// Scene graph errors
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// No entity with this id is registered
    #[error("Unknown entity {0}")]
    UnknownEntity(EntityId),

    /// An entity was made its own parent
    #[error("Entity {0} cannot be its own parent")]
    SelfParent(EntityId),

    /// The new parent is a descendant of the child
    #[error("Parenting {child} to {parent} would create a cycle")]
    ParentCycle {
        /// Entity being re-parented
        child: EntityId,
        /// Requested parent
        parent: EntityId,
    },

    /// Every entity id has been handed out
    #[error("No entity ids left")]
    IdsExhausted,

    /// Rename with an empty or blank name
    #[error("Entity {0} cannot have an empty name")]
    EmptyName(EntityId),
}
