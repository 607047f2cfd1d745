//! Component kinds and the shared component capability

use super::components::BehaviourKind;
use super::EntityId;

/// Closed set of component kinds an entity can carry
///
/// An entity holds at most one component of each kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// Local transform
    Transform,
    /// Shared mesh reference
    Mesh,
    /// One behaviour kind
    Behaviour(BehaviourKind),
}

/// Capability shared by all components
///
/// A component is created for exactly one owner and never moves to another.
pub trait Component {
    /// Entity that owns this component
    fn owner(&self) -> EntityId;

    /// Kind slot this component occupies
    fn kind(&self) -> ComponentKind;
}
