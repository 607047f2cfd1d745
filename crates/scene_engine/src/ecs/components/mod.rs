//! Components that can be attached to a game object

pub mod transform;
pub mod mesh;
pub mod behaviour;

pub use transform::Transform;
pub use mesh::MeshComponent;
pub use behaviour::{Behaviour, BehaviourContext, BehaviourKind, BehaviourSlot};
