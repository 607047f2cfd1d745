//! Built-in behaviours

pub mod rotate;
pub mod scripted;

pub use rotate::RotateBehaviour;
pub use scripted::ScriptedBehaviour;
