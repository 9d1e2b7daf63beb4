//! ECS Components module
//!
//! The two components the world itself understands: hierarchical
//! transforms and the local bounds fed to the spatial index. Everything
//! else (meshes, materials, lights) is supplied by collaborators.

pub mod transform;
pub mod bounds;

pub use transform::TransformComponent;
pub use bounds::BoundsComponent;
