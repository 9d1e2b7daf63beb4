//! Entity-Component-System implementation
//!
//! Entities are plain ids. Components live in one dense store per type,
//! owned by the [`World`] together with names and the parent/child
//! hierarchy.

pub mod world;
pub mod entity;
pub mod component;
pub mod storage;
pub mod registry;
pub mod components;

#[cfg(test)]
mod tests;

pub use world::{AssetManager, EntityManager, World};
pub use entity::Entity;
pub use component::{Component, ComponentMask, MAX_COMPONENT_TYPES};
pub use storage::ComponentStore;
pub use registry::ComponentRegistry;
