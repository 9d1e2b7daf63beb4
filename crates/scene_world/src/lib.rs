//! # Scene World
//!
//! An in-memory scene core: an entity/component world with a parent/child
//! hierarchy and an octree spatial index for culling queries.
//!
//! ## Features
//!
//! - **ECS World**: sparse-set component stores, unique entity names,
//!   hierarchical transforms with dirty propagation
//! - **Octree**: subdividing/collapsing spatial index with frustum,
//!   box and radius queries
//! - **Background loading**: worker threads parse payloads, the owning
//!   thread installs them
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scene_world::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut scene = SceneManager::new(&OctreeSettings::default())?;
//!     let unit = AABB::from_center_extents(Vec3::zeros(), Vec3::repeat(0.5));
//!
//!     let ship = scene.spawn("Ship", None, &Transform::from_position(Vec3::new(0.0, 0.0, -10.0)), Some(unit));
//!     scene.spawn("Turret", Some(ship), &Transform::identity(), Some(unit));
//!     scene.update();
//!
//!     let view_projection = Mat4::new_perspective(16.0 / 9.0, 1.0, 0.1, 500.0);
//!     scene.for_each_visible(&Frustum::from_matrix(&view_projection), |entity| {
//!         log::info!("visible: {entity}");
//!     });
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod foundation;
pub mod config;
pub mod ecs;
pub mod scene;
pub mod spatial;
pub mod assets;

/// Common imports for scene users
pub mod prelude {
    pub use crate::{
        assets::{AssetLoader, LoadError, LoadHandle, LoadStatus},
        config::{Config, ConfigError, LoaderConfig, OctreeSettings, SceneConfig},
        ecs::{
            components::{BoundsComponent, TransformComponent},
            AssetManager, Component, ComponentRegistry, ComponentStore, Entity, EntityManager, World,
        },
        foundation::math::{Mat4, Quat, Transform, Vec3},
        scene::{Containment, Frustum, SceneManager, AABB},
        spatial::{Octree, OctreeConfig, OctreeError},
    };
}
