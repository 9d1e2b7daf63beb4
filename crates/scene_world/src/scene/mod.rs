//! Scene management
//!
//! Bounding volumes and frusta shared by the spatial index, plus the
//! [`SceneManager`] that keeps the index in step with the entity world.

mod scene_manager;
mod scene_graph;

pub use scene_manager::{FrameReport, SceneManager, SceneStats};
pub use scene_graph::{Containment, Frustum, Plane, AABB};
