//! Spatial partitioning data structures
//!
//! An octree over opaque item keys, used for frustum culling and
//! proximity queries.

mod octree;

pub use octree::{Octree, OctreeConfig, OctreeError, OctreeNode};
