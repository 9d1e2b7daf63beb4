//! Local-space bounding volume of an entity's geometry

use crate::ecs::Component;
use crate::foundation::math::{Mat4, Vec3};
use crate::scene::AABB;

/// Bounding box in the owning entity's local space
///
/// Combined with the entity's world matrix this yields the box the scene
/// manager feeds to the octree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundsComponent {
    local: AABB,
    dirty: bool,
}

impl Component for BoundsComponent {}

impl Default for BoundsComponent {
    fn default() -> Self {
        Self::new(AABB::from_center_extents(Vec3::zeros(), Vec3::repeat(0.5)))
    }
}

impl BoundsComponent {
    /// Bounds covering `local`
    pub fn new(local: AABB) -> Self {
        Self { local, dirty: true }
    }

    /// Local-space box
    pub fn local(&self) -> &AABB {
        &self.local
    }

    /// Replace the local box; the spatial index picks it up next update
    pub fn set_local(&mut self, local: AABB) {
        self.local = local;
        self.dirty = true;
    }

    /// World-space box under `world`
    pub fn world(&self, world: &Mat4) -> AABB {
        self.local.transformed(world)
    }

    /// Whether the box changed since the spatial index last saw it
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Acknowledge that the spatial index is current
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}
