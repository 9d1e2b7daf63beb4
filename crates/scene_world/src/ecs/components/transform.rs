//! Transform component for the ECS system
//!
//! Local TRS relative to the parent entity plus a cached local-to-world
//! matrix. The transform store is kept in parent-before-child order so a
//! single left-to-right pass can rebuild every stale world matrix.

use crate::ecs::{Component, ComponentStore, Entity};
use crate::foundation::math::{Mat4, Point3, Quat, Transform, Vec3};

/// ECS Transform component
///
/// `position`, `rotation` and `scale` are expressed in the parent's space.
/// Writing them directly requires a [`mark_dirty`](Self::mark_dirty) call;
/// the setters do that for you.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformComponent {
    /// Position relative to the parent
    pub position: Vec3,

    /// Rotation relative to the parent
    pub rotation: Quat,

    /// Scale relative to the parent
    pub scale: Vec3,

    world: Mat4,
    dirty: bool,
    updated: bool,
    moved: bool,
}

impl Component for TransformComponent {
    const HIERARCHICAL: bool = true;
}

impl Default for TransformComponent {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
            world: Mat4::identity(),
            dirty: true,
            updated: false,
            moved: false,
        }
    }
}

impl TransformComponent {
    /// Create identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create from position only
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create from a local TRS transform
    pub fn from_transform(transform: &Transform) -> Self {
        Self {
            position: transform.position,
            rotation: transform.rotation,
            scale: transform.scale,
            ..Default::default()
        }
    }

    /// Builder pattern: Set rotation
    #[must_use]
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Builder pattern: Set scale (non-uniform)
    #[must_use]
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Builder pattern: Set scale (uniform)
    #[must_use]
    pub fn with_uniform_scale(self, scale: f32) -> Self {
        self.with_scale(Vec3::repeat(scale))
    }

    /// Move relative to the parent and flag for recomputation
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.dirty = true;
    }

    /// Rotate relative to the parent and flag for recomputation
    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
        self.dirty = true;
    }

    /// Rescale relative to the parent and flag for recomputation
    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
        self.dirty = true;
    }

    /// Replace the local TRS with the decomposition of `local`
    pub fn set_local_matrix(&mut self, local: &Mat4) {
        let decomposed = Transform::from_matrix(local);
        self.position = decomposed.position;
        self.rotation = decomposed.rotation;
        self.scale = decomposed.scale;
        self.dirty = true;
    }

    /// Local TRS as a plain transform
    pub fn local(&self) -> Transform {
        Transform {
            position: self.position,
            rotation: self.rotation,
            scale: self.scale,
        }
    }

    /// Local-to-parent matrix
    pub fn local_matrix(&self) -> Mat4 {
        self.local().to_matrix()
    }

    /// Cached local-to-world matrix as of the last update
    pub fn world_matrix(&self) -> &Mat4 {
        &self.world
    }

    /// World-space origin of this transform as of the last update
    pub fn world_position(&self) -> Vec3 {
        self.world.transform_point(&Point3::origin()).coords
    }

    /// Request recomputation on the next update
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Whether the cached world matrix is stale
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether the last update recomputed this transform
    pub fn was_updated(&self) -> bool {
        self.updated
    }

    /// Whether the world matrix changed since [`clear_moved`](Self::clear_moved).
    ///
    /// Unlike [`was_updated`](Self::was_updated) this survives further
    /// updates, so a consumer that runs less often still sees the change.
    pub fn has_moved(&self) -> bool {
        self.moved
    }

    /// Acknowledge the last world matrix change
    pub fn clear_moved(&mut self) {
        self.moved = false;
    }
}

impl ComponentStore<TransformComponent> {
    /// Restore parent-before-child order. Returns whether anything moved.
    pub fn sort(&mut self, parent_of: impl Fn(Entity) -> Option<Entity>) -> bool {
        self.sort_topological(parent_of)
    }

    /// Rebuild stale world matrices, returning how many were recomputed.
    ///
    /// First every descendant of a dirty transform is flagged dirty, then
    /// dirty entries compose their local matrix with the parent's freshly
    /// rebuilt world matrix. Both passes rely on [`sort`](Self::sort) order.
    pub fn update(&mut self, parent_of: impl Fn(Entity) -> Option<Entity>) -> usize {
        let count = self.len();

        for transform in self.as_mut_slice() {
            transform.updated = false;
        }

        // Propagate
        for index in 0..count {
            let Some(parent) = self.parent_slot(index, &parent_of) else {
                continue;
            };
            debug_assert!(parent < index, "transform store not in topological order");
            if self.as_slice()[parent].dirty {
                self.as_mut_slice()[index].dirty = true;
            }
        }

        // Recompute
        let mut recomputed = 0;
        for index in 0..count {
            if !self.as_slice()[index].dirty {
                continue;
            }
            let parent_world = self
                .parent_slot(index, &parent_of)
                .map_or_else(Mat4::identity, |parent| self.as_slice()[parent].world);

            let transform = &mut self.as_mut_slice()[index];
            transform.world = parent_world * transform.local_matrix();
            transform.dirty = false;
            transform.updated = true;
            transform.moved = true;
            recomputed += 1;
        }

        recomputed
    }

    fn parent_slot(
        &self,
        index: usize,
        parent_of: &impl Fn(Entity) -> Option<Entity>,
    ) -> Option<usize> {
        parent_of(self.entities()[index]).and_then(|parent| self.index_of(parent))
    }
}
