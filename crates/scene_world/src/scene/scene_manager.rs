//! Scene Manager - keeps the spatial index in step with the world
//!
//! The manager owns the entity [`World`], an [`Octree`] of world-space
//! entity bounds and, optionally, an [`AssetLoader`]. Once per frame
//! [`SceneManager::update`] installs finished background loads, rebuilds
//! stale world transforms and re-inserts every entity whose world box may
//! have moved. Culling code then asks the octree what is visible.

use crate::assets::{AssetLoader, DrainReport, LoadError, LoadHandle};
use crate::config::{ConfigError, LoaderConfig, OctreeSettings};
use crate::ecs::components::{BoundsComponent, TransformComponent};
use crate::ecs::{Component, Entity, World};
use crate::foundation::math::Transform;
use crate::scene::{Frustum, AABB};
use crate::spatial::Octree;

/// What one [`SceneManager::update`] did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Background loads finished this frame
    pub loaded: DrainReport,
    /// World transforms recomputed
    pub transforms_updated: usize,
    /// Entities (re)inserted into the octree
    pub reindexed: usize,
    /// Entities whose bounds left the octree root and were dropped
    pub dropped: usize,
    /// Index entries removed because their entity died or lost its bounds
    pub pruned: usize,
}

/// Scene-wide counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SceneStats {
    /// Live entities
    pub entities: usize,
    /// Entities present in the octree
    pub indexed: usize,
    /// Deepest octree node
    pub octree_depth: u32,
    /// Completed updates
    pub frames: u64,
}

/// Scene Manager - coordinates the world, the octree and background loads
pub struct SceneManager {
    world: World,
    octree: Octree<Entity>,
    loader: Option<AssetLoader>,
    frames: u64,
}

impl SceneManager {
    /// Create a scene whose octree follows `settings`
    pub fn new(settings: &OctreeSettings) -> Result<Self, ConfigError> {
        let octree = Octree::try_new(settings.bounds(), settings.to_octree_config()?)?;
        Ok(Self {
            world: World::new(),
            octree,
            loader: None,
            frames: 0,
        })
    }

    /// Start background loading workers for this scene
    pub fn with_loader(mut self, config: &LoaderConfig) -> Result<Self, LoadError> {
        self.loader = Some(AssetLoader::new(config)?);
        Ok(self)
    }

    /// The entity world
    pub fn world(&self) -> &World {
        &self.world
    }

    /// The entity world, mutably
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// The spatial index
    pub fn octree(&self) -> &Octree<Entity> {
        &self.octree
    }

    /// Create an entity with a transform and, if given, local bounds
    pub fn spawn(
        &mut self,
        name: &str,
        parent: Option<Entity>,
        transform: &Transform,
        local_bounds: Option<AABB>,
    ) -> Entity {
        let entity = self.world.create(name);
        self.world.insert_component(entity, TransformComponent::from_transform(transform));
        if let Some(bounds) = local_bounds {
            self.world.insert_component(entity, BoundsComponent::new(bounds));
        }
        if let Some(parent) = parent {
            if !self.world.add_child(parent, entity, false) {
                log::debug!("Spawned {entity} as a root: parent {parent} rejected");
            }
        }
        entity
    }

    /// Replace an entity's local bounds
    pub fn set_bounds(&mut self, entity: Entity, local_bounds: AABB) -> bool {
        match self.world.add_component::<BoundsComponent>(entity) {
            Some(bounds) => {
                bounds.set_local(local_bounds);
                true
            }
            None => false,
        }
    }

    /// Delete an entity and its descendants from the world and the index
    pub fn despawn(&mut self, entity: Entity) -> bool {
        for doomed in self.world.descendants(entity) {
            self.octree.delete(doomed);
        }
        self.world.delete(entity)
    }

    /// Parse a payload in the background and install it on `target`.
    ///
    /// `None` when the scene runs without a loader.
    pub fn load<P, F>(&self, target: Entity, parse: F) -> Option<LoadHandle>
    where
        P: Component + Send,
        F: FnOnce() -> Result<P, LoadError> + Send + 'static,
    {
        self.loader.as_ref().map(|loader| loader.submit(target, parse))
    }

    /// Advance one frame
    pub fn update(&mut self) -> FrameReport {
        let loaded = match self.loader.as_mut() {
            Some(loader) => loader.drain(&mut self.world),
            None => DrainReport::default(),
        };
        let transforms_updated = self.world.update_transforms();
        let pruned = self.prune_index();

        let octree = &mut self.octree;
        let mut reindexed = 0;
        let mut dropped = 0;
        self.world.for_each_with2::<TransformComponent, BoundsComponent>(|entity, transform, bounds| {
            if !transform.has_moved() && !bounds.is_dirty() {
                return;
            }
            if octree.insert(entity, bounds.world(transform.world_matrix())) {
                reindexed += 1;
            } else {
                dropped += 1;
            }
            transform.clear_moved();
            bounds.clear_dirty();
        });

        self.frames += 1;
        let report = FrameReport {
            loaded,
            transforms_updated,
            reindexed,
            dropped,
            pruned,
        };
        log::debug!(
            "Frame {}: {} transforms, {} reindexed, {} dropped, {} pruned, {} loads",
            self.frames,
            transforms_updated,
            reindexed,
            dropped,
            pruned,
            loaded.total()
        );
        report
    }

    /// Drop index entries whose entity is gone or no longer carries both
    /// a transform and bounds. Covers edits made through [`world_mut`](Self::world_mut).
    fn prune_index(&mut self) -> usize {
        let world = &self.world;
        let stale: Vec<Entity> = self
            .octree
            .items()
            .filter(|&entity| {
                !world.has_component::<TransformComponent>(entity)
                    || !world.has_component::<BoundsComponent>(entity)
            })
            .collect();

        for &entity in &stale {
            self.octree.delete(entity);
        }
        if !stale.is_empty() {
            log::trace!("Pruned {} stale octree entries", stale.len());
        }
        stale.len()
    }

    /// Visit every indexed entity whose world box touches `frustum`
    pub fn for_each_visible(&self, frustum: &Frustum, f: impl FnMut(Entity)) {
        self.octree.for_each_in_frustum(frustum, f);
    }

    /// Indexed entities whose world box touches `frustum`
    pub fn visible_entities(&self, frustum: &Frustum) -> Vec<Entity> {
        let mut visible = Vec::new();
        self.for_each_visible(frustum, |entity| visible.push(entity));
        visible
    }

    /// Current counters
    pub fn stats(&self) -> SceneStats {
        SceneStats {
            entities: self.world.count(),
            indexed: self.octree.count(),
            octree_depth: self.octree.depth(),
            frames: self.frames,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4, Point3, Vec3};
    use approx::assert_relative_eq;
    use std::time::{Duration, Instant};

    fn unit_box() -> AABB {
        AABB::from_center_extents(Vec3::zeros(), Vec3::repeat(0.5))
    }

    fn scene() -> SceneManager {
        SceneManager::new(&OctreeSettings {
            extent: 100.0,
            ..Default::default()
        })
        .unwrap()
    }

    fn camera_looking_down_negative_z() -> Frustum {
        let projection = Mat4::new_perspective(1.0, std::f32::consts::FRAC_PI_2, 0.1, 50.0);
        let view = Mat4::look_at_rh(&Point3::origin(), &Point3::new(0.0, 0.0, -1.0), &Vec3::y());
        Frustum::from_matrix(&(projection * view))
    }

    #[test]
    fn test_children_follow_parent_in_the_index() {
        let mut scene = scene();
        let ship = scene.spawn("Ship", None, &Transform::from_position(Vec3::new(10.0, 0.0, 0.0)), None);
        let turret = scene.spawn(
            "Turret",
            Some(ship),
            &Transform::from_position(Vec3::new(0.0, 2.0, 0.0)),
            Some(unit_box()),
        );

        let report = scene.update();
        assert_eq!(report.transforms_updated, 2);
        assert_eq!(report.reindexed, 1);
        assert_relative_eq!(
            scene.octree().bounds_of(turret).unwrap().center(),
            Vec3::new(10.0, 2.0, 0.0),
            epsilon = 1e-5
        );

        // Idle frame touches nothing
        assert_eq!(scene.update().reindexed, 0);

        scene
            .world_mut()
            .get_component_mut::<TransformComponent>(ship)
            .unwrap()
            .set_position(Vec3::new(-10.0, 0.0, 0.0));
        assert_eq!(scene.update().reindexed, 1);
        assert_relative_eq!(
            scene.octree().bounds_of(turret).unwrap().center(),
            Vec3::new(-10.0, 2.0, 0.0),
            epsilon = 1e-5
        );
    }

    #[test]
    fn test_despawn_clears_subtree_from_index() {
        let mut scene = scene();
        let root = scene.spawn("Root", None, &Transform::identity(), Some(unit_box()));
        let child = scene.spawn("Child", Some(root), &Transform::identity(), Some(unit_box()));
        let other = scene.spawn("Other", None, &Transform::identity(), Some(unit_box()));
        scene.update();
        assert_eq!(scene.stats().indexed, 3);

        assert!(scene.despawn(root));
        assert!(!scene.octree().contains(child));
        assert!(scene.octree().contains(other));
        assert_eq!(scene.stats().entities, 1);
        assert_eq!(scene.stats().indexed, 1);
    }

    #[test]
    fn test_out_of_world_entity_is_dropped_once() {
        let mut scene = scene();
        let far = scene.spawn("Far", None, &Transform::from_position(Vec3::new(500.0, 0.0, 0.0)), Some(unit_box()));

        assert_eq!(scene.update().dropped, 1);
        assert!(!scene.octree().contains(far));
        assert_eq!(scene.update().dropped, 0);
    }

    #[test]
    fn test_visibility_query() {
        let mut scene = scene();
        let ahead = scene.spawn("Ahead", None, &Transform::from_position(Vec3::new(0.0, 0.0, -10.0)), Some(unit_box()));
        scene.spawn("Behind", None, &Transform::from_position(Vec3::new(0.0, 0.0, 10.0)), Some(unit_box()));
        scene.spawn("TooFar", None, &Transform::from_position(Vec3::new(0.0, 0.0, -80.0)), Some(unit_box()));
        scene.update();

        assert_eq!(scene.visible_entities(&camera_looking_down_negative_z()), vec![ahead]);
    }

    #[test]
    fn test_background_bounds_load() {
        let mut scene = scene()
            .with_loader(&LoaderConfig {
                worker_threads: 1,
                queue_capacity: 4,
            })
            .unwrap();
        let rock = scene.spawn("Rock", None, &Transform::from_position(Vec3::new(0.0, 0.0, -5.0)), None);
        scene.update();
        assert!(!scene.octree().contains(rock));

        let handle = scene.load(rock, || Ok(BoundsComponent::new(unit_box()))).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while scene.update().loaded.applied == 0 {
            assert!(Instant::now() < deadline, "load never applied");
            std::thread::sleep(Duration::from_millis(1));
        }

        assert!(scene.octree().contains(rock));
        assert!(handle.poll().is_some());
    }

    #[test]
    fn test_world_edits_are_pruned_from_index() {
        let mut scene = scene();
        let stripped = scene.spawn("Stripped", None, &Transform::from_position(Vec3::new(0.0, 0.0, -10.0)), Some(unit_box()));
        let deleted = scene.spawn("Deleted", None, &Transform::from_position(Vec3::new(2.0, 0.0, -10.0)), Some(unit_box()));
        let kept = scene.spawn("Kept", None, &Transform::from_position(Vec3::new(-2.0, 0.0, -10.0)), Some(unit_box()));
        scene.update();
        assert_eq!(scene.stats().indexed, 3);

        assert!(scene.world_mut().remove_component::<BoundsComponent>(stripped).is_some());
        assert!(scene.world_mut().delete(deleted));

        let report = scene.update();
        assert_eq!(report.pruned, 2);
        assert!(!scene.octree().contains(stripped));
        assert!(!scene.octree().contains(deleted));
        assert_eq!(scene.stats().indexed, 1);
        assert_eq!(scene.visible_entities(&camera_looking_down_negative_z()), vec![kept]);

        // Nothing left to prune
        assert_eq!(scene.update().pruned, 0);
    }

    #[test]
    fn test_external_transform_update_still_reindexes() {
        let mut scene = scene();
        let ship = scene.spawn("Ship", None, &Transform::from_position(Vec3::new(0.0, 0.0, -10.0)), Some(unit_box()));
        scene.update();
        assert_eq!(scene.visible_entities(&camera_looking_down_negative_z()), vec![ship]);

        // Move behind the camera and rebuild transforms outside the scene loop
        let world = scene.world_mut();
        world
            .get_component_mut::<TransformComponent>(ship)
            .unwrap()
            .set_position(Vec3::new(0.0, 0.0, 10.0));
        assert_eq!(world.update_transforms(), 1);

        let report = scene.update();
        assert_eq!(report.transforms_updated, 0);
        assert_eq!(report.reindexed, 1);
        assert_relative_eq!(
            scene.octree().bounds_of(ship).unwrap().center(),
            Vec3::new(0.0, 0.0, 10.0),
            epsilon = 1e-5
        );
        assert!(scene.visible_entities(&camera_looking_down_negative_z()).is_empty());
    }

    #[test]
    fn test_load_without_loader() {
        let scene = scene();
        assert!(scene.load(Entity::new(0), || Ok(BoundsComponent::default())).is_none());
    }
}
