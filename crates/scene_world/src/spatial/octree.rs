//! Octree spatial partitioning structure
//!
//! Divides a fixed root volume into nested octants. Items are keyed by an
//! opaque id and carry an axis-aligned box; each item lives in the deepest
//! node whose bounds fully contain its box. Leaves subdivide when they hold
//! too many items and internal nodes collapse back once their subtree
//! thins out.

use crate::foundation::math::Vec3;
use crate::scene::{Containment, Frustum, AABB};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// Configuration for octree behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OctreeConfig {
    /// Maximum subdivision depth (root is depth 0)
    pub max_depth: u32,

    /// An internal node collapses once its subtree holds this many items or fewer
    pub min_items: usize,

    /// A leaf subdivides once it directly holds more than this many items
    pub max_items: usize,
}

impl Default for OctreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 8,
            min_items: 4,
            max_items: 16,
        }
    }
}

impl OctreeConfig {
    /// Check that an octree over `bounds` can be built with this configuration
    pub fn validate(&self, bounds: &AABB) -> Result<(), OctreeError> {
        let extents = bounds.extents();
        let smallest = extents.x.min(extents.y).min(extents.z);
        if !(smallest > 0.0) {
            return Err(OctreeError::NonPositiveExtent { extent: smallest });
        }
        if self.max_items == 0 {
            return Err(OctreeError::ZeroMaxItems);
        }
        if self.min_items > self.max_items {
            return Err(OctreeError::InvertedThresholds {
                min: self.min_items,
                max: self.max_items,
            });
        }
        Ok(())
    }
}

/// Octree construction errors
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum OctreeError {
    /// Root volume is flat or inverted along some axis
    #[error("root extent must be positive on every axis, got {extent}")]
    NonPositiveExtent {
        /// Smallest half-extent of the root volume
        extent: f32,
    },

    /// Collapse threshold above the subdivide threshold
    #[error("min_items ({min}) exceeds max_items ({max})")]
    InvertedThresholds {
        /// Configured collapse threshold
        min: usize,
        /// Configured subdivide threshold
        max: usize,
    },

    /// A leaf could never hold an item
    #[error("max_items must be at least 1")]
    ZeroMaxItems,
}

/// Single node in the octree hierarchy
#[derive(Debug, Clone)]
pub struct OctreeNode<K> {
    bounds: AABB,
    depth: u32,
    min_items: usize,
    max_items: usize,
    /// Items in the whole subtree
    count: usize,
    items: Vec<(K, AABB)>,
    children: Option<Box<[OctreeNode<K>; 8]>>,
}

impl<K: Copy + Eq + Hash + Debug> OctreeNode<K> {
    fn new(bounds: AABB, depth: u32, min_items: usize, max_items: usize) -> Self {
        Self {
            bounds,
            depth,
            min_items,
            max_items,
            count: 0,
            items: Vec::new(),
            children: None,
        }
    }

    /// World-space bounds of this node
    pub fn bounds(&self) -> &AABB {
        &self.bounds
    }

    /// Depth in the tree (0 = root)
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Check if this node is a leaf (has no children)
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// Items held by this node and all of its descendants
    pub fn count(&self) -> usize {
        self.count
    }

    /// Items held directly by this node
    pub fn items(&self) -> impl Iterator<Item = (K, &AABB)> {
        self.items.iter().map(|(item, bounds)| (*item, bounds))
    }

    /// The eight octants, if subdivided
    pub fn children(&self) -> Option<&[OctreeNode<K>; 8]> {
        self.children.as_deref()
    }

    /// Bounds of octant `index`; bits 0/1/2 select the upper half in x/y/z
    fn octant_bounds(&self, index: usize) -> AABB {
        let center = self.bounds.center();
        let pick = |bit: usize, low: f32, mid: f32, high: f32| {
            if index & bit != 0 {
                (mid, high)
            } else {
                (low, mid)
            }
        };
        let (min_x, max_x) = pick(1, self.bounds.min.x, center.x, self.bounds.max.x);
        let (min_y, max_y) = pick(2, self.bounds.min.y, center.y, self.bounds.max.y);
        let (min_z, max_z) = pick(4, self.bounds.min.z, center.z, self.bounds.max.z);
        AABB::new(Vec3::new(min_x, min_y, min_z), Vec3::new(max_x, max_y, max_z))
    }

    fn insert(&mut self, item: K, bounds: AABB, max_depth: u32) {
        self.count += 1;

        if let Some(children) = self.children.as_deref_mut() {
            match children.iter_mut().find(|child| child.bounds.contains(&bounds)) {
                Some(child) => child.insert(item, bounds, max_depth),
                None => self.items.push((item, bounds)),
            }
            return;
        }

        self.items.push((item, bounds));
        if self.items.len() > self.max_items && self.depth < max_depth {
            self.subdivide(max_depth);
        }
    }

    /// Turn this leaf into an internal node and push every item that fits
    /// into a child down into it.
    fn subdivide(&mut self, max_depth: u32) {
        let min_items = (self.min_items / 8).max(1);
        let max_items = (self.max_items / 8).max(1);
        let depth = self.depth + 1;
        let children = std::array::from_fn(|index| {
            OctreeNode::new(self.octant_bounds(index), depth, min_items, max_items)
        });
        self.children = Some(Box::new(children));

        log::trace!("Subdivided octree node at depth {} holding {} items", self.depth, self.items.len());

        let pending = std::mem::take(&mut self.items);
        self.count -= pending.len();
        for (item, bounds) in pending {
            self.insert(item, bounds, max_depth);
        }
    }

    /// Remove `item`, which must live along the path `bounds` selects.
    /// Collapses nodes on the way back up.
    fn remove(&mut self, item: K, bounds: &AABB) -> bool {
        let removed = match self
            .children
            .as_deref_mut()
            .and_then(|children| children.iter_mut().find(|child| child.bounds.contains(bounds)))
        {
            Some(child) => child.remove(item, bounds),
            None => match self.items.iter().position(|(held, _)| *held == item) {
                Some(index) => {
                    self.items.swap_remove(index);
                    true
                }
                None => false,
            },
        };

        if removed {
            self.count -= 1;
            if !self.is_leaf() && self.count <= self.min_items {
                self.collapse();
            }
        }
        removed
    }

    /// Pull every descendant's items into this node and drop the children
    fn collapse(&mut self) {
        let Some(children) = self.children.take() else {
            return;
        };
        let mut stack = Vec::from(*children);
        while let Some(mut node) = stack.pop() {
            self.items.append(&mut node.items);
            if let Some(grandchildren) = node.children.take() {
                stack.extend(*grandchildren);
            }
        }
        log::trace!("Collapsed octree node at depth {} back to {} items", self.depth, self.items.len());
    }

    fn visit_frustum<F: FnMut(K)>(&self, frustum: &Frustum, mut fully_inside: bool, f: &mut F) {
        if !fully_inside {
            match frustum.classify_aabb(&self.bounds) {
                Containment::Outside => return,
                Containment::Inside => fully_inside = true,
                Containment::Intersecting => {}
            }
        }

        for (item, bounds) in &self.items {
            if fully_inside || frustum.intersects_aabb(bounds) {
                f(*item);
            }
        }
        if let Some(children) = self.children.as_deref() {
            for child in children {
                child.visit_frustum(frustum, fully_inside, f);
            }
        }
    }

    fn visit_aabb<F: FnMut(K)>(&self, volume: &AABB, f: &mut F) {
        if !self.bounds.intersects(volume) {
            return;
        }
        for (item, bounds) in &self.items {
            if bounds.intersects(volume) {
                f(*item);
            }
        }
        if let Some(children) = self.children.as_deref() {
            for child in children {
                child.visit_aabb(volume, f);
            }
        }
    }

    fn query_radius(&self, center: Vec3, radius_squared: f32, results: &mut Vec<K>) {
        // Sphere misses this node entirely
        if self.bounds.distance_squared_to(center) > radius_squared {
            return;
        }
        for (item, bounds) in &self.items {
            if bounds.distance_squared_to(center) <= radius_squared {
                results.push(*item);
            }
        }
        if let Some(children) = self.children.as_deref() {
            for child in children {
                child.query_radius(center, radius_squared, results);
            }
        }
    }

    fn visit<F: FnMut(&OctreeNode<K>)>(&self, leaves_only: bool, f: &mut F) {
        if !leaves_only || self.is_leaf() {
            f(self);
        }
        if let Some(children) = self.children.as_deref() {
            for child in children {
                child.visit(leaves_only, f);
            }
        }
    }

    fn max_depth_below(&self) -> u32 {
        self.children.as_deref().map_or(self.depth, |children| {
            children.iter().map(OctreeNode::max_depth_below).max().unwrap_or(self.depth)
        })
    }
}

/// Octree spatial partitioning structure
///
/// Every item is stored exactly once, so traversals never report an item
/// twice. The item's box doubles as its reverse index: the node holding it
/// is found by descending through the children that contain the box.
#[derive(Debug, Clone)]
pub struct Octree<K> {
    root: OctreeNode<K>,
    config: OctreeConfig,
    locations: HashMap<K, AABB>,
}

impl<K: Copy + Eq + Hash + Debug> Octree<K> {
    /// Create an octree over `bounds`, rejecting unusable configurations
    pub fn try_new(bounds: AABB, config: OctreeConfig) -> Result<Self, OctreeError> {
        config.validate(&bounds)?;
        Ok(Self {
            root: OctreeNode::new(bounds, 0, config.min_items, config.max_items),
            config,
            locations: HashMap::new(),
        })
    }

    /// Create an octree over `bounds`
    ///
    /// # Panics
    ///
    /// If the configuration fails [`OctreeConfig::validate`].
    pub fn new(bounds: AABB, config: OctreeConfig) -> Self {
        match Self::try_new(bounds, config) {
            Ok(octree) => octree,
            Err(error) => panic!("invalid octree configuration: {error}"),
        }
    }

    /// Insert or move an item.
    ///
    /// Any previous entry for `item` is removed first. Returns false, and
    /// leaves the item absent, when `bounds` is not fully inside the root.
    pub fn insert(&mut self, item: K, bounds: AABB) -> bool {
        self.delete(item);

        if !self.root.bounds.contains(&bounds) {
            log::warn!(
                "Octree insert of {item:?} dropped: bounds {:?}..{:?} exceed the root volume",
                bounds.min,
                bounds.max
            );
            return false;
        }

        self.root.insert(item, bounds, self.config.max_depth);
        self.locations.insert(item, bounds);
        true
    }

    /// Remove an item. Returns false if it was not present.
    pub fn delete(&mut self, item: K) -> bool {
        let Some(bounds) = self.locations.remove(&item) else {
            return false;
        };
        let removed = self.root.remove(item, &bounds);
        debug_assert!(removed, "octree reverse index out of sync for {item:?}");
        removed
    }

    /// Remove every item and all subdivisions
    pub fn clear(&mut self) {
        self.root = OctreeNode::new(self.root.bounds, 0, self.config.min_items, self.config.max_items);
        self.locations.clear();
    }

    /// Total number of items in the tree
    pub fn count(&self) -> usize {
        self.root.count()
    }

    /// Number of entries in the reverse index; always equals [`count`](Self::count)
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// Whether the tree holds no items
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Whether `item` is stored
    pub fn contains(&self, item: K) -> bool {
        self.locations.contains_key(&item)
    }

    /// Every stored item, in no particular order
    pub fn items(&self) -> impl Iterator<Item = K> + '_ {
        self.locations.keys().copied()
    }

    /// Bounds `item` was inserted with
    pub fn bounds_of(&self, item: K) -> Option<&AABB> {
        self.locations.get(&item)
    }

    /// Whether the root is still a leaf
    pub fn is_leaf(&self) -> bool {
        self.root.is_leaf()
    }

    /// Root node
    pub fn root(&self) -> &OctreeNode<K> {
        &self.root
    }

    /// Active configuration
    pub fn config(&self) -> &OctreeConfig {
        &self.config
    }

    /// Depth of the deepest node
    pub fn depth(&self) -> u32 {
        self.root.max_depth_below()
    }

    /// Visit every item whose bounds are at least partly inside `frustum`.
    ///
    /// Subtrees outside the frustum are skipped; subtrees fully inside are
    /// reported without further plane tests.
    pub fn for_each_in_frustum(&self, frustum: &Frustum, mut f: impl FnMut(K)) {
        self.root.visit_frustum(frustum, false, &mut f);
    }

    /// Visit every item whose bounds overlap `volume`
    pub fn for_each_in_aabb(&self, volume: &AABB, mut f: impl FnMut(K)) {
        self.root.visit_aabb(volume, &mut f);
    }

    /// Items whose bounds come within `radius` of `center`
    pub fn query_radius(&self, center: Vec3, radius: f32) -> Vec<K> {
        let mut results = Vec::new();
        self.root.query_radius(center, radius * radius, &mut results);
        results
    }

    /// Visit every leaf node, for debug overlays
    pub fn for_each_leaf(&self, mut f: impl FnMut(&OctreeNode<K>)) {
        self.root.visit(true, &mut f);
    }

    /// Visit every node, parents before children
    pub fn for_each(&self, mut f: impl FnMut(&OctreeNode<K>)) {
        self.root.visit(false, &mut f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4, Point3};

    fn world_bounds() -> AABB {
        AABB::new(Vec3::repeat(-64.0), Vec3::repeat(64.0))
    }

    fn small_box(center: Vec3) -> AABB {
        AABB::from_center_extents(center, Vec3::repeat(1.0))
    }

    /// One point per octant of the root, well away from the split planes
    fn octant_centers() -> Vec<Vec3> {
        (0..8)
            .map(|i| {
                let sign = |bit: usize| if i & bit != 0 { 32.0 } else { -32.0 };
                Vec3::new(sign(1), sign(2), sign(4))
            })
            .collect()
    }

    fn camera_looking_down_negative_z() -> Frustum {
        let projection = Mat4::new_perspective(1.0, std::f32::consts::FRAC_PI_2, 0.1, 100.0);
        let view = Mat4::look_at_rh(&Point3::origin(), &Point3::new(0.0, 0.0, -1.0), &Vec3::y());
        Frustum::from_matrix(&(projection * view))
    }

    fn collect_frustum(octree: &Octree<u32>, frustum: &Frustum) -> Vec<u32> {
        let mut seen = Vec::new();
        octree.for_each_in_frustum(frustum, |item| seen.push(item));
        seen.sort_unstable();
        seen
    }

    #[test]
    fn test_insert_delete_round_trip() {
        let mut octree = Octree::new(world_bounds(), OctreeConfig::default());
        octree.insert(1, small_box(Vec3::new(5.0, 5.0, -20.0)));
        let before = octree.count();

        let bounds = small_box(Vec3::new(0.0, 0.0, -10.0));
        assert!(octree.insert(7, bounds));
        assert_eq!(octree.count(), before + 1);
        assert_eq!(octree.bounds_of(7), Some(&bounds));

        assert!(octree.delete(7));
        assert_eq!(octree.count(), before);
        assert!(!octree.delete(7));
        assert!(!collect_frustum(&octree, &camera_looking_down_negative_z()).contains(&7));
    }

    #[test]
    fn test_reinsert_moves_item() {
        let mut octree = Octree::new(world_bounds(), OctreeConfig::default());
        octree.insert(3, small_box(Vec3::new(10.0, 0.0, 0.0)));
        octree.insert(3, small_box(Vec3::new(-10.0, 0.0, 0.0)));

        assert_eq!(octree.count(), 1);
        assert!(octree.query_radius(Vec3::new(10.0, 0.0, 0.0), 2.0).is_empty());
        assert_eq!(octree.query_radius(Vec3::new(-10.0, 0.0, 0.0), 2.0), vec![3]);
    }

    #[test]
    fn test_out_of_root_insert_is_rejected() {
        let mut octree = Octree::new(world_bounds(), OctreeConfig::default());
        octree.insert(1, small_box(Vec3::zeros()));
        let before = octree.count();

        let too_big = AABB::new(Vec3::repeat(-100.0), Vec3::repeat(100.0));
        assert!(!octree.insert(2, too_big));
        assert_eq!(octree.count(), before);
        assert!(!octree.contains(2));

        // Moving a stored item out of the world drops its old entry too
        assert!(!octree.insert(1, small_box(Vec3::new(70.0, 0.0, 0.0))));
        assert!(!octree.contains(1));
        assert_eq!(octree.count(), before - 1);
    }

    #[test]
    fn test_subdivide_and_collapse_symmetry() {
        let config = OctreeConfig {
            max_depth: 4,
            min_items: 2,
            max_items: 4,
        };
        let mut octree = Octree::new(world_bounds(), config);
        let centers = octant_centers();

        for (id, center) in (0u32..).zip(centers.iter().take(config.max_items)) {
            octree.insert(id, small_box(*center));
        }
        assert!(octree.is_leaf());

        octree.insert(4, small_box(centers[4]));
        assert!(!octree.is_leaf());
        // Every item fits an octant, so nothing stays at the root
        assert_eq!(octree.root().items().count(), 0);
        assert_eq!(octree.depth(), 1);

        octree.delete(0);
        octree.delete(1);
        assert!(!octree.is_leaf());
        octree.delete(2);
        assert!(octree.is_leaf());
        assert_eq!(octree.root().items().count(), 2);
        assert_eq!(octree.count(), octree.len());
    }

    #[test]
    fn test_straddling_items_stay_at_parent() {
        let config = OctreeConfig {
            max_depth: 4,
            min_items: 0,
            max_items: 2,
        };
        let mut octree = Octree::new(world_bounds(), config);
        octree.insert(10, small_box(Vec3::zeros()));
        octree.insert(11, small_box(Vec3::new(30.0, 30.0, 30.0)));
        octree.insert(12, small_box(Vec3::new(-30.0, 30.0, 30.0)));

        assert!(!octree.is_leaf());
        let direct: Vec<u32> = octree.root().items().map(|(item, _)| item).collect();
        assert_eq!(direct, vec![10]);

        assert!(octree.delete(10));
        assert!(octree.delete(11));
        assert_eq!(octree.count(), 1);
    }

    #[test]
    fn test_frustum_skips_excluded_region() {
        let config = OctreeConfig {
            max_depth: 6,
            min_items: 1,
            max_items: 2,
        };
        let mut octree = Octree::new(world_bounds(), config);

        // Ahead of the camera (negative z) and behind it (positive z)
        for id in 0..6u32 {
            let offset = id as f32 * 3.0 - 7.5;
            octree.insert(id, small_box(Vec3::new(offset, 5.0, -30.0)));
            octree.insert(100 + id, small_box(Vec3::new(offset, 5.0, 30.0)));
        }
        assert!(octree.depth() > 0);

        let visible = collect_frustum(&octree, &camera_looking_down_negative_z());
        assert_eq!(visible, (0..6).collect::<Vec<_>>());
    }

    #[test]
    fn test_frustum_filters_items_of_a_visited_leaf() {
        let mut octree = Octree::new(world_bounds(), OctreeConfig::default());
        octree.insert(1, small_box(Vec3::new(0.0, 0.0, -30.0)));
        octree.insert(2, small_box(Vec3::new(0.0, 0.0, 30.0)));
        octree.insert(3, small_box(Vec3::new(50.0, 0.0, -5.0)));
        assert!(octree.is_leaf());

        // The root straddles the frustum, so each stored item is tested on its own
        assert_eq!(collect_frustum(&octree, &camera_looking_down_negative_z()), vec![1]);
    }

    #[test]
    fn test_aabb_and_radius_queries() {
        let mut octree = Octree::new(world_bounds(), OctreeConfig::default());
        octree.insert(1, small_box(Vec3::zeros()));
        octree.insert(2, small_box(Vec3::new(5.0, 0.0, 0.0)));
        octree.insert(3, small_box(Vec3::new(50.0, 0.0, 0.0)));

        let mut hits = octree.query_radius(Vec3::zeros(), 10.0);
        hits.sort_unstable();
        assert_eq!(hits, vec![1, 2]);

        let mut inside = Vec::new();
        octree.for_each_in_aabb(&AABB::new(Vec3::new(40.0, -5.0, -5.0), Vec3::repeat(60.0)), |item| {
            inside.push(item);
        });
        assert_eq!(inside, vec![3]);
    }

    #[test]
    fn test_traversals_cover_the_tree() {
        let config = OctreeConfig {
            max_depth: 3,
            min_items: 1,
            max_items: 1,
        };
        let mut octree = Octree::new(world_bounds(), config);
        for (id, center) in (0u32..).zip(octant_centers()) {
            octree.insert(id, small_box(center));
        }

        let mut leaves = 0;
        let mut leaf_items = 0;
        octree.for_each_leaf(|node| {
            leaves += 1;
            leaf_items += node.items().count();
        });
        assert_eq!(leaves, 8);
        assert_eq!(leaf_items, 8);

        let mut depths = Vec::new();
        octree.for_each(|node| depths.push(node.depth()));
        assert_eq!(depths.first(), Some(&0));
        assert_eq!(depths.len(), 9);

        octree.clear();
        assert!(octree.is_empty() && octree.is_leaf());
    }

    #[test]
    fn test_invalid_configurations() {
        let flat = AABB::new(Vec3::zeros(), Vec3::new(1.0, 0.0, 1.0));
        assert!(matches!(
            Octree::<u32>::try_new(flat, OctreeConfig::default()),
            Err(OctreeError::NonPositiveExtent { .. })
        ));

        let inverted = OctreeConfig {
            min_items: 9,
            max_items: 3,
            ..Default::default()
        };
        assert_eq!(
            Octree::<u32>::try_new(world_bounds(), inverted).err(),
            Some(OctreeError::InvertedThresholds { min: 9, max: 3 })
        );

        let empty = OctreeConfig {
            min_items: 0,
            max_items: 0,
            ..Default::default()
        };
        assert_eq!(Octree::<u32>::try_new(world_bounds(), empty).err(), Some(OctreeError::ZeroMaxItems));
    }

    #[test]
    #[should_panic(expected = "invalid octree configuration")]
    fn test_new_panics_on_bad_config() {
        let _ = Octree::<u32>::new(AABB::new(Vec3::zeros(), Vec3::zeros()), OctreeConfig::default());
    }
}
