//! ECS World implementation
//!
//! The world owns entity ids, unique display names, the parent/child
//! adjacency and one [`ComponentStore`] per component type. Stores are
//! created on first use and live as long as the world.
//!
//! Every steady-state operation reports failure through `bool`/`Option`:
//! unknown ids, missing components and name clashes are ordinary outcomes
//! on the per-frame path, not errors.

use super::component::MAX_COMPONENT_TYPES;
use super::components::TransformComponent;
use super::storage::ErasedStore;
use super::{Component, ComponentMask, ComponentStore, Entity};
use crate::foundation::math::{inverse_or_identity, Mat4};
use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};

/// Name given to entities created with an empty name
const DEFAULT_NAME: &str = "Entity";

/// Bookkeeping for one live entity
#[derive(Debug, Default)]
struct EntityRecord {
    name: String,
    parent: Option<Entity>,
    children: Vec<Entity>,
    mask: ComponentMask,
}

/// ECS World containing all entities and components
pub struct World {
    next_entity_id: u32,
    records: BTreeMap<Entity, EntityRecord>,
    names: HashMap<String, Entity>,
    /// Lowest numeric suffix that may still be free, per base name
    suffix_hints: HashMap<String, u32>,
    stores: Vec<Box<dyn ErasedStore>>,
    store_slots: HashMap<TypeId, usize>,
    /// Hierarchy or hierarchical component set changed since the last sort
    order_stale: bool,
}

/// The world as used for scene entities
pub type EntityManager = World;

/// The world as used for loaded assets (meshes, textures, materials)
pub type AssetManager = World;

impl World {
    /// Create a new world
    pub fn new() -> Self {
        Self {
            next_entity_id: 0,
            records: BTreeMap::new(),
            names: HashMap::new(),
            suffix_hints: HashMap::new(),
            stores: Vec::new(),
            store_slots: HashMap::new(),
            order_stale: false,
        }
    }

    /// Create a new entity.
    ///
    /// A name already in use gets the smallest free `_N` suffix for that
    /// base name, so creation never fails.
    pub fn create(&mut self, name: &str) -> Entity {
        let id = self.next_entity_id;
        assert!(id != Entity::INVALID.id(), "entity ids exhausted after {id} creations");

        let entity = Entity::new(id);
        self.next_entity_id = id + 1;

        let name = self.unique_name(name);
        self.names.insert(name.clone(), entity);
        self.records.insert(
            entity,
            EntityRecord {
                name,
                ..Default::default()
            },
        );
        entity
    }

    /// Delete an entity, its components and, recursively, its children.
    ///
    /// Returns false if the entity was not live.
    pub fn delete(&mut self, entity: Entity) -> bool {
        let Some(parent) = self.records.get(&entity).map(|record| record.parent) else {
            return false;
        };
        if let Some(parent) = parent {
            self.detach(parent, entity);
        }

        let doomed = self.descendants(entity);
        let mut touched = ComponentMask::EMPTY;
        for &victim in &doomed {
            let mask = self.records.get(&victim).map_or(ComponentMask::EMPTY, |r| r.mask);
            for slot in mask.bits() {
                let removed = self.stores[slot].remove_entity(victim);
                debug_assert!(removed, "presence mask out of sync for {victim}");
            }
            touched = touched.with(mask);
        }

        for victim in &doomed {
            if let Some(record) = self.records.remove(victim) {
                self.release_name(&record.name);
            }
        }

        let records = &self.records;
        let parent_of = |e: Entity| records.get(&e).and_then(|r| r.parent);
        for slot in touched.bits() {
            self.stores[slot].restore_order(&parent_of);
        }

        log::trace!("Deleted {} entities rooted at {}", doomed.len(), entity);
        true
    }

    /// Rename an entity.
    ///
    /// Fails for unknown ids, empty names and names held by another entity.
    pub fn rename(&mut self, entity: Entity, new_name: &str) -> bool {
        if new_name.is_empty() {
            return false;
        }
        match self.names.get(new_name) {
            Some(&holder) if holder == entity => return true,
            Some(_) => {
                log::debug!("Rename of {entity} rejected: '{new_name}' is taken");
                return false;
            }
            None => {}
        }
        let Some(record) = self.records.get_mut(&entity) else {
            return false;
        };

        let old_name = std::mem::replace(&mut record.name, new_name.to_owned());
        self.names.insert(new_name.to_owned(), entity);
        self.release_name(&old_name);
        true
    }

    /// Whether the entity is live
    pub fn contains(&self, entity: Entity) -> bool {
        self.records.contains_key(&entity)
    }

    /// Number of live entities
    pub fn count(&self) -> usize {
        self.records.len()
    }

    /// Look up an entity by its display name
    pub fn id_of(&self, name: &str) -> Option<Entity> {
        self.names.get(name).copied()
    }

    /// Display name of a live entity
    pub fn name(&self, entity: Entity) -> Option<&str> {
        self.records.get(&entity).map(|record| record.name.as_str())
    }

    fn unique_name(&mut self, requested: &str) -> String {
        let base = if requested.is_empty() { DEFAULT_NAME } else { requested };
        if !self.names.contains_key(base) {
            return base.to_owned();
        }

        let hint = self.suffix_hints.entry(base.to_owned()).or_insert(1);
        let mut suffix = *hint;
        loop {
            let candidate = format!("{base}_{suffix}");
            if !self.names.contains_key(&candidate) {
                *hint = suffix + 1;
                return candidate;
            }
            suffix += 1;
        }
    }

    fn release_name(&mut self, name: &str) {
        self.names.remove(name);

        let Some((base, suffix)) = name.rsplit_once('_') else {
            return;
        };
        if let (Ok(suffix), Some(hint)) = (suffix.parse::<u32>(), self.suffix_hints.get_mut(base)) {
            // Suffixes start at 1, even if the caller picked "Name_0" themselves
            *hint = (*hint).min(suffix.max(1));
        }
    }

    // ------------------------------------------------------------------
    // Hierarchy
    // ------------------------------------------------------------------

    /// Make `child` a child of `parent`, detaching it from any previous parent.
    ///
    /// With `keep_world_transform` the child's transform (if any) is
    /// re-expressed in the new parent's space so it stays put in the world;
    /// otherwise its local values are kept and it moves with the new parent.
    /// Fails for unknown ids and for edits that would create a cycle.
    pub fn add_child(&mut self, parent: Entity, child: Entity, keep_world_transform: bool) -> bool {
        if !self.contains(parent) || !self.contains(child) {
            log::debug!("add_child({parent}, {child}) rejected: unknown entity");
            return false;
        }
        if parent == child || self.is_ancestor(child, parent) {
            log::warn!("add_child({parent}, {child}) rejected: would create a cycle");
            return false;
        }
        if self.parent(child) == Some(parent) {
            return true;
        }

        let rebased_local = if keep_world_transform && self.has_component::<TransformComponent>(child) {
            let child_world = self.world_matrix(child).unwrap_or_else(Mat4::identity);
            let parent_world = self.world_matrix(parent).unwrap_or_else(Mat4::identity);
            Some(inverse_or_identity(&parent_world) * child_world)
        } else {
            None
        };

        if let Some(old_parent) = self.parent(child) {
            self.detach(old_parent, child);
        }
        if let Some(record) = self.records.get_mut(&child) {
            record.parent = Some(parent);
        }
        if let Some(record) = self.records.get_mut(&parent) {
            record.children.push(child);
        }

        if let Some(transform) = self.get_component_mut::<TransformComponent>(child) {
            match rebased_local {
                Some(local) => transform.set_local_matrix(&local),
                None => transform.mark_dirty(),
            }
        }
        self.order_stale = true;
        true
    }

    /// Detach `child` from `parent` without deleting it.
    ///
    /// The child keeps its local transform values, now relative to the world.
    pub fn remove_child(&mut self, parent: Entity, child: Entity) -> bool {
        if self.parent(child) != Some(parent) {
            return false;
        }
        self.detach(parent, child);
        if let Some(transform) = self.get_component_mut::<TransformComponent>(child) {
            transform.mark_dirty();
        }
        true
    }

    fn detach(&mut self, parent: Entity, child: Entity) {
        if let Some(record) = self.records.get_mut(&parent) {
            record.children.retain(|&c| c != child);
        }
        if let Some(record) = self.records.get_mut(&child) {
            record.parent = None;
        }
    }

    /// Whether `ancestor` appears on `entity`'s parent chain
    pub fn is_ancestor(&self, ancestor: Entity, entity: Entity) -> bool {
        let mut cursor = self.parent(entity);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// Parent of a live entity
    pub fn parent(&self, entity: Entity) -> Option<Entity> {
        self.records.get(&entity).and_then(|record| record.parent)
    }

    /// Whether the entity has a parent
    pub fn has_parent(&self, entity: Entity) -> bool {
        self.parent(entity).is_some()
    }

    /// Whether the entity has at least one child
    pub fn has_children(&self, entity: Entity) -> bool {
        self.records.get(&entity).is_some_and(|record| !record.children.is_empty())
    }

    /// Direct children in attachment order
    pub fn children(&self, entity: Entity) -> &[Entity] {
        self.records.get(&entity).map_or(&[], |record| record.children.as_slice())
    }

    /// The entity followed by all of its descendants, pre-order
    pub fn descendants(&self, entity: Entity) -> Vec<Entity> {
        let mut out = Vec::new();
        if !self.contains(entity) {
            return out;
        }
        let mut stack = vec![entity];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev());
        }
        out
    }

    /// Visit the direct children of an entity
    pub fn for_each_child(&self, entity: Entity, mut f: impl FnMut(Entity)) {
        for &child in self.children(entity) {
            f(child);
        }
    }

    /// Visit every entity without a parent, in creation order
    pub fn for_each_root(&self, mut f: impl FnMut(Entity)) {
        for (&entity, record) in &self.records {
            if record.parent.is_none() {
                f(entity);
            }
        }
    }

    /// Visit every live entity, in creation order
    pub fn for_all(&self, mut f: impl FnMut(Entity)) {
        for &entity in self.records.keys() {
            f(entity);
        }
    }

    // ------------------------------------------------------------------
    // Components
    // ------------------------------------------------------------------

    fn slot_of<T: Component>(&self) -> Option<usize> {
        self.store_slots.get(&TypeId::of::<T>()).copied()
    }

    fn slot_or_register<T: Component>(&mut self) -> usize {
        if let Some(slot) = self.slot_of::<T>() {
            return slot;
        }
        let slot = self.stores.len();
        assert!(
            slot < MAX_COMPONENT_TYPES,
            "more than {MAX_COMPONENT_TYPES} component types registered"
        );
        self.stores.push(Box::new(ComponentStore::<T>::new()));
        self.store_slots.insert(TypeId::of::<T>(), slot);
        log::trace!("Registered component store {} in slot {slot}", std::any::type_name::<T>());
        slot
    }

    /// Store for `T`, if any entity ever had one
    pub fn component_store<T: Component>(&self) -> Option<&ComponentStore<T>> {
        let slot = self.slot_of::<T>()?;
        self.stores[slot].as_any().downcast_ref()
    }

    /// Mutable store for `T`, if any entity ever had one
    pub fn component_store_mut<T: Component>(&mut self) -> Option<&mut ComponentStore<T>> {
        let slot = self.slot_of::<T>()?;
        downcast_mut(&mut self.stores[slot])
    }

    /// Return the entity's `T`, default-constructing it if absent.
    ///
    /// `None` only when the entity is not live.
    pub fn add_component<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        let slot = self.mark_present::<T>(entity)?;
        downcast_mut::<T>(&mut self.stores[slot]).map(|store| store.add(entity))
    }

    /// Install a fully built `T` for the entity, replacing any existing one
    pub fn insert_component<T: Component>(&mut self, entity: Entity, value: T) -> Option<&mut T> {
        let slot = self.mark_present::<T>(entity)?;
        downcast_mut::<T>(&mut self.stores[slot]).map(|store| store.insert(entity, value))
    }

    fn mark_present<T: Component>(&mut self, entity: Entity) -> Option<usize> {
        if !self.contains(entity) {
            return None;
        }
        let slot = self.slot_or_register::<T>();
        let record = self.records.get_mut(&entity)?;
        if !record.mask.has(slot) && T::HIERARCHICAL {
            self.order_stale = true;
        }
        record.mask.insert(slot);
        Some(slot)
    }

    /// Remove the entity's `T`, returning it
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Option<T> {
        let slot = self.slot_of::<T>()?;
        self.records.get_mut(&entity)?.mask.remove(slot);

        let records = &self.records;
        let store = downcast_mut::<T>(&mut self.stores[slot])?;
        let removed = store.remove(entity)?;
        if T::HIERARCHICAL {
            store.sort_topological(|e| records.get(&e).and_then(|r| r.parent));
        }
        Some(removed)
    }

    /// Whether the entity has a `T`, answered from its presence mask
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        match (self.slot_of::<T>(), self.records.get(&entity)) {
            (Some(slot), Some(record)) => record.mask.has(slot),
            _ => false,
        }
    }

    /// Whether the entity has every component in `mask`
    pub fn has_all(&self, entity: Entity, mask: ComponentMask) -> bool {
        self.records.get(&entity).is_some_and(|record| record.mask.contains_all(mask))
    }

    /// Presence bit for `T`, if its store exists
    pub fn component_bit<T: Component>(&self) -> Option<ComponentMask> {
        self.slot_of::<T>().map(ComponentMask::single)
    }

    /// Get the entity's `T`
    pub fn get_component<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.component_store::<T>()?.get(entity)
    }

    /// Get the entity's `T` mutably
    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.component_store_mut::<T>()?.get_mut(entity)
    }

    /// Borrow two different component types of one entity at once
    ///
    /// # Panics
    ///
    /// If `A` and `B` are the same type.
    pub fn get_components2<A: Component, B: Component>(
        &mut self,
        entity: Entity,
    ) -> (Option<&mut A>, Option<&mut B>) {
        assert_ne!(TypeId::of::<A>(), TypeId::of::<B>(), "component types must differ");
        let slots = [self.slot_of::<A>(), self.slot_of::<B>()];
        let [a, b] = disjoint_stores(&mut self.stores, slots);
        (
            a.and_then(downcast_mut::<A>).and_then(|s| s.get_mut(entity)),
            b.and_then(downcast_mut::<B>).and_then(|s| s.get_mut(entity)),
        )
    }

    /// Borrow three different component types of one entity at once
    ///
    /// # Panics
    ///
    /// If any two of the types are the same.
    pub fn get_components3<A: Component, B: Component, C: Component>(
        &mut self,
        entity: Entity,
    ) -> (Option<&mut A>, Option<&mut B>, Option<&mut C>) {
        assert_distinct(&[TypeId::of::<A>(), TypeId::of::<B>(), TypeId::of::<C>()]);
        let slots = [self.slot_of::<A>(), self.slot_of::<B>(), self.slot_of::<C>()];
        let [a, b, c] = disjoint_stores(&mut self.stores, slots);
        (
            a.and_then(downcast_mut::<A>).and_then(|s| s.get_mut(entity)),
            b.and_then(downcast_mut::<B>).and_then(|s| s.get_mut(entity)),
            c.and_then(downcast_mut::<C>).and_then(|s| s.get_mut(entity)),
        )
    }

    /// First `T` in storage order, for singleton-style components
    pub fn first_component<T: Component>(&self) -> Option<(Entity, &T)> {
        let store = self.component_store::<T>()?;
        Some((store.first_entity()?, store.first()?))
    }

    /// Component type name and instance count for every store, in slot order
    pub fn store_summary(&self) -> Vec<(&'static str, usize)> {
        self.stores.iter().map(|store| (store.component_name(), store.len())).collect()
    }

    /// Number of entities with a `T`
    pub fn component_count<T: Component>(&self) -> usize {
        self.component_store::<T>().map_or(0, ComponentStore::len)
    }

    /// Visit every `T` in dense storage order
    pub fn for_each_with<T: Component>(&mut self, f: impl FnMut(Entity, &mut T)) {
        if let Some(store) = self.component_store_mut::<T>() {
            store.for_each(f);
        }
    }

    /// Visit every entity holding both an `A` and a `B`.
    ///
    /// Tests the presence mask of every live entity, so this costs
    /// O(entities) regardless of how many match.
    pub fn for_each_with2<A: Component, B: Component>(
        &mut self,
        mut f: impl FnMut(Entity, &mut A, &mut B),
    ) {
        assert_ne!(TypeId::of::<A>(), TypeId::of::<B>(), "component types must differ");
        let (Some(slot_a), Some(slot_b)) = (self.slot_of::<A>(), self.slot_of::<B>()) else {
            return;
        };
        let required = ComponentMask::single(slot_a).with(ComponentMask::single(slot_b));

        let [a, b] = disjoint_stores(&mut self.stores, [Some(slot_a), Some(slot_b)]);
        let (Some(store_a), Some(store_b)) = (a.and_then(downcast_mut::<A>), b.and_then(downcast_mut::<B>))
        else {
            return;
        };

        for (&entity, record) in &self.records {
            if !record.mask.contains_all(required) {
                continue;
            }
            if let (Some(a), Some(b)) = (store_a.get_mut(entity), store_b.get_mut(entity)) {
                f(entity, a, b);
            }
        }
    }

    /// Visit every entity holding an `A`, a `B` and a `C`
    pub fn for_each_with3<A: Component, B: Component, C: Component>(
        &mut self,
        mut f: impl FnMut(Entity, &mut A, &mut B, &mut C),
    ) {
        assert_distinct(&[TypeId::of::<A>(), TypeId::of::<B>(), TypeId::of::<C>()]);
        let (Some(slot_a), Some(slot_b), Some(slot_c)) =
            (self.slot_of::<A>(), self.slot_of::<B>(), self.slot_of::<C>())
        else {
            return;
        };
        let required = ComponentMask::single(slot_a)
            .with(ComponentMask::single(slot_b))
            .with(ComponentMask::single(slot_c));

        let [a, b, c] = disjoint_stores(&mut self.stores, [Some(slot_a), Some(slot_b), Some(slot_c)]);
        let (Some(store_a), Some(store_b), Some(store_c)) = (
            a.and_then(downcast_mut::<A>),
            b.and_then(downcast_mut::<B>),
            c.and_then(downcast_mut::<C>),
        ) else {
            return;
        };

        for (&entity, record) in &self.records {
            if !record.mask.contains_all(required) {
                continue;
            }
            if let (Some(a), Some(b), Some(c)) =
                (store_a.get_mut(entity), store_b.get_mut(entity), store_c.get_mut(entity))
            {
                f(entity, a, b, c);
            }
        }
    }

    // ------------------------------------------------------------------
    // Transforms
    // ------------------------------------------------------------------

    /// Bring every transform's world matrix up to date.
    ///
    /// Re-sorts the transform store if the hierarchy changed since the last
    /// call, then runs the dirty-propagating update. Returns the number of
    /// recomputed transforms.
    pub fn update_transforms(&mut self) -> usize {
        let Some(slot) = self.slot_of::<TransformComponent>() else {
            return 0;
        };
        let records = &self.records;
        let parent_of = |e: Entity| records.get(&e).and_then(|r| r.parent);
        let Some(store) = downcast_mut::<TransformComponent>(&mut self.stores[slot]) else {
            return 0;
        };

        if self.order_stale {
            store.sort(parent_of);
            self.order_stale = false;
        }
        store.update(parent_of)
    }

    /// Current local-to-world matrix, composed fresh from local transforms.
    ///
    /// The walk stops at the first ancestor without a transform, matching
    /// how [`update_transforms`](Self::update_transforms) composes.
    pub fn world_matrix(&self, entity: Entity) -> Option<Mat4> {
        let store = self.component_store::<TransformComponent>()?;
        let mut matrix = store.get(entity)?.local_matrix();
        let mut cursor = self.parent(entity);
        while let Some(ancestor) = cursor {
            let Some(transform) = store.get(ancestor) else {
                break;
            };
            matrix = transform.local_matrix() * matrix;
            cursor = self.parent(ancestor);
        }
        Some(matrix)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

fn downcast_mut<T: Component>(store: &mut Box<dyn ErasedStore>) -> Option<&mut ComponentStore<T>> {
    store.as_any_mut().downcast_mut()
}

/// Mutable borrows of up to `N` distinct store slots at once
fn disjoint_stores<const N: usize>(
    stores: &mut [Box<dyn ErasedStore>],
    slots: [Option<usize>; N],
) -> [Option<&mut Box<dyn ErasedStore>>; N] {
    let mut out: [Option<&mut Box<dyn ErasedStore>>; N] = std::array::from_fn(|_| None);
    for (index, store) in stores.iter_mut().enumerate() {
        if let Some(position) = slots.iter().position(|&slot| slot == Some(index)) {
            out[position] = Some(store);
        }
    }
    out
}

fn assert_distinct(types: &[TypeId]) {
    for (i, a) in types.iter().enumerate() {
        assert!(!types[i + 1..].contains(a), "component types must differ");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use approx::assert_relative_eq;

    #[derive(Debug, Default, PartialEq)]
    struct Mesh(u32);
    impl Component for Mesh {}

    #[derive(Debug, Default, PartialEq)]
    struct Material(u32);
    impl Component for Material {}

    #[derive(Debug, Default)]
    struct Camera;
    impl Component for Camera {}

    #[test]
    fn test_create_makes_names_unique_per_base() {
        let mut world = World::new();
        let a = world.create("Cube");
        let b = world.create("Cube");
        let c = world.create("Cube");
        let d = world.create("Light");

        assert_eq!(world.name(a), Some("Cube"));
        assert_eq!(world.name(b), Some("Cube_1"));
        assert_eq!(world.name(c), Some("Cube_2"));
        assert_eq!(world.name(d), Some("Light"));
        assert_eq!(world.id_of("Cube_2"), Some(c));

        // Freed suffixes are reused smallest-first
        world.delete(b);
        let reused = world.create("Cube");
        let next = world.create("Cube");
        let unnamed = world.create("");
        assert_eq!(world.name(reused), Some("Cube_1"));
        assert_eq!(world.name(next), Some("Cube_3"));
        assert_eq!(world.name(unnamed), Some("Entity"));
    }

    #[test]
    fn test_freeing_suffix_zero_keeps_suffixes_positive() {
        let mut world = World::new();
        world.create("Cube");
        world.create("Cube");
        let zero = world.create("Cube_0");
        assert_eq!(world.name(zero), Some("Cube_0"));

        world.delete(zero);
        let next = world.create("Cube");
        assert_eq!(world.name(next), Some("Cube_2"));
    }

    #[test]
    #[should_panic(expected = "entity ids exhausted")]
    fn test_id_exhaustion_fails_fast() {
        let mut world = World::new();
        world.next_entity_id = u32::MAX - 1;
        let last = world.create("Last");
        assert_eq!(last.id(), u32::MAX - 1);
        world.create("Overflow");
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut world = World::new();
        let a = world.create("A");
        world.delete(a);
        let b = world.create("A");

        assert_ne!(a, b);
        assert!(!world.contains(a));
        assert!(world.get_component::<Mesh>(a).is_none());
    }

    #[test]
    fn test_recursive_delete() {
        let mut world = World::new();
        let a = world.create("A");
        let b = world.create("B");
        let c = world.create("C");
        let other = world.create("Other");
        assert!(world.add_child(a, b, false));
        assert!(world.add_child(b, c, false));
        world.add_component::<Mesh>(c).unwrap().0 = 9;
        world.add_component::<Mesh>(other);

        let before = world.count();
        assert!(world.delete(a));

        assert!(!world.contains(a) && !world.contains(b) && !world.contains(c));
        assert_eq!(world.count(), before - 3);
        assert_eq!(world.component_count::<Mesh>(), 1);
        assert!(world.component_store::<Mesh>().unwrap().is_consistent());
        assert_eq!(world.store_summary(), vec![(std::any::type_name::<Mesh>(), 1)]);
        assert_eq!(world.id_of("C"), None);
        assert!(!world.delete(a));
    }

    #[test]
    fn test_delete_child_detaches_from_parent() {
        let mut world = World::new();
        let parent = world.create("Parent");
        let child = world.create("Child");
        world.add_child(parent, child, false);

        world.delete(child);
        assert!(!world.has_children(parent));
    }

    #[test]
    fn test_rename_rules() {
        let mut world = World::new();
        let x = world.create("X");
        let y = world.create("Y");

        assert!(!world.rename(x, "Y"));
        assert_eq!(world.name(x), Some("X"));
        assert!(!world.rename(x, ""));
        assert!(!world.rename(Entity::new(99), "Z"));

        assert!(world.rename(x, "Z"));
        assert_eq!(world.id_of("Z"), Some(x));
        assert_eq!(world.id_of("X"), None);
        assert!(world.rename(y, "X"));
    }

    #[test]
    fn test_add_child_rejects_cycles_and_unknown_ids() {
        let mut world = World::new();
        let a = world.create("A");
        let b = world.create("B");
        let c = world.create("C");
        assert!(world.add_child(a, b, false));
        assert!(world.add_child(b, c, false));

        assert!(!world.add_child(c, a, false));
        assert!(!world.add_child(a, a, false));
        assert!(!world.add_child(a, Entity::new(42), false));
        assert_eq!(world.parent(a), None);
    }

    #[test]
    fn test_reparenting_moves_child_between_lists() {
        let mut world = World::new();
        let first = world.create("First");
        let second = world.create("Second");
        let child = world.create("Child");

        world.add_child(first, child, false);
        world.add_child(second, child, false);

        assert!(!world.has_children(first));
        assert_eq!(world.children(second), &[child]);
        assert_eq!(world.parent(child), Some(second));

        assert!(!world.remove_child(first, child));
        assert!(world.remove_child(second, child));
        assert!(!world.has_parent(child));
        assert!(world.contains(child));
    }

    #[test]
    fn test_roots_children_and_all() {
        let mut world = World::new();
        let root = world.create("Root");
        let kid_a = world.create("KidA");
        let kid_b = world.create("KidB");
        let lone = world.create("Lone");
        world.add_child(root, kid_a, false);
        world.add_child(root, kid_b, false);

        let mut roots = Vec::new();
        world.for_each_root(|e| roots.push(e));
        assert_eq!(roots, vec![root, lone]);

        let mut kids = Vec::new();
        world.for_each_child(root, |e| kids.push(e));
        assert_eq!(kids, vec![kid_a, kid_b]);

        let mut all = 0;
        world.for_all(|_| all += 1);
        assert_eq!(all, 4);
        assert_eq!(world.descendants(root), vec![root, kid_a, kid_b]);
    }

    #[test]
    fn test_component_lifecycle() {
        let mut world = World::new();
        let e = world.create("E");

        assert!(!world.has_component::<Mesh>(e));
        world.add_component::<Mesh>(e).unwrap().0 = 3;
        assert!(world.has_component::<Mesh>(e));
        assert_eq!(world.add_component::<Mesh>(e).map(|m| m.0), Some(3));
        assert_eq!(world.component_count::<Mesh>(), 1);

        assert_eq!(world.remove_component::<Mesh>(e), Some(Mesh(3)));
        assert!(!world.has_component::<Mesh>(e));
        assert_eq!(world.remove_component::<Mesh>(e), None);
        assert!(world.add_component::<Mesh>(Entity::INVALID).is_none());
    }

    #[test]
    fn test_get_components_borrows_disjoint_stores() {
        let mut world = World::new();
        let e = world.create("E");
        world.add_component::<Mesh>(e);
        world.add_component::<Material>(e);

        let (mesh, material, camera) = world.get_components3::<Mesh, Material, Camera>(e);
        mesh.unwrap().0 = 1;
        material.unwrap().0 = 2;
        assert!(camera.is_none());

        assert_eq!(world.get_component::<Mesh>(e), Some(&Mesh(1)));
        assert_eq!(world.get_component::<Material>(e), Some(&Material(2)));
    }

    #[test]
    fn test_for_each_with_single_and_multi() {
        let mut world = World::new();
        let both = world.create("Both");
        let mesh_only = world.create("MeshOnly");
        world.insert_component(both, Mesh(1));
        world.insert_component(both, Material(10));
        world.insert_component(mesh_only, Mesh(2));

        let mut total = 0;
        world.for_each_with::<Mesh>(|_, mesh| total += mesh.0);
        assert_eq!(total, 3);

        let mut visited = Vec::new();
        world.for_each_with2::<Mesh, Material>(|entity, mesh, material| {
            material.0 += mesh.0;
            visited.push(entity);
        });
        assert_eq!(visited, vec![both]);
        assert_eq!(world.get_component::<Material>(both), Some(&Material(11)));
    }

    #[test]
    fn test_first_component_is_first_in_storage_order() {
        let mut world = World::new();
        let a = world.create("CamA");
        let b = world.create("CamB");
        world.add_component::<Camera>(a);
        world.add_component::<Camera>(b);
        world.remove_component::<Camera>(a);
        world.add_component::<Camera>(a);

        // b was swapped into slot 0 when a left
        assert_eq!(world.first_component::<Camera>().map(|(e, _)| e), Some(b));
    }

    #[test]
    fn test_keep_world_transform_on_reparent() {
        let mut world = World::new();
        let parent = world.create("Parent");
        let child = world.create("Child");
        world.insert_component(
            parent,
            TransformComponent::from_position(Vec3::new(5.0, 0.0, 0.0)).with_uniform_scale(2.0),
        );
        world.insert_component(child, TransformComponent::from_position(Vec3::new(1.0, 1.0, 1.0)));

        assert!(world.add_child(parent, child, true));
        world.update_transforms();

        let child_transform = world.get_component::<TransformComponent>(child).unwrap();
        assert_relative_eq!(child_transform.world_position(), Vec3::new(1.0, 1.0, 1.0), epsilon = 1e-5);
        assert_relative_eq!(child_transform.position, Vec3::new(-2.0, 0.5, 0.5), epsilon = 1e-5);
    }

    #[test]
    fn test_rebase_without_keep_moves_with_parent() {
        let mut world = World::new();
        let parent = world.create("Parent");
        let child = world.create("Child");
        world.insert_component(parent, TransformComponent::from_position(Vec3::new(5.0, 0.0, 0.0)));
        world.insert_component(child, TransformComponent::from_position(Vec3::new(1.0, 0.0, 0.0)));

        world.add_child(parent, child, false);
        world.update_transforms();

        let child_transform = world.get_component::<TransformComponent>(child).unwrap();
        assert_relative_eq!(child_transform.world_position(), Vec3::new(6.0, 0.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn test_transform_store_stays_topological() {
        let mut world = World::new();
        let grandchild = world.create("Grandchild");
        let child = world.create("Child");
        let root = world.create("Root");
        let spare = world.create("Spare");
        for e in [grandchild, spare, child, root] {
            world.add_component::<TransformComponent>(e);
        }
        world.add_child(root, child, false);
        world.add_child(child, grandchild, false);
        world.update_transforms();

        let check = |world: &World| {
            let store = world.component_store::<TransformComponent>().unwrap();
            for &entity in store.entities() {
                if let Some(parent) = world.parent(entity).filter(|p| store.has(*p)) {
                    assert!(store.index_of(parent) < store.index_of(entity));
                }
            }
        };
        check(&world);

        // Swap-remove pulls the last entry forward; the re-sort must repair it
        world.remove_component::<TransformComponent>(spare);
        check(&world);
        world.delete(spare);
        check(&world);
    }
}
