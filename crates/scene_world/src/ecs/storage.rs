//! Dense per-type component storage
//!
//! Each component type lives in its own [`ComponentStore`], a sparse set:
//! values are packed contiguously, an id map points from entity to slot and
//! a reverse array points from slot back to entity. Removal swaps the last
//! slot into the hole so iteration never touches gaps.

use super::{Component, Entity};
use std::any::Any;
use std::collections::HashMap;

/// Dense storage for one component type
pub struct ComponentStore<T: Component> {
    components: Vec<T>,
    index_of: HashMap<Entity, usize>,
    entities: Vec<Entity>,
}

impl<T: Component> ComponentStore<T> {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
            index_of: HashMap::new(),
            entities: Vec::new(),
        }
    }

    /// Return the entity's component, default-constructing it if absent.
    ///
    /// Calling this twice without a remove in between yields the same slot.
    pub fn add(&mut self, entity: Entity) -> &mut T {
        let index = match self.index_of.get(&entity) {
            Some(&index) => index,
            None => self.push(entity, T::default()),
        };
        &mut self.components[index]
    }

    /// Install `value` for the entity, replacing any existing component.
    pub fn insert(&mut self, entity: Entity, value: T) -> &mut T {
        let index = match self.index_of.get(&entity) {
            Some(&index) => {
                self.components[index] = value;
                index
            }
            None => self.push(entity, value),
        };
        &mut self.components[index]
    }

    fn push(&mut self, entity: Entity, value: T) -> usize {
        let index = self.components.len();
        self.components.push(value);
        self.entities.push(entity);
        self.index_of.insert(entity, index);
        index
    }

    /// Swap-remove the entity's component. No-op if absent.
    pub fn remove(&mut self, entity: Entity) -> Option<T> {
        let index = self.index_of.remove(&entity)?;
        let removed = self.components.swap_remove(index);
        self.entities.swap_remove(index);

        // The former last slot now sits at `index`
        if let Some(&moved) = self.entities.get(index) {
            self.index_of.insert(moved, index);
        }

        Some(removed)
    }

    /// Whether the entity has a component in this store
    pub fn has(&self, entity: Entity) -> bool {
        self.index_of.contains_key(&entity)
    }

    /// Get the entity's component
    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.index_of.get(&entity).map(|&index| &self.components[index])
    }

    /// Get the entity's component mutably
    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        let index = *self.index_of.get(&entity)?;
        Some(&mut self.components[index])
    }

    /// Dense slot of the entity's component
    pub fn index_of(&self, entity: Entity) -> Option<usize> {
        self.index_of.get(&entity).copied()
    }

    /// First component in storage order.
    ///
    /// Callers that treat a type as a singleton (the active camera, say) get
    /// whichever instance currently occupies slot 0, which is not
    /// necessarily the oldest.
    pub fn first(&self) -> Option<&T> {
        self.components.first()
    }

    /// Owner of the first component in storage order
    pub fn first_entity(&self) -> Option<Entity> {
        self.entities.first().copied()
    }

    /// Visit every component in storage order
    pub fn for_each(&mut self, mut f: impl FnMut(Entity, &mut T)) {
        for (entity, component) in self.entities.iter().zip(self.components.iter_mut()) {
            f(*entity, component);
        }
    }

    /// Iterate `(entity, component)` pairs in storage order
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.entities.iter().copied().zip(self.components.iter())
    }

    /// Slot-to-entity map for the active range
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Components in storage order
    pub fn as_slice(&self) -> &[T] {
        &self.components
    }

    /// Components in storage order, mutably
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.components
    }

    /// Number of active components
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether the store holds no components
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Reorder so every entity's parent entry precedes its own.
    ///
    /// Walks each not-yet-placed entity's ancestor chain (as far as the
    /// ancestors have entries here) and emits ancestors first. Relative order
    /// among unrelated entries is kept. Returns whether anything moved.
    pub fn sort_topological(&mut self, parent_of: impl Fn(Entity) -> Option<Entity>) -> bool {
        let count = self.components.len();
        let mut order = Vec::with_capacity(count);
        let mut placed = vec![false; count];
        let mut chain = Vec::new();

        for start in 0..count {
            if placed[start] {
                continue;
            }

            chain.clear();
            let mut cursor = start;
            loop {
                // Marked on the way up so a malformed cycle terminates
                placed[cursor] = true;
                chain.push(cursor);

                match parent_of(self.entities[cursor]).and_then(|p| self.index_of(p)) {
                    Some(parent) if !placed[parent] => cursor = parent,
                    _ => break,
                }
            }
            order.extend(chain.iter().rev());
        }

        if order.iter().enumerate().all(|(slot, &from)| slot == from) {
            return false;
        }

        self.apply_permutation(&order);
        true
    }

    /// Rearrange so that new slot `i` holds what was at `order[i]`.
    fn apply_permutation(&mut self, order: &[usize]) {
        let mut old_components = std::mem::take(&mut self.components);
        let old_entities = std::mem::take(&mut self.entities);

        self.components = order
            .iter()
            .map(|&from| std::mem::take(&mut old_components[from]))
            .collect();
        self.entities = order.iter().map(|&from| old_entities[from]).collect();

        for (index, entity) in self.entities.iter().enumerate() {
            self.index_of.insert(*entity, index);
        }
    }

    /// Whether the id map and the reverse array are exact inverses
    pub fn is_consistent(&self) -> bool {
        self.entities.len() == self.components.len()
            && self.index_of.len() == self.entities.len()
            && self
                .entities
                .iter()
                .enumerate()
                .all(|(index, entity)| self.index_of.get(entity) == Some(&index))
    }
}

impl<T: Component> Default for ComponentStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Type-erased view of a [`ComponentStore`] used by the world registry
pub(crate) trait ErasedStore {
    /// Remove the entity's component without restoring hierarchical order
    fn remove_entity(&mut self, entity: Entity) -> bool;

    /// Re-sort hierarchical stores after a batch of removals; no-op otherwise
    fn restore_order(&mut self, parent_of: &dyn Fn(Entity) -> Option<Entity>);

    /// Active component count
    fn len(&self) -> usize;

    /// Name of the stored component type, for diagnostics
    fn component_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> ErasedStore for ComponentStore<T> {
    fn remove_entity(&mut self, entity: Entity) -> bool {
        self.remove(entity).is_some()
    }

    fn restore_order(&mut self, parent_of: &dyn Fn(Entity) -> Option<Entity>) {
        if T::HIERARCHICAL {
            self.sort_topological(parent_of);
        }
    }

    fn len(&self) -> usize {
        ComponentStore::len(self)
    }

    fn component_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
