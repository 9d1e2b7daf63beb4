//! String-keyed component dispatch
//!
//! Editors and scene files refer to component types by name. The registry
//! maps each name to monomorphised add/remove/has functions so callers can
//! manipulate components without knowing the concrete type.

use super::components::{BoundsComponent, TransformComponent};
use super::{Component, Entity, World};
use std::collections::BTreeMap;

#[derive(Clone, Copy)]
struct Dispatch {
    add: fn(&mut World, Entity) -> bool,
    remove: fn(&mut World, Entity) -> bool,
    has: fn(&World, Entity) -> bool,
}

impl Dispatch {
    fn of<T: Component>() -> Self {
        Self {
            add: |world, entity| world.add_component::<T>(entity).is_some(),
            remove: |world, entity| world.remove_component::<T>(entity).is_some(),
            has: |world, entity| world.has_component::<T>(entity),
        }
    }
}

/// Name to component type table
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    entries: BTreeMap<String, Dispatch>,
}

impl ComponentRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the components the world ships with
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register::<TransformComponent>("Transform");
        registry.register::<BoundsComponent>("Bounds");
        registry
    }

    /// Register `T` under `name`, replacing any previous registration
    pub fn register<T: Component>(&mut self, name: &str) {
        if self.entries.insert(name.to_owned(), Dispatch::of::<T>()).is_some() {
            log::debug!("Component name '{name}' re-registered");
        }
    }

    /// Add the named component. False for unknown names or entities.
    pub fn add(&self, world: &mut World, entity: Entity, name: &str) -> bool {
        self.entries.get(name).is_some_and(|dispatch| (dispatch.add)(world, entity))
    }

    /// Remove the named component. False if nothing was removed.
    pub fn remove(&self, world: &mut World, entity: Entity, name: &str) -> bool {
        self.entries.get(name).is_some_and(|dispatch| (dispatch.remove)(world, entity))
    }

    /// Whether the entity has the named component
    pub fn has(&self, world: &World, entity: Entity, name: &str) -> bool {
        self.entries.get(name).is_some_and(|dispatch| (dispatch.has)(world, entity))
    }

    /// Whether `name` is registered
    pub fn is_registered(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Tag;
    impl Component for Tag {}

    #[test]
    fn test_dispatch_by_name() {
        let mut registry = ComponentRegistry::with_builtin();
        registry.register::<Tag>("Tag");

        let mut world = World::new();
        let entity = world.create("Thing");

        assert!(registry.add(&mut world, entity, "Transform"));
        assert!(registry.add(&mut world, entity, "Tag"));
        assert!(world.has_component::<TransformComponent>(entity));
        assert!(registry.has(&world, entity, "Tag"));
        assert!(!registry.has(&world, entity, "Bounds"));

        assert!(registry.remove(&mut world, entity, "Tag"));
        assert!(!registry.remove(&mut world, entity, "Tag"));
        assert!(!world.has_component::<Tag>(entity));
    }

    #[test]
    fn test_unknown_name_or_entity() {
        let registry = ComponentRegistry::with_builtin();
        let mut world = World::new();

        assert!(!registry.add(&mut world, Entity::new(3), "Transform"));
        let entity = world.create("Thing");
        assert!(!registry.add(&mut world, entity, "Mesh"));
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["Bounds", "Transform"]);
    }
}
