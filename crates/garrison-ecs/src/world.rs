//! The [`World`]: entity storage, component bags and system dispatch.
//!
//! Every live entity owns a component bag keyed by [`ComponentTypeId`], holding
//! at most one value per kind. Entities are kept in a `BTreeMap` so iteration
//! and query results always come back in ascending id order, which is also
//! creation order.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use crate::component::{Component, ComponentRegistry, ComponentTypeId};
use crate::entity::{EntityAllocator, EntityId};
use crate::system::{System, UpdateDiagnostics};
use crate::EcsError;

type ComponentBag = HashMap<ComponentTypeId, Box<dyn Any + Send + Sync>>;

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// The top-level ECS container.
///
/// Owns the entity allocator, the component registry, every component bag and
/// the ordered list of registered systems.
pub struct World {
    allocator: EntityAllocator,
    registry: ComponentRegistry,
    entities: BTreeMap<EntityId, ComponentBag>,
    /// Registered systems, in dispatch order. Temporarily empty while
    /// [`update`](Self::update) is running.
    systems: Vec<Box<dyn System>>,
    /// Names of every registered system, including ones currently checked out
    /// by a running update.
    system_names: Vec<String>,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entity_count", &self.entities.len())
            .field("component_kinds", &self.registry.len())
            .field("systems", &self.system_names)
            .finish()
    }
}

impl World {
    /// Create a new, empty world.
    pub fn new() -> Self {
        Self {
            allocator: EntityAllocator::new(),
            registry: ComponentRegistry::new(),
            entities: BTreeMap::new(),
            systems: Vec::new(),
            system_names: Vec::new(),
        }
    }

    /// Read-only access to the component registry.
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Register a component kind under an explicit name.
    ///
    /// Optional: kinds are registered implicitly on first insert.
    pub fn register_component<T: Component>(&mut self, name: &str) -> ComponentTypeId {
        self.registry.register::<T>(name)
    }

    // -- entity lifecycle ---------------------------------------------------

    /// Create an empty entity and return its fresh id.
    pub fn create_entity(&mut self) -> EntityId {
        let id = self.allocator.allocate();
        self.entities.insert(id, ComponentBag::new());
        id
    }

    /// Create an entity carrying a single component.
    pub fn spawn_with<T: Component>(&mut self, component: T) -> EntityId {
        let id = self.create_entity();
        let kind = self.registry.id_or_register::<T>();
        if let Some(bag) = self.entities.get_mut(&id) {
            bag.insert(kind, Box::new(component));
        }
        id
    }

    /// Destroy an entity and drop its component bag.
    ///
    /// Returns `false` (and does nothing) when the id is unknown or was
    /// already destroyed.
    pub fn destroy_entity(&mut self, entity: EntityId) -> bool {
        let removed = self.entities.remove(&entity).is_some();
        if removed {
            tracing::trace!(entity = %entity, "destroyed entity");
        }
        removed
    }

    /// Whether `entity` refers to a live entity.
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.entities.contains_key(&entity)
    }

    /// Borrow a live entity for reading.
    pub fn entity(&self, entity: EntityId) -> Option<EntityRef<'_>> {
        self.is_alive(entity).then_some(EntityRef { id: entity, world: self })
    }

    /// Borrow a live entity for reading and writing.
    pub fn entity_mut(&mut self, entity: EntityId) -> Option<EntityMut<'_>> {
        if self.is_alive(entity) {
            Some(EntityMut { id: entity, world: self })
        } else {
            None
        }
    }

    /// Total number of live entities.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Ids of every live entity, ascending.
    pub fn entity_ids(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    /// Destroy every entity. Systems stay registered and ids keep counting
    /// upward, so ids issued before the clear are never handed out again.
    pub fn clear(&mut self) {
        let count = self.entities.len();
        self.entities.clear();
        tracing::debug!(count, "cleared world");
    }

    // -- component access ---------------------------------------------------

    /// Attach `value` to `entity`, replacing any existing value of the same
    /// kind.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::StaleEntity`] when the entity does not exist.
    pub fn insert_component<T: Component>(
        &mut self,
        entity: EntityId,
        value: T,
    ) -> Result<(), EcsError> {
        if !self.entities.contains_key(&entity) {
            return Err(EcsError::StaleEntity { entity });
        }
        let kind = self.registry.id_or_register::<T>();
        let bag = self
            .entities
            .get_mut(&entity)
            .ok_or(EcsError::StaleEntity { entity })?;
        bag.insert(kind, Box::new(value));
        Ok(())
    }

    /// Detach and return the component of kind `T`, if present.
    pub fn remove_component<T: Component>(&mut self, entity: EntityId) -> Option<T> {
        let kind = self.registry.lookup::<T>()?;
        let boxed = self.entities.get_mut(&entity)?.remove(&kind)?;
        boxed.downcast::<T>().ok().map(|b| *b)
    }

    /// Get an immutable reference to a component on an entity.
    pub fn get_component<T: Component>(&self, entity: EntityId) -> Option<&T> {
        let kind = self.registry.lookup::<T>()?;
        self.entities
            .get(&entity)?
            .get(&kind)
            .and_then(|value| value.downcast_ref::<T>())
    }

    /// Get a mutable reference to a component on an entity.
    pub fn get_component_mut<T: Component>(&mut self, entity: EntityId) -> Option<&mut T> {
        let kind = self.registry.lookup::<T>()?;
        self.entities
            .get_mut(&entity)?
            .get_mut(&kind)
            .and_then(|value| value.downcast_mut::<T>())
    }

    /// Check whether an entity has a component of kind `T`.
    pub fn has_component<T: Component>(&self, entity: EntityId) -> bool {
        let Some(kind) = self.registry.lookup::<T>() else {
            return false;
        };
        self.entities
            .get(&entity)
            .is_some_and(|bag| bag.contains_key(&kind))
    }

    /// Registered names of every component kind attached to `entity`, sorted.
    pub fn component_names(&self, entity: EntityId) -> Vec<&str> {
        let Some(bag) = self.entities.get(&entity) else {
            return Vec::new();
        };
        let mut names: Vec<&str> = bag
            .keys()
            .filter_map(|kind| self.registry.get_info(*kind))
            .map(|info| info.name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    // -- queries ------------------------------------------------------------

    /// Ids of every entity carrying a `T`, ascending.
    ///
    /// The result is materialised, so callers may mutate the world while
    /// walking it. Entities destroyed in the meantime simply fail later
    /// lookups.
    pub fn entities_with<T: Component>(&self) -> Vec<EntityId> {
        let Some(kind) = self.registry.lookup::<T>() else {
            return Vec::new();
        };
        self.entities
            .iter()
            .filter(|(_, bag)| bag.contains_key(&kind))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Lazily iterate `(id, &T)` pairs in ascending id order.
    pub fn iter_with<T: Component>(&self) -> impl Iterator<Item = (EntityId, &T)> + '_ {
        let kind = self.registry.lookup::<T>();
        self.entities.iter().filter_map(move |(id, bag)| {
            let value = bag.get(&kind?)?.downcast_ref::<T>()?;
            Some((*id, value))
        })
    }

    // -- systems ------------------------------------------------------------

    /// Register a system. It runs after every system registered before it.
    ///
    /// A system added while [`update`](Self::update) is running first runs on
    /// the following update.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::DuplicateSystem`] if a system with the same name is
    /// already registered.
    pub fn add_system(&mut self, system: Box<dyn System>) -> Result<(), EcsError> {
        let name = system.name().to_owned();
        if self.system_names.contains(&name) {
            return Err(EcsError::DuplicateSystem { name });
        }
        tracing::debug!(system = %name, order = self.system_names.len(), "registered system");
        self.system_names.push(name);
        self.systems.push(system);
        Ok(())
    }

    /// Names of the registered systems, in dispatch order.
    pub fn system_names(&self) -> &[String] {
        &self.system_names
    }

    /// Run every registered system once, in registration order.
    pub fn update(&mut self, dt: f32) -> UpdateDiagnostics {
        let frame_start = Instant::now();
        let mut running = std::mem::take(&mut self.systems);
        let mut diagnostics = UpdateDiagnostics {
            system_times: Vec::with_capacity(running.len()),
            ..UpdateDiagnostics::default()
        };

        for system in running.iter_mut() {
            let start = Instant::now();
            system.update(self, dt);
            diagnostics
                .system_times
                .push((system.name().to_owned(), start.elapsed()));
        }

        // Anything registered mid-update landed in `self.systems`; keep it
        // behind the systems that were already there.
        let added = std::mem::replace(&mut self.systems, running);
        self.systems.extend(added);

        diagnostics.total_time = frame_start.elapsed();
        diagnostics
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// EntityRef / EntityMut
// ---------------------------------------------------------------------------

/// Shared view of one live entity.
#[derive(Clone, Copy)]
pub struct EntityRef<'w> {
    id: EntityId,
    world: &'w World,
}

impl<'w> EntityRef<'w> {
    /// The entity's id.
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Component of kind `T`, if attached.
    pub fn get<T: Component>(&self) -> Option<&'w T> {
        self.world.get_component::<T>(self.id)
    }

    /// Whether a component of kind `T` is attached.
    pub fn has<T: Component>(&self) -> bool {
        self.world.has_component::<T>(self.id)
    }
}

impl std::fmt::Debug for EntityRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityRef")
            .field("id", &self.id)
            .field("components", &self.world.component_names(self.id))
            .finish()
    }
}

/// Exclusive view of one live entity.
pub struct EntityMut<'w> {
    id: EntityId,
    world: &'w mut World,
}

impl EntityMut<'_> {
    /// The entity's id.
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Component of kind `T`, if attached.
    pub fn get<T: Component>(&self) -> Option<&T> {
        self.world.get_component::<T>(self.id)
    }

    /// Mutable component of kind `T`, if attached.
    pub fn get_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.world.get_component_mut::<T>(self.id)
    }

    /// Whether a component of kind `T` is attached.
    pub fn has<T: Component>(&self) -> bool {
        self.world.has_component::<T>(self.id)
    }

    /// Attach `value`, replacing any existing value of the same kind.
    pub fn insert<T: Component>(&mut self, value: T) -> &mut Self {
        let kind = self.world.registry.id_or_register::<T>();
        if let Some(bag) = self.world.entities.get_mut(&self.id) {
            bag.insert(kind, Box::new(value));
        }
        self
    }

    /// Detach and return the component of kind `T`.
    pub fn remove<T: Component>(&mut self) -> Option<T> {
        self.world.remove_component::<T>(self.id)
    }
}

impl std::fmt::Debug for EntityMut<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityMut").field("id", &self.id).finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
