//! Garrison ECS -- a small entity/component store with ordered system dispatch.
//!
//! Entities are opaque ids that own a bag of components, at most one per
//! component kind. Ids are never recycled. Systems are plain trait objects
//! run once per [`World::update`](world::World::update) in the order they
//! were registered.
//!
//! # Quick Start
//!
//! ```
//! use garrison_ecs::prelude::*;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Position { x: f32, z: f32 }
//!
//! let mut world = World::new();
//! let entity = world.create_entity();
//! world.insert_component(entity, Position { x: 0.0, z: 0.0 }).unwrap();
//!
//! world
//!     .add_system(Box::new(FnSystem::new("drift", |w: &mut World, dt: f32| {
//!         for id in w.entities_with::<Position>() {
//!             if let Some(p) = w.get_component_mut::<Position>(id) {
//!                 p.x += dt;
//!             }
//!         }
//!     })))
//!     .unwrap();
//! world.update(1.0);
//!
//! assert_eq!(world.get_component::<Position>(entity), Some(&Position { x: 1.0, z: 0.0 }));
//! ```

#![deny(unsafe_code)]

pub mod component;
pub mod entity;
pub mod system;
pub mod world;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by ECS operations.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// The entity does not exist (destroyed or never allocated).
    #[error("entity {entity:?} does not exist (destroyed or never allocated)")]
    StaleEntity { entity: entity::EntityId },

    /// A system with the same name is already registered.
    #[error("a system named '{name}' is already registered")]
    DuplicateSystem { name: String },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::component::{Component, ComponentInfo, ComponentRegistry, ComponentTypeId};
    pub use crate::entity::EntityId;
    pub use crate::system::{FnSystem, System, UpdateDiagnostics};
    pub use crate::world::{EntityMut, EntityRef, World};
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Position {
        x: f32,
        z: f32,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Velocity {
        dx: f32,
        dz: f32,
    }

    struct Integrate;

    impl System for Integrate {
        fn name(&self) -> &str {
            "integrate"
        }

        fn update(&mut self, world: &mut World, dt: f32) {
            for id in world.entities_with::<Velocity>() {
                let Some(vel) = world.get_component::<Velocity>(id).cloned() else {
                    continue;
                };
                if let Some(pos) = world.get_component_mut::<Position>(id) {
                    pos.x += vel.dx * dt;
                    pos.z += vel.dz * dt;
                }
            }
        }
    }

    #[test]
    fn struct_system_moves_entities() {
        let mut world = World::new();
        let moving = world.create_entity();
        world
            .insert_component(moving, Position { x: 0.0, z: 0.0 })
            .unwrap();
        world
            .insert_component(moving, Velocity { dx: 2.0, dz: -1.0 })
            .unwrap();
        let still = world.spawn_with(Position { x: 5.0, z: 5.0 });

        world.add_system(Box::new(Integrate)).unwrap();
        world.update(0.5);

        assert_eq!(
            world.get_component::<Position>(moving),
            Some(&Position { x: 1.0, z: -0.5 })
        );
        assert_eq!(
            world.get_component::<Position>(still),
            Some(&Position { x: 5.0, z: 5.0 })
        );
    }

    #[test]
    fn destroyed_entity_vanishes_everywhere() {
        let mut world = World::new();
        let e = world.spawn_with(Position { x: 0.0, z: 0.0 });
        world
            .insert_component(e, Velocity { dx: 0.0, dz: 0.0 })
            .unwrap();
        assert!(world.destroy_entity(e));

        assert!(world.entity(e).is_none());
        assert!(world.entity_mut(e).is_none());
        assert!(!world.has_component::<Position>(e));
        assert!(world.entities_with::<Position>().is_empty());
        assert!(world.entities_with::<Velocity>().is_empty());
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn error_messages_are_readable() {
        let err = EcsError::DuplicateSystem {
            name: "capture".to_owned(),
        };
        assert_eq!(err.to_string(), "a system named 'capture' is already registered");
        let err = EcsError::StaleEntity {
            entity: EntityId::from_raw(9),
        };
        assert!(err.to_string().contains("EntityId(9)"));
    }
}
