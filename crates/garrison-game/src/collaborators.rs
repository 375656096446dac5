//! Building registry collaborator.
//!
//! The simulation only writes to the registry (register on spawn, update on
//! capture, unregister on despawn); pathfinding and placement are the
//! readers. The in-memory [`BuildingCollisionRegistry`] is the implementation
//! the simulation wires in by default.

use std::cell::RefCell;
use std::collections::BTreeMap;

use garrison_ecs::entity::EntityId;
use serde::Serialize;

use crate::ownership::OwnerId;

/// Write-side interface of a building spatial index.
pub trait BuildingRegistry {
    fn register_building(&self, id: EntityId, type_name: &str, x: f32, z: f32, owner: OwnerId);

    fn update_building_owner(&self, id: EntityId, owner: OwnerId);

    /// Forget `id`. Returns `false` if it was never registered.
    fn unregister_building(&self, id: EntityId) -> bool;
}

/// One registered building footprint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildingFootprint {
    pub type_name: String,
    pub center_x: f32,
    pub center_z: f32,
    pub half_width: f32,
    pub half_depth: f32,
    pub owner: OwnerId,
}

impl BuildingFootprint {
    /// Whether the ground point `(x, z)` falls inside this footprint.
    pub fn contains(&self, x: f32, z: f32) -> bool {
        (x - self.center_x).abs() <= self.half_width && (z - self.center_z).abs() <= self.half_depth
    }
}

/// Half extents `(width, depth)` of a building kind's collision box.
fn half_extents(type_name: &str) -> (f32, f32) {
    match type_name {
        "barracks" => (2.0, 2.0),
        "defense_tower" => (0.75, 0.75),
        "home" => (1.25, 1.25),
        _ => (1.0, 1.0),
    }
}

/// In-memory building footprint index.
#[derive(Debug, Default)]
pub struct BuildingCollisionRegistry {
    buildings: RefCell<BTreeMap<EntityId, BuildingFootprint>>,
}

impl BuildingCollisionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn footprint(&self, id: EntityId) -> Option<BuildingFootprint> {
        self.buildings.borrow().get(&id).cloned()
    }

    pub fn owner_of(&self, id: EntityId) -> Option<OwnerId> {
        self.buildings.borrow().get(&id).map(|b| b.owner)
    }

    /// Whether any registered footprint covers `(x, z)`.
    pub fn is_blocked(&self, x: f32, z: f32) -> bool {
        self.buildings.borrow().values().any(|b| b.contains(x, z))
    }

    pub fn len(&self) -> usize {
        self.buildings.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buildings.borrow().is_empty()
    }
}

impl BuildingRegistry for BuildingCollisionRegistry {
    fn register_building(&self, id: EntityId, type_name: &str, x: f32, z: f32, owner: OwnerId) {
        let (half_width, half_depth) = half_extents(type_name);
        self.buildings.borrow_mut().insert(
            id,
            BuildingFootprint {
                type_name: type_name.to_owned(),
                center_x: x,
                center_z: z,
                half_width,
                half_depth,
                owner,
            },
        );
        tracing::debug!(entity = %id, type_name, owner, "registered building footprint");
    }

    fn update_building_owner(&self, id: EntityId, owner: OwnerId) {
        match self.buildings.borrow_mut().get_mut(&id) {
            Some(footprint) => footprint.owner = owner,
            None => tracing::debug!(entity = %id, "owner update for unregistered building"),
        }
    }

    fn unregister_building(&self, id: EntityId) -> bool {
        let removed = self.buildings.borrow_mut().remove(&id).is_some();
        if removed {
            tracing::debug!(entity = %id, "unregistered building footprint");
        }
        removed
    }
}
