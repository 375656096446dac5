//! Serializable world state with a BLAKE3 content hash.
//!
//! A [`WorldSnapshot`] holds the gameplay-relevant components of every
//! entity in ascending id order plus the driver's tick metadata. Two runs fed
//! the same configuration and commands produce byte-identical JSON and
//! therefore the same hash.

use garrison_ecs::entity::EntityId;
use garrison_ecs::world::World;
use serde::Serialize;

use crate::ambient::AmbientState;
use crate::components::{AIControlled, AttackTarget, Capture, Movement, Production, Transform, Unit};
use crate::victory::VictoryOutcome;
use crate::GameError;

/// Components of one entity that affect simulation outcomes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub unit: Option<Unit>,
    pub transform: Option<Transform>,
    pub movement: Option<Movement>,
    pub production: Option<Production>,
    pub capture: Option<Capture>,
    pub attack_target: Option<AttackTarget>,
    pub ai_controlled: bool,
}

impl EntitySnapshot {
    fn capture(world: &World, id: EntityId) -> Self {
        Self {
            id,
            unit: world.get_component::<Unit>(id).cloned(),
            transform: world.get_component::<Transform>(id).cloned(),
            movement: world.get_component::<Movement>(id).cloned(),
            production: world.get_component::<Production>(id).cloned(),
            capture: world.get_component::<Capture>(id).cloned(),
            attack_target: world.get_component::<AttackTarget>(id).cloned(),
            ai_controlled: world.has_component::<AIControlled>(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorldSnapshot {
    pub tick: u64,
    pub ambient: AmbientState,
    pub outcome: Option<VictoryOutcome>,
    pub entities: Vec<EntitySnapshot>,
}

impl WorldSnapshot {
    pub fn capture(world: &World, tick: u64, ambient: AmbientState, outcome: Option<VictoryOutcome>) -> Self {
        let entities = world
            .entity_ids()
            .into_iter()
            .map(|id| EntitySnapshot::capture(world, id))
            .collect();
        Self {
            tick,
            ambient,
            outcome,
            entities,
        }
    }

    pub fn to_json(&self) -> Result<String, GameError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// BLAKE3 hex digest (64 lowercase hex chars) of the compact JSON form.
    pub fn hash(&self) -> Result<String, GameError> {
        let bytes = serde_json::to_vec(self)?;
        Ok(blake3::hash(&bytes).to_hex().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::troops::TroopType;

    fn world_with_archer(x: f32) -> World {
        let mut world = World::new();
        let id = world.spawn_with(Unit::new(TroopType::Archer.into(), 1));
        world.insert_component(id, Transform::at(x, 0.0, 0.0)).unwrap();
        world
    }

    #[test]
    fn hash_is_hex_and_stable() {
        let a = WorldSnapshot::capture(&world_with_archer(1.0), 3, AmbientState::Peaceful, None);
        let b = WorldSnapshot::capture(&world_with_archer(1.0), 3, AmbientState::Peaceful, None);
        let hash = a.hash().unwrap();
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, b.hash().unwrap());
    }

    #[test]
    fn any_difference_changes_the_hash() {
        let base = WorldSnapshot::capture(&world_with_archer(1.0), 3, AmbientState::Peaceful, None);
        let moved = WorldSnapshot::capture(&world_with_archer(1.5), 3, AmbientState::Peaceful, None);
        let later = WorldSnapshot::capture(&world_with_archer(1.0), 4, AmbientState::Peaceful, None);
        assert_ne!(base.hash().unwrap(), moved.hash().unwrap());
        assert_ne!(base.hash().unwrap(), later.hash().unwrap());
    }

    #[test]
    fn entities_in_id_order() {
        let mut world = World::new();
        let a = world.create_entity();
        let b = world.create_entity();
        let c = world.create_entity();
        world.destroy_entity(b);
        let snap = WorldSnapshot::capture(&world, 0, AmbientState::Peaceful, None);
        let ids: Vec<EntityId> = snap.entities.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![a, c]);
        assert!(snap.to_json().unwrap().contains("\"tick\": 0"));
    }
}
