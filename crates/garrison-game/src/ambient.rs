//! Ambient mood classification.
//!
//! Presentation layers (music, lighting) want a coarse idea of how the match
//! feels for the local player. [`AmbientStateManager`] samples the world on a
//! fixed interval rather than every tick and publishes
//! [`GameEvent::AmbientStateChanged`] only on an actual transition.

use garrison_ecs::world::World;
use serde::Serialize;

use crate::components::{ground_distance_sq, AttackTarget, Transform, Unit};
use crate::config::AmbientConfig;
use crate::events::{EventBus, GameEvent};
use crate::ownership::{is_neutral, OwnerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbientState {
    #[default]
    Peaceful,
    Tense,
    Combat,
    Victory,
    Defeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AmbientStateChange {
    pub new_state: AmbientState,
    pub previous_state: AmbientState,
}

/// Whether each side still has a living barracks-class building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BarracksPresence {
    pub enemy_barracks_alive: bool,
    pub player_barracks_alive: bool,
}

impl BarracksPresence {
    /// Compute the pair from the world. Neutral barracks belong to neither
    /// side.
    pub fn scan(world: &World, local_owner: OwnerId) -> Self {
        let mut presence = BarracksPresence::default();
        for (_, unit) in world.iter_with::<Unit>() {
            if !unit.is_alive() || !unit.unit_type.is_barracks_class() {
                continue;
            }
            if unit.owner_id == local_owner {
                presence.player_barracks_alive = true;
            } else if !is_neutral(unit.owner_id) {
                presence.enemy_barracks_alive = true;
            }
        }
        presence
    }
}

#[derive(Debug)]
pub struct AmbientStateManager {
    config: AmbientConfig,
    bus: EventBus,
    timer: f32,
    current: AmbientState,
}

impl AmbientStateManager {
    pub fn new(config: AmbientConfig, bus: EventBus) -> Self {
        Self {
            config,
            bus,
            timer: 0.0,
            current: AmbientState::Peaceful,
        }
    }

    pub fn current(&self) -> AmbientState {
        self.current
    }

    /// Back to peaceful with an empty accumulator. Publishes nothing.
    pub fn reset(&mut self) {
        self.timer = 0.0;
        self.current = AmbientState::Peaceful;
    }

    /// Accumulate `dt` and, once the check interval has elapsed, reclassify.
    ///
    /// Rules in priority order: a `"victory"` or `"defeat"` signal, local
    /// units in combat, both sides holding a barracks, otherwise peaceful.
    /// Any other non-empty signal is ignored and the remaining rules decide.
    pub fn update(
        &mut self,
        dt: f32,
        world: &World,
        local_owner: OwnerId,
        presence: BarracksPresence,
        victory_state: &str,
    ) -> Option<AmbientStateChange> {
        self.timer += dt;
        if self.timer < self.config.check_interval {
            return None;
        }
        self.timer = 0.0;

        let new_state = match victory_state {
            "victory" => AmbientState::Victory,
            "defeat" => AmbientState::Defeat,
            _ if self.player_in_combat(world, local_owner) => AmbientState::Combat,
            _ if presence.enemy_barracks_alive && presence.player_barracks_alive => AmbientState::Tense,
            _ => AmbientState::Peaceful,
        };
        if new_state == self.current {
            return None;
        }

        let change = AmbientStateChange {
            new_state,
            previous_state: std::mem::replace(&mut self.current, new_state),
        };
        tracing::info!(from = ?change.previous_state, to = ?change.new_state, "ambient state changed");
        self.bus.publish(GameEvent::AmbientStateChanged {
            new_state: change.new_state,
            previous_state: change.previous_state,
        });
        Some(change)
    }

    /// A living local unit is attacking, or stands strictly within the
    /// combat radius of a living unit it does not own.
    pub fn player_in_combat(&self, world: &World, local_owner: OwnerId) -> bool {
        let radius_sq = self.config.combat_radius * self.config.combat_radius;
        let positioned = |own: bool| {
            world.iter_with::<Unit>().filter_map(move |(id, u)| {
                if !u.is_alive() || (u.owner_id == local_owner) != own {
                    return None;
                }
                Some((id, world.get_component::<Transform>(id)))
            })
        };

        for (id, transform) in positioned(true) {
            if world.has_component::<AttackTarget>(id) {
                return true;
            }
            let Some(mine) = transform else {
                continue;
            };
            let near = positioned(false).any(|(_, other)| {
                other.is_some_and(|t| {
                    ground_distance_sq(mine.position.x, mine.position.z, t.position.x, t.position.z) < radius_sq
                })
            });
            if near {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::order_attack;
    use crate::ownership::NEUTRAL_OWNER_ID;
    use crate::troops::{BuildingType, TroopType};
    use garrison_ecs::entity::EntityId;

    fn place(world: &mut World, kind: impl Into<crate::troops::UnitType>, owner: OwnerId, x: f32) -> EntityId {
        let id = world.spawn_with(Unit::new(kind.into(), owner));
        world.insert_component(id, Transform::at(x, 0.0, 0.0)).unwrap();
        id
    }

    fn manager() -> (AmbientStateManager, EventBus) {
        let bus = EventBus::new();
        (AmbientStateManager::new(AmbientConfig::default(), bus.clone()), bus)
    }

    #[test]
    fn samples_only_on_interval() {
        let mut world = World::new();
        place(&mut world, TroopType::Archer, 1, 0.0);
        place(&mut world, TroopType::Archer, 2, 5.0);
        let (mut mgr, _bus) = manager();

        assert_eq!(mgr.update(1.0, &world, 1, BarracksPresence::default(), ""), None);
        assert_eq!(mgr.current(), AmbientState::Peaceful);
        let change = mgr.update(1.0, &world, 1, BarracksPresence::default(), "").unwrap();
        assert_eq!(change.new_state, AmbientState::Combat);
        assert_eq!(change.previous_state, AmbientState::Peaceful);
    }

    #[test]
    fn victory_signal_wins_over_combat() {
        let mut world = World::new();
        place(&mut world, TroopType::Archer, 1, 0.0);
        place(&mut world, TroopType::Archer, 2, 1.0);
        let (mut mgr, bus) = manager();
        let rec = bus.recorder();
        let both = BarracksPresence {
            enemy_barracks_alive: true,
            player_barracks_alive: true,
        };

        mgr.update(2.0, &world, 1, both, "victory");
        assert_eq!(mgr.current(), AmbientState::Victory);
        mgr.update(2.0, &world, 1, both, "defeat");
        assert_eq!(mgr.current(), AmbientState::Defeat);
        assert_eq!(rec.len(), 2);
    }

    #[test]
    fn unknown_signal_falls_through() {
        let world = World::new();
        let (mut mgr, _bus) = manager();
        let both = BarracksPresence {
            enemy_barracks_alive: true,
            player_barracks_alive: true,
        };
        mgr.update(2.0, &world, 1, both, "draw");
        assert_eq!(mgr.current(), AmbientState::Tense);
    }

    #[test]
    fn change_event_fires_once_per_transition() {
        let world = World::new();
        let (mut mgr, bus) = manager();
        let rec = bus.recorder();
        let both = BarracksPresence {
            enemy_barracks_alive: true,
            player_barracks_alive: true,
        };
        for _ in 0..5 {
            mgr.update(2.0, &world, 1, both, "");
        }
        assert_eq!(
            rec.drain(),
            vec![GameEvent::AmbientStateChanged {
                new_state: AmbientState::Tense,
                previous_state: AmbientState::Peaceful,
            }]
        );
        for _ in 0..3 {
            mgr.update(2.0, &world, 1, BarracksPresence::default(), "");
        }
        assert_eq!(rec.len(), 1);

        mgr.reset();
        assert_eq!(mgr.current(), AmbientState::Peaceful);
        assert_eq!(rec.len(), 1);
    }

    #[test]
    fn combat_radius_is_strict_and_ignores_dead() {
        let mut world = World::new();
        let (mgr, _bus) = manager();
        place(&mut world, TroopType::Archer, 1, 0.0);
        let enemy = place(&mut world, TroopType::Archer, 2, 15.0);
        assert!(!mgr.player_in_combat(&world, 1));

        world.get_component_mut::<Transform>(enemy).unwrap().position.x = 14.9;
        assert!(mgr.player_in_combat(&world, 1));

        world.get_component_mut::<Unit>(enemy).unwrap().health = 0;
        assert!(!mgr.player_in_combat(&world, 1));
    }

    #[test]
    fn attack_target_counts_as_combat() {
        let mut world = World::new();
        let (mgr, _bus) = manager();
        let mine = world.spawn_with(Unit::new(TroopType::Archer.into(), 1));
        let far = place(&mut world, TroopType::Archer, 2, 100.0);
        assert!(!mgr.player_in_combat(&world, 1));
        order_attack(&mut world, mine, far, true);
        assert!(mgr.player_in_combat(&world, 1));
    }

    #[test]
    fn presence_scan() {
        let mut world = World::new();
        place(&mut world, BuildingType::Barracks, 1, 0.0);
        place(&mut world, BuildingType::Barracks, NEUTRAL_OWNER_ID, 50.0);
        let presence = BarracksPresence::scan(&world, 1);
        assert!(presence.player_barracks_alive);
        assert!(!presence.enemy_barracks_alive);

        let enemy = place(&mut world, BuildingType::Barracks, 3, 90.0);
        assert!(BarracksPresence::scan(&world, 1).enemy_barracks_alive);
        world.get_component_mut::<Unit>(enemy).unwrap().health = 0;
        assert!(!BarracksPresence::scan(&world, 1).enemy_barracks_alive);
    }
}
