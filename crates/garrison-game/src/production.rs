//! Troop production: player commands and the per-tick production system.
//!
//! [`ProductionService`] validates and enqueues player requests against the
//! first owned barracks in a selection. [`ProductionSystem`] counts down the
//! in-flight product of every owned building, spawns finished units at the
//! building's exit and starts the next queued product.
//!
//! Weights, not unit counts, drive every limit: a unit's weight is its
//! catalog `individuals_per_unit`.

use std::rc::Rc;

use garrison_ecs::entity::EntityId;
use garrison_ecs::system::System;
use garrison_ecs::world::World;
use serde::Serialize;

use crate::components::{AIControlled, Production, RallyPoint, Transform, Unit};
use crate::config::ProductionConfig;
use crate::factory::{order_move, SpawnParams, UnitFactory};
use crate::ownership::{is_neutral, OwnerId};
use crate::troops::{TroopConfig, TroopType};
use crate::OwnershipQueries;

/// Production installed on a newly owned barracks: archers, rally point
/// offset from the building, build time and cost from the catalog.
pub fn default_barracks_production(
    troops: &TroopConfig,
    x: f32,
    z: f32,
    max_units: i32,
    rally_offset: (f32, f32),
) -> Production {
    let product = TroopType::Archer;
    Production {
        product_type: product,
        max_units,
        build_time: troops.build_time(product),
        villager_cost: troops.troop_weight(product),
        rally: Some(RallyPoint {
            x: x + rally_offset.0,
            z: z + rally_offset.1,
        }),
        ..Production::default()
    }
}

/// First entity in `selected` that still exists and is a living barracks
/// owned by `owner`. Selection order decides; there is no "best" match.
pub fn find_owned_barracks(world: &World, selected: &[EntityId], owner: OwnerId) -> Option<EntityId> {
    selected.iter().copied().find(|&id| {
        world.get_component::<Unit>(id).is_some_and(|u| {
            u.owner_id == owner && u.is_alive() && u.unit_type.is_barracks_class()
        })
    })
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Outcome of [`ProductionService::start_production`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductionResult {
    Success,
    NoBarracks,
    PerBarracksLimitReached,
    GlobalTroopLimitReached,
    QueueFull,
}

impl ProductionResult {
    pub fn is_success(self) -> bool {
        self == ProductionResult::Success
    }
}

/// Read-only view of the selected barracks' production.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ProductionState {
    pub has_barracks: bool,
    pub building: Option<EntityId>,
    pub in_progress: bool,
    pub product_type: Option<TroopType>,
    pub time_remaining: f32,
    pub build_time: f32,
    pub produced_count: i32,
    pub max_units: i32,
    pub villager_cost: i32,
    pub queue_depth: usize,
    pub queue: Vec<TroopType>,
    pub rally: Option<RallyPoint>,
}

// ---------------------------------------------------------------------------
// ProductionService
// ---------------------------------------------------------------------------

/// Validates and applies production commands.
#[derive(Debug, Clone)]
pub struct ProductionService {
    troops: Rc<TroopConfig>,
    config: ProductionConfig,
    max_troops_per_player: i32,
}

impl ProductionService {
    pub fn new(troops: Rc<TroopConfig>, config: ProductionConfig, max_troops_per_player: i32) -> Self {
        Self {
            troops,
            config,
            max_troops_per_player,
        }
    }

    /// Production a barracks gets when a command finds it has none.
    fn fallback_production(&self) -> Production {
        Production {
            max_units: self.config.fallback_max_units,
            ..Production::default()
        }
    }

    /// Weight of the in-flight product plus every queued product.
    fn committed_weight(&self, prod: &Production) -> i32 {
        let in_flight = if prod.in_progress {
            self.troops.troop_weight(prod.product_type)
        } else {
            0
        };
        in_flight
            + prod
                .queue
                .iter()
                .map(|t| self.troops.troop_weight(*t))
                .sum::<i32>()
    }

    /// Request one `troop` from the first owned barracks in `selected`.
    ///
    /// Checks run in order: barracks present, per-barracks cap, per-player
    /// cap, queue depth. A rejection leaves the world untouched.
    pub fn start_production(
        &self,
        world: &mut World,
        selected: &[EntityId],
        owner: OwnerId,
        troop: TroopType,
    ) -> ProductionResult {
        let Some(building) = find_owned_barracks(world, selected, owner) else {
            return ProductionResult::NoBarracks;
        };
        let weight = self.troops.troop_weight(troop);
        let current = world
            .get_component::<Production>(building)
            .cloned()
            .unwrap_or_else(|| self.fallback_production());

        let result = if current.produced_count + self.committed_weight(&current) + weight
            > current.max_units
        {
            ProductionResult::PerBarracksLimitReached
        } else if world.troop_count_for(owner, &self.troops) + weight > self.max_troops_per_player {
            ProductionResult::GlobalTroopLimitReached
        } else if current.pending_len() >= self.config.max_queue_depth {
            ProductionResult::QueueFull
        } else {
            ProductionResult::Success
        };
        if !result.is_success() {
            tracing::debug!(entity = %building, owner, troop = %troop, ?result, "production rejected");
            return result;
        }

        if !world.has_component::<Production>(building) {
            if let Err(err) = world.insert_component(building, current) {
                tracing::warn!(%err, entity = %building, "could not attach production");
                return ProductionResult::NoBarracks;
            }
        }
        if let Some(prod) = world.get_component_mut::<Production>(building) {
            if prod.in_progress {
                prod.queue.push_back(troop);
            } else {
                prod.product_type = troop;
                prod.build_time = self.troops.build_time(troop);
                prod.time_remaining = prod.build_time;
                prod.villager_cost = weight;
                prod.in_progress = true;
            }
            tracing::debug!(
                entity = %building,
                owner,
                troop = %troop,
                queued = prod.queue.len(),
                "production accepted"
            );
        }
        ProductionResult::Success
    }

    /// Set the rally point of the first owned barracks in `selected`.
    /// Returns `false` when there is none.
    pub fn set_rally(&self, world: &mut World, selected: &[EntityId], owner: OwnerId, x: f32, z: f32) -> bool {
        let Some(building) = find_owned_barracks(world, selected, owner) else {
            return false;
        };
        if !world.has_component::<Production>(building) {
            if let Err(err) = world.insert_component(building, self.fallback_production()) {
                tracing::warn!(%err, entity = %building, "could not attach production");
                return false;
            }
        }
        match world.get_component_mut::<Production>(building) {
            Some(prod) => {
                prod.rally = Some(RallyPoint { x, z });
                true
            }
            None => false,
        }
    }

    /// Snapshot of the first owned barracks in `selected`.
    pub fn production_state(&self, world: &World, selected: &[EntityId], owner: OwnerId) -> ProductionState {
        let Some(building) = find_owned_barracks(world, selected, owner) else {
            return ProductionState::default();
        };
        let mut state = ProductionState {
            has_barracks: true,
            building: Some(building),
            ..ProductionState::default()
        };
        if let Some(p) = world.get_component::<Production>(building) {
            state.in_progress = p.in_progress;
            state.product_type = Some(p.product_type);
            state.time_remaining = p.time_remaining;
            state.build_time = p.build_time;
            state.produced_count = p.produced_count;
            state.max_units = p.max_units;
            state.villager_cost = p.villager_cost;
            state.queue_depth = p.queue.len();
            state.queue = p.queue.iter().copied().collect();
            state.rally = p.rally;
        }
        state
    }
}

// ---------------------------------------------------------------------------
// ProductionSystem
// ---------------------------------------------------------------------------

/// Per-tick countdown and spawning for every owned building with an
/// in-flight product.
#[derive(Debug)]
pub struct ProductionSystem {
    factory: UnitFactory,
    troops: Rc<TroopConfig>,
    max_troops_per_player: i32,
}

impl ProductionSystem {
    pub const NAME: &'static str = "production";

    pub fn new(factory: UnitFactory, troops: Rc<TroopConfig>, max_troops_per_player: i32) -> Self {
        Self {
            factory,
            troops,
            max_troops_per_player,
        }
    }

    /// Exit point for the `produced`-th unit: a slowly widening spiral
    /// around the building.
    pub fn exit_position(x: f32, z: f32, produced: i32) -> (f32, f32) {
        let radius = 2.5 + 0.2 * (produced % 5) as f32;
        let angle = 0.5 * (produced % 8) as f32;
        (x + radius * angle.cos(), z + radius * angle.sin())
    }

    fn tick_building(&self, world: &mut World, id: EntityId, dt: f32) {
        let (owner, x, z) = match (world.get_component::<Unit>(id), world.get_component::<Transform>(id)) {
            (Some(u), Some(t)) => (u.owner_id, t.position.x, t.position.z),
            _ => return,
        };
        if is_neutral(owner) {
            return;
        }
        let ai_controlled = world.has_component::<AIControlled>(id);

        let Some(prod) = world.get_component_mut::<Production>(id) else {
            return;
        };
        if !prod.in_progress {
            return;
        }
        let weight = self.troops.troop_weight(prod.product_type);
        if prod.produced_count + weight > prod.max_units {
            prod.in_progress = false;
            return;
        }
        prod.time_remaining -= dt;
        if prod.time_remaining > 0.0 {
            return;
        }
        let product = prod.product_type;
        let produced = prod.produced_count;
        let rally = prod.rally;

        if world.troop_count_for(owner, &self.troops) + weight > self.max_troops_per_player {
            if let Some(prod) = world.get_component_mut::<Production>(id) {
                prod.in_progress = false;
                prod.time_remaining = 0.0;
            }
            tracing::debug!(entity = %id, owner, "troop cap reached, production halted");
            return;
        }

        let (ex, ez) = Self::exit_position(x, z, produced);
        let params = SpawnParams::new(product, ex, ez, owner).ai(ai_controlled);
        let spawned = self.factory.spawn(world, &params);
        if let Some(rally) = rally {
            order_move(world, spawned, rally.x, rally.z);
        }

        if let Some(prod) = world.get_component_mut::<Production>(id) {
            prod.produced_count += weight;
            prod.in_progress = false;
            prod.time_remaining = 0.0;
            if let Some(next) = prod.queue.pop_front() {
                prod.product_type = next;
                prod.build_time = self.troops.build_time(next);
                prod.villager_cost = self.troops.troop_weight(next);
                prod.time_remaining = prod.build_time;
                prod.in_progress = true;
            }
        }
        tracing::debug!(entity = %id, unit = %spawned, troop = %product, "unit produced");
    }
}

impl System for ProductionSystem {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn update(&mut self, world: &mut World, dt: f32) {
        for id in world.entities_with::<Production>() {
            self.tick_building(world, id, dt);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::BuildingCollisionRegistry;
    use crate::components::Movement;
    use crate::events::EventBus;
    use crate::troops::BuildingType;

    struct Fixture {
        world: World,
        factory: UnitFactory,
        troops: Rc<TroopConfig>,
    }

    fn fixture() -> Fixture {
        let troops = Rc::new(TroopConfig::new());
        let factory = UnitFactory::new(
            troops.clone(),
            EventBus::new(),
            Rc::new(BuildingCollisionRegistry::new()),
            ProductionConfig::default(),
        );
        Fixture {
            world: World::new(),
            factory,
            troops,
        }
    }

    fn service(troops: &Rc<TroopConfig>, cap: i32) -> ProductionService {
        ProductionService::new(troops.clone(), ProductionConfig::default(), cap)
    }

    #[test]
    fn first_owned_barracks_wins() {
        let mut fx = fixture();
        let enemy = fx.factory.spawn(&mut fx.world, &SpawnParams::new(BuildingType::Barracks, 0.0, 0.0, 2));
        let archer = fx.factory.spawn(&mut fx.world, &SpawnParams::new(TroopType::Archer, 0.0, 0.0, 1));
        let first = fx.factory.spawn(&mut fx.world, &SpawnParams::new(BuildingType::Barracks, 5.0, 0.0, 1));
        let second = fx.factory.spawn(&mut fx.world, &SpawnParams::new(BuildingType::Barracks, 9.0, 0.0, 1));

        assert_eq!(find_owned_barracks(&fx.world, &[enemy, archer, second, first], 1), Some(second));
        assert_eq!(find_owned_barracks(&fx.world, &[enemy, archer, first, second], 1), Some(first));
        assert_eq!(find_owned_barracks(&fx.world, &[enemy, archer], 1), None);
    }

    #[test]
    fn no_barracks_result() {
        let mut fx = fixture();
        let svc = service(&fx.troops, 50);
        let archer = fx.factory.spawn(&mut fx.world, &SpawnParams::new(TroopType::Archer, 0.0, 0.0, 1));
        assert_eq!(
            svc.start_production(&mut fx.world, &[archer], 1, TroopType::Archer),
            ProductionResult::NoBarracks
        );
        assert_eq!(svc.production_state(&fx.world, &[archer], 1), ProductionState::default());
    }

    #[test]
    fn idle_building_starts_then_queues() {
        let mut fx = fixture();
        let svc = service(&fx.troops, 1000);
        let b = fx.factory.spawn(&mut fx.world, &SpawnParams::new(BuildingType::Barracks, 0.0, 0.0, 1));

        assert!(svc.start_production(&mut fx.world, &[b], 1, TroopType::Swordsman).is_success());
        assert!(svc.start_production(&mut fx.world, &[b], 1, TroopType::Spearman).is_success());
        let state = svc.production_state(&fx.world, &[b], 1);
        assert!(state.in_progress);
        assert_eq!(state.product_type, Some(TroopType::Swordsman));
        assert_eq!(state.time_remaining, 7.0);
        assert_eq!(state.villager_cost, 15);
        assert_eq!(state.queue, vec![TroopType::Spearman]);
    }

    #[test]
    fn queue_full_rejects_without_mutation() {
        let mut fx = fixture();
        let svc = service(&fx.troops, 10_000);
        let b = fx.factory.spawn(
            &mut fx.world,
            &SpawnParams::new(BuildingType::Barracks, 0.0, 0.0, 1).with_max_population(10_000),
        );
        for _ in 0..5 {
            assert!(svc.start_production(&mut fx.world, &[b], 1, TroopType::Builder).is_success());
        }
        let before = fx.world.get_component::<Production>(b).cloned();
        assert_eq!(
            svc.start_production(&mut fx.world, &[b], 1, TroopType::Builder),
            ProductionResult::QueueFull
        );
        assert_eq!(fx.world.get_component::<Production>(b).cloned(), before);
    }

    #[test]
    fn global_cap_counts_live_troops() {
        let mut fx = fixture();
        let svc = service(&fx.troops, 50);
        let b = fx.factory.spawn(&mut fx.world, &SpawnParams::new(BuildingType::Barracks, 0.0, 0.0, 1));
        fx.factory.spawn(&mut fx.world, &SpawnParams::new(TroopType::Archer, 30.0, 0.0, 1));
        fx.factory.spawn(&mut fx.world, &SpawnParams::new(TroopType::Archer, 31.0, 0.0, 1));
        // 40 live + 20 > 50.
        assert_eq!(
            svc.start_production(&mut fx.world, &[b], 1, TroopType::Archer),
            ProductionResult::GlobalTroopLimitReached
        );
        // 40 live + 9 fits.
        assert!(svc.start_production(&mut fx.world, &[b], 1, TroopType::MountedKnight).is_success());
    }

    #[test]
    fn rally_creates_production_when_missing() {
        let mut fx = fixture();
        let svc = service(&fx.troops, 50);
        let b = fx.world.create_entity();
        fx.world.insert_component(b, Unit::new(BuildingType::Barracks.into(), 1)).unwrap();

        assert!(svc.set_rally(&mut fx.world, &[b], 1, 3.0, 4.0));
        assert!(svc.set_rally(&mut fx.world, &[b], 1, 7.0, 8.0));
        let prod = fx.world.get_component::<Production>(b).unwrap();
        assert_eq!(prod.rally, Some(RallyPoint { x: 7.0, z: 8.0 }));
        assert_eq!(prod.max_units, ProductionConfig::default().fallback_max_units);
        assert!(!svc.set_rally(&mut fx.world, &[b], 2, 0.0, 0.0));
    }

    #[test]
    fn start_attaches_fallback_production_when_missing() {
        let mut fx = fixture();
        let svc = service(&fx.troops, 50);
        let b = fx.world.spawn_with(Unit::new(BuildingType::Barracks.into(), 1));
        assert!(!fx.world.has_component::<Production>(b));

        assert!(svc.start_production(&mut fx.world, &[b], 1, TroopType::Builder).is_success());
        let prod = fx.world.get_component::<Production>(b).unwrap();
        assert!(prod.in_progress);
        assert_eq!(prod.product_type, TroopType::Builder);
        assert_eq!(prod.villager_cost, 1);
        assert_eq!(prod.max_units, ProductionConfig::default().fallback_max_units);
        assert!(prod.queue.is_empty());
    }

    #[test]
    fn exit_positions_spiral() {
        let (x0, z0) = ProductionSystem::exit_position(0.0, 0.0, 0);
        assert_eq!((x0, z0), (2.5, 0.0));
        let (x5, z5) = ProductionSystem::exit_position(0.0, 0.0, 5);
        let r5 = (x5 * x5 + z5 * z5).sqrt();
        assert!((r5 - 2.5).abs() < 1e-5);
    }

    #[test]
    fn system_spawns_and_drains_queue_fifo() {
        let mut fx = fixture();
        let svc = service(&fx.troops, 1000);
        let b = fx.factory.spawn(&mut fx.world, &SpawnParams::new(BuildingType::Barracks, 0.0, 0.0, 1).ai(true));
        svc.start_production(&mut fx.world, &[b], 1, TroopType::Builder);
        svc.start_production(&mut fx.world, &[b], 1, TroopType::Swordsman);
        svc.start_production(&mut fx.world, &[b], 1, TroopType::Archer);

        let mut system = ProductionSystem::new(fx.factory.clone(), fx.troops.clone(), 1000);
        let mut spawned_order = Vec::new();
        for _ in 0..400 {
            let before = fx.world.entity_ids();
            system.update(&mut fx.world, 0.1);
            for id in fx.world.entity_ids() {
                if !before.contains(&id) {
                    let unit = fx.world.get_component::<Unit>(id).unwrap();
                    spawned_order.push(unit.unit_type.troop().unwrap());
                    assert!(fx.world.has_component::<AIControlled>(id));
                    let mv = fx.world.get_component::<Movement>(id).unwrap();
                    assert!(mv.has_target);
                    assert_eq!((mv.target_x, mv.target_z), (4.0, 2.0));
                }
            }
        }
        assert_eq!(
            spawned_order,
            vec![TroopType::Builder, TroopType::Swordsman, TroopType::Archer]
        );
        let prod = fx.world.get_component::<Production>(b).unwrap();
        assert_eq!(prod.produced_count, 1 + 15 + 20);
        assert!(!prod.in_progress);
        assert!(prod.queue.is_empty());
    }

    #[test]
    fn system_halts_at_per_building_cap() {
        let mut fx = fixture();
        let b = fx.factory.spawn(&mut fx.world, &SpawnParams::new(BuildingType::Barracks, 0.0, 0.0, 1));
        if let Some(prod) = fx.world.get_component_mut::<Production>(b) {
            prod.produced_count = 90;
            prod.max_units = 100;
            prod.in_progress = true;
            prod.time_remaining = 0.01;
        }
        let mut system = ProductionSystem::new(fx.factory.clone(), fx.troops.clone(), 1000);
        let before = fx.world.entity_count();
        system.update(&mut fx.world, 0.1);
        assert_eq!(fx.world.entity_count(), before);
        assert!(!fx.world.get_component::<Production>(b).unwrap().in_progress);
    }

    #[test]
    fn system_halts_at_global_cap_without_spawning() {
        let mut fx = fixture();
        let b = fx.factory.spawn(&mut fx.world, &SpawnParams::new(BuildingType::Barracks, 0.0, 0.0, 1));
        fx.factory.spawn(&mut fx.world, &SpawnParams::new(TroopType::Archer, 40.0, 0.0, 1));
        if let Some(prod) = fx.world.get_component_mut::<Production>(b) {
            prod.in_progress = true;
            prod.time_remaining = 0.05;
            prod.queue.push_back(TroopType::Archer);
        }
        let mut system = ProductionSystem::new(fx.factory.clone(), fx.troops.clone(), 30);
        let before = fx.world.entity_count();
        system.update(&mut fx.world, 0.1);
        assert_eq!(fx.world.entity_count(), before);
        let prod = fx.world.get_component::<Production>(b).unwrap();
        assert!(!prod.in_progress);
        assert_eq!(prod.produced_count, 0);
        assert_eq!(prod.queue.len(), 1);
    }
}
