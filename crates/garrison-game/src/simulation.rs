//! Fixed-step simulation driver.
//!
//! [`Simulation`] owns the world and every gameplay service. Each
//! [`tick`](Simulation::tick):
//!
//! 1. runs the registered systems (production, then capture),
//! 2. polls the victory service,
//! 3. feeds the ambient manager with the victory signal and the barracks
//!    presence scanned from the world,
//! 4. advances the tick counter.
//!
//! Nothing in the loop reads the wall clock or a random source, so identical
//! configurations and commands give identical [`state_hash`](Simulation::state_hash)es.
//!
//! # Example
//!
//! ```
//! use garrison_game::prelude::*;
//!
//! let mut sim = Simulation::new(GameConfig::default(), 1).unwrap();
//! let barracks = sim.spawn(&SpawnParams::new(BuildingType::Barracks, 0.0, 0.0, 1));
//! let result = sim.start_production(&[barracks], 1, TroopType::Builder);
//! assert_eq!(result, ProductionResult::Success);
//!
//! sim.run_ticks(150);
//! assert_eq!(sim.tick_count(), 150);
//! assert_eq!(sim.state_hash().unwrap().len(), 64);
//! ```

use std::rc::Rc;
use std::time::{Duration, Instant};

use garrison_ecs::entity::EntityId;
use garrison_ecs::system::UpdateDiagnostics;
use garrison_ecs::world::World;

use crate::ambient::{AmbientState, AmbientStateChange, AmbientStateManager, BarracksPresence};
use crate::capture::CaptureSystem;
use crate::collaborators::{BuildingCollisionRegistry, BuildingRegistry};
use crate::config::GameConfig;
use crate::events::EventBus;
use crate::factory::{MapDefinition, SpawnParams, UnitFactory, VisualCatalog};
use crate::ownership::OwnerId;
use crate::production::{ProductionResult, ProductionService, ProductionState, ProductionSystem};
use crate::selection::SelectionQueryService;
use crate::snapshot::WorldSnapshot;
use crate::troops::{TroopConfig, TroopType};
use crate::victory::{VictoryOutcome, VictoryService};
use crate::GameError;

// ---------------------------------------------------------------------------
// TickDiagnostics
// ---------------------------------------------------------------------------

/// What happened during one tick.
#[derive(Debug, Clone, Default)]
pub struct TickDiagnostics {
    /// Tick number after this tick completed.
    pub tick: u64,
    /// Per-system timings from the world update.
    pub update: UpdateDiagnostics,
    /// Set on the tick the match was decided.
    pub outcome: Option<VictoryOutcome>,
    /// Set on ticks where the ambient state changed.
    pub ambient_change: Option<AmbientStateChange>,
    /// Wall-clock time for the whole tick.
    pub total_time: Duration,
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Simulation {
    config: GameConfig,
    local_owner: OwnerId,
    world: World,
    bus: EventBus,
    troops: Rc<TroopConfig>,
    buildings: Rc<BuildingCollisionRegistry>,
    factory: UnitFactory,
    production: ProductionService,
    selection: SelectionQueryService,
    victory: VictoryService,
    ambient: AmbientStateManager,
    tick: u64,
    last_diagnostics: TickDiagnostics,
}

impl Simulation {
    /// Build a simulation with the default troop catalog.
    pub fn new(config: GameConfig, local_owner: OwnerId) -> Result<Self, GameError> {
        Self::with_troops(config, TroopConfig::new(), local_owner)
    }

    /// Build a simulation around a caller-supplied troop catalog.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidConfig`] if `config` fails validation.
    pub fn with_troops(config: GameConfig, troops: TroopConfig, local_owner: OwnerId) -> Result<Self, GameError> {
        config.validate()?;

        let troops = Rc::new(troops);
        let bus = EventBus::new();
        let buildings = Rc::new(BuildingCollisionRegistry::new());
        let factory = UnitFactory::new(troops.clone(), bus.clone(), buildings.clone(), config.production.clone());

        let mut world = World::new();
        world.add_system(Box::new(ProductionSystem::new(
            factory.clone(),
            troops.clone(),
            config.max_troops_per_player,
        )))?;
        world.add_system(Box::new(CaptureSystem::new(
            troops.clone(),
            bus.clone(),
            buildings.clone(),
            config.capture.clone(),
            config.production.clone(),
        )))?;

        tracing::info!(
            local_owner,
            fixed_dt = config.fixed_dt,
            max_troops_per_player = config.max_troops_per_player,
            systems = ?world.system_names(),
            "simulation ready"
        );

        Ok(Self {
            production: ProductionService::new(troops.clone(), config.production.clone(), config.max_troops_per_player),
            selection: SelectionQueryService::new(),
            victory: VictoryService::new(config.victory.clone(), local_owner),
            ambient: AmbientStateManager::new(config.ambient.clone(), bus.clone()),
            config,
            local_owner,
            world,
            bus,
            troops,
            buildings,
            factory,
            tick: 0,
            last_diagnostics: TickDiagnostics::default(),
        })
    }

    // -- accessors ----------------------------------------------------------

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn local_owner(&self) -> OwnerId {
        self.local_owner
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn troops(&self) -> &TroopConfig {
        &self.troops
    }

    pub fn buildings(&self) -> &BuildingCollisionRegistry {
        &self.buildings
    }

    pub fn factory(&self) -> &UnitFactory {
        &self.factory
    }

    pub fn production(&self) -> &ProductionService {
        &self.production
    }

    pub fn selection(&self) -> &SelectionQueryService {
        &self.selection
    }

    pub fn victory(&self) -> &VictoryService {
        &self.victory
    }

    pub fn ambient_state(&self) -> AmbientState {
        self.ambient.current()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Simulated seconds since construction.
    pub fn sim_time(&self) -> f64 {
        self.tick as f64 * f64::from(self.config.fixed_dt)
    }

    pub fn last_diagnostics(&self) -> &TickDiagnostics {
        &self.last_diagnostics
    }

    // -- commands -----------------------------------------------------------

    pub fn spawn(&mut self, params: &SpawnParams) -> EntityId {
        self.factory.spawn(&mut self.world, params)
    }

    /// Destroy `id` and drop its building footprint, if it had one. Returns
    /// `false` when the entity was already gone.
    pub fn despawn(&mut self, id: EntityId) -> bool {
        if !self.world.destroy_entity(id) {
            return false;
        }
        self.buildings.unregister_building(id);
        true
    }

    pub fn load_map(&mut self, map: &MapDefinition, visuals: Option<&VisualCatalog>) -> Vec<EntityId> {
        self.factory
            .spawn_map(&mut self.world, map, visuals, self.local_owner)
    }

    pub fn start_production(&mut self, selected: &[EntityId], owner: OwnerId, troop: TroopType) -> ProductionResult {
        self.production
            .start_production(&mut self.world, selected, owner, troop)
    }

    pub fn set_rally(&mut self, selected: &[EntityId], owner: OwnerId, x: f32, z: f32) -> bool {
        self.production
            .set_rally(&mut self.world, selected, owner, x, z)
    }

    pub fn production_state(&self, selected: &[EntityId], owner: OwnerId) -> ProductionState {
        self.production
            .production_state(&self.world, selected, owner)
    }

    /// Clear the match outcome and ambient mood, e.g. after a scenario
    /// restart.
    pub fn reset_outcome(&mut self) {
        self.victory.reset();
        self.ambient.reset();
    }

    // -- stepping -----------------------------------------------------------

    /// Advance one fixed step.
    pub fn tick(&mut self) -> &TickDiagnostics {
        let start = Instant::now();
        let dt = self.config.fixed_dt;

        let update = self.world.update(dt);
        let outcome = self.victory.update(&self.world, dt);
        let presence = BarracksPresence::scan(&self.world, self.local_owner);
        let ambient_change = self
            .ambient
            .update(dt, &self.world, self.local_owner, presence, self.victory.signal());
        self.tick += 1;

        self.last_diagnostics = TickDiagnostics {
            tick: self.tick,
            update,
            outcome,
            ambient_change,
            total_time: start.elapsed(),
        };
        tracing::trace!(
            tick = self.tick,
            entities = self.world.entity_count(),
            elapsed_us = self.last_diagnostics.total_time.as_micros() as u64,
            "tick complete"
        );
        &self.last_diagnostics
    }

    /// Run `count` ticks and return the new tick count.
    pub fn run_ticks(&mut self, count: u64) -> u64 {
        for _ in 0..count {
            self.tick();
        }
        self.tick
    }

    // -- snapshots ----------------------------------------------------------

    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot::capture(&self.world, self.tick, self.ambient.current(), self.victory.outcome())
    }

    /// BLAKE3 hex digest of [`snapshot`](Self::snapshot).
    pub fn state_hash(&self) -> Result<String, GameError> {
        self.snapshot().hash()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Unit;
    use crate::events::GameEvent;
    use crate::troops::BuildingType;

    #[test]
    fn systems_registered_in_fixed_order() {
        let sim = Simulation::new(GameConfig::default(), 1).unwrap();
        assert_eq!(sim.world().system_names(), &["production", "capture"]);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = GameConfig {
            fixed_dt: 0.0,
            ..GameConfig::default()
        };
        assert!(matches!(
            Simulation::new(config, 1).unwrap_err(),
            GameError::InvalidConfig { .. }
        ));
    }

    #[test]
    fn tick_reports_timings_and_counts() {
        let mut sim = Simulation::new(GameConfig::default(), 1).unwrap();
        let diag = sim.tick();
        assert_eq!(diag.tick, 1);
        assert_eq!(diag.update.system_times.len(), 2);
        assert_eq!(sim.run_ticks(9), 10);
        assert!((sim.sim_time() - 10.0 / 30.0).abs() < 1e-6);
    }

    #[test]
    fn despawn_unregisters_buildings() {
        let mut sim = Simulation::new(GameConfig::default(), 1).unwrap();
        let b = sim.spawn(&SpawnParams::new(BuildingType::Barracks, 0.0, 0.0, 1));
        let archer = sim.spawn(&SpawnParams::new(TroopType::Archer, 10.0, 0.0, 1));
        assert_eq!(sim.buildings().len(), 1);

        assert!(sim.despawn(archer));
        assert_eq!(sim.buildings().len(), 1);
        assert!(sim.despawn(b));
        assert!(sim.buildings().is_empty());
        assert!(!sim.world().is_alive(b));
        assert!(!sim.despawn(b));
    }

    #[test]
    fn production_spawns_through_the_tick_loop() {
        let mut sim = Simulation::new(GameConfig::default(), 1).unwrap();
        let rec = sim.bus().recorder();
        let b = sim.spawn(&SpawnParams::new(BuildingType::Barracks, 0.0, 0.0, 1));
        sim.spawn(&SpawnParams::new(BuildingType::Barracks, 80.0, 0.0, 2));
        assert!(sim.start_production(&[b], 1, TroopType::Builder).is_success());

        // Builder build time is 4 s: 120 ticks at 1/30 s, plus slack.
        sim.run_ticks(125);
        let spawned: Vec<_> = rec
            .events()
            .into_iter()
            .filter(|e| {
                matches!(
                    e,
                    GameEvent::UnitSpawned {
                        unit_type: crate::troops::UnitType::Troop(TroopType::Builder),
                        ..
                    }
                )
            })
            .collect();
        assert_eq!(spawned.len(), 1);
        assert_eq!(sim.production_state(&[b], 1).produced_count, 1);
    }

    #[test]
    fn ambient_turns_tense_and_victory_follows_elimination() {
        let mut sim = Simulation::new(GameConfig::default(), 1).unwrap();
        sim.spawn(&SpawnParams::new(BuildingType::Barracks, 0.0, 0.0, 1));
        let enemy = sim.spawn(&SpawnParams::new(BuildingType::Barracks, 100.0, 0.0, 2));

        sim.run_ticks(61);
        assert_eq!(sim.ambient_state(), AmbientState::Tense);
        assert_eq!(sim.victory().outcome(), None);

        sim.world_mut().get_component_mut::<Unit>(enemy).unwrap().health = 0;
        let diag = sim.tick();
        assert_eq!(diag.outcome, Some(VictoryOutcome::Victory));
        sim.run_ticks(60);
        assert_eq!(sim.ambient_state(), AmbientState::Victory);

        sim.reset_outcome();
        assert_eq!(sim.ambient_state(), AmbientState::Peaceful);
    }

    #[test]
    fn identical_runs_hash_identically() {
        let run = || {
            let mut sim = Simulation::new(GameConfig::default(), 1).unwrap();
            let b = sim.spawn(&SpawnParams::new(BuildingType::Barracks, 0.0, 0.0, 1));
            sim.spawn(&SpawnParams::new(BuildingType::Barracks, 20.0, 0.0, 2));
            sim.spawn(&SpawnParams::new(TroopType::Spearman, 18.0, 2.0, 1));
            sim.start_production(&[b], 1, TroopType::Swordsman);
            sim.run_ticks(300);
            sim.state_hash().unwrap()
        };
        assert_eq!(run(), run());
    }
}
