//! Garrison gameplay core.
//!
//! Builds the RTS rules on top of [`garrison_ecs`]: the component set, unit
//! factories, barracks capture, troop production, selection queries, the
//! ambient mood classifier, victory detection, and a fixed-step
//! [`Simulation`](simulation::Simulation) driver that wires them together.
//!
//! Per-tick system order is fixed: **production, then capture**. The victory
//! service and ambient manager are sampled by the driver after the world
//! update.

#![deny(unsafe_code)]

pub mod ambient;
pub mod capture;
pub mod collaborators;
pub mod components;
pub mod config;
pub mod events;
pub mod factory;
pub mod ownership;
pub mod production;
pub mod selection;
pub mod simulation;
pub mod snapshot;
pub mod troops;
pub mod victory;

use garrison_ecs::entity::EntityId;
use garrison_ecs::world::World;
use garrison_ecs::EcsError;

use crate::components::Unit;
use crate::ownership::OwnerId;
use crate::troops::TroopConfig;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced while configuring or loading the game layer.
///
/// Gameplay operations themselves never fail: missing entities are skipped
/// and rule violations come back as result values.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// A configuration document could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// A configuration parsed but holds an out-of-range value.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// A unit type string did not name any known troop or building.
    #[error("unknown unit type '{name}'")]
    UnknownUnitType { name: String },

    /// Reading a configuration file failed.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// An ECS operation failed.
    #[error(transparent)]
    Ecs(#[from] EcsError),
}

// ---------------------------------------------------------------------------
// Ownership queries
// ---------------------------------------------------------------------------

/// Owner-based scans over every entity with a [`Unit`].
///
/// These are linear and uncached; entity counts stay in the hundreds.
pub trait OwnershipQueries {
    /// Entities whose unit belongs to `owner`, ascending id.
    fn units_owned_by(&self, owner: OwnerId) -> Vec<EntityId>;

    /// Entities whose unit does not belong to `owner` (neutral included).
    fn units_not_owned_by(&self, owner: OwnerId) -> Vec<EntityId>;

    /// Total weight of `owner`'s living, non-building units.
    fn troop_count_for(&self, owner: OwnerId, troops: &TroopConfig) -> i32;
}

impl OwnershipQueries for World {
    fn units_owned_by(&self, owner: OwnerId) -> Vec<EntityId> {
        self.iter_with::<Unit>()
            .filter(|(_, u)| u.owner_id == owner)
            .map(|(id, _)| id)
            .collect()
    }

    fn units_not_owned_by(&self, owner: OwnerId) -> Vec<EntityId> {
        self.iter_with::<Unit>()
            .filter(|(_, u)| u.owner_id != owner)
            .map(|(id, _)| id)
            .collect()
    }

    fn troop_count_for(&self, owner: OwnerId, troops: &TroopConfig) -> i32 {
        self.iter_with::<Unit>()
            .filter(|(_, u)| u.owner_id == owner && u.is_living_troop())
            .map(|(_, u)| troops.individuals_per_unit(u.unit_type))
            .sum()
    }
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::ambient::{AmbientStateChange, AmbientState, AmbientStateManager, BarracksPresence};
    pub use crate::capture::CaptureSystem;
    pub use crate::collaborators::{BuildingCollisionRegistry, BuildingRegistry};
    pub use crate::components::*;
    pub use crate::config::{AmbientConfig, CaptureConfig, GameConfig, ProductionConfig};
    pub use crate::events::{EventBus, EventRecorder, GameEvent, SubscriptionId};
    pub use crate::factory::{
        order_attack, order_guard, order_move, order_patrol, set_hold_mode, CoordSystem,
        MapDefinition, MapSpawn, SpawnParams, UnitFactory, VisualCatalog, VisualDef,
    };
    pub use crate::ownership::{is_neutral, team_color, OwnerId, NEUTRAL_OWNER_ID};
    pub use crate::production::{ProductionResult, ProductionService, ProductionState, ProductionSystem};
    pub use crate::selection::{CommandMode, ModeAvailability, SelectionQueryService, SelectionSet};
    pub use crate::simulation::{Simulation, TickDiagnostics};
    pub use crate::snapshot::WorldSnapshot;
    pub use crate::troops::{BuildingType, TroopClass, TroopConfig, TroopType, UnitType};
    pub use crate::victory::{DefeatCondition, VictoryCondition, VictoryConfig, VictoryOutcome, VictoryService};
    pub use crate::{GameError, OwnershipQueries};
    pub use garrison_ecs::prelude::*;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
