//! Match outcome detection for the local player.
//!
//! The service is polled once per tick. It first checks the configured win
//! condition, then the defeat conditions in order; the first decision sticks
//! until [`VictoryService::reset`].

use garrison_ecs::world::World;
use serde::{Deserialize, Serialize};

use crate::components::Unit;
use crate::ownership::{is_neutral, OwnerId};
use crate::troops::UnitType;

/// How the local player wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VictoryCondition {
    /// Destroy or take every enemy key structure.
    Elimination { key_structures: Vec<UnitType> },
    /// Hold out for `duration` seconds.
    SurviveTime { duration: f32 },
}

impl Default for VictoryCondition {
    fn default() -> Self {
        VictoryCondition::Elimination {
            key_structures: vec![UnitType::BARRACKS],
        }
    }
}

/// How the local player loses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefeatCondition {
    /// No living troop of the local player remains.
    NoUnits,
    /// No living key structure of the local player remains.
    NoKeyStructures,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VictoryConfig {
    pub condition: VictoryCondition,
    pub defeat_conditions: Vec<DefeatCondition>,
}

impl Default for VictoryConfig {
    fn default() -> Self {
        Self {
            condition: VictoryCondition::default(),
            defeat_conditions: vec![DefeatCondition::NoKeyStructures],
        }
    }
}

impl VictoryConfig {
    /// Structures whose loss decides the match. Survival maps still lose on
    /// barracks.
    pub fn key_structures(&self) -> &[UnitType] {
        match &self.condition {
            VictoryCondition::Elimination { key_structures } => key_structures.as_slice(),
            VictoryCondition::SurviveTime { .. } => &[UnitType::BARRACKS],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VictoryOutcome {
    Victory,
    Defeat,
}

impl VictoryOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            VictoryOutcome::Victory => "victory",
            VictoryOutcome::Defeat => "defeat",
        }
    }
}

#[derive(Debug, Clone)]
pub struct VictoryService {
    config: VictoryConfig,
    local_owner: OwnerId,
    elapsed: f32,
    outcome: Option<VictoryOutcome>,
}

impl VictoryService {
    pub fn new(config: VictoryConfig, local_owner: OwnerId) -> Self {
        let mut config = config;
        if config.defeat_conditions.is_empty() {
            config.defeat_conditions.push(DefeatCondition::NoKeyStructures);
        }
        Self {
            config,
            local_owner,
            elapsed: 0.0,
            outcome: None,
        }
    }

    pub fn config(&self) -> &VictoryConfig {
        &self.config
    }

    pub fn outcome(&self) -> Option<VictoryOutcome> {
        self.outcome
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// `""` while undecided, else `"victory"` or `"defeat"`.
    pub fn signal(&self) -> &'static str {
        self.outcome.map_or("", VictoryOutcome::as_str)
    }

    /// Forget any decision and restart the clock.
    pub fn reset(&mut self) {
        self.elapsed = 0.0;
        self.outcome = None;
    }

    /// Advance the clock and evaluate. Returns the outcome only on the tick
    /// it is decided.
    pub fn update(&mut self, world: &World, dt: f32) -> Option<VictoryOutcome> {
        if self.outcome.is_some() {
            return None;
        }
        if matches!(self.config.condition, VictoryCondition::SurviveTime { .. }) {
            self.elapsed += dt;
        }

        let decided = if self.won(world) {
            Some(VictoryOutcome::Victory)
        } else if self.lost(world) {
            Some(VictoryOutcome::Defeat)
        } else {
            None
        };
        if let Some(outcome) = decided {
            self.outcome = Some(outcome);
            tracing::info!(local_owner = self.local_owner, outcome = outcome.as_str(), elapsed = self.elapsed, "match decided");
        }
        decided
    }

    fn is_key(&self, unit: &Unit) -> bool {
        self.config.key_structures().contains(&unit.unit_type)
    }

    fn won(&self, world: &World) -> bool {
        match &self.config.condition {
            VictoryCondition::Elimination { .. } => !world.iter_with::<Unit>().any(|(_, u)| {
                u.is_alive() && u.owner_id != self.local_owner && !is_neutral(u.owner_id) && self.is_key(u)
            }),
            VictoryCondition::SurviveTime { duration } => self.elapsed >= *duration,
        }
    }

    fn lost(&self, world: &World) -> bool {
        let own = || {
            world
                .iter_with::<Unit>()
                .map(|(_, u)| u)
                .filter(|u| u.owner_id == self.local_owner && u.is_alive())
        };
        self.config.defeat_conditions.iter().any(|condition| match condition {
            DefeatCondition::NoUnits => !own().any(|u| !u.is_building()),
            DefeatCondition::NoKeyStructures => !own().any(|u| self.is_key(u)),
        })
    }
}
