//! Tunable game rules.
//!
//! [`GameConfig`] deserializes from JSON with every field optional; missing
//! values take the defaults below. Always call [`GameConfig::validate`] (the
//! loaders do) before handing a config to the simulation.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::components::{DEFAULT_CAPTURE_TIME, DEFAULT_MAX_UNITS};
use crate::victory::{VictoryCondition, VictoryConfig};
use crate::GameError;

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Ground-plane radius around a barracks in which troops count.
    pub radius: f32,
    /// Attackers must field at least this many times the defenders' weight.
    pub advantage_multiplier: i32,
    /// Progress lost per second, as a multiple of `dt`, once the capture
    /// condition no longer holds.
    pub decay_rate: f32,
    /// Seconds of progress needed to take a building.
    pub required_time: f32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            radius: 8.0,
            advantage_multiplier: 3,
            decay_rate: 2.0,
            required_time: DEFAULT_CAPTURE_TIME,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductionConfig {
    /// Maximum in-flight plus queued products per building.
    pub max_queue_depth: usize,
    /// `max_units` for barracks installed by an ownership transfer.
    pub captured_max_units: i32,
    /// `max_units` for map-spawned barracks without an explicit population.
    pub default_max_population: i32,
    /// `max_units` for a Production created on demand by a command.
    pub fallback_max_units: i32,
    /// Default rally offset from the building, on the ground plane.
    pub rally_offset: (f32, f32),
}

impl Default for ProductionConfig {
    fn default() -> Self {
        Self {
            max_queue_depth: 5,
            captured_max_units: 150,
            default_max_population: 100,
            fallback_max_units: DEFAULT_MAX_UNITS,
            rally_offset: (4.0, 2.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbientConfig {
    /// Seconds between classifications.
    pub check_interval: f32,
    /// Units closer than this to an enemy count as in combat.
    pub combat_radius: f32,
}

impl Default for AmbientConfig {
    fn default() -> Self {
        Self {
            check_interval: 2.0,
            combat_radius: 15.0,
        }
    }
}

// ---------------------------------------------------------------------------
// GameConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Seconds advanced per simulation tick.
    pub fixed_dt: f32,
    /// Live troop weight cap per owner.
    pub max_troops_per_player: i32,
    pub capture: CaptureConfig,
    pub production: ProductionConfig,
    pub ambient: AmbientConfig,
    pub victory: VictoryConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 30.0,
            max_troops_per_player: 50,
            capture: CaptureConfig::default(),
            production: ProductionConfig::default(),
            ambient: AmbientConfig::default(),
            victory: VictoryConfig::default(),
        }
    }
}

impl GameConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, GameError> {
        let config: GameConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, GameError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&raw)?;
        tracing::info!(path = %path.as_ref().display(), "loaded game config");
        Ok(config)
    }

    /// Check that times, radii and limits are in range.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<(), GameError> {
        fn positive(name: &str, value: f32) -> Result<(), GameError> {
            if value > 0.0 && value.is_finite() {
                Ok(())
            } else {
                Err(GameError::InvalidConfig {
                    reason: format!("{name} must be a positive finite number, got {value}"),
                })
            }
        }

        positive("fixed_dt", self.fixed_dt)?;
        positive("capture.radius", self.capture.radius)?;
        positive("capture.required_time", self.capture.required_time)?;
        positive("capture.decay_rate", self.capture.decay_rate)?;
        positive("ambient.check_interval", self.ambient.check_interval)?;
        positive("ambient.combat_radius", self.ambient.combat_radius)?;

        if let VictoryCondition::SurviveTime { duration } = self.victory.condition {
            positive("victory.condition.duration", duration)?;
        }

        if self.capture.advantage_multiplier < 1 {
            return Err(GameError::InvalidConfig {
                reason: "capture.advantage_multiplier must be at least 1".to_owned(),
            });
        }
        if self.production.max_queue_depth == 0 {
            return Err(GameError::InvalidConfig {
                reason: "production.max_queue_depth must be at least 1".to_owned(),
            });
        }
        if self.max_troops_per_player < 0 {
            return Err(GameError::InvalidConfig {
                reason: "max_troops_per_player must not be negative".to_owned(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = GameConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.max_troops_per_player, 50);
        assert_eq!(cfg.capture.required_time, 15.0);
        assert_eq!(cfg.production.max_queue_depth, 5);
        assert_eq!(cfg.ambient.check_interval, 2.0);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = GameConfig::from_json(r#"{"capture": {"required_time": 5.0}, "max_troops_per_player": 200}"#)
            .unwrap();
        assert_eq!(cfg.capture.required_time, 5.0);
        assert_eq!(cfg.capture.radius, 8.0);
        assert_eq!(cfg.max_troops_per_player, 200);
        assert_eq!(cfg.ambient, AmbientConfig::default());
    }

    #[test]
    fn rejects_non_positive_times() {
        let err = GameConfig::from_json(r#"{"capture": {"required_time": 0.0}}"#).unwrap_err();
        assert!(err.to_string().contains("capture.required_time"));
        let err = GameConfig::from_json(r#"{"fixed_dt": -1.0}"#).unwrap_err();
        assert!(matches!(err, GameError::InvalidConfig { .. }));
    }

    #[test]
    fn survive_time_needs_a_duration() {
        let err = GameConfig::from_json(r#"{"victory": {"condition": {"type": "survive_time", "duration": 0.0}}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("victory.condition.duration"));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = GameConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, GameError::Config(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = GameConfig::from_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, GameError::Io(_)));
    }
}
