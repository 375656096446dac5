//! Unit kinds and the troop catalog.
//!
//! [`UnitType`] names every spawnable kind, troops and buildings alike, and is
//! written as a lower-case string (`"archer"`, `"barracks"`, ...). The
//! [`TroopConfig`] holds per-troop stats and formation data. It is built once
//! at startup and shared read-only (as `Rc<TroopConfig>`) between the systems
//! that need it.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::GameError;

/// Build time used when a troop has no catalog entry.
pub const DEFAULT_BUILD_TIME: f32 = 4.0;

// ---------------------------------------------------------------------------
// TroopType / BuildingType
// ---------------------------------------------------------------------------

/// Trainable troop kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TroopType {
    Archer,
    Swordsman,
    Spearman,
    /// Written as `"horse_swordsman"`.
    MountedKnight,
    HorseArcher,
    Healer,
    Builder,
}

impl TroopType {
    /// Every troop kind, in declaration order.
    pub const ALL: [TroopType; 7] = [
        TroopType::Archer,
        TroopType::Swordsman,
        TroopType::Spearman,
        TroopType::MountedKnight,
        TroopType::HorseArcher,
        TroopType::Healer,
        TroopType::Builder,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TroopType::Archer => "archer",
            TroopType::Swordsman => "swordsman",
            TroopType::Spearman => "spearman",
            TroopType::MountedKnight => "horse_swordsman",
            TroopType::HorseArcher => "horse_archer",
            TroopType::Healer => "healer",
            TroopType::Builder => "builder",
        }
    }

    /// Whether this troop rides a horse.
    pub fn is_mounted(self) -> bool {
        matches!(self, TroopType::MountedKnight | TroopType::HorseArcher)
    }

    pub fn can_use_attack_mode(self) -> bool {
        !matches!(self, TroopType::Healer | TroopType::Builder)
    }

    pub fn can_use_guard_mode(self) -> bool {
        self != TroopType::Builder
    }

    /// Mounted troops cannot brace, and support troops never hold a line.
    pub fn can_use_hold_mode(self) -> bool {
        matches!(
            self,
            TroopType::Archer | TroopType::Swordsman | TroopType::Spearman
        )
    }

    pub fn can_use_patrol_mode(self) -> bool {
        self != TroopType::Builder
    }
}

/// Static building kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BuildingType {
    Barracks,
    DefenseTower,
    Home,
}

impl BuildingType {
    pub const ALL: [BuildingType; 3] = [
        BuildingType::Barracks,
        BuildingType::DefenseTower,
        BuildingType::Home,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BuildingType::Barracks => "barracks",
            BuildingType::DefenseTower => "defense_tower",
            BuildingType::Home => "home",
        }
    }

    /// Fixed spawn stats for this building kind.
    pub fn stats(self) -> BuildingStats {
        match self {
            BuildingType::Barracks => BuildingStats {
                health: 2000,
                vision_range: 22.0,
                scale: [1.8, 1.2, 1.8],
            },
            BuildingType::DefenseTower => BuildingStats {
                health: 1500,
                vision_range: 18.0,
                scale: [1.0, 2.0, 1.0],
            },
            BuildingType::Home => BuildingStats {
                health: 1000,
                vision_range: 15.0,
                scale: [1.2, 1.0, 1.2],
            },
        }
    }
}

/// Spawn-time stats shared by every building of one kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuildingStats {
    pub health: i32,
    pub vision_range: f32,
    pub scale: [f32; 3],
}

// ---------------------------------------------------------------------------
// UnitType
// ---------------------------------------------------------------------------

/// Any spawnable kind: a troop or a building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum UnitType {
    Troop(TroopType),
    Building(BuildingType),
}

impl UnitType {
    pub const BARRACKS: UnitType = UnitType::Building(BuildingType::Barracks);

    pub fn as_str(self) -> &'static str {
        match self {
            UnitType::Troop(t) => t.as_str(),
            UnitType::Building(b) => b.as_str(),
        }
    }

    pub fn is_building(self) -> bool {
        matches!(self, UnitType::Building(_))
    }

    /// Barracks-class buildings can be captured and can produce troops.
    pub fn is_barracks_class(self) -> bool {
        self == UnitType::BARRACKS
    }

    pub fn troop(self) -> Option<TroopType> {
        match self {
            UnitType::Troop(t) => Some(t),
            UnitType::Building(_) => None,
        }
    }
}

impl From<TroopType> for UnitType {
    fn from(t: TroopType) -> Self {
        UnitType::Troop(t)
    }
}

impl From<BuildingType> for UnitType {
    fn from(b: BuildingType) -> Self {
        UnitType::Building(b)
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TroopType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitType {
    type Err = GameError;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let parsed = match lowered.as_str() {
            "horseswordsman" | "mounted_knight" => Some(TroopType::MountedKnight.into()),
            "horsearcher" => Some(TroopType::HorseArcher.into()),
            "defensetower" => Some(BuildingType::DefenseTower.into()),
            other => TroopType::ALL
                .iter()
                .map(|t| UnitType::Troop(*t))
                .chain(BuildingType::ALL.iter().map(|b| UnitType::Building(*b)))
                .find(|u| u.as_str() == other),
        };
        parsed.ok_or_else(|| GameError::UnknownUnitType {
            name: s.to_owned(),
        })
    }
}

impl FromStr for TroopType {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<UnitType>()? {
            UnitType::Troop(t) => Ok(t),
            UnitType::Building(_) => Err(GameError::UnknownUnitType {
                name: s.to_owned(),
            }),
        }
    }
}

impl TryFrom<String> for UnitType {
    type Error = GameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<UnitType> for String {
    fn from(value: UnitType) -> Self {
        value.as_str().to_owned()
    }
}

impl Serialize for TroopType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TroopType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// TroopClass
// ---------------------------------------------------------------------------

/// Production parameters for one troop class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionProfile {
    pub cost: i32,
    pub build_time: f32,
    pub priority: i32,
    pub is_melee: bool,
}

/// Combat parameters for one troop class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatProfile {
    pub health: i32,
    pub max_health: i32,
    pub speed: f32,
    pub vision_range: f32,
    pub ranged_range: f32,
    pub ranged_damage: i32,
    pub ranged_cooldown: f32,
    pub melee_range: f32,
    pub melee_damage: i32,
    pub melee_cooldown: f32,
    pub can_ranged: bool,
    pub can_melee: bool,
}

/// Everything the catalog knows about one troop kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TroopClass {
    pub troop_type: TroopType,
    pub display_name: String,
    /// How many individual soldiers one unit of this kind represents. Used
    /// as the unit's weight for capture counts and troop limits.
    pub individuals_per_unit: i32,
    pub max_units_per_row: i32,
    pub selection_ring_size: f32,
    pub render_scale: f32,
    pub renderer_id: String,
    pub production: ProductionProfile,
    pub combat: CombatProfile,
}

/// Partial override for one catalog entry, as read from JSON.
#[derive(Debug, Clone, Deserialize)]
struct TroopClassPatch {
    id: TroopType,
    display_name: Option<String>,
    individuals_per_unit: Option<i32>,
    max_units_per_row: Option<i32>,
    selection_ring_size: Option<f32>,
    build_time: Option<f32>,
    cost: Option<i32>,
    health: Option<i32>,
    speed: Option<f32>,
    vision_range: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct TroopOverrides {
    #[serde(default)]
    troops: Vec<TroopClassPatch>,
}

impl TroopClassPatch {
    fn apply(self, class: &mut TroopClass) {
        if let Some(v) = self.display_name {
            class.display_name = v;
        }
        if let Some(v) = self.individuals_per_unit {
            class.individuals_per_unit = v;
        }
        if let Some(v) = self.max_units_per_row {
            class.max_units_per_row = v;
        }
        if let Some(v) = self.selection_ring_size {
            class.selection_ring_size = v;
        }
        if let Some(v) = self.build_time {
            class.production.build_time = v;
        }
        if let Some(v) = self.cost {
            class.production.cost = v;
        }
        if let Some(v) = self.health {
            class.combat.health = v;
            class.combat.max_health = v;
        }
        if let Some(v) = self.speed {
            class.combat.speed = v;
        }
        if let Some(v) = self.vision_range {
            class.combat.vision_range = v;
        }
    }
}

// ---------------------------------------------------------------------------
// TroopConfig
// ---------------------------------------------------------------------------

/// Read-only troop catalog with lookups that fall back to documented
/// defaults for unknown kinds.
#[derive(Debug, Clone)]
pub struct TroopConfig {
    classes: BTreeMap<TroopType, TroopClass>,
}

impl TroopConfig {
    /// Catalog populated with the built-in troop classes.
    pub fn new() -> Self {
        let mut config = Self::empty();
        for class in default_classes() {
            config.register_class(class);
        }
        config
    }

    /// Catalog with no classes; every lookup returns its fallback.
    pub fn empty() -> Self {
        Self {
            classes: BTreeMap::new(),
        }
    }

    /// Built-in catalog with overrides applied from a JSON document of the
    /// form `{"troops": [{"id": "archer", "individuals_per_unit": 30}, ...]}`.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Config`] on malformed JSON (including unknown troop
    /// ids) and [`GameError::InvalidConfig`] when an override leaves a class
    /// with a non-positive weight or build time.
    pub fn from_json(json: &str) -> Result<Self, GameError> {
        let overrides: TroopOverrides = serde_json::from_str(json)?;
        let mut config = Self::new();
        for patch in overrides.troops {
            let troop = patch.id;
            let Some(class) = config.classes.get_mut(&troop) else {
                continue;
            };
            patch.apply(class);
            if class.individuals_per_unit < 1 {
                return Err(GameError::InvalidConfig {
                    reason: format!("{troop}: individuals_per_unit must be at least 1"),
                });
            }
            if class.production.build_time <= 0.0 {
                return Err(GameError::InvalidConfig {
                    reason: format!("{troop}: build_time must be positive"),
                });
            }
            tracing::debug!(troop = %troop, "applied troop class override");
        }
        Ok(config)
    }

    /// Add or replace the class for `class.troop_type`.
    pub fn register_class(&mut self, class: TroopClass) {
        self.classes.insert(class.troop_type, class);
    }

    pub fn class(&self, troop: TroopType) -> Option<&TroopClass> {
        self.classes.get(&troop)
    }

    /// Registered classes in kind order.
    pub fn classes(&self) -> impl Iterator<Item = &TroopClass> {
        self.classes.values()
    }

    fn troop_class(&self, unit_type: UnitType) -> Option<&TroopClass> {
        unit_type.troop().and_then(|t| self.classes.get(&t))
    }

    /// Weight of one unit of this kind (default 1).
    pub fn individuals_per_unit(&self, unit_type: UnitType) -> i32 {
        self.troop_class(unit_type)
            .map_or(1, |c| c.individuals_per_unit)
    }

    /// Shorthand for [`individuals_per_unit`](Self::individuals_per_unit) on a troop.
    pub fn troop_weight(&self, troop: TroopType) -> i32 {
        self.individuals_per_unit(UnitType::Troop(troop))
    }

    /// Formation width (default 10).
    pub fn max_units_per_row(&self, unit_type: UnitType) -> i32 {
        self.troop_class(unit_type).map_or(10, |c| c.max_units_per_row)
    }

    /// Selection ring radius (default 0.5).
    pub fn selection_ring_size(&self, unit_type: UnitType) -> f32 {
        self.troop_class(unit_type)
            .map_or(0.5, |c| c.selection_ring_size)
    }

    /// Seconds to train one unit (default [`DEFAULT_BUILD_TIME`]).
    pub fn build_time(&self, troop: TroopType) -> f32 {
        self.classes
            .get(&troop)
            .map_or(DEFAULT_BUILD_TIME, |c| c.production.build_time)
    }

    pub fn can_use_attack_mode(&self, unit_type: UnitType) -> bool {
        unit_type.troop().is_some_and(TroopType::can_use_attack_mode)
    }

    pub fn can_use_guard_mode(&self, unit_type: UnitType) -> bool {
        unit_type.troop().is_some_and(TroopType::can_use_guard_mode)
    }

    pub fn can_use_hold_mode(&self, unit_type: UnitType) -> bool {
        unit_type.troop().is_some_and(TroopType::can_use_hold_mode)
    }

    pub fn can_use_patrol_mode(&self, unit_type: UnitType) -> bool {
        unit_type.troop().is_some_and(TroopType::can_use_patrol_mode)
    }
}

impl Default for TroopConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::too_many_arguments)]
fn class(
    troop_type: TroopType,
    display_name: &str,
    weight: i32,
    per_row: i32,
    ring: f32,
    scale: f32,
    production: ProductionProfile,
    combat: CombatProfile,
) -> TroopClass {
    TroopClass {
        troop_type,
        display_name: display_name.to_owned(),
        individuals_per_unit: weight,
        max_units_per_row: per_row,
        selection_ring_size: ring,
        render_scale: scale,
        renderer_id: format!("troops/{}", troop_type.as_str()),
        production,
        combat,
    }
}

fn default_classes() -> Vec<TroopClass> {
    vec![
        class(
            TroopType::Archer,
            "Archer",
            20,
            5,
            1.2,
            0.5,
            ProductionProfile { cost: 50, build_time: 5.0, priority: 10, is_melee: false },
            CombatProfile {
                health: 80,
                max_health: 80,
                speed: 3.0,
                vision_range: 16.0,
                ranged_range: 6.0,
                ranged_damage: 12,
                ranged_cooldown: 1.2,
                melee_range: 1.5,
                melee_damage: 5,
                melee_cooldown: 0.8,
                can_ranged: true,
                can_melee: true,
            },
        ),
        class(
            TroopType::Swordsman,
            "Swordsman",
            15,
            5,
            1.1,
            0.6,
            ProductionProfile { cost: 90, build_time: 7.0, priority: 10, is_melee: true },
            CombatProfile {
                health: 140,
                max_health: 140,
                speed: 2.2,
                vision_range: 14.0,
                ranged_range: 1.5,
                ranged_damage: 6,
                ranged_cooldown: 1.8,
                melee_range: 1.6,
                melee_damage: 18,
                melee_cooldown: 0.6,
                can_ranged: false,
                can_melee: true,
            },
        ),
        class(
            TroopType::Spearman,
            "Spearman",
            24,
            6,
            1.4,
            0.55,
            ProductionProfile { cost: 75, build_time: 6.0, priority: 5, is_melee: true },
            CombatProfile {
                health: 120,
                max_health: 120,
                speed: 2.5,
                vision_range: 15.0,
                ranged_range: 2.5,
                ranged_damage: 8,
                ranged_cooldown: 1.5,
                melee_range: 2.5,
                melee_damage: 18,
                melee_cooldown: 0.8,
                can_ranged: false,
                can_melee: true,
            },
        ),
        class(
            TroopType::MountedKnight,
            "Mounted Knight",
            9,
            3,
            2.0,
            0.8,
            ProductionProfile { cost: 150, build_time: 10.0, priority: 15, is_melee: true },
            CombatProfile {
                health: 200,
                max_health: 200,
                speed: 8.0,
                vision_range: 16.0,
                ranged_range: 1.5,
                ranged_damage: 5,
                ranged_cooldown: 2.0,
                melee_range: 2.0,
                melee_damage: 25,
                melee_cooldown: 0.8,
                can_ranged: false,
                can_melee: true,
            },
        ),
        class(
            TroopType::HorseArcher,
            "Horse Archer",
            9,
            3,
            2.0,
            0.8,
            ProductionProfile { cost: 140, build_time: 9.0, priority: 12, is_melee: false },
            CombatProfile {
                health: 160,
                max_health: 160,
                speed: 7.5,
                vision_range: 18.0,
                ranged_range: 7.0,
                ranged_damage: 10,
                ranged_cooldown: 1.4,
                melee_range: 1.5,
                melee_damage: 6,
                melee_cooldown: 1.0,
                can_ranged: true,
                can_melee: true,
            },
        ),
        class(
            TroopType::Healer,
            "Healer",
            10,
            5,
            1.0,
            0.5,
            ProductionProfile { cost: 60, build_time: 6.0, priority: 4, is_melee: false },
            CombatProfile {
                health: 70,
                max_health: 70,
                speed: 2.6,
                vision_range: 14.0,
                ranged_range: 0.0,
                ranged_damage: 0,
                ranged_cooldown: 1.0,
                melee_range: 1.5,
                melee_damage: 2,
                melee_cooldown: 1.2,
                can_ranged: false,
                can_melee: true,
            },
        ),
        class(
            TroopType::Builder,
            "Builder",
            1,
            5,
            0.8,
            0.5,
            ProductionProfile { cost: 30, build_time: 4.0, priority: 2, is_melee: true },
            CombatProfile {
                health: 60,
                max_health: 60,
                speed: 2.4,
                vision_range: 10.0,
                ranged_range: 0.0,
                ranged_damage: 0,
                ranged_cooldown: 1.0,
                melee_range: 1.2,
                melee_damage: 3,
                melee_cooldown: 1.0,
                can_ranged: false,
                can_melee: true,
            },
        ),
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_type_string_roundtrip() {
        for troop in TroopType::ALL {
            let ut = UnitType::Troop(troop);
            assert_eq!(ut.as_str().parse::<UnitType>().unwrap(), ut);
        }
        for building in BuildingType::ALL {
            let ut = UnitType::Building(building);
            assert_eq!(ut.to_string().parse::<UnitType>().unwrap(), ut);
        }
    }

    #[test]
    fn parse_is_lenient_about_case_and_aliases() {
        assert_eq!(
            " Horse_Swordsman ".parse::<UnitType>().unwrap(),
            UnitType::Troop(TroopType::MountedKnight)
        );
        assert_eq!(
            "horseswordsman".parse::<TroopType>().unwrap(),
            TroopType::MountedKnight
        );
        assert!("dragon".parse::<UnitType>().is_err());
        assert!("barracks".parse::<TroopType>().is_err());
    }

    #[test]
    fn unit_type_serializes_as_string() {
        let json = serde_json::to_string(&UnitType::BARRACKS).unwrap();
        assert_eq!(json, "\"barracks\"");
        let back: UnitType = serde_json::from_str("\"spearman\"").unwrap();
        assert_eq!(back, UnitType::Troop(TroopType::Spearman));
        assert!(serde_json::from_str::<UnitType>("\"catapult\"").is_err());
    }

    #[test]
    fn default_catalog_values() {
        let cfg = TroopConfig::new();
        assert_eq!(cfg.troop_weight(TroopType::Archer), 20);
        assert_eq!(cfg.troop_weight(TroopType::MountedKnight), 9);
        assert_eq!(cfg.build_time(TroopType::Swordsman), 7.0);
        assert_eq!(cfg.max_units_per_row(TroopType::Spearman.into()), 6);
        assert_eq!(cfg.selection_ring_size(TroopType::Archer.into()), 1.2);
    }

    #[test]
    fn lookups_fall_back_for_unknown_kinds() {
        let cfg = TroopConfig::empty();
        assert_eq!(cfg.troop_weight(TroopType::Archer), 1);
        assert_eq!(cfg.individuals_per_unit(UnitType::BARRACKS), 1);
        assert_eq!(cfg.max_units_per_row(TroopType::Archer.into()), 10);
        assert_eq!(cfg.selection_ring_size(TroopType::Archer.into()), 0.5);
        assert_eq!(cfg.build_time(TroopType::Healer), DEFAULT_BUILD_TIME);
    }

    #[test]
    fn mode_flags() {
        let cfg = TroopConfig::new();
        assert!(cfg.can_use_attack_mode(TroopType::Archer.into()));
        assert!(!cfg.can_use_attack_mode(TroopType::Healer.into()));
        assert!(!cfg.can_use_hold_mode(TroopType::MountedKnight.into()));
        assert!(cfg.can_use_hold_mode(TroopType::Spearman.into()));
        assert!(!cfg.can_use_patrol_mode(TroopType::Builder.into()));
        assert!(!cfg.can_use_guard_mode(UnitType::BARRACKS));
    }

    #[test]
    fn json_overrides_apply_on_top_of_defaults() {
        let cfg = TroopConfig::from_json(
            r#"{"troops": [{"id": "archer", "individuals_per_unit": 30, "build_time": 2.5}]}"#,
        )
        .unwrap();
        assert_eq!(cfg.troop_weight(TroopType::Archer), 30);
        assert_eq!(cfg.build_time(TroopType::Archer), 2.5);
        assert_eq!(cfg.troop_weight(TroopType::Swordsman), 15);
    }

    #[test]
    fn json_overrides_are_validated() {
        let err = TroopConfig::from_json(r#"{"troops": [{"id": "archer", "individuals_per_unit": 0}]}"#)
            .unwrap_err();
        assert!(matches!(err, GameError::InvalidConfig { .. }));
        let err = TroopConfig::from_json(r#"{"troops": [{"id": "wizard"}]}"#).unwrap_err();
        assert!(matches!(err, GameError::Config(_)));
    }
}
