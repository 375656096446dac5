//! Gameplay components.
//!
//! Plain data records attached to entities. Behaviour lives in the systems
//! and services; the only logic here is construction defaults and a few
//! small accessors.

use std::collections::VecDeque;

use garrison_ecs::entity::EntityId;
use serde::{Deserialize, Serialize};

use crate::ownership::{OwnerId, NEUTRAL_OWNER_ID};
use crate::troops::{TroopType, UnitType, DEFAULT_BUILD_TIME};

/// Default cap on the number of individuals one building may produce.
pub const DEFAULT_MAX_UNITS: i32 = 5;
/// Default seconds of uncontested presence needed to capture a building.
pub const DEFAULT_CAPTURE_TIME: f32 = 15.0;
/// Smallest scale a [`Transform`] axis may hold.
pub const MIN_SCALE: f32 = 1e-4;

// ---------------------------------------------------------------------------
// Spatial
// ---------------------------------------------------------------------------

/// Three-component vector. `y` is up; gameplay works on the `x`/`z` plane.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ONE: Vec3 = Vec3 {
        x: 1.0,
        y: 1.0,
        z: 1.0,
    };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Distance on the ground plane, ignoring height.
    pub fn ground_distance(&self, other: &Vec3) -> f32 {
        ground_distance_sq(self.x, self.z, other.x, other.z).sqrt()
    }
}

/// Squared ground-plane distance between `(ax, az)` and `(bx, bz)`.
#[inline]
pub fn ground_distance_sq(ax: f32, az: f32, bx: f32, bz: f32) -> f32 {
    let dx = ax - bx;
    let dz = az - bz;
    dx * dx + dz * dz
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
    pub desired_yaw: Option<f32>,
}

impl Transform {
    /// Build a transform at `position`. Non-positive scale axes are clamped
    /// to [`MIN_SCALE`].
    pub fn new(position: Vec3, scale: Vec3) -> Self {
        let clamp = |axis: f32| {
            if axis > 0.0 {
                axis
            } else {
                tracing::warn!(scale = axis, "non-positive transform scale clamped");
                MIN_SCALE
            }
        };
        Self {
            position,
            rotation: Vec3::default(),
            scale: Vec3::new(clamp(scale.x), clamp(scale.y), clamp(scale.z)),
            desired_yaw: None,
        }
    }

    pub fn at(x: f32, y: f32, z: f32) -> Self {
        Self::new(Vec3::new(x, y, z), Vec3::ONE)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new(Vec3::default(), Vec3::ONE)
    }
}

// ---------------------------------------------------------------------------
// Presentation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeshKind {
    None,
    Quad,
    Plane,
    #[default]
    Cube,
    Capsule,
    Ring,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Renderable {
    pub mesh_path: String,
    pub texture_path: String,
    pub renderer_id: String,
    pub visible: bool,
    pub mesh: MeshKind,
    pub color: [f32; 3],
}

impl Default for Renderable {
    fn default() -> Self {
        Self {
            mesh_path: String::new(),
            texture_path: String::new(),
            renderer_id: String::new(),
            visible: true,
            mesh: MeshKind::Cube,
            color: [1.0, 1.0, 1.0],
        }
    }
}

// ---------------------------------------------------------------------------
// Unit
// ---------------------------------------------------------------------------

/// Core gameplay record: health, ownership and kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub health: i32,
    pub max_health: i32,
    pub speed: f32,
    pub owner_id: OwnerId,
    pub unit_type: UnitType,
    pub vision_range: Option<f32>,
}

impl Unit {
    pub fn new(unit_type: UnitType, owner_id: OwnerId) -> Self {
        Self {
            health: 100,
            max_health: 100,
            speed: 1.0,
            owner_id,
            unit_type,
            vision_range: Some(12.0),
        }
    }

    /// A unit at or below zero health is logically dead even if its entity
    /// still exists.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    #[inline]
    pub fn is_building(&self) -> bool {
        self.unit_type.is_building()
    }

    /// Alive, non-building unit.
    #[inline]
    pub fn is_living_troop(&self) -> bool {
        self.is_alive() && !self.is_building()
    }
}

// ---------------------------------------------------------------------------
// Movement & combat
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Movement {
    pub has_target: bool,
    pub target_x: f32,
    pub target_z: f32,
    pub goal_x: f32,
    pub goal_z: f32,
    pub vx: f32,
    pub vz: f32,
    pub path: Vec<(f32, f32)>,
}

impl Movement {
    /// Idle movement state parked at `(x, z)`.
    pub fn parked_at(x: f32, z: f32) -> Self {
        Self {
            target_x: x,
            target_z: z,
            goal_x: x,
            goal_z: z,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatMode {
    Ranged,
    Melee,
    Auto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attack {
    pub range: f32,
    pub damage: i32,
    pub cooldown: f32,
    pub time_since_last: f32,
    pub melee_range: f32,
    pub melee_damage: i32,
    pub melee_cooldown: f32,
    pub preferred_mode: CombatMode,
    pub current_mode: CombatMode,
    pub can_melee: bool,
    pub can_ranged: bool,
    pub max_height_difference: f32,
}

impl Default for Attack {
    fn default() -> Self {
        Self {
            range: 2.0,
            damage: 10,
            cooldown: 1.0,
            time_since_last: 0.0,
            melee_range: 1.5,
            melee_damage: 10,
            melee_cooldown: 1.0,
            preferred_mode: CombatMode::Auto,
            current_mode: CombatMode::Ranged,
            can_melee: true,
            can_ranged: false,
            max_height_difference: 2.0,
        }
    }
}

impl Attack {
    pub fn in_melee_range(&self, distance: f32, height_diff: f32) -> bool {
        distance <= self.melee_range && height_diff <= self.max_height_difference
    }

    pub fn in_ranged_range(&self, distance: f32) -> bool {
        distance <= self.range && distance > self.melee_range
    }

    pub fn current_damage(&self) -> i32 {
        match self.current_mode {
            CombatMode::Melee => self.melee_damage,
            _ => self.damage,
        }
    }
}

/// Weak reference to the entity being attacked. The target may have been
/// destroyed; readers must re-validate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackTarget {
    pub target_id: EntityId,
    pub should_chase: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Patrol {
    pub waypoints: Vec<(f32, f32)>,
    pub current_waypoint: usize,
    pub patrolling: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GuardMode {
    pub active: bool,
    pub guarded_entity: Option<EntityId>,
    pub guard_position: Option<(f32, f32)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldMode {
    pub active: bool,
    pub exit_cooldown: f32,
    pub stand_up_duration: f32,
}

impl Default for HoldMode {
    fn default() -> Self {
        Self {
            active: true,
            exit_cooldown: 0.0,
            stand_up_duration: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatPhase {
    #[default]
    Idle,
    Advance,
    WindUp,
    Strike,
    Impact,
    Recover,
    Reposition,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CombatState {
    pub phase: CombatPhase,
    pub phase_time: f32,
    pub phase_duration: f32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HitFeedback {
    pub is_reacting: bool,
    pub reaction_time: f32,
    pub reaction_intensity: f32,
    pub knockback: (f32, f32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Healer {
    pub healing_range: f32,
    pub healing_amount: i32,
    pub healing_cooldown: f32,
    pub time_since_last_heal: f32,
}

impl Default for Healer {
    fn default() -> Self {
        Self {
            healing_range: 8.0,
            healing_amount: 5,
            healing_cooldown: 2.0,
            time_since_last_heal: 0.0,
        }
    }
}

/// Marker for units driven by the AI rather than the local player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AIControlled;

// ---------------------------------------------------------------------------
// Buildings
// ---------------------------------------------------------------------------

/// Marker for static structures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Building;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Home {
    pub population_contribution: i32,
}

impl Default for Home {
    fn default() -> Self {
        Self {
            population_contribution: 50,
        }
    }
}

/// Where freshly produced units walk to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RallyPoint {
    pub x: f32,
    pub z: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Production {
    pub in_progress: bool,
    pub build_time: f32,
    pub time_remaining: f32,
    /// Cumulative weight of everything this building has produced.
    pub produced_count: i32,
    pub max_units: i32,
    pub product_type: TroopType,
    pub rally: Option<RallyPoint>,
    pub villager_cost: i32,
    pub queue: VecDeque<TroopType>,
}

impl Default for Production {
    fn default() -> Self {
        Self {
            in_progress: false,
            build_time: DEFAULT_BUILD_TIME,
            time_remaining: 0.0,
            produced_count: 0,
            max_units: DEFAULT_MAX_UNITS,
            product_type: TroopType::Archer,
            rally: None,
            villager_cost: 1,
            queue: VecDeque::new(),
        }
    }
}

impl Production {
    /// In-flight product plus everything queued behind it.
    pub fn pending_len(&self) -> usize {
        usize::from(self.in_progress) + self.queue.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capture {
    pub capturing_player: Option<OwnerId>,
    pub progress: f32,
    pub required_time: f32,
    pub active: bool,
}

impl Capture {
    pub fn with_required_time(required_time: f32) -> Self {
        Self {
            capturing_player: None,
            progress: 0.0,
            required_time,
            active: false,
        }
    }

    /// Drop back to the idle state.
    pub fn reset(&mut self) {
        self.capturing_player = None;
        self.progress = 0.0;
        self.active = false;
    }

    /// Owner id of the capturer, or the neutral sentinel when idle.
    pub fn capturer_or_neutral(&self) -> OwnerId {
        self.capturing_player.unwrap_or(NEUTRAL_OWNER_ID)
    }
}

impl Default for Capture {
    fn default() -> Self {
        Self::with_required_time(DEFAULT_CAPTURE_TIME)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
