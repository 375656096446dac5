//! Unit factories, map spawning and unit command helpers.
//!
//! [`UnitFactory::spawn`] is the only place that assembles the canonical
//! component bundle for each kind, always in the order Transform, Renderable,
//! Unit, then the kind-specific components. Every spawn publishes
//! [`GameEvent::UnitSpawned`].

use std::collections::HashMap;
use std::rc::Rc;

use garrison_ecs::entity::EntityId;
use garrison_ecs::world::World;
use serde::{Deserialize, Serialize};

use crate::collaborators::BuildingRegistry;
use crate::components::{
    AIControlled, Attack, AttackTarget, Building, CombatMode, GuardMode, Healer, HoldMode, Home,
    MeshKind, Movement, Patrol, Renderable, Transform, Unit, Vec3,
};
use crate::config::ProductionConfig;
use crate::events::{EventBus, GameEvent};
use crate::ownership::{is_neutral, team_color, OwnerId};
use crate::production::default_barracks_production;
use crate::troops::{BuildingType, TroopConfig, TroopType, UnitType};

// ---------------------------------------------------------------------------
// SpawnParams
// ---------------------------------------------------------------------------

/// Everything a factory needs to create one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnParams {
    pub unit_type: UnitType,
    pub position: Vec3,
    pub owner_id: OwnerId,
    pub ai_controlled: bool,
    /// Production cap for barracks; `None` uses the configured default.
    pub max_population: Option<i32>,
}

impl SpawnParams {
    /// Human-controlled unit on the ground at `(x, z)`.
    pub fn new(unit_type: impl Into<UnitType>, x: f32, z: f32, owner_id: OwnerId) -> Self {
        Self {
            unit_type: unit_type.into(),
            position: Vec3::new(x, 0.0, z),
            owner_id,
            ai_controlled: false,
            max_population: None,
        }
    }

    pub fn ai(mut self, ai_controlled: bool) -> Self {
        self.ai_controlled = ai_controlled;
        self
    }

    pub fn with_max_population(mut self, max_population: i32) -> Self {
        self.max_population = Some(max_population);
        self
    }
}

// ---------------------------------------------------------------------------
// UnitFactory
// ---------------------------------------------------------------------------

/// Builds units and buildings into a [`World`].
///
/// Cheap to clone: all collaborators are shared handles.
#[derive(Clone)]
pub struct UnitFactory {
    troops: Rc<TroopConfig>,
    bus: EventBus,
    buildings: Rc<dyn BuildingRegistry>,
    production: ProductionConfig,
}

impl std::fmt::Debug for UnitFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitFactory")
            .field("production", &self.production)
            .finish_non_exhaustive()
    }
}

impl UnitFactory {
    pub fn new(
        troops: Rc<TroopConfig>,
        bus: EventBus,
        buildings: Rc<dyn BuildingRegistry>,
        production: ProductionConfig,
    ) -> Self {
        Self {
            troops,
            bus,
            buildings,
            production,
        }
    }

    pub fn troops(&self) -> &TroopConfig {
        &self.troops
    }

    /// Create the entity described by `params` and publish `UnitSpawned`.
    pub fn spawn(&self, world: &mut World, params: &SpawnParams) -> EntityId {
        let id = world.create_entity();
        match params.unit_type {
            UnitType::Troop(troop) => self.build_troop(world, id, troop, params),
            UnitType::Building(building) => self.build_building(world, id, building, params),
        }
        tracing::debug!(
            entity = %id,
            unit_type = %params.unit_type,
            owner = params.owner_id,
            x = params.position.x,
            z = params.position.z,
            "spawned unit"
        );
        self.bus.publish(GameEvent::UnitSpawned {
            entity: id,
            owner: params.owner_id,
            unit_type: params.unit_type,
        });
        id
    }

    fn build_troop(&self, world: &mut World, id: EntityId, troop: TroopType, params: &SpawnParams) {
        let class = self.troops.class(troop);
        let scale = class.map_or(1.0, |c| c.render_scale);

        let mut unit = Unit::new(UnitType::Troop(troop), params.owner_id);
        let mut attack = Attack::default();
        if let Some(c) = class {
            let combat = &c.combat;
            unit.health = combat.health;
            unit.max_health = combat.max_health;
            unit.speed = combat.speed;
            unit.vision_range = Some(combat.vision_range);

            attack = Attack {
                range: if combat.can_ranged {
                    combat.ranged_range
                } else {
                    combat.melee_range
                },
                damage: combat.ranged_damage,
                cooldown: combat.ranged_cooldown,
                melee_range: combat.melee_range,
                melee_damage: combat.melee_damage,
                melee_cooldown: combat.melee_cooldown,
                preferred_mode: match (combat.can_ranged, combat.can_melee) {
                    (true, true) => CombatMode::Auto,
                    (true, false) => CombatMode::Ranged,
                    _ => CombatMode::Melee,
                },
                current_mode: if combat.can_ranged {
                    CombatMode::Ranged
                } else {
                    CombatMode::Melee
                },
                can_ranged: combat.can_ranged,
                can_melee: combat.can_melee,
                ..Attack::default()
            };
        }

        let renderable = Renderable {
            renderer_id: class.map_or_else(|| format!("troops/{troop}"), |c| c.renderer_id.clone()),
            mesh: MeshKind::Capsule,
            color: team_color(params.owner_id),
            ..Renderable::default()
        };

        let Some(mut e) = world.entity_mut(id) else {
            return;
        };
        e.insert(Transform::new(params.position, Vec3::new(scale, scale, scale)))
            .insert(renderable)
            .insert(unit);
        if params.ai_controlled {
            e.insert(AIControlled);
        }
        e.insert(Movement::parked_at(params.position.x, params.position.z))
            .insert(attack);
        if troop == TroopType::Healer {
            e.insert(Healer::default());
        }
    }

    fn build_building(
        &self,
        world: &mut World,
        id: EntityId,
        building: BuildingType,
        params: &SpawnParams,
    ) {
        let stats = building.stats();
        let [sx, sy, sz] = stats.scale;
        let unit = Unit {
            health: stats.health,
            max_health: stats.health,
            speed: 0.0,
            owner_id: params.owner_id,
            unit_type: UnitType::Building(building),
            vision_range: Some(stats.vision_range),
        };
        let renderable = Renderable {
            renderer_id: format!("buildings/{}", building.as_str()),
            color: team_color(params.owner_id),
            ..Renderable::default()
        };
        let (x, z) = (params.position.x, params.position.z);

        if let Some(mut e) = world.entity_mut(id) {
            e.insert(Transform::new(params.position, Vec3::new(sx, sy, sz)))
                .insert(renderable)
                .insert(unit);
            if params.ai_controlled {
                e.insert(AIControlled);
            }
            e.insert(Building);

            match building {
                BuildingType::Barracks => {
                    if !is_neutral(params.owner_id) {
                        let max_units = params
                            .max_population
                            .unwrap_or(self.production.default_max_population);
                        e.insert(default_barracks_production(
                            &self.troops,
                            x,
                            z,
                            max_units,
                            self.production.rally_offset,
                        ));
                    }
                }
                BuildingType::DefenseTower => {
                    e.insert(Attack {
                        range: 16.0,
                        damage: 25,
                        cooldown: 2.0,
                        can_ranged: true,
                        can_melee: false,
                        preferred_mode: CombatMode::Ranged,
                        current_mode: CombatMode::Ranged,
                        max_height_difference: 4.0,
                        ..Attack::default()
                    });
                }
                BuildingType::Home => {
                    e.insert(Home::default());
                }
            }
        }

        self.buildings
            .register_building(id, building.as_str(), x, z, params.owner_id);
    }

    /// Spawn every entry of `map` and return the created ids in map order.
    ///
    /// Entries with an unknown unit type are skipped with a warning. Owners
    /// other than `local_owner` are marked AI-controlled.
    pub fn spawn_map(
        &self,
        world: &mut World,
        map: &MapDefinition,
        visuals: Option<&VisualCatalog>,
        local_owner: OwnerId,
    ) -> Vec<EntityId> {
        let mut ids = Vec::with_capacity(map.spawns.len());
        for spawn in &map.spawns {
            let unit_type = match spawn.unit_type.parse::<UnitType>() {
                Ok(t) => t,
                Err(error) => {
                    tracing::warn!(%error, x = spawn.x, z = spawn.z, "skipping map spawn");
                    continue;
                }
            };
            let (x, z) = map.coord_system.to_world(spawn.x, spawn.z);
            let mut params = SpawnParams::new(unit_type, x, z, spawn.owner_id)
                .ai(spawn.owner_id != local_owner);
            params.max_population = spawn.max_population;

            let id = self.spawn(world, &params);
            if let Some(renderable) = world.get_component_mut::<Renderable>(id) {
                if let Some(def) = visuals.and_then(|v| v.lookup(unit_type.as_str())) {
                    def.apply_to(renderable);
                }
                if renderable.color == [0.0, 0.0, 0.0] {
                    renderable.color = [1.0, 1.0, 1.0];
                }
            }
            ids.push(id);
        }
        tracing::info!(
            map = %map.name,
            spawned = ids.len(),
            requested = map.spawns.len(),
            "applied map"
        );
        ids
    }
}

// ---------------------------------------------------------------------------
// Map definitions
// ---------------------------------------------------------------------------

/// How spawn coordinates in a [`MapDefinition`] are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoordSystem {
    /// Coordinates are already world units.
    #[default]
    World,
    /// Coordinates are tile indices on a `width` x `height` grid centred on
    /// the origin.
    Grid {
        width: f32,
        height: f32,
        tile_size: f32,
    },
}

impl CoordSystem {
    /// Convert a spawn coordinate to world `(x, z)`.
    pub fn to_world(&self, x: f32, z: f32) -> (f32, f32) {
        match *self {
            CoordSystem::World => (x, z),
            CoordSystem::Grid {
                width,
                height,
                tile_size,
            } => {
                let tile = tile_size.max(1e-4);
                (
                    (x - (width * 0.5 - 0.5)) * tile,
                    (z - (height * 0.5 - 0.5)) * tile,
                )
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapSpawn {
    /// Unit type name, parsed at spawn time.
    pub unit_type: String,
    pub x: f32,
    pub z: f32,
    pub owner_id: OwnerId,
    #[serde(default)]
    pub max_population: Option<i32>,
}

/// Already-validated map contents.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MapDefinition {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub coord_system: CoordSystem,
    pub spawns: Vec<MapSpawn>,
}

// ---------------------------------------------------------------------------
// Visual catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualDef {
    pub mesh: MeshKind,
    pub color: [f32; 3],
    #[serde(default)]
    pub texture: String,
}

impl VisualDef {
    /// Overwrite mesh and colour; the texture only when one is set.
    pub fn apply_to(&self, renderable: &mut Renderable) {
        renderable.mesh = self.mesh;
        renderable.color = self.color;
        if !self.texture.is_empty() {
            renderable.texture_path = self.texture.clone();
        }
    }
}

/// Unit type name -> visual overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisualCatalog {
    defs: HashMap<String, VisualDef>,
}

impl VisualCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, unit_type: &str, def: VisualDef) {
        self.defs.insert(unit_type.to_owned(), def);
    }

    pub fn lookup(&self, unit_type: &str) -> Option<&VisualDef> {
        self.defs.get(unit_type)
    }
}

// ---------------------------------------------------------------------------
// Unit commands
// ---------------------------------------------------------------------------

/// Send a unit towards `(x, z)`. Cancels hold mode. Returns `false` if the
/// entity no longer exists.
pub fn order_move(world: &mut World, id: EntityId, x: f32, z: f32) -> bool {
    let Some(mut e) = world.entity_mut(id) else {
        return false;
    };
    if !e.has::<Movement>() {
        e.insert(Movement::default());
    }
    if let Some(mv) = e.get_mut::<Movement>() {
        mv.target_x = x;
        mv.target_z = z;
        mv.goal_x = x;
        mv.goal_z = z;
        mv.has_target = true;
        mv.path.clear();
    }
    if let Some(hold) = e.get_mut::<HoldMode>() {
        hold.active = false;
    }
    true
}

/// Enter or leave hold mode. Entering stops movement; leaving starts the
/// stand-up cooldown.
pub fn set_hold_mode(world: &mut World, id: EntityId, enabled: bool) -> bool {
    let Some(mut e) = world.entity_mut(id) else {
        return false;
    };
    if enabled {
        if !e.has::<HoldMode>() {
            e.insert(HoldMode::default());
        }
        if let Some(hold) = e.get_mut::<HoldMode>() {
            hold.active = true;
            hold.exit_cooldown = 0.0;
        }
        if let Some(mv) = e.get_mut::<Movement>() {
            mv.has_target = false;
            mv.path.clear();
        }
    } else if let Some(hold) = e.get_mut::<HoldMode>() {
        hold.active = false;
        hold.exit_cooldown = hold.stand_up_duration;
    }
    true
}

/// Target `target` for attack. Stops patrolling.
pub fn order_attack(world: &mut World, id: EntityId, target: EntityId, should_chase: bool) -> bool {
    let Some(mut e) = world.entity_mut(id) else {
        return false;
    };
    e.insert(AttackTarget {
        target_id: target,
        should_chase,
    });
    if let Some(patrol) = e.get_mut::<Patrol>() {
        patrol.patrolling = false;
    }
    true
}

/// Walk `waypoints` in a loop. Clears any attack target.
pub fn order_patrol(world: &mut World, id: EntityId, waypoints: Vec<(f32, f32)>) -> bool {
    let Some(mut e) = world.entity_mut(id) else {
        return false;
    };
    let patrolling = !waypoints.is_empty();
    e.insert(Patrol {
        waypoints,
        current_waypoint: 0,
        patrolling,
    });
    e.remove::<AttackTarget>();
    true
}

/// Guard an entity or a ground position.
pub fn order_guard(
    world: &mut World,
    id: EntityId,
    guarded_entity: Option<EntityId>,
    guard_position: Option<(f32, f32)>,
) -> bool {
    let Some(mut e) = world.entity_mut(id) else {
        return false;
    };
    e.insert(GuardMode {
        active: true,
        guarded_entity,
        guard_position,
    });
    true
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
