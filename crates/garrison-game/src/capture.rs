//! Barracks capture.
//!
//! Every tick each barracks compares the troop weight of its owner near the
//! building with that of every opposing owner. An attacker fielding at least
//! `advantage_multiplier` times the defenders' weight accumulates capture
//! progress; once the progress reaches the building's required time the
//! barracks changes hands. Progress decays when the advantage is lost.

use std::collections::BTreeSet;
use std::rc::Rc;

use garrison_ecs::entity::EntityId;
use garrison_ecs::system::System;
use garrison_ecs::world::World;

use crate::collaborators::BuildingRegistry;
use crate::components::{ground_distance_sq, Building, Capture, Production, Renderable, Transform, Unit};
use crate::config::{CaptureConfig, ProductionConfig};
use crate::events::{EventBus, GameEvent};
use crate::ownership::{is_neutral, team_color, OwnerId};
use crate::production::default_barracks_production;
use crate::troops::TroopConfig;

/// Slack on the completion check so that `n` ticks of `dt` complete a
/// capture of `n * dt` seconds despite f32 accumulation error.
const PROGRESS_EPSILON: f32 = 1e-4;

/// Per-tick capture processing for barracks-class buildings.
pub struct CaptureSystem {
    troops: Rc<TroopConfig>,
    bus: EventBus,
    buildings: Rc<dyn BuildingRegistry>,
    config: CaptureConfig,
    production: ProductionConfig,
}

impl std::fmt::Debug for CaptureSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSystem")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CaptureSystem {
    pub const NAME: &'static str = "capture";

    pub fn new(
        troops: Rc<TroopConfig>,
        bus: EventBus,
        buildings: Rc<dyn BuildingRegistry>,
        config: CaptureConfig,
        production: ProductionConfig,
    ) -> Self {
        Self {
            troops,
            bus,
            buildings,
            config,
            production,
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Summed `individuals_per_unit` of `owner`'s living troops within
    /// `radius` of `(x, z)` on the ground plane. Buildings never count.
    pub fn count_nearby_troops(&self, world: &World, x: f32, z: f32, owner: OwnerId, radius: f32) -> i32 {
        let radius_sq = radius * radius;
        world
            .iter_with::<Unit>()
            .filter(|(_, u)| u.owner_id == owner && u.is_living_troop())
            .filter_map(|(id, u)| {
                let t = world.get_component::<Transform>(id)?;
                (ground_distance_sq(t.position.x, t.position.z, x, z) <= radius_sq)
                    .then(|| self.troops.individuals_per_unit(u.unit_type))
            })
            .sum()
    }

    /// Strongest opposing owner near `(x, z)` and its weight.
    ///
    /// Owners are tried in ascending id order and only a strictly greater
    /// count replaces the leader, so ties go to the lowest id. An owner with
    /// nothing nearby never leads.
    fn strongest_attacker(&self, world: &World, x: f32, z: f32, defender: OwnerId) -> (Option<OwnerId>, i32) {
        let owners: BTreeSet<OwnerId> = world
            .iter_with::<Unit>()
            .map(|(_, u)| u.owner_id)
            .filter(|&o| o != defender && !is_neutral(o))
            .collect();

        let mut best = (None, 0);
        for owner in owners {
            let count = self.count_nearby_troops(world, x, z, owner, self.config.radius);
            if count > best.1 {
                best = (Some(owner), count);
            }
        }
        best
    }

    /// Hand `building` to `new_owner`.
    ///
    /// Recolours it, updates the building registry and publishes
    /// `BarrackCaptured`. A player owner keeps any existing production
    /// (counters, queue, rally) and gets a default one only when the building
    /// has none; the neutral owner loses production. Repeating the call with the
    /// same owner leaves the building in the same state. Buildings missing
    /// their unit, transform or renderable are skipped.
    pub fn transfer_ownership(&self, world: &mut World, building: EntityId, new_owner: OwnerId) {
        let troops = &self.troops;
        let production = &self.production;
        let Some(mut e) = world.entity_mut(building) else {
            return;
        };
        if !(e.has::<Unit>() && e.has::<Transform>() && e.has::<Renderable>()) {
            return;
        }
        let (x, z) = match e.get::<Transform>() {
            Some(t) => (t.position.x, t.position.z),
            None => return,
        };
        let previous_owner = match e.get_mut::<Unit>() {
            Some(unit) => std::mem::replace(&mut unit.owner_id, new_owner),
            None => return,
        };
        if let Some(renderable) = e.get_mut::<Renderable>() {
            renderable.color = team_color(new_owner);
        }
        if is_neutral(new_owner) {
            e.remove::<Production>();
        } else if !e.has::<Production>() {
            e.insert(default_barracks_production(
                troops,
                x,
                z,
                production.captured_max_units,
                production.rally_offset,
            ));
        }

        self.buildings.update_building_owner(building, new_owner);
        tracing::info!(entity = %building, previous_owner, new_owner, "barracks changed hands");
        self.bus.publish(GameEvent::BarrackCaptured {
            entity: building,
            previous_owner,
            new_owner,
        });
    }

    fn process_building(&self, world: &mut World, id: EntityId, dt: f32) {
        let (owner, x, z) = match (world.get_component::<Unit>(id), world.get_component::<Transform>(id)) {
            (Some(u), Some(t)) if u.unit_type.is_barracks_class() => (u.owner_id, t.position.x, t.position.z),
            _ => return,
        };

        if !world.has_component::<Capture>(id) {
            let capture = Capture::with_required_time(self.config.required_time);
            if world.insert_component(id, capture).is_err() {
                return;
            }
        }

        let (capturer, attackers) = self.strongest_attacker(world, x, z, owner);
        let defenders = if is_neutral(owner) {
            0
        } else {
            self.count_nearby_troops(world, x, z, owner, self.config.radius)
        };
        let can_capture = capturer.is_some() && attackers >= defenders * self.config.advantage_multiplier;

        let Some(capture) = world.get_component_mut::<Capture>(id) else {
            return;
        };
        if can_capture {
            if capture.capturing_player != capturer {
                capture.capturing_player = capturer;
                capture.progress = 0.0;
                tracing::debug!(entity = %id, capturer = ?capturer, attackers, defenders, "capture started");
            }
            capture.active = true;
            capture.progress += dt;

            if capture.progress + PROGRESS_EPSILON >= capture.required_time {
                let new_owner = capture.capturer_or_neutral();
                capture.reset();
                self.transfer_ownership(world, id, new_owner);
            }
        } else if capture.active {
            capture.progress -= self.config.decay_rate * dt;
            if capture.progress <= 0.0 {
                capture.reset();
                tracing::debug!(entity = %id, "capture abandoned");
            }
        }
    }
}

impl System for CaptureSystem {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn update(&mut self, world: &mut World, dt: f32) {
        for id in world.entities_with::<Building>() {
            self.process_building(world, id, dt);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
