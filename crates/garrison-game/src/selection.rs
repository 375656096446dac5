//! Queries over the player's current selection.
//!
//! Selections hold raw ids that may go stale at any time; every query here
//! re-validates them against the world and only counts living, non-building
//! units.

use garrison_ecs::entity::EntityId;
use garrison_ecs::world::World;
use serde::Serialize;

use crate::components::{AttackTarget, GuardMode, HoldMode, Patrol, Unit};
use crate::troops::{TroopConfig, TroopType, UnitType};

/// An ordered, duplicate-free list of selected entity ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelectionSet {
    ids: Vec<EntityId>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `id` at the end. Returns `false` if it was already selected.
    pub fn select(&mut self, id: EntityId) -> bool {
        if self.ids.contains(&id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    pub fn deselect(&mut self, id: EntityId) -> bool {
        let before = self.ids.len();
        self.ids.retain(|&e| e != id);
        self.ids.len() != before
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.ids.contains(&id)
    }

    pub fn ids(&self) -> &[EntityId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Drop ids whose entity is gone or whose unit has died.
    pub fn retain_live(&mut self, world: &World) {
        self.ids
            .retain(|&id| world.get_component::<Unit>(id).is_some_and(Unit::is_alive));
    }
}

impl FromIterator<EntityId> for SelectionSet {
    fn from_iter<I: IntoIterator<Item = EntityId>>(iter: I) -> Self {
        let mut set = SelectionSet::new();
        for id in iter {
            set.select(id);
        }
        set
    }
}

/// The stance a whole selection shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandMode {
    #[default]
    Normal,
    Attack,
    Guard,
    Patrol,
}

/// Which command buttons make sense for a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ModeAvailability {
    pub can_attack: bool,
    pub can_guard: bool,
    pub can_hold: bool,
    pub can_patrol: bool,
    pub can_heal: bool,
    pub can_build: bool,
}

/// Stateless selection queries.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectionQueryService;

impl SelectionQueryService {
    pub fn new() -> Self {
        Self
    }

    /// Living, non-building units among `selected`, in selection order.
    fn counted<'w>(world: &'w World, selected: &'w [EntityId]) -> impl Iterator<Item = (EntityId, &'w Unit)> + 'w {
        selected.iter().filter_map(move |&id| {
            world
                .get_component::<Unit>(id)
                .filter(|u| u.is_living_troop())
                .map(|u| (id, u))
        })
    }

    /// Mode every counted unit shares, checked as patrol, then attack, then
    /// guard. `Normal` for an empty or mixed selection.
    pub fn command_mode(&self, world: &World, selected: &[EntityId]) -> CommandMode {
        let ids: Vec<EntityId> = Self::counted(world, selected).map(|(id, _)| id).collect();
        if ids.is_empty() {
            return CommandMode::Normal;
        }

        let every = |pred: fn(&World, EntityId) -> bool| ids.iter().all(|&id| pred(world, id));
        if every(|w, id| w.get_component::<Patrol>(id).is_some_and(|p| p.patrolling)) {
            CommandMode::Patrol
        } else if every(|w, id| w.has_component::<AttackTarget>(id)) {
            CommandMode::Attack
        } else if every(|w, id| w.get_component::<GuardMode>(id).is_some_and(|g| g.active)) {
            CommandMode::Guard
        } else {
            CommandMode::Normal
        }
    }

    /// A mode is available when any counted unit supports it.
    pub fn mode_availability(&self, world: &World, selected: &[EntityId], troops: &TroopConfig) -> ModeAvailability {
        let mut modes = ModeAvailability::default();
        for (_, unit) in Self::counted(world, selected) {
            let kind = unit.unit_type;
            modes.can_attack |= troops.can_use_attack_mode(kind);
            modes.can_guard |= troops.can_use_guard_mode(kind);
            modes.can_hold |= troops.can_use_hold_mode(kind);
            modes.can_patrol |= troops.can_use_patrol_mode(kind);
            modes.can_heal |= kind == UnitType::Troop(TroopType::Healer);
            modes.can_build |= kind == UnitType::Troop(TroopType::Builder);
        }
        modes
    }

    /// Whether any counted unit is holding position.
    pub fn any_in_hold_mode(&self, world: &World, selected: &[EntityId]) -> bool {
        Self::counted(world, selected)
            .any(|(id, _)| world.get_component::<HoldMode>(id).is_some_and(|h| h.active))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::{order_attack, order_guard, order_patrol, set_hold_mode};
    use crate::troops::BuildingType;

    fn troop(world: &mut World, kind: TroopType) -> EntityId {
        world.spawn_with(Unit::new(kind.into(), 1))
    }

    #[test]
    fn selection_set_dedups_and_prunes() {
        let mut world = World::new();
        let a = troop(&mut world, TroopType::Archer);
        let b = troop(&mut world, TroopType::Archer);
        let c = troop(&mut world, TroopType::Archer);
        let mut set: SelectionSet = [a, b, a, c].into_iter().collect();
        assert_eq!(set.ids(), &[a, b, c]);

        world.destroy_entity(b);
        world.get_component_mut::<Unit>(c).unwrap().health = 0;
        set.retain_live(&world);
        assert_eq!(set.ids(), &[a]);
        assert!(set.deselect(a));
        assert!(set.is_empty());
    }

    #[test]
    fn empty_or_stale_selection_is_normal() {
        let world = World::new();
        let svc = SelectionQueryService::new();
        assert_eq!(svc.command_mode(&world, &[]), CommandMode::Normal);
        assert_eq!(svc.command_mode(&world, &[EntityId::from_raw(5)]), CommandMode::Normal);
    }

    #[test]
    fn mode_precedence() {
        let mut world = World::new();
        let svc = SelectionQueryService::new();
        let a = troop(&mut world, TroopType::Archer);
        let b = troop(&mut world, TroopType::Swordsman);
        let barracks = world.spawn_with(Unit::new(BuildingType::Barracks.into(), 1));
        let sel = [a, b, barracks];

        order_guard(&mut world, a, None, Some((0.0, 0.0)));
        order_guard(&mut world, b, None, Some((0.0, 0.0)));
        assert_eq!(svc.command_mode(&world, &sel), CommandMode::Guard);

        order_attack(&mut world, a, barracks, true);
        assert_eq!(svc.command_mode(&world, &sel), CommandMode::Guard);
        order_attack(&mut world, b, barracks, true);
        assert_eq!(svc.command_mode(&world, &sel), CommandMode::Attack);

        order_patrol(&mut world, a, vec![(1.0, 1.0)]);
        order_patrol(&mut world, b, vec![(1.0, 1.0)]);
        assert_eq!(svc.command_mode(&world, &sel), CommandMode::Patrol);
    }

    #[test]
    fn availability_is_a_union() {
        let mut world = World::new();
        let svc = SelectionQueryService::new();
        let troops = TroopConfig::new();
        let builder = troop(&mut world, TroopType::Builder);
        let healer = troop(&mut world, TroopType::Healer);
        let archer = troop(&mut world, TroopType::Archer);

        let only_builder = svc.mode_availability(&world, &[builder], &troops);
        assert_eq!(
            only_builder,
            ModeAvailability {
                can_build: true,
                ..ModeAvailability::default()
            }
        );

        let mixed = svc.mode_availability(&world, &[builder, healer], &troops);
        assert!(mixed.can_heal && mixed.can_build && mixed.can_guard && mixed.can_patrol);
        assert!(!mixed.can_attack && !mixed.can_hold);

        let all = svc.mode_availability(&world, &[builder, healer, archer], &troops);
        assert!(all.can_attack && all.can_hold);
    }

    #[test]
    fn hold_detection_skips_dead_units() {
        let mut world = World::new();
        let svc = SelectionQueryService::new();
        let a = troop(&mut world, TroopType::Spearman);
        let b = troop(&mut world, TroopType::Spearman);
        set_hold_mode(&mut world, a, true);
        assert!(svc.any_in_hold_mode(&world, &[b, a]));

        world.get_component_mut::<Unit>(a).unwrap().health = 0;
        assert!(!svc.any_in_hold_mode(&world, &[b, a]));
        set_hold_mode(&mut world, b, true);
        set_hold_mode(&mut world, b, false);
        assert!(!svc.any_in_hold_mode(&world, &[b]));
    }
}
