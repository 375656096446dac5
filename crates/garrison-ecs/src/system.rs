//! Per-frame update routines.
//!
//! A [`System`] is registered with the [`World`] and invoked once per call to
//! [`World::update`], in registration order. Systems receive exclusive access
//! to the world for the duration of their update and may spawn, destroy and
//! mutate freely.

use std::time::Duration;

use crate::world::World;

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

/// A stateless-or-lightly-stateful per-tick update routine.
pub trait System {
    /// Human-readable name, used for diagnostics and duplicate detection.
    fn name(&self) -> &str;

    /// Advance this system by `dt` seconds.
    fn update(&mut self, world: &mut World, dt: f32);
}

// ---------------------------------------------------------------------------
// FnSystem
// ---------------------------------------------------------------------------

/// Adapter that turns a closure into a [`System`].
pub struct FnSystem<F> {
    name: String,
    func: F,
}

impl<F> FnSystem<F>
where
    F: FnMut(&mut World, f32),
{
    /// Wrap `func` under `name`.
    pub fn new(name: &str, func: F) -> Self {
        Self {
            name: name.to_owned(),
            func,
        }
    }
}

impl<F> System for FnSystem<F>
where
    F: FnMut(&mut World, f32),
{
    fn name(&self) -> &str {
        &self.name
    }

    fn update(&mut self, world: &mut World, dt: f32) {
        (self.func)(world, dt);
    }
}

impl<F> std::fmt::Debug for FnSystem<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnSystem").field("name", &self.name).finish()
    }
}

// ---------------------------------------------------------------------------
// UpdateDiagnostics
// ---------------------------------------------------------------------------

/// Wall-clock timings for one [`World::update`] call.
#[derive(Debug, Clone, Default)]
pub struct UpdateDiagnostics {
    /// Time per system, in execution order.
    pub system_times: Vec<(String, Duration)>,
    /// Total time for the update.
    pub total_time: Duration,
}
