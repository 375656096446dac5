//! Capture and ambient scan cost at "big battle" entity counts.
//!
//! Both the capture count and the ambient combat test are linear scans per
//! building or per local unit, so they grow with the square of the army
//! size. These benchmarks track where that starts to matter.
//!
//! Run with: `cargo bench --bench capture_benchmarks`

use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use garrison_game::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `barracks` contested buildings in a row, each ringed by `per_side` troops
/// of two owners.
fn battlefield(barracks: usize, per_side: usize) -> (World, CaptureSystem) {
    let troops = Rc::new(TroopConfig::new());
    let bus = EventBus::new();
    let registry = Rc::new(BuildingCollisionRegistry::new());
    let factory = UnitFactory::new(troops.clone(), bus.clone(), registry.clone(), ProductionConfig::default());
    let mut world = World::new();

    for b in 0..barracks {
        let bx = b as f32 * 30.0;
        factory.spawn(&mut world, &SpawnParams::new(BuildingType::Barracks, bx, 0.0, 1));
        for i in 0..per_side {
            let angle = i as f32 * 0.37;
            let r = 2.0 + (i % 5) as f32;
            factory.spawn(
                &mut world,
                &SpawnParams::new(TroopType::Archer, bx + r * angle.cos(), r * angle.sin(), 1),
            );
            factory.spawn(
                &mut world,
                &SpawnParams::new(TroopType::Spearman, bx - r * angle.cos(), -r * angle.sin(), 2),
            );
        }
    }

    let capture = CaptureSystem::new(
        troops,
        bus,
        registry,
        CaptureConfig::default(),
        ProductionConfig::default(),
    );
    (world, capture)
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_capture_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("capture_tick");
    for &(barracks, per_side) in &[(4usize, 25usize), (8, 50), (16, 100)] {
        let (mut world, mut capture) = battlefield(barracks, per_side);
        let label = format!("{barracks}x{per_side}");
        group.bench_with_input(BenchmarkId::from_parameter(label), &(), |b, _| {
            b.iter(|| {
                capture.update(&mut world, 1.0 / 30.0);
                black_box(world.entity_count());
            });
        });
    }
    group.finish();
}

fn bench_ambient_combat_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("ambient_combat_scan");
    for &per_side in &[50usize, 200, 400] {
        let (mut world, _) = battlefield(1, per_side);
        // Push the enemy away so the scan cannot stop early.
        for id in world.units_owned_by(2) {
            if let Some(t) = world.get_component_mut::<Transform>(id) {
                t.position.x += 500.0;
            }
        }
        let manager = AmbientStateManager::new(AmbientConfig::default(), EventBus::new());
        group.bench_with_input(BenchmarkId::from_parameter(per_side), &(), |b, _| {
            b.iter(|| black_box(manager.player_in_combat(&world, 1)));
        });
    }
    group.finish();
}

fn bench_simulation_tick(c: &mut Criterion) {
    c.bench_function("simulation_tick_two_bases", |b| {
        let mut sim = Simulation::new(GameConfig::default(), 1).unwrap();
        let ours = sim.spawn(&SpawnParams::new(BuildingType::Barracks, 0.0, 0.0, 1));
        sim.spawn(&SpawnParams::new(BuildingType::Barracks, 80.0, 0.0, 2));
        for i in 0..100 {
            let z = i as f32 * 0.5;
            sim.spawn(&SpawnParams::new(TroopType::Swordsman, 30.0, z, 1));
            sim.spawn(&SpawnParams::new(TroopType::Swordsman, 50.0, z, 2));
        }
        sim.start_production(&[ours], 1, TroopType::Builder);
        b.iter(|| black_box(sim.tick().tick));
    });
}

// ---------------------------------------------------------------------------
// Criterion groups and main
// ---------------------------------------------------------------------------

criterion_group!(
    benches,
    bench_capture_tick,
    bench_ambient_combat_scan,
    bench_simulation_tick,
);
criterion_main!(benches);
