//! Performance benchmarks for ems_core using Criterion.rs.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ems_core::cases::RandomCaseStream;
use ems_core::clock::ONE_MIN_MS;
use ems_core::coverage::{full_coverage, CoverageAlgorithm, CoverageTracker};
use ems_core::fleet::round_robin_fleet;
use ems_core::generators::{BoundingBoxLocation, ExponentialDuration, WeightedPriority};
use ems_core::model::{Ambulance, Location};
use ems_core::selection::ClosestAmbulanceSelector;
use ems_core::simulator::EventDrivenSimulator;
use ems_core::travel::{CachedTravelTimes, H3GridTravelTimes, LocationSet, TravelTimeOracle};
use ems_core::treatment::TravelTreatment;

fn grid(per_side: usize, lat: (f64, f64), lng: (f64, f64)) -> LocationSet {
    let at = |(lo, hi): (f64, f64), i: usize| lo + (hi - lo) * i as f64 / per_side as f64;
    LocationSet::new(
        (0..per_side)
            .flat_map(|i| (0..per_side).map(move |j| Location::new(at(lat, i), at(lng, j))))
            .collect(),
    )
}

fn oracle() -> Arc<dyn TravelTimeOracle> {
    Arc::new(CachedTravelTimes::new(H3GridTravelTimes::default(), 65_536))
}

fn bench_simulation_run(c: &mut Criterion) {
    let scenarios = vec![("small", 10, 200), ("medium", 30, 1_000), ("large", 60, 3_000)];

    let mut group = c.benchmark_group("simulation_run");
    group.sample_size(10);
    for (name, ambulances, cases) in scenarios {
        group.bench_with_input(
            BenchmarkId::from_parameter(name),
            &(ambulances, cases),
            |b, &(ambulances, cases)| {
                b.iter(|| {
                    let oracle = oracle();
                    let bases = grid(4, (32.45, 32.60), (-117.10, -116.95));
                    let stream = RandomCaseStream::new(
                        0,
                        Box::new(ExponentialDuration::new(ambulances as f64 * 1.5, 42)),
                        Box::new(BoundingBoxLocation::new(32.45, 32.60, -117.10, -116.95, 43)),
                        Box::new(WeightedPriority::historical(44)),
                    )
                    .with_quantity(cases);
                    let mut sim = EventDrivenSimulator::new(
                        round_robin_fleet(&bases, ambulances),
                        Box::new(stream),
                        Box::new(ClosestAmbulanceSelector::new(Arc::clone(&oracle))),
                        Box::new(TravelTreatment::new(Arc::clone(&oracle), 20 * ONE_MIN_MS)),
                    )
                    .with_coverage(Box::new(CoverageTracker::new(
                        grid(10, (32.45, 32.60), (-117.10, -116.95)),
                        oracle,
                        10 * ONE_MIN_MS,
                    )));
                    black_box(sim.run().map(|records| records.len()))
                });
            },
        );
    }
    group.finish();
}

fn bench_coverage(c: &mut Criterion) {
    let oracle = oracle();
    let demands = grid(20, (32.45, 32.60), (-117.10, -116.95));
    let bases = grid(8, (32.45, 32.60), (-117.10, -116.95));
    let mut fleet: Vec<Ambulance> = round_robin_fleet(&bases, 64);
    let r1_ms = 10 * ONE_MIN_MS;

    let mut group = c.benchmark_group("coverage");

    // One ambulance toggles per call, as between two simulation steps.
    let mut tracker = CoverageTracker::new(demands.clone(), Arc::clone(&oracle), r1_ms);
    tracker.calculate(&fleet);
    let mut toggle = 0usize;
    group.bench_function("incremental_one_change", |b| {
        b.iter(|| {
            let ambulance = &mut fleet[toggle % 64];
            let base = ambulance.base;
            let _ = if ambulance.is_deployed() {
                ambulance.finish(base)
            } else {
                ambulance.deploy(base, 0, 1)
            };
            toggle += 7;
            black_box(tracker.calculate(&fleet))
        });
    });

    group.bench_function("full_recompute", |b| {
        b.iter(|| black_box(full_coverage(&demands, oracle.as_ref(), &fleet, r1_ms)));
    });

    group.finish();
}

criterion_group!(benches, bench_simulation_run, bench_coverage);
criterion_main!(benches);
