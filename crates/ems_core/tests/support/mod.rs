#![allow(dead_code)]

use std::sync::Arc;

use ems_core::cases::{RandomCaseStream, ReplayCaseStream};
use ems_core::clock::{SimTime, ONE_MIN_MS};
use ems_core::coverage::CoverageTracker;
use ems_core::fleet::round_robin_fleet;
use ems_core::generators::{
    BoundingBoxLocation, DurationGenerator, ExponentialDuration, WeightedPriority,
};
use ems_core::model::{Ambulance, AmbulanceId, Case, Location};
use ems_core::selection::{AmbulanceSelector, ClosestAmbulanceSelector, FirstAvailableSelector};
use ems_core::simulator::EventDrivenSimulator;
use ems_core::test_helpers::{case_at, test_bases, test_fleet};
use ems_core::travel::{CachedTravelTimes, H3GridTravelTimes, LocationSet, TravelTimeOracle};
use ems_core::treatment::{FixedTreatment, TravelTreatment};

/// Service area used by the seeded scenarios.
pub const LAT_RANGE: (f64, f64) = (32.45, 32.60);
pub const LNG_RANGE: (f64, f64) = (-117.10, -116.95);

/// Replays one priority-1 case per arrival time, ids from 1.
pub fn replay(arrivals: &[SimTime]) -> ReplayCaseStream {
    ReplayCaseStream::new(
        arrivals
            .iter()
            .enumerate()
            .map(|(i, t)| case_at(i as u64 + 1, *t))
            .collect::<Vec<Case>>(),
    )
}

/// Lowest-id dispatch with a single fixed-length treatment event.
pub fn fixed_sim(fleet_size: usize, arrivals: &[SimTime], duration_ms: u64) -> EventDrivenSimulator {
    EventDrivenSimulator::new(
        test_fleet(fleet_size),
        Box::new(replay(arrivals)),
        Box::new(FirstAvailableSelector),
        Box::new(FixedTreatment::single(duration_ms)),
    )
}

pub fn with_selector(
    fleet_size: usize,
    arrivals: &[SimTime],
    duration_ms: u64,
    selector: impl AmbulanceSelector + 'static,
) -> EventDrivenSimulator {
    EventDrivenSimulator::new(
        test_fleet(fleet_size),
        Box::new(replay(arrivals)),
        Box::new(selector),
        Box::new(FixedTreatment::single(duration_ms)),
    )
}

pub fn shared_oracle() -> Arc<dyn TravelTimeOracle> {
    Arc::new(CachedTravelTimes::new(H3GridTravelTimes::default(), 4096))
}

/// Demand points on a regular grid over the service area.
pub fn demand_grid(per_side: usize) -> LocationSet {
    let step = |(lo, hi): (f64, f64), i: usize| lo + (hi - lo) * i as f64 / (per_side - 1).max(1) as f64;
    LocationSet::new(
        (0..per_side)
            .flat_map(|i| (0..per_side).map(move |j| (i, j)))
            .map(|(i, j)| Location::new(step(LAT_RANGE, i), step(LNG_RANGE, j)))
            .collect(),
    )
}

pub fn seeded_stream(seed: u64, quantity: usize) -> RandomCaseStream {
    RandomCaseStream::new(
        0,
        Box::new(ExponentialDuration::new(12.0, seed)),
        Box::new(BoundingBoxLocation::new(
            LAT_RANGE.0,
            LAT_RANGE.1,
            LNG_RANGE.0,
            LNG_RANGE.1,
            seed.wrapping_add(1),
        )),
        Box::new(WeightedPriority::historical(seed.wrapping_add(2))),
    )
    .with_quantity(quantity)
}

/// Six ambulances on four bases, closest dispatch, travel-based treatment
/// with hospital transport and coverage sampling.
pub fn seeded_sim(seed: u64, quantity: usize) -> EventDrivenSimulator {
    let oracle = shared_oracle();
    let hospitals = LocationSet::new(vec![
        Location::new(32.53, -117.04),
        Location::new(32.47, -116.98),
    ]);
    let treatment = TravelTreatment::new(Arc::clone(&oracle), 20 * ONE_MIN_MS)
        .with_hospitals(hospitals, 15 * ONE_MIN_MS);
    let coverage = CoverageTracker::new(demand_grid(5), Arc::clone(&oracle), 10 * ONE_MIN_MS);

    EventDrivenSimulator::new(
        round_robin_fleet(&test_bases(4), 6),
        Box::new(seeded_stream(seed, quantity)),
        Box::new(ClosestAmbulanceSelector::new(oracle)),
        Box::new(treatment),
    )
    .with_coverage(Box::new(coverage))
}

/// Picks one particular ambulance and declines while it is busy.
#[derive(Debug, Clone, Copy)]
pub struct OnlyAmbulance(pub AmbulanceId);

impl AmbulanceSelector for OnlyAmbulance {
    fn select(&self, available: &[&Ambulance], _case: &Case, _now: SimTime) -> Option<AmbulanceId> {
        available.iter().map(|a| a.id).find(|id| *id == self.0)
    }
}

/// Inter-arrival times from a script, then no more arrivals.
#[derive(Debug)]
pub struct ScriptedDuration(pub Vec<f64>);

impl DurationGenerator for ScriptedDuration {
    fn generate(&mut self, _timestamp: SimTime) -> f64 {
        if self.0.is_empty() {
            f64::INFINITY
        } else {
            self.0.remove(0)
        }
    }
}
