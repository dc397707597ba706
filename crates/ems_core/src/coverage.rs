//! Spatial coverage of demand points by the available part of the fleet.
//!
//! A demand point is covered when at least one available (not deployed)
//! ambulance can reach it within the response threshold `r1`.
//! [`CoverageTracker`] keeps the covering sets between calls and only
//! processes ambulances that became available or unavailable since the last
//! call, so a call costs O(changed ambulances x demand points) instead of
//! O(available ambulances x demand points).
//!
//! The cache is keyed by ambulance id together with the location the
//! ambulance was counted at. An available ambulance found somewhere else on
//! the next call is removed and added again.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::trace;

use crate::model::{Ambulance, AmbulanceId, Location};
use crate::travel::{LocationSet, TravelTimeOracle};

/// Trait for coverage metrics sampled during a run.
pub trait CoverageAlgorithm: Send {
    /// Coverage fraction in [0, 1] for the given fleet. Deployed ambulances
    /// never contribute.
    fn calculate(&mut self, ambulances: &[Ambulance]) -> f64;
}

/// Which ambulances cover which demand point.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverageState {
    /// Ambulances currently registered as contributing coverage.
    pub ambulances: BTreeSet<AmbulanceId>,
    /// Covering ambulances per demand point, indexed like the demand set.
    pub locations_coverage: Vec<BTreeSet<AmbulanceId>>,
}

impl CoverageState {
    pub fn with_locations(count: usize) -> Self {
        Self {
            ambulances: BTreeSet::new(),
            locations_coverage: vec![BTreeSet::new(); count],
        }
    }

    pub fn covered_count(&self) -> usize {
        self.locations_coverage
            .iter()
            .filter(|covering| !covering.is_empty())
            .count()
    }

    pub fn fraction(&self) -> f64 {
        if self.locations_coverage.is_empty() {
            return 0.0;
        }
        self.covered_count() as f64 / self.locations_coverage.len() as f64
    }
}

/// Percent coverage of a demand set within response threshold `r1`, maintained incrementally.
pub struct CoverageTracker {
    /// Representative point of each demand location; demand points never move.
    demand_points: Vec<Location>,
    oracle: Arc<dyn TravelTimeOracle>,
    r1_ms: u64,
    state: CoverageState,
    /// Where each registered ambulance was when its coverage was computed.
    positions: BTreeMap<AmbulanceId, Location>,
}

impl CoverageTracker {
    pub fn new(demands: LocationSet, oracle: Arc<dyn TravelTimeOracle>, r1_ms: u64) -> Self {
        let demand_points = demands
            .locations
            .iter()
            .map(|demand| oracle.closest(*demand).point)
            .collect();
        let state = CoverageState::with_locations(demands.len());
        Self {
            demand_points,
            oracle,
            r1_ms,
            state,
            positions: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> &CoverageState {
        &self.state
    }

    fn add_ambulance_coverage(&mut self, ambulance: &Ambulance) {
        let supply_point = self.oracle.closest(ambulance.location).point;

        for (index, demand_point) in self.demand_points.iter().enumerate() {
            if self.oracle.get_time(supply_point, *demand_point) <= self.r1_ms {
                self.state.locations_coverage[index].insert(ambulance.id);
            }
        }

        self.state.ambulances.insert(ambulance.id);
        self.positions.insert(ambulance.id, ambulance.location);
    }

    fn remove_ambulance_coverage(&mut self, id: AmbulanceId) {
        for covering in self.state.locations_coverage.iter_mut() {
            covering.remove(&id);
        }
        self.state.ambulances.remove(&id);
        self.positions.remove(&id);
    }
}

impl CoverageAlgorithm for CoverageTracker {
    fn calculate(&mut self, ambulances: &[Ambulance]) -> f64 {
        // Keyed by id; if an id appears twice the first entry wins.
        let mut available: BTreeMap<AmbulanceId, &Ambulance> = BTreeMap::new();
        for ambulance in ambulances.iter().filter(|a| a.is_available()) {
            available.entry(ambulance.id).or_insert(ambulance);
        }

        let to_add: Vec<&Ambulance> = available
            .values()
            .filter(|a| self.positions.get(&a.id) != Some(&a.location))
            .copied()
            .collect();
        // Gone from the pool, or moved since it was counted.
        let to_remove: Vec<AmbulanceId> = self
            .positions
            .iter()
            .filter(|(id, at)| available.get(*id).map_or(true, |a| a.location != **at))
            .map(|(id, _)| *id)
            .collect();

        if !to_add.is_empty() || !to_remove.is_empty() {
            trace!(
                added = to_add.len(),
                removed = to_remove.len(),
                "updating coverage"
            );
        }

        for id in to_remove {
            self.remove_ambulance_coverage(id);
        }
        for ambulance in to_add {
            self.add_ambulance_coverage(ambulance);
        }

        self.state.fraction()
    }
}

/// Coverage computed from scratch, without any cache.
pub fn full_coverage(
    demands: &LocationSet,
    oracle: &dyn TravelTimeOracle,
    ambulances: &[Ambulance],
    r1_ms: u64,
) -> f64 {
    if demands.is_empty() {
        return 0.0;
    }
    let supply_points: Vec<Location> = ambulances
        .iter()
        .filter(|a| a.is_available())
        .map(|a| oracle.closest(a.location).point)
        .collect();
    let covered = demands
        .locations
        .iter()
        .filter(|demand| {
            let demand_point = oracle.closest(**demand).point;
            supply_points
                .iter()
                .any(|supply| oracle.get_time(*supply, demand_point) <= r1_ms)
        })
        .count();
    covered as f64 / demands.len() as f64
}
