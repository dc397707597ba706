//! Test helpers for common test setup and utilities.
//!
//! Shared fixtures so unit tests, integration tests and benches use the same
//! geography and the same small building blocks.

use crate::clock::SimTime;
use crate::fleet::round_robin_fleet;
use crate::model::{Ambulance, AmbulanceId, Case, CaseId, Location};
use crate::selection::AmbulanceSelector;
use crate::travel::LocationSet;

/// Where [`case_at`] cases happen.
pub fn test_incident() -> Location {
    Location::new(32.51, -117.02)
}

/// Bases spaced along a meridian, 0.01 degrees apart.
pub fn test_bases(count: usize) -> LocationSet {
    LocationSet::new(
        (0..count)
            .map(|i| Location::new(32.50 + 0.01 * i as f64, -117.00))
            .collect(),
    )
}

/// `count` available ambulances, one per test base, ids from 1.
pub fn test_fleet(count: usize) -> Vec<Ambulance> {
    round_robin_fleet(&test_bases(count), count)
}

/// Priority-1 case at the test incident location.
pub fn case_at(id: u64, arrival: SimTime) -> Case {
    Case::new(CaseId(id), test_incident(), arrival, 1)
}

/// Never picks an ambulance.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecliningSelector;

impl AmbulanceSelector for DecliningSelector {
    fn select(&self, _available: &[&Ambulance], _case: &Case, _now: SimTime) -> Option<AmbulanceId> {
        None
    }
}

/// Always answers with the same id, whether or not it is available.
#[derive(Debug, Clone, Copy)]
pub struct FixedSelector(pub AmbulanceId);

impl AmbulanceSelector for FixedSelector {
    fn select(&self, _available: &[&Ambulance], _case: &Case, _now: SimTime) -> Option<AmbulanceId> {
        Some(self.0)
    }
}
