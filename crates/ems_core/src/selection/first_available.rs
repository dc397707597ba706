use crate::clock::SimTime;
use crate::model::{Ambulance, AmbulanceId, Case};

use super::selector::AmbulanceSelector;

/// Baseline policy: the available ambulance with the lowest id, regardless of distance.
#[derive(Debug, Default)]
pub struct FirstAvailableSelector;

impl AmbulanceSelector for FirstAvailableSelector {
    fn select(
        &self,
        available: &[&Ambulance],
        _case: &Case,
        _current_time: SimTime,
    ) -> Option<AmbulanceId> {
        available.iter().map(|ambulance| ambulance.id).min()
    }
}
