use std::sync::Arc;

use crate::clock::SimTime;
use crate::model::{Ambulance, AmbulanceId, Case};
use crate::travel::TravelTimeOracle;

use super::selector::AmbulanceSelector;

/// Sends the ambulance that can reach the incident soonest.
///
/// Travel time is measured from each ambulance's current location to the case
/// location. Equal times go to the lowest ambulance id, so the choice never
/// depends on fleet order. With `max_travel_time_ms` set, the selector declines
/// when no ambulance is within the limit.
pub struct ClosestAmbulanceSelector {
    oracle: Arc<dyn TravelTimeOracle>,
    pub max_travel_time_ms: Option<u64>,
}

impl ClosestAmbulanceSelector {
    pub fn new(oracle: Arc<dyn TravelTimeOracle>) -> Self {
        Self {
            oracle,
            max_travel_time_ms: None,
        }
    }

    pub fn with_max_travel_time_ms(mut self, limit_ms: u64) -> Self {
        self.max_travel_time_ms = Some(limit_ms);
        self
    }
}

impl AmbulanceSelector for ClosestAmbulanceSelector {
    fn select(
        &self,
        available: &[&Ambulance],
        case: &Case,
        _current_time: SimTime,
    ) -> Option<AmbulanceId> {
        let mut best: Option<(u64, AmbulanceId)> = None;

        for ambulance in available {
            let travel_ms = self.oracle.get_time(ambulance.location, case.location);
            if self.max_travel_time_ms.is_some_and(|limit| travel_ms > limit) {
                continue;
            }
            let candidate = (travel_ms, ambulance.id);
            match best {
                Some(current) if current <= candidate => {}
                _ => best = Some(candidate),
            }
        }

        best.map(|(_, id)| id)
    }
}
