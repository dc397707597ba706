//! Fleet construction.

use crate::model::{Ambulance, AmbulanceId};
use crate::travel::LocationSet;

/// `count` ambulances spread over `bases` in round-robin order, ids from 1.
/// Empty when there are no bases.
pub fn round_robin_fleet(bases: &LocationSet, count: usize) -> Vec<Ambulance> {
    if bases.is_empty() {
        return Vec::new();
    }
    bases
        .locations
        .iter()
        .cycle()
        .take(count)
        .enumerate()
        .map(|(index, base)| Ambulance::new(AmbulanceId(index as u32 + 1), *base))
        .collect()
}
