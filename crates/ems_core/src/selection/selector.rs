use crate::clock::SimTime;
use crate::model::{Ambulance, AmbulanceId, Case};

/// Dispatch policy: picks which available ambulance responds to a case.
///
/// Selectors are pure queries. They must not change ambulance state; the
/// simulator deploys whatever ambulance is returned.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use ems_core::model::{Ambulance, AmbulanceId, Case, CaseId, Location};
/// use ems_core::selection::{AmbulanceSelector, ClosestAmbulanceSelector};
/// use ems_core::travel::H3GridTravelTimes;
///
/// let selector = ClosestAmbulanceSelector::new(Arc::new(H3GridTravelTimes::default()));
/// let near = Ambulance::new(AmbulanceId(1), Location::new(32.51, -117.0));
/// let far = Ambulance::new(AmbulanceId(2), Location::new(32.60, -117.0));
/// let case = Case::new(CaseId(1), Location::new(32.50, -117.0), 0, 1);
///
/// assert_eq!(selector.select(&[&far, &near], &case, 0), Some(AmbulanceId(1)));
/// ```
pub trait AmbulanceSelector: Send {
    /// Choose an ambulance for `case` at `current_time`.
    ///
    /// # Arguments
    ///
    /// * `available` - Ambulances that are not deployed, in fleet order
    /// * `case` - The case waiting for an ambulance
    /// * `current_time` - Current simulation time in milliseconds
    ///
    /// # Returns
    ///
    /// The id of one of `available`, or `None` to decline. Declining is not an
    /// error: the case waits in the pending queue.
    fn select(
        &self,
        available: &[&Ambulance],
        case: &Case,
        current_time: SimTime,
    ) -> Option<AmbulanceId>;
}
