//! Treatment plans: the sequence of events an ambulance goes through for one case.
//!
//! An [`EventGenerator`] is asked for a plan when a case is assigned. Plans are
//! lazy iterators; the simulator pulls the next event only when the previous
//! one completes.

use std::sync::Arc;

use crate::clock::SimTime;
use crate::model::{Ambulance, Case, CaseEvent, EventType, Location};
use crate::travel::{LocationSet, TravelTimeOracle};

/// A finite, ordered sequence of treatment events.
pub type CaseEvents = Box<dyn Iterator<Item = CaseEvent> + Send>;

pub trait EventGenerator: Send {
    /// Plan the treatment of `case` by `ambulance`, starting at `start_time`.
    /// The returned iterator must be finite.
    fn events(&self, case: &Case, ambulance: &Ambulance, start_time: SimTime) -> CaseEvents;
}

/// Same steps with the same durations for every case, all at the incident location.
#[derive(Debug, Clone)]
pub struct FixedTreatment {
    pub steps: Vec<(EventType, u64)>,
}

impl FixedTreatment {
    pub fn new(steps: Vec<(EventType, u64)>) -> Self {
        Self { steps }
    }

    /// One on-scene event of `duration_ms`.
    pub fn single(duration_ms: u64) -> Self {
        Self::new(vec![(EventType::AtIncident, duration_ms)])
    }
}

impl EventGenerator for FixedTreatment {
    fn events(&self, case: &Case, _ambulance: &Ambulance, _start_time: SimTime) -> CaseEvents {
        let destination = case.location;
        let events: Vec<CaseEvent> = self
            .steps
            .iter()
            .map(|(event_type, duration)| CaseEvent {
                event_type: *event_type,
                destination,
                duration: *duration,
            })
            .collect();
        Box::new(events.into_iter())
    }
}

/// Drive to the incident, treat on scene and, when hospitals are known,
/// transport the patient to the nearest one.
pub struct TravelTreatment {
    oracle: Arc<dyn TravelTimeOracle>,
    hospitals: Arc<LocationSet>,
    pub on_scene_ms: u64,
    pub at_hospital_ms: u64,
}

impl TravelTreatment {
    pub fn new(oracle: Arc<dyn TravelTimeOracle>, on_scene_ms: u64) -> Self {
        Self {
            oracle,
            hospitals: Arc::new(LocationSet::default()),
            on_scene_ms,
            at_hospital_ms: 0,
        }
    }

    pub fn with_hospitals(mut self, hospitals: LocationSet, at_hospital_ms: u64) -> Self {
        self.hospitals = Arc::new(hospitals);
        self.at_hospital_ms = at_hospital_ms;
        self
    }
}

impl EventGenerator for TravelTreatment {
    fn events(&self, case: &Case, ambulance: &Ambulance, _start_time: SimTime) -> CaseEvents {
        Box::new(TravelPlan {
            oracle: Arc::clone(&self.oracle),
            hospitals: Arc::clone(&self.hospitals),
            origin: ambulance.location,
            incident: case.location,
            on_scene_ms: self.on_scene_ms,
            at_hospital_ms: self.at_hospital_ms,
            hospital: None,
            next: Some(EventType::ToIncident),
        })
    }
}

struct TravelPlan {
    oracle: Arc<dyn TravelTimeOracle>,
    hospitals: Arc<LocationSet>,
    origin: Location,
    incident: Location,
    on_scene_ms: u64,
    at_hospital_ms: u64,
    hospital: Option<Location>,
    next: Option<EventType>,
}

impl Iterator for TravelPlan {
    type Item = CaseEvent;

    fn next(&mut self) -> Option<CaseEvent> {
        let event_type = self.next?;
        let event = match event_type {
            EventType::ToIncident => {
                self.next = Some(EventType::AtIncident);
                CaseEvent {
                    event_type,
                    destination: self.incident,
                    duration: self.oracle.get_time(self.origin, self.incident),
                }
            }
            EventType::AtIncident => {
                self.hospital = self
                    .hospitals
                    .closest(&self.incident)
                    .map(|(_, hospital, _)| hospital);
                self.next = self.hospital.map(|_| EventType::ToHospital);
                CaseEvent {
                    event_type,
                    destination: self.incident,
                    duration: self.on_scene_ms,
                }
            }
            EventType::ToHospital => {
                let hospital = self.hospital?;
                self.next = Some(EventType::AtHospital);
                CaseEvent {
                    event_type,
                    destination: hospital,
                    duration: self.oracle.get_time(self.incident, hospital),
                }
            }
            EventType::AtHospital => {
                let hospital = self.hospital?;
                self.next = None;
                CaseEvent {
                    event_type,
                    destination: hospital,
                    duration: self.at_hospital_ms,
                }
            }
        };
        Some(event)
    }
}
