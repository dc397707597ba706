//! Entities the dispatch engine moves around: locations, ambulances, cases and
//! the records a finished case leaves behind.

use std::fmt;

use h3o::{CellIndex, LatLng, Resolution};
use serde::{Deserialize, Serialize};

use crate::clock::SimTime;
use crate::error::{Result, SimError};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Case priority, 1 being the most urgent.
pub type Priority = u8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance in kilometres.
    pub fn haversine_km(&self, other: &Location) -> f64 {
        let (lat1, lon1) = (self.latitude.to_radians(), self.longitude.to_radians());
        let (lat2, lon2) = (other.latitude.to_radians(), other.longitude.to_radians());
        let sin_dlat = ((lat2 - lat1) * 0.5).sin();
        let sin_dlon = ((lon2 - lon1) * 0.5).sin();
        let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
        let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
        EARTH_RADIUS_KM * c
    }

    /// H3 cell containing this location; `None` for non-finite coordinates.
    pub fn to_cell(&self, resolution: Resolution) -> Option<CellIndex> {
        LatLng::new(self.latitude, self.longitude)
            .ok()
            .map(|ll| ll.to_cell(resolution))
    }
}

impl From<CellIndex> for Location {
    fn from(cell: CellIndex) -> Self {
        let ll: LatLng = cell.into();
        Self::new(ll.lat(), ll.lng())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AmbulanceId(pub u32);

impl fmt::Display for AmbulanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CaseId(pub u64);

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A vehicle of the fleet. `end_time` is set exactly while the ambulance is deployed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ambulance {
    pub id: AmbulanceId,
    pub base: Location,
    pub location: Location,
    deployed: bool,
    deployed_time: Option<SimTime>,
    end_time: Option<SimTime>,
}

impl Ambulance {
    /// A fresh, available ambulance parked at its base.
    pub fn new(id: AmbulanceId, base: Location) -> Self {
        Self {
            id,
            base,
            location: base,
            deployed: false,
            deployed_time: None,
            end_time: None,
        }
    }

    pub fn is_deployed(&self) -> bool {
        self.deployed
    }

    pub fn is_available(&self) -> bool {
        !self.deployed
    }

    pub fn deployed_time(&self) -> Option<SimTime> {
        self.deployed_time
    }

    pub fn end_time(&self) -> Option<SimTime> {
        self.end_time
    }

    pub fn deploy(
        &mut self,
        location: Location,
        deployed_time: SimTime,
        finish_time: SimTime,
    ) -> Result<()> {
        if self.deployed {
            return Err(SimError::AlreadyDeployed(self.id));
        }
        self.deployed = true;
        self.location = location;
        self.deployed_time = Some(deployed_time);
        self.end_time = Some(finish_time);
        Ok(())
    }

    /// Moves the expected end of the current deployment.
    pub fn reschedule(&mut self, end_time: SimTime) -> Result<()> {
        if !self.deployed {
            return Err(SimError::NotDeployed(self.id));
        }
        self.end_time = Some(end_time);
        Ok(())
    }

    pub fn finish(&mut self, location: Location) -> Result<()> {
        if !self.deployed {
            return Err(SimError::NotDeployed(self.id));
        }
        self.deployed = false;
        self.location = location;
        self.deployed_time = None;
        self.end_time = None;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub id: CaseId,
    pub location: Location,
    /// Arrival time.
    pub datetime: SimTime,
    pub priority: Priority,
    /// Time spent waiting in the pending queue, summed over every stint.
    pub delay: u64,
    /// Number of times the case was put in the pending queue.
    pub times_queued: u32,
}

impl Case {
    pub fn new(id: CaseId, location: Location, datetime: SimTime, priority: Priority) -> Self {
        Self {
            id,
            location,
            datetime,
            priority,
            delay: 0,
            times_queued: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    ToIncident,
    AtIncident,
    ToHospital,
    AtHospital,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventType::ToIncident => "to_incident",
            EventType::AtIncident => "at_incident",
            EventType::ToHospital => "to_hospital",
            EventType::AtHospital => "at_hospital",
        };
        f.write_str(name)
    }
}

/// One step of a case's treatment. When it completes the ambulance is at `destination`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CaseEvent {
    pub event_type: EventType,
    pub destination: Location,
    /// Milliseconds.
    pub duration: u64,
}

/// History of a case from its first assignment on. Only `event_history` grows
/// after creation; the record is final once handed out by the simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub case: Case,
    pub ambulance: AmbulanceId,
    pub delay: u64,
    pub assigned_at: SimTime,
    pub finished_at: Option<SimTime>,
    pub event_history: Vec<CaseEvent>,
}

impl CaseRecord {
    pub fn new(case: Case, ambulance: AmbulanceId, assigned_at: SimTime) -> Self {
        Self {
            delay: case.delay,
            case,
            ambulance,
            assigned_at,
            finished_at: None,
            event_history: Vec::new(),
        }
    }

    /// Time from assignment to the end of the last event.
    pub fn service_time(&self) -> Option<u64> {
        self.finished_at
            .map(|finished| finished.saturating_sub(self.assigned_at))
    }

    /// Time from arrival until the ambulance reached the incident, if it ever travelled there.
    pub fn response_time(&self) -> Option<u64> {
        let mut elapsed = self.assigned_at.saturating_sub(self.case.datetime);
        for event in &self.event_history {
            elapsed = elapsed.saturating_add(event.duration);
            if event.event_type == EventType::ToIncident {
                return Some(elapsed);
            }
        }
        None
    }
}
