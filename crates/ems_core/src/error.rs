use thiserror::Error;

use crate::clock::SimTime;
use crate::model::{AmbulanceId, CaseId};

/// Fatal conditions raised by the engine. None of these are recovered inside a run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("ambulance {0} is already deployed")]
    AlreadyDeployed(AmbulanceId),

    #[error("ambulance {0} is not deployed")]
    NotDeployed(AmbulanceId),

    #[error("duration generator produced {duration_ms} ms at t={timestamp}")]
    NegativeDuration { duration_ms: f64, timestamp: SimTime },

    #[error("case {case} arrives at {arrival}, before the previous arrival at {previous}")]
    UnorderedArrivals {
        case: CaseId,
        arrival: SimTime,
        previous: SimTime,
    },

    #[error("selector returned ambulance {0}, which is not in the available pool")]
    UnknownAmbulance(AmbulanceId),

    #[error("case id {0} was already released into this run")]
    DuplicateCase(CaseId),

    #[error("completion scheduled for case {0}, which is not active")]
    UnknownCase(CaseId),

    #[error("dispatch stalled at t={at} with {pending} pending case(s) and nothing left to release an ambulance")]
    DispatchStalled { at: SimTime, pending: usize },
}

pub type Result<T> = std::result::Result<T, SimError>;
