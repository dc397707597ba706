//! Event-driven dispatch engine.
//!
//! Cases move PENDING -> ACTIVE -> FINISHED and never go back. Each
//! [`EventDrivenSimulator::step`] does exactly one thing, in this order of
//! preference:
//!
//! 1. dispatch the front of the pending queue, when an ambulance is available
//!    and the backlog is not blocked;
//! 2. take the next arrival, when it is strictly earlier than the earliest
//!    ongoing completion (ties go to the completion);
//! 3. complete the earliest ongoing event, lowest case id first on equal times.
//!
//! A case that completes its last event releases its ambulance, which returns
//! to base instantly, and its [`CaseRecord`] is appended to the output.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::{debug, info, warn};

use crate::cases::CaseStream;
use crate::clock::{Completion, SimTime, SimulationClock};
use crate::coverage::CoverageAlgorithm;
use crate::error::{Result, SimError};
use crate::model::{Ambulance, AmbulanceId, Case, CaseEvent, CaseId, CaseRecord, EventType};
use crate::selection::AmbulanceSelector;
use crate::telemetry::{CaseCounts, SimTelemetry};
use crate::treatment::{CaseEvents, EventGenerator};

/// What a single step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// A case was assigned and its first event started.
    Dispatched {
        case: CaseId,
        ambulance: AmbulanceId,
        timestamp: SimTime,
        from_queue: bool,
    },
    /// An arrival found no ambulance (or was declined) and joined the pending queue.
    Queued { case: CaseId, timestamp: SimTime },
    /// The selector declined the front of the pending queue; the backlog is
    /// blocked until an ambulance is released.
    Declined { case: CaseId, timestamp: SimTime },
    /// An event completed and the case moved on to its next one.
    EventCompleted {
        case: CaseId,
        event_type: EventType,
        timestamp: SimTime,
    },
    /// The case completed its last event (or had none) and its record was emitted.
    Finished {
        case: CaseId,
        ambulance: AmbulanceId,
        timestamp: SimTime,
    },
}

impl StepOutcome {
    pub fn case(&self) -> CaseId {
        match *self {
            StepOutcome::Dispatched { case, .. }
            | StepOutcome::Queued { case, .. }
            | StepOutcome::Declined { case, .. }
            | StepOutcome::EventCompleted { case, .. }
            | StepOutcome::Finished { case, .. } => case,
        }
    }

    pub fn timestamp(&self) -> SimTime {
        match *self {
            StepOutcome::Dispatched { timestamp, .. }
            | StepOutcome::Queued { timestamp, .. }
            | StepOutcome::Declined { timestamp, .. }
            | StepOutcome::EventCompleted { timestamp, .. }
            | StepOutcome::Finished { timestamp, .. } => timestamp,
        }
    }
}

struct PendingCase {
    case: Case,
    queued_at: SimTime,
}

struct ActiveCase {
    record: CaseRecord,
    /// Index into the fleet.
    ambulance: usize,
    /// Event in progress; appended to the history when it completes.
    current: CaseEvent,
    events: CaseEvents,
}

enum Dispatch {
    Assigned(StepOutcome),
    Declined(Case),
}

pub struct EventDrivenSimulator {
    ambulances: Vec<Ambulance>,
    case_stream: Box<dyn CaseStream>,
    selector: Box<dyn AmbulanceSelector>,
    treatment: Box<dyn EventGenerator>,
    coverage: Option<Box<dyn CoverageAlgorithm>>,
    clock: SimulationClock,
    /// Peeked arrival, not yet released into the simulation.
    next_arrival: Option<Case>,
    arrivals_exhausted: bool,
    pending: VecDeque<PendingCase>,
    active: BTreeMap<CaseId, ActiveCase>,
    records: Vec<CaseRecord>,
    finished: usize,
    released: usize,
    /// Ids released so far; a case id may enter the run only once.
    released_ids: BTreeSet<CaseId>,
    backlog_blocked: bool,
    telemetry: SimTelemetry,
}

impl EventDrivenSimulator {
    pub fn new(
        ambulances: Vec<Ambulance>,
        case_stream: Box<dyn CaseStream>,
        selector: Box<dyn AmbulanceSelector>,
        treatment: Box<dyn EventGenerator>,
    ) -> Self {
        Self {
            ambulances,
            case_stream,
            selector,
            treatment,
            coverage: None,
            clock: SimulationClock::default(),
            next_arrival: None,
            arrivals_exhausted: false,
            pending: VecDeque::new(),
            active: BTreeMap::new(),
            records: Vec::new(),
            finished: 0,
            released: 0,
            released_ids: BTreeSet::new(),
            backlog_blocked: false,
            telemetry: SimTelemetry::default(),
        }
    }

    /// Sample coverage now and after every step.
    pub fn with_coverage(mut self, mut coverage: Box<dyn CoverageAlgorithm>) -> Self {
        let fraction = coverage.calculate(&self.ambulances);
        self.telemetry.record_coverage(self.clock.now(), fraction);
        self.coverage = Some(coverage);
        self
    }

    pub fn now(&self) -> SimTime {
        self.clock.now()
    }

    pub fn ambulances(&self) -> &[Ambulance] {
        &self.ambulances
    }

    pub fn telemetry(&self) -> &SimTelemetry {
        &self.telemetry
    }

    /// Records emitted so far and not yet handed out by [`Self::run`].
    pub fn records(&self) -> &[CaseRecord] {
        &self.records
    }

    pub fn pending_cases(&self) -> impl Iterator<Item = &Case> {
        self.pending.iter().map(|p| &p.case)
    }

    pub fn is_backlog_blocked(&self) -> bool {
        self.backlog_blocked
    }

    pub fn counts(&self) -> CaseCounts {
        CaseCounts {
            pending: self.pending.len(),
            active: self.active.len(),
            finished: self.finished,
            released: self.released,
        }
    }

    /// Runs until arrivals are exhausted and no case is pending or active.
    pub fn run(&mut self) -> Result<Vec<CaseRecord>> {
        self.run_with_hook(|_, _| {})
    }

    /// Like [`Self::run`], calling `hook` after every step.
    pub fn run_with_hook<F>(&mut self, mut hook: F) -> Result<Vec<CaseRecord>>
    where
        F: FnMut(&Self, &StepOutcome),
    {
        info!(
            ambulances = self.ambulances.len(),
            remaining = ?self.case_stream.remaining(),
            "simulation started"
        );
        while let Some(outcome) = self.step()? {
            hook(self, &outcome);
        }
        info!(
            finished = self.finished,
            steps = self.telemetry.steps,
            end_time = self.clock.now(),
            max_pending = self.telemetry.max_pending,
            "simulation finished"
        );
        Ok(std::mem::take(&mut self.records))
    }

    /// Advances the simulation by one step. `Ok(None)` once everything is done.
    pub fn step(&mut self) -> Result<Option<StepOutcome>> {
        let Some(outcome) = self.advance()? else {
            return Ok(None);
        };

        self.telemetry.steps += 1;
        self.telemetry.record_pending(self.pending.len());
        if let Some(coverage) = self.coverage.as_mut() {
            let fraction = coverage.calculate(&self.ambulances);
            self.telemetry.record_coverage(self.clock.now(), fraction);
        }

        debug_assert!(
            self.counts().is_conserved(),
            "case counts not conserved: {:?}",
            self.counts()
        );
        debug!(
            step = self.telemetry.steps,
            ?outcome,
            pending = self.pending.len(),
            active = self.active.len(),
            "step"
        );
        Ok(Some(outcome))
    }

    fn advance(&mut self) -> Result<Option<StepOutcome>> {
        if !self.backlog_blocked && self.has_available() {
            if let Some(front) = self.pending.pop_front() {
                return self.dispatch_pending(front).map(Some);
            }
        }

        let next_arrival = self.peek_arrival()?;
        let next_completion = self.clock.next_completion_time();
        let arrival_first = match (next_arrival, next_completion) {
            (Some(arrival), Some(completion)) => arrival < completion,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => {
                if self.pending.is_empty() {
                    return Ok(None);
                }
                warn!(
                    at = self.clock.now(),
                    pending = self.pending.len(),
                    "dispatch stalled"
                );
                return Err(SimError::DispatchStalled {
                    at: self.clock.now(),
                    pending: self.pending.len(),
                });
            }
        };

        if arrival_first {
            if let Some(case) = self.next_arrival.take() {
                return self.accept_arrival(case).map(Some);
            }
        }
        self.complete_next().map(Some)
    }

    fn has_available(&self) -> bool {
        self.ambulances.iter().any(Ambulance::is_available)
    }

    fn peek_arrival(&mut self) -> Result<Option<SimTime>> {
        if self.next_arrival.is_none() && !self.arrivals_exhausted {
            self.next_arrival = self.case_stream.next_case()?;
            self.arrivals_exhausted = self.next_arrival.is_none();
        }
        Ok(self.next_arrival.as_ref().map(|case| case.datetime))
    }

    fn accept_arrival(&mut self, case: Case) -> Result<StepOutcome> {
        if !self.released_ids.insert(case.id) {
            return Err(SimError::DuplicateCase(case.id));
        }
        self.released += 1;
        self.clock.advance_to(case.datetime);
        debug!(case = %case.id, priority = case.priority, at = self.clock.now(), "case arrived");

        if !self.has_available() {
            return Ok(self.enqueue(case));
        }
        match self.dispatch(case, None)? {
            Dispatch::Assigned(outcome) => Ok(outcome),
            Dispatch::Declined(case) => {
                self.telemetry.declines += 1;
                debug!(case = %case.id, "selector declined arrival");
                Ok(self.enqueue(case))
            }
        }
    }

    fn enqueue(&mut self, mut case: Case) -> StepOutcome {
        let now = self.clock.now();
        let id = case.id;
        case.times_queued += 1;
        self.telemetry.queued += 1;
        self.pending.push_back(PendingCase {
            case,
            queued_at: now,
        });
        StepOutcome::Queued {
            case: id,
            timestamp: now,
        }
    }

    fn dispatch_pending(&mut self, front: PendingCase) -> Result<StepOutcome> {
        let queued_at = front.queued_at;
        match self.dispatch(front.case, Some(queued_at))? {
            Dispatch::Assigned(outcome) => Ok(outcome),
            Dispatch::Declined(case) => {
                let id = case.id;
                self.pending.push_front(PendingCase { case, queued_at });
                self.backlog_blocked = true;
                self.telemetry.declines += 1;
                warn!(
                    case = %id,
                    pending = self.pending.len(),
                    "selector declined queued case, backlog blocked until an ambulance is released"
                );
                Ok(StepOutcome::Declined {
                    case: id,
                    timestamp: self.clock.now(),
                })
            }
        }
    }

    /// Asks the selector for an ambulance and starts the case's treatment.
    /// `queued_at` is set when the case comes from the pending queue.
    fn dispatch(&mut self, mut case: Case, queued_at: Option<SimTime>) -> Result<Dispatch> {
        let now = self.clock.now();

        let available: Vec<&Ambulance> = self
            .ambulances
            .iter()
            .filter(|a| a.is_available())
            .collect();
        let chosen = if available.is_empty() {
            None
        } else {
            self.selector.select(&available, &case, now)
        };
        let Some(ambulance_id) = chosen else {
            return Ok(Dispatch::Declined(case));
        };
        let index = self
            .ambulances
            .iter()
            .position(|a| a.id == ambulance_id && a.is_available())
            .ok_or(SimError::UnknownAmbulance(ambulance_id))?;

        if let Some(queued_at) = queued_at {
            case.delay += now.saturating_sub(queued_at);
        }
        let mut events = self.treatment.events(&case, &self.ambulances[index], now);
        let mut record = CaseRecord::new(case, ambulance_id, now);
        let case_id = record.case.id;
        self.telemetry.assignments += 1;

        let Some(first) = events.next() else {
            record.finished_at = Some(now);
            self.records.push(record);
            self.finished += 1;
            debug!(case = %case_id, ambulance = %ambulance_id, "case has no treatment events");
            return Ok(Dispatch::Assigned(StepOutcome::Finished {
                case: case_id,
                ambulance: ambulance_id,
                timestamp: now,
            }));
        };

        let end_time = now.saturating_add(first.duration);
        let ambulance = &mut self.ambulances[index];
        let here = ambulance.location;
        ambulance.deploy(here, now, end_time)?;
        self.clock.schedule(Completion {
            timestamp: end_time,
            case_id,
        });
        debug!(
            case = %case_id,
            ambulance = %ambulance_id,
            event = %first.event_type,
            until = end_time,
            delay = record.delay,
            "case dispatched"
        );
        self.active.insert(
            case_id,
            ActiveCase {
                record,
                ambulance: index,
                current: first,
                events,
            },
        );

        Ok(Dispatch::Assigned(StepOutcome::Dispatched {
            case: case_id,
            ambulance: ambulance_id,
            timestamp: now,
            from_queue: queued_at.is_some(),
        }))
    }

    fn complete_next(&mut self) -> Result<StepOutcome> {
        let Some(completion) = self.clock.pop_next() else {
            // Only reached when advance() saw a completion.
            return Err(SimError::DispatchStalled {
                at: self.clock.now(),
                pending: self.pending.len(),
            });
        };
        let now = completion.timestamp;
        let case_id = completion.case_id;
        let mut active = self
            .active
            .remove(&case_id)
            .ok_or(SimError::UnknownCase(case_id))?;

        let done = active.current;
        active.record.event_history.push(done);
        self.ambulances[active.ambulance].location = done.destination;

        if let Some(next) = active.events.next() {
            let end_time = now.saturating_add(next.duration);
            self.ambulances[active.ambulance].reschedule(end_time)?;
            active.current = next;
            self.clock.schedule(Completion {
                timestamp: end_time,
                case_id,
            });
            self.active.insert(case_id, active);
            return Ok(StepOutcome::EventCompleted {
                case: case_id,
                event_type: done.event_type,
                timestamp: now,
            });
        }

        let ambulance = &mut self.ambulances[active.ambulance];
        let base = ambulance.base;
        ambulance.finish(base)?;
        let ambulance_id = ambulance.id;

        active.record.finished_at = Some(now);
        self.records.push(active.record);
        self.finished += 1;
        if self.backlog_blocked {
            debug!(ambulance = %ambulance_id, "ambulance released, backlog unblocked");
            self.backlog_blocked = false;
        }

        Ok(StepOutcome::Finished {
            case: case_id,
            ambulance: ambulance_id,
            timestamp: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cases::ReplayCaseStream;
    use crate::model::Location;
    use crate::selection::FirstAvailableSelector;
    use crate::test_helpers::{case_at, test_fleet, DecliningSelector};
    use crate::treatment::FixedTreatment;

    fn simulator(
        fleet_size: usize,
        arrivals: &[SimTime],
        treatment: FixedTreatment,
    ) -> EventDrivenSimulator {
        let cases: Vec<Case> = arrivals
            .iter()
            .enumerate()
            .map(|(i, t)| case_at(i as u64 + 1, *t))
            .collect();
        EventDrivenSimulator::new(
            test_fleet(fleet_size),
            Box::new(ReplayCaseStream::new(cases)),
            Box::new(FirstAvailableSelector),
            Box::new(treatment),
        )
    }

    #[test]
    fn completion_wins_tie_with_arrival() {
        let mut sim = simulator(1, &[0, 5], FixedTreatment::single(5));
        assert!(matches!(
            sim.step().expect("step"),
            Some(StepOutcome::Dispatched { timestamp: 0, .. })
        ));
        // Case 2 arrives at t=5, exactly when case 1 completes.
        assert_eq!(
            sim.step().expect("step"),
            Some(StepOutcome::Finished {
                case: CaseId(1),
                ambulance: AmbulanceId(1),
                timestamp: 5
            })
        );
        assert_eq!(
            sim.step().expect("step"),
            Some(StepOutcome::Dispatched {
                case: CaseId(2),
                ambulance: AmbulanceId(1),
                timestamp: 5,
                from_queue: false
            })
        );
    }

    #[test]
    fn empty_treatment_finishes_on_assignment() {
        let mut sim = simulator(1, &[3], FixedTreatment::new(Vec::new()));
        let records = sim.run().expect("run");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].finished_at, Some(3));
        assert!(records[0].event_history.is_empty());
        assert!(sim.ambulances()[0].is_available());
    }

    #[test]
    fn multi_event_treatment_reschedules_ambulance() {
        let treatment = FixedTreatment::new(vec![
            (EventType::ToIncident, 4),
            (EventType::AtIncident, 6),
        ]);
        let mut sim = simulator(1, &[0], treatment);
        sim.step().expect("dispatch");
        assert_eq!(sim.ambulances()[0].end_time(), Some(4));
        assert_eq!(
            sim.step().expect("first event"),
            Some(StepOutcome::EventCompleted {
                case: CaseId(1),
                event_type: EventType::ToIncident,
                timestamp: 4
            })
        );
        assert_eq!(sim.ambulances()[0].end_time(), Some(10));
        assert_eq!(sim.ambulances()[0].location, Location::new(32.51, -117.02));

        let records = sim.run().expect("run");
        assert_eq!(records[0].event_history.len(), 2);
        assert_eq!(records[0].finished_at, Some(10));
        assert_eq!(sim.ambulances()[0].location, sim.ambulances()[0].base);
    }

    #[test]
    fn declined_backlog_stalls_when_nothing_can_progress() {
        let mut sim = EventDrivenSimulator::new(
            test_fleet(1),
            Box::new(ReplayCaseStream::new(vec![case_at(1, 0)])),
            Box::new(DecliningSelector),
            Box::new(FixedTreatment::single(5)),
        );
        assert_eq!(
            sim.step().expect("arrival"),
            Some(StepOutcome::Queued {
                case: CaseId(1),
                timestamp: 0
            })
        );
        assert_eq!(
            sim.step().expect("decline"),
            Some(StepOutcome::Declined {
                case: CaseId(1),
                timestamp: 0
            })
        );
        assert!(sim.is_backlog_blocked());
        assert_eq!(
            sim.step(),
            Err(SimError::DispatchStalled { at: 0, pending: 1 })
        );
        assert_eq!(sim.counts().pending, 1);
    }

    #[test]
    fn empty_fleet_with_cases_stalls() {
        let mut sim = simulator(0, &[0], FixedTreatment::single(5));
        assert!(matches!(sim.run(), Err(SimError::DispatchStalled { .. })));
    }

    /// Hands out cases as given, without any checks.
    struct UncheckedStream(VecDeque<Case>);

    impl CaseStream for UncheckedStream {
        fn next_case(&mut self) -> Result<Option<Case>> {
            Ok(self.0.pop_front())
        }
    }

    #[test]
    fn repeated_case_id_fails_instead_of_replacing_active_case() {
        let mut sim = EventDrivenSimulator::new(
            test_fleet(2),
            Box::new(UncheckedStream(VecDeque::from([case_at(1, 0), case_at(1, 1)]))),
            Box::new(FirstAvailableSelector),
            Box::new(FixedTreatment::single(5)),
        );
        assert_eq!(sim.run(), Err(SimError::DuplicateCase(CaseId(1))));
        let counts = sim.counts();
        assert_eq!((counts.released, counts.active), (1, 1));
        assert!(counts.is_conserved());
    }

    #[test]
    fn no_cases_is_immediately_done() {
        let mut sim = simulator(2, &[], FixedTreatment::single(5));
        assert_eq!(sim.step().expect("step"), None);
        assert_eq!(sim.counts(), CaseCounts::default());
    }
}
