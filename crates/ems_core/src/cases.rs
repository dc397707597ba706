//! Case streams: lazy, time-ordered sources of case arrivals.

use std::collections::{BTreeSet, VecDeque};

use crate::clock::SimTime;
use crate::error::{Result, SimError};
use crate::generators::{DurationGenerator, LocationGenerator, PriorityGenerator};
use crate::model::{Case, CaseId};

/// A forward-only sequence of cases in non-decreasing arrival order.
pub trait CaseStream: Send {
    /// Next arrival, or `None` once the stream is exhausted.
    fn next_case(&mut self) -> Result<Option<Case>>;

    /// Number of cases still to come, when known.
    fn remaining(&self) -> Option<usize> {
        None
    }
}

/// Synthesizes cases from independent generators for inter-arrival time,
/// location and priority. Unbounded unless a quantity is set.
#[derive(Debug)]
pub struct RandomCaseStream {
    time: SimTime,
    next_id: u64,
    quantity: Option<usize>,
    produced: usize,
    exhausted: bool,
    durations: Box<dyn DurationGenerator>,
    locations: Box<dyn LocationGenerator>,
    priorities: Box<dyn PriorityGenerator>,
}

impl RandomCaseStream {
    pub fn new(
        initial_time: SimTime,
        durations: Box<dyn DurationGenerator>,
        locations: Box<dyn LocationGenerator>,
        priorities: Box<dyn PriorityGenerator>,
    ) -> Self {
        Self {
            time: initial_time,
            next_id: 1,
            quantity: None,
            produced: 0,
            exhausted: false,
            durations,
            locations,
            priorities,
        }
    }

    /// Stop after `quantity` cases.
    pub fn with_quantity(mut self, quantity: usize) -> Self {
        self.quantity = Some(quantity);
        self
    }
}

impl CaseStream for RandomCaseStream {
    fn next_case(&mut self) -> Result<Option<Case>> {
        if self.exhausted || self.quantity.is_some_and(|q| self.produced >= q) {
            return Ok(None);
        }

        let duration_ms = self.durations.generate(self.time);
        // Also rejects NaN.
        if !(duration_ms >= 0.0) {
            return Err(SimError::NegativeDuration {
                duration_ms,
                timestamp: self.time,
            });
        }
        if duration_ms.is_infinite() {
            self.exhausted = true;
            return Ok(None);
        }

        self.time = self.time.saturating_add(duration_ms.round() as u64);
        let location = self.locations.generate(self.time);
        let priority = self.priorities.generate(self.time);
        let case = Case::new(CaseId(self.next_id), location, self.time, priority);

        self.next_id += 1;
        self.produced += 1;
        Ok(Some(case))
    }

    fn remaining(&self) -> Option<usize> {
        if self.exhausted {
            return Some(0);
        }
        self.quantity.map(|q| q.saturating_sub(self.produced))
    }
}

/// Replays a pre-loaded list of cases, checking that arrivals never go back
/// in time and that no case id repeats.
#[derive(Debug, Clone, Default)]
pub struct ReplayCaseStream {
    cases: VecDeque<Case>,
    last_arrival: Option<SimTime>,
    seen: BTreeSet<CaseId>,
}

impl ReplayCaseStream {
    pub fn new(cases: impl IntoIterator<Item = Case>) -> Self {
        Self {
            cases: cases.into_iter().collect(),
            last_arrival: None,
            seen: BTreeSet::new(),
        }
    }

    /// Sorts by arrival time (stable, so equal times keep their input order) before replaying.
    pub fn sorted(cases: impl IntoIterator<Item = Case>) -> Self {
        let mut cases: Vec<Case> = cases.into_iter().collect();
        cases.sort_by_key(|case| case.datetime);
        Self::new(cases)
    }

    /// Keep only the first `quantity` cases.
    pub fn with_quantity(mut self, quantity: usize) -> Self {
        self.cases.truncate(quantity);
        self
    }
}

impl CaseStream for ReplayCaseStream {
    fn next_case(&mut self) -> Result<Option<Case>> {
        let Some(case) = self.cases.pop_front() else {
            return Ok(None);
        };
        if let Some(previous) = self.last_arrival {
            if case.datetime < previous {
                return Err(SimError::UnorderedArrivals {
                    case: case.id,
                    arrival: case.datetime,
                    previous,
                });
            }
        }
        if !self.seen.insert(case.id) {
            return Err(SimError::DuplicateCase(case.id));
        }
        self.last_arrival = Some(case.datetime);
        Ok(Some(case))
    }

    fn remaining(&self) -> Option<usize> {
        Some(self.cases.len())
    }
}
