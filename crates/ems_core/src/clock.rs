//! Simulated time and the ongoing-event heap.
//!
//! Time only moves in logical jumps: either to the next case arrival or to the
//! earliest completion among in-progress cases. Completions live in a min-heap
//! keyed by `(timestamp, case id)`; an entry is never changed while resident,
//! a case that moves on to its next event is popped and pushed again.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::model::CaseId;

/// Simulation time in milliseconds since the run's epoch.
pub type SimTime = u64;

pub const ONE_SEC_MS: u64 = 1000;
pub const ONE_MIN_MS: u64 = 60 * ONE_SEC_MS;
pub const ONE_HOUR_MS: u64 = 60 * ONE_MIN_MS;

/// The instant an in-progress case finishes its current event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub timestamp: SimTime,
    pub case_id: CaseId,
}

impl Ord for Completion {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering to make BinaryHeap a min-heap by timestamp,
        // equal timestamps pop the lowest case id first.
        other
            .timestamp
            .cmp(&self.timestamp)
            .then_with(|| other.case_id.cmp(&self.case_id))
    }
}

impl PartialOrd for Completion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default)]
pub struct SimulationClock {
    now: SimTime,
    completions: BinaryHeap<Completion>,
}

impl SimulationClock {
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Moves the clock forward to an arrival. Time never runs backwards.
    pub fn advance_to(&mut self, timestamp: SimTime) {
        debug_assert!(timestamp >= self.now, "clock must not run backwards");
        self.now = self.now.max(timestamp);
    }

    pub fn schedule(&mut self, completion: Completion) {
        debug_assert!(
            completion.timestamp >= self.now,
            "completion timestamp must be >= current time"
        );
        self.completions.push(completion);
    }

    pub fn next_completion_time(&self) -> Option<SimTime> {
        self.completions.peek().map(|c| c.timestamp)
    }

    /// Pops the earliest completion and advances the clock to it.
    pub fn pop_next(&mut self) -> Option<Completion> {
        let completion = self.completions.pop()?;
        self.now = completion.timestamp;
        Some(completion)
    }

    pub fn pending_completions(&self) -> usize {
        self.completions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.completions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_pops_completions_in_time_order() {
        let mut clock = SimulationClock::default();
        clock.schedule(Completion {
            timestamp: 10,
            case_id: CaseId(1),
        });
        clock.schedule(Completion {
            timestamp: 5,
            case_id: CaseId(2),
        });
        clock.schedule(Completion {
            timestamp: 20,
            case_id: CaseId(3),
        });

        let first = clock.pop_next().expect("first completion");
        assert_eq!(first.timestamp, 5);
        assert_eq!(clock.now(), 5);

        let second = clock.pop_next().expect("second completion");
        assert_eq!(second.timestamp, 10);
        assert_eq!(clock.now(), 10);

        let third = clock.pop_next().expect("third completion");
        assert_eq!(third.timestamp, 20);
        assert_eq!(clock.now(), 20);

        assert!(clock.pop_next().is_none());
        assert!(clock.is_empty());
    }

    #[test]
    fn simultaneous_completions_pop_lowest_case_first() {
        let mut clock = SimulationClock::default();
        for id in [7, 3, 5] {
            clock.schedule(Completion {
                timestamp: 42,
                case_id: CaseId(id),
            });
        }
        let order: Vec<u64> = std::iter::from_fn(|| clock.pop_next())
            .map(|c| c.case_id.0)
            .collect();
        assert_eq!(order, vec![3, 5, 7]);
    }

    #[test]
    fn advance_to_moves_now_and_peek_does_not() {
        let mut clock = SimulationClock::default();
        clock.advance_to(15);
        clock.schedule(Completion {
            timestamp: 30,
            case_id: CaseId(1),
        });
        assert_eq!(clock.next_completion_time(), Some(30));
        assert_eq!(clock.now(), 15);
        assert_eq!(clock.pending_completions(), 1);
    }
}
