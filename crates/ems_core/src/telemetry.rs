//! Telemetry: per-run counters and coverage samples.

use serde::{Deserialize, Serialize};

use crate::clock::SimTime;

/// Coverage fraction measured after a step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoverageSample {
    pub timestamp: SimTime,
    pub coverage: f64,
}

/// Cases per lifecycle state at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseCounts {
    pub pending: usize,
    pub active: usize,
    pub finished: usize,
    /// Cases the stream has handed to the simulator so far.
    pub released: usize,
}

impl CaseCounts {
    /// Every released case is in exactly one state.
    pub fn is_conserved(&self) -> bool {
        self.pending + self.active + self.finished == self.released
    }
}

/// Collects run telemetry. Owned by the simulator.
#[derive(Debug, Clone, Default)]
pub struct SimTelemetry {
    pub steps: u64,
    pub assignments: u64,
    /// Arrivals that went to the pending queue.
    pub queued: u64,
    /// Dispatch attempts the selector turned down.
    pub declines: u64,
    pub max_pending: usize,
    pub coverage: Vec<CoverageSample>,
}

impl SimTelemetry {
    pub fn record_pending(&mut self, pending: usize) {
        self.max_pending = self.max_pending.max(pending);
    }

    pub fn record_coverage(&mut self, timestamp: SimTime, coverage: f64) {
        self.coverage.push(CoverageSample {
            timestamp,
            coverage,
        });
    }

    /// Time-weighted mean coverage over the sampled interval; each sample
    /// holds until the next one. `None` with fewer than two distinct instants.
    pub fn time_weighted_coverage(&self) -> Option<f64> {
        let first = self.coverage.first()?;
        let last = self.coverage.last()?;
        let span = last.timestamp.saturating_sub(first.timestamp);
        if span == 0 {
            return None;
        }
        let weighted: f64 = self
            .coverage
            .windows(2)
            .map(|w| w[0].coverage * w[1].timestamp.saturating_sub(w[0].timestamp) as f64)
            .sum();
        Some(weighted / span as f64)
    }

    pub fn min_coverage(&self) -> Option<f64> {
        self.coverage
            .iter()
            .map(|s| s.coverage)
            .min_by(|a, b| a.total_cmp(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_weighted_coverage_holds_each_sample() {
        let mut telemetry = SimTelemetry::default();
        telemetry.record_coverage(0, 1.0);
        telemetry.record_coverage(10, 0.5);
        telemetry.record_coverage(10, 0.0);
        telemetry.record_coverage(30, 1.0);
        // 1.0 for 10ms, 0.0 for 20ms
        let mean = telemetry.time_weighted_coverage().expect("span");
        assert!((mean - 10.0 / 30.0).abs() < 1e-12);
        assert_eq!(telemetry.min_coverage(), Some(0.0));
    }

    #[test]
    fn no_span_no_mean() {
        let mut telemetry = SimTelemetry::default();
        assert_eq!(telemetry.time_weighted_coverage(), None);
        telemetry.record_coverage(5, 1.0);
        assert_eq!(telemetry.time_weighted_coverage(), None);
    }

    #[test]
    fn counts_conservation() {
        let counts = CaseCounts {
            pending: 1,
            active: 2,
            finished: 3,
            released: 6,
        };
        assert!(counts.is_conserved());
        assert!(!CaseCounts { released: 7, ..counts }.is_conserved());
    }
}
