//! Metrics extraction from simulation results.
//!
//! Summarizes one replication's case records and telemetry into delay,
//! response-time, service-time and coverage statistics.

use ems_core::model::CaseRecord;
use ems_core::simulator::EventDrivenSimulator;
use serde::{Deserialize, Serialize};

/// Aggregated metrics from a single replication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub replication: usize,
    pub seed: u64,
    pub num_ambulances: usize,
    /// Cases released into the simulation.
    pub total_cases: usize,
    pub finished_cases: usize,
    /// Cases that had to wait in the pending queue.
    pub queued_cases: usize,
    /// Average time in the pending queue, over all cases.
    pub avg_delay_ms: f64,
    pub median_delay_ms: f64,
    pub p90_delay_ms: f64,
    /// Arrival to the ambulance reaching the incident.
    pub avg_response_ms: f64,
    pub median_response_ms: f64,
    pub p90_response_ms: f64,
    /// Assignment to the end of the last treatment event.
    pub avg_service_ms: f64,
    pub median_service_ms: f64,
    pub p90_service_ms: f64,
    /// Time-weighted mean coverage; `None` when coverage was not sampled.
    pub avg_coverage: Option<f64>,
    pub min_coverage: Option<f64>,
    pub max_pending: usize,
    pub declines: u64,
    pub steps: u64,
    pub end_time_ms: u64,
}

impl SimulationResult {
    /// Average, median and P90 of `values`; zeros when empty.
    pub(crate) fn calculate_stats(values: &[u64]) -> (f64, f64, f64) {
        if values.is_empty() {
            return (0.0, 0.0, 0.0);
        }

        let mut sorted = values.to_vec();
        sorted.sort_unstable();

        let avg = sorted.iter().map(|v| *v as f64).sum::<f64>() / sorted.len() as f64;
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] as f64 + sorted[mid] as f64) / 2.0
        } else {
            sorted[mid] as f64
        };
        // floor(0.9 * (n - 1))
        let p90_idx = ((sorted.len() - 1) as f64 * 0.9) as usize;
        let p90 = sorted[p90_idx.min(sorted.len() - 1)] as f64;

        (avg, median, p90)
    }
}

/// Metrics of a finished replication. `records` are the records the run returned.
pub fn extract_metrics(
    replication: usize,
    seed: u64,
    simulator: &EventDrivenSimulator,
    records: &[CaseRecord],
) -> SimulationResult {
    let delays: Vec<u64> = records.iter().map(|r| r.delay).collect();
    let responses: Vec<u64> = records.iter().filter_map(CaseRecord::response_time).collect();
    let services: Vec<u64> = records.iter().filter_map(CaseRecord::service_time).collect();

    let (avg_delay_ms, median_delay_ms, p90_delay_ms) = SimulationResult::calculate_stats(&delays);
    let (avg_response_ms, median_response_ms, p90_response_ms) =
        SimulationResult::calculate_stats(&responses);
    let (avg_service_ms, median_service_ms, p90_service_ms) =
        SimulationResult::calculate_stats(&services);

    let telemetry = simulator.telemetry();
    let counts = simulator.counts();

    SimulationResult {
        replication,
        seed,
        num_ambulances: simulator.ambulances().len(),
        total_cases: counts.released,
        finished_cases: counts.finished,
        queued_cases: records.iter().filter(|r| r.case.times_queued > 0).count(),
        avg_delay_ms,
        median_delay_ms,
        p90_delay_ms,
        avg_response_ms,
        median_response_ms,
        p90_response_ms,
        avg_service_ms,
        median_service_ms,
        p90_service_ms,
        avg_coverage: telemetry.time_weighted_coverage(),
        min_coverage: telemetry.min_coverage(),
        max_pending: telemetry.max_pending,
        declines: telemetry.declines,
        steps: telemetry.steps,
        end_time_ms: simulator.now(),
    }
}

/// Mean of the headline metrics across replications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSummary {
    pub replications: usize,
    pub total_cases: usize,
    pub mean_avg_delay_ms: f64,
    pub mean_p90_delay_ms: f64,
    pub mean_avg_response_ms: f64,
    pub mean_p90_response_ms: f64,
    pub mean_coverage: Option<f64>,
    pub worst_coverage: Option<f64>,
}

pub fn summarize(results: &[SimulationResult]) -> Option<ExperimentSummary> {
    if results.is_empty() {
        return None;
    }
    let n = results.len() as f64;
    let mean = |f: fn(&SimulationResult) -> f64| results.iter().map(f).sum::<f64>() / n;

    let coverages: Vec<f64> = results.iter().filter_map(|r| r.avg_coverage).collect();
    let mean_coverage =
        (!coverages.is_empty()).then(|| coverages.iter().sum::<f64>() / coverages.len() as f64);
    let worst_coverage = results
        .iter()
        .filter_map(|r| r.min_coverage)
        .min_by(|a, b| a.total_cmp(b));

    Some(ExperimentSummary {
        replications: results.len(),
        total_cases: results.iter().map(|r| r.total_cases).sum(),
        mean_avg_delay_ms: mean(|r| r.avg_delay_ms),
        mean_p90_delay_ms: mean(|r| r.p90_delay_ms),
        mean_avg_response_ms: mean(|r| r.avg_response_ms),
        mean_p90_response_ms: mean(|r| r.p90_response_ms),
        mean_coverage,
        worst_coverage,
    })
}
