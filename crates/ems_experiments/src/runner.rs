//! Parallel replication execution using rayon.
//!
//! Each replication builds its own simulator from the shared [`Scenario`] and
//! runs it to completion; nothing mutable is shared between replications.

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{debug, info};

use ems_core::model::CaseRecord;

use crate::error::ExperimentError;
use crate::metrics::{extract_metrics, SimulationResult};
use crate::scenario::Scenario;

/// Case records and metrics of one replication.
#[derive(Debug, Clone)]
pub struct ReplicationOutput {
    pub replication: usize,
    pub seed: u64,
    pub records: Vec<CaseRecord>,
    pub metrics: SimulationResult,
}

/// Seed of replication `replication`: consecutive seeds from the base seed.
pub fn replication_seed(base_seed: u64, replication: usize) -> u64 {
    base_seed.wrapping_add(replication as u64)
}

/// Run one replication to completion.
pub fn run_single_replication(
    scenario: &Scenario,
    replication: usize,
) -> Result<ReplicationOutput, ExperimentError> {
    let seed = replication_seed(scenario.settings.seed, replication);
    let mut simulator = scenario.build_simulator(seed);
    let records = simulator
        .run()
        .map_err(|source| ExperimentError::Simulation {
            replication,
            source,
        })?;
    let metrics = extract_metrics(replication, seed, &simulator, &records);
    debug!(
        replication,
        seed,
        finished = metrics.finished_cases,
        avg_delay_ms = metrics.avg_delay_ms,
        "replication finished"
    );
    Ok(ReplicationOutput {
        replication,
        seed,
        records,
        metrics,
    })
}

/// Run every replication configured in the scenario's settings.
pub fn run_replications(scenario: &Scenario) -> Result<Vec<ReplicationOutput>, ExperimentError> {
    run_replications_with_progress(scenario, true)
}

/// Run every replication, optionally with a progress bar.
///
/// Results come back in replication order. The first failing replication
/// aborts the whole batch.
pub fn run_replications_with_progress(
    scenario: &Scenario,
    show_progress: bool,
) -> Result<Vec<ReplicationOutput>, ExperimentError> {
    let total = scenario.settings.replications;
    let pb = if show_progress && total > 0 {
        let bar = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        Some(bar)
    } else {
        None
    };

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(threads) = scenario.settings.threads {
        builder = builder.num_threads(threads);
    }
    let pool = builder.build()?;

    info!(
        replications = total,
        threads = pool.current_num_threads(),
        "running replications"
    );

    let pb_clone = pb.clone();
    let outputs = pool.install(|| {
        (0..total)
            .into_par_iter()
            .map(|replication| {
                let output = run_single_replication(scenario, replication);
                if let Some(ref progress_bar) = pb_clone {
                    progress_bar.inc(1);
                }
                output
            })
            .collect::<Result<Vec<_>, _>>()
    });

    if let Some(ref progress_bar) = pb {
        progress_bar.finish_with_message("Completed");
    }

    outputs
}
