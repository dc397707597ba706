use serde::Serialize;

use crate::metrics::{ExperimentSummary, SimulationResult};

#[derive(Serialize)]
struct JsonReport<'a> {
    summary: Option<&'a ExperimentSummary>,
    results: &'a [SimulationResult],
}

pub(crate) fn export_to_json_impl(
    results: &[SimulationResult],
    summary: Option<&ExperimentSummary>,
    file: std::fs::File,
) -> Result<(), Box<dyn std::error::Error>> {
    serde_json::to_writer_pretty(file, &JsonReport { summary, results })?;
    Ok(())
}
