//! Result export.
//!
//! Case records and per-replication metrics go to CSV; metrics and the
//! cross-replication summary go to JSON.

use std::path::Path;

use crate::metrics::{ExperimentSummary, SimulationResult};
use crate::runner::ReplicationOutput;

#[path = "export/csv.rs"]
mod csv;
#[path = "export/json.rs"]
mod json;
#[path = "export/writer_utils.rs"]
mod writer_utils;

/// Export the case records of every replication to CSV, one row per case.
///
/// # Errors
///
/// Returns an error if there is nothing to export, or if file creation or CSV
/// writing fails.
pub fn export_records_to_csv(
    outputs: &[ReplicationOutput],
    path: impl AsRef<Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    writer_utils::ensure_rows(outputs, "case records")?;
    let file = writer_utils::create_output_file(path.as_ref())?;
    csv::export_records_impl(outputs, file)
}

/// Export per-replication metrics to CSV, one row per replication.
pub fn export_results_to_csv(
    results: &[SimulationResult],
    path: impl AsRef<Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    writer_utils::ensure_rows(results, "replication results")?;
    let file = writer_utils::create_output_file(path.as_ref())?;
    csv::export_results_impl(results, file)
}

/// Export per-replication metrics and their summary to JSON.
pub fn export_to_json(
    results: &[SimulationResult],
    summary: Option<&ExperimentSummary>,
    path: impl AsRef<Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let file = writer_utils::create_output_file(path.as_ref())?;
    json::export_to_json_impl(results, summary, file)
}
