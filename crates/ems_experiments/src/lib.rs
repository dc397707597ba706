//! Experiment runner for the EMS dispatch simulation.
//!
//! Loads datasets and settings, runs independent replications in parallel and
//! exports case records and metrics.
//!
//! # Quick Start
//!
//! ```no_run
//! use ems_experiments::{run_replications, summarize, Scenario, Settings};
//!
//! let settings = Settings::from_file("settings/tijuana.json")?.with_replications(8);
//! let scenario = Scenario::load(settings)?;
//! let outputs = run_replications(&scenario)?;
//! let results: Vec<_> = outputs.iter().map(|o| o.metrics.clone()).collect();
//! println!("{:?}", summarize(&results));
//! # Ok::<(), ems_experiments::ExperimentError>(())
//! ```
//!
//! # Architecture
//!
//! - [`config`]: settings file and defaults
//! - [`dataset`]: CSV loaders for cases, points and travel times
//! - [`scenario`]: loaded inputs and per-replication simulator construction
//! - [`runner`]: parallel replications using rayon
//! - [`metrics`]: per-replication statistics and summaries
//! - [`export`]: CSV/JSON export

pub mod config;
pub mod dataset;
pub mod error;
pub mod export;
pub mod metrics;
pub mod runner;
pub mod scenario;

pub use config::{SelectorKind, Settings};
pub use error::ExperimentError;
pub use export::{export_records_to_csv, export_results_to_csv, export_to_json};
pub use metrics::{summarize, ExperimentSummary, SimulationResult};
pub use runner::{run_replications, run_replications_with_progress, ReplicationOutput};
pub use scenario::Scenario;
