use std::path::PathBuf;

use ems_core::travel::TravelTimesError;
use ems_core::SimError;
use thiserror::Error;

/// Failures while loading inputs or running replications.
#[derive(Error, Debug)]
pub enum ExperimentError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid CSV in {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("invalid settings in {}: {source}", .path.display())]
    Settings {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{}, record {record}: cannot parse datetime {value:?}: {source}", .path.display())]
    Datetime {
        path: PathBuf,
        record: usize,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("{}, record {record}: {message}", .path.display())]
    InvalidRecord {
        path: PathBuf,
        record: usize,
        message: String,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    TravelTimes(#[from] TravelTimesError),

    #[cfg(feature = "precomputed")]
    #[error("failed to load {}: {source}", .path.display())]
    Precomputed {
        path: PathBuf,
        #[source]
        source: ems_core::travel::precomputed::PrecomputedError,
    },

    #[error("replication {replication} failed: {source}")]
    Simulation {
        replication: usize,
        #[source]
        source: SimError,
    },

    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
