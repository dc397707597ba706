//! Run settings: a JSON settings file with command-line overrides on top.
//!
//! Every field has a default, so a settings file only lists what it changes.
//! Relative dataset paths are resolved against `filepath`.
//!
//! ```json
//! {
//!   "filepath": "data/",
//!   "bases": "bases.csv",
//!   "demands": "demands.csv",
//!   "cases": "cases.csv",
//!   "num_ambs": 12,
//!   "num_bases": 8
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use ems_core::clock::ONE_MIN_MS;
use serde::{Deserialize, Serialize};

use crate::error::ExperimentError;

/// Dispatch policy used for every replication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SelectorKind {
    /// Shortest travel time to the incident.
    #[default]
    Closest,
    /// Lowest ambulance id, ignoring distance.
    FirstAvailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory the dataset paths below are relative to.
    pub filepath: PathBuf,
    /// Candidate bases (`latitude,longitude`). Required.
    pub bases: Option<PathBuf>,
    /// Demand points for coverage; coverage is not sampled without them.
    pub demands: Option<PathBuf>,
    /// Historical cases to replay. Synthetic cases are generated when absent.
    pub cases: Option<PathBuf>,
    /// Hospitals patients are transported to; treatment ends on scene when absent.
    pub hospitals: Option<PathBuf>,
    /// Travel-time matrix, CSV or a `.bin` table (feature `precomputed`).
    /// Times are estimated on the H3 grid when absent.
    pub times: Option<PathBuf>,

    #[serde(alias = "num_ambs")]
    pub num_ambulances: usize,
    /// Use only the first `num_bases` bases from the file.
    pub num_bases: Option<usize>,
    /// Stop after this many cases.
    pub num_cases: Option<usize>,

    pub selector: SelectorKind,
    /// Decline dispatch when no ambulance is within this many minutes.
    pub max_travel_minutes: Option<f64>,
    /// Coverage threshold in minutes.
    pub r1_minutes: f64,
    pub on_scene_minutes: f64,
    pub at_hospital_minutes: f64,

    /// Arrival rate of synthetic cases.
    pub arrival_rate_per_hour: f64,
    /// Multipliers of the arrival rate for each hour of the day, from midnight.
    pub hourly_profile: Option<[f64; 24]>,
    /// Average speed for grid-estimated travel times.
    pub speed_kmh: f64,
    pub cache_capacity: usize,

    pub seed: u64,
    pub replications: usize,
    /// Worker threads; rayon's default when unset.
    pub threads: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            filepath: PathBuf::new(),
            bases: None,
            demands: None,
            cases: None,
            hospitals: None,
            times: None,
            num_ambulances: 5,
            num_bases: None,
            num_cases: None,
            selector: SelectorKind::Closest,
            max_travel_minutes: None,
            r1_minutes: 10.0,
            on_scene_minutes: 20.0,
            at_hospital_minutes: 15.0,
            arrival_rate_per_hour: 6.0,
            hourly_profile: None,
            speed_kmh: ems_core::travel::DEFAULT_SPEED_KMH,
            cache_capacity: 100_000,
            seed: 42,
            replications: 1,
            threads: None,
        }
    }
}

impl Settings {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ExperimentError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|source| ExperimentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ExperimentError::Settings {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Absolute or `filepath`-relative location of a dataset.
    pub fn resolve(&self, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.filepath.join(file)
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_ambulances(mut self, count: usize) -> Self {
        self.num_ambulances = count;
        self
    }

    pub fn with_bases(mut self, count: usize) -> Self {
        self.num_bases = Some(count);
        self
    }

    pub fn with_cases(mut self, count: usize) -> Self {
        self.num_cases = Some(count);
        self
    }

    pub fn with_replications(mut self, count: usize) -> Self {
        self.replications = count;
        self
    }

    pub fn r1_ms(&self) -> u64 {
        minutes_to_ms(self.r1_minutes)
    }

    pub fn on_scene_ms(&self) -> u64 {
        minutes_to_ms(self.on_scene_minutes)
    }

    pub fn at_hospital_ms(&self) -> u64 {
        minutes_to_ms(self.at_hospital_minutes)
    }

    pub fn max_travel_ms(&self) -> Option<u64> {
        self.max_travel_minutes.map(minutes_to_ms)
    }

    pub fn validate(&self) -> Result<(), ExperimentError> {
        if self.bases.is_none() {
            return Err(ExperimentError::Config("a bases file is required".into()));
        }
        if self.num_ambulances == 0 {
            return Err(ExperimentError::Config("at least one ambulance is required".into()));
        }
        if self.num_bases == Some(0) {
            return Err(ExperimentError::Config("num_bases must be positive".into()));
        }
        if self.replications == 0 {
            return Err(ExperimentError::Config("at least one replication is required".into()));
        }
        if self.cases.is_none() && !(self.arrival_rate_per_hour > 0.0) {
            return Err(ExperimentError::Config(
                "synthetic cases need a positive arrival_rate_per_hour".into(),
            ));
        }
        if self.cases.is_none() && self.num_cases.is_none() {
            return Err(ExperimentError::Config(
                "synthetic cases need num_cases to bound the run".into(),
            ));
        }
        if !(self.speed_kmh.is_finite() && self.speed_kmh > 0.0) {
            return Err(ExperimentError::Config(format!(
                "speed_kmh must be a positive number, got {}",
                self.speed_kmh
            )));
        }
        let minutes = [
            ("r1_minutes", Some(self.r1_minutes)),
            ("on_scene_minutes", Some(self.on_scene_minutes)),
            ("at_hospital_minutes", Some(self.at_hospital_minutes)),
            ("max_travel_minutes", self.max_travel_minutes),
        ];
        for (name, value) in minutes {
            if let Some(value) = value.filter(|v| !(v.is_finite() && *v >= 0.0)) {
                return Err(ExperimentError::Config(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if let Some(profile) = &self.hourly_profile {
            if profile.iter().any(|m| !(m.is_finite() && *m >= 0.0)) {
                return Err(ExperimentError::Config(
                    "hourly_profile multipliers must be non-negative numbers".into(),
                ));
            }
            if profile.iter().all(|m| *m == 0.0) {
                return Err(ExperimentError::Config(
                    "hourly_profile needs at least one non-zero hour".into(),
                ));
            }
        }
        Ok(())
    }
}

fn minutes_to_ms(minutes: f64) -> u64 {
    (minutes.max(0.0) * ONE_MIN_MS as f64).round() as u64
}
