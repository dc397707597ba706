//! CSV datasets: cases, point sets (bases, demands, hospitals) and travel-time matrices.
//!
//! Formats, all with a header row:
//!
//! - cases: `id,latitude,longitude,datetime,priority`, datetime as
//!   `%Y-%m-%d %H:%M:%S`. Simulation time 0 is the earliest case.
//! - points: `latitude,longitude` (`lat`/`long` are accepted too).
//! - travel times: `latitude,longitude,<one column per node>`; row `i` is
//!   node `i` followed by the times in seconds from it to every node.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::NaiveDateTime;
use ems_core::clock::SimTime;
use ems_core::model::{Case, CaseId, Location, Priority};
use ems_core::travel::{LocationSet, MatrixTravelTimes};
use serde::Deserialize;

use crate::error::ExperimentError;

pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Deserialize)]
struct CaseRow {
    id: u64,
    #[serde(alias = "lat")]
    latitude: f64,
    #[serde(alias = "long")]
    longitude: f64,
    datetime: String,
    priority: Priority,
}

#[derive(Debug, Deserialize)]
struct PointRow {
    #[serde(alias = "lat")]
    latitude: f64,
    #[serde(alias = "long")]
    longitude: f64,
}

/// Cases in file order, with arrival times relative to `epoch`.
#[derive(Debug, Clone, Default)]
pub struct CaseDataset {
    pub cases: Vec<Case>,
    /// Wall-clock time of simulation time 0; `None` for an empty file.
    pub epoch: Option<NaiveDateTime>,
}

impl CaseDataset {
    /// Wall-clock time of a simulation timestamp.
    pub fn to_datetime(&self, timestamp: SimTime) -> Option<NaiveDateTime> {
        let offset = chrono::Duration::milliseconds(i64::try_from(timestamp).ok()?);
        self.epoch?.checked_add_signed(offset)
    }
}

fn reader(path: &Path) -> Result<csv::Reader<std::fs::File>, ExperimentError> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| csv_error(path, source))
}

fn csv_error(path: &Path, source: csv::Error) -> ExperimentError {
    ExperimentError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

pub fn load_cases(path: impl AsRef<Path>) -> Result<CaseDataset, ExperimentError> {
    let path = path.as_ref();
    let mut rows = Vec::new();
    let mut ids = BTreeSet::new();
    for (record, row) in reader(path)?.deserialize::<CaseRow>().enumerate() {
        let row = row.map_err(|source| csv_error(path, source))?;
        if !ids.insert(row.id) {
            return Err(ExperimentError::InvalidRecord {
                path: path.to_path_buf(),
                record: record + 1,
                message: format!("case id {} appears more than once", row.id),
            });
        }
        let datetime = NaiveDateTime::parse_from_str(&row.datetime, DATETIME_FORMAT).map_err(
            |source| ExperimentError::Datetime {
                path: path.to_path_buf(),
                record: record + 1,
                value: row.datetime.clone(),
                source,
            },
        )?;
        rows.push((row, datetime));
    }

    let Some(epoch) = rows.iter().map(|(_, datetime)| *datetime).min() else {
        return Ok(CaseDataset::default());
    };
    let cases = rows
        .into_iter()
        .map(|(row, datetime)| {
            let arrival = (datetime - epoch).num_milliseconds().max(0) as SimTime;
            Case::new(
                CaseId(row.id),
                Location::new(row.latitude, row.longitude),
                arrival,
                row.priority,
            )
        })
        .collect();
    Ok(CaseDataset {
        cases,
        epoch: Some(epoch),
    })
}

pub fn load_points(path: impl AsRef<Path>) -> Result<LocationSet, ExperimentError> {
    let path = path.as_ref();
    let locations = reader(path)?
        .deserialize::<PointRow>()
        .map(|row| {
            row.map(|row| Location::new(row.latitude, row.longitude))
                .map_err(|source| csv_error(path, source))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(LocationSet::new(locations))
}

pub fn load_travel_times(path: impl AsRef<Path>) -> Result<MatrixTravelTimes, ExperimentError> {
    let path = path.as_ref();
    let mut nodes = Vec::new();
    let mut times_secs = Vec::new();

    for (index, record) in reader(path)?.records().enumerate() {
        let record = record.map_err(|source| csv_error(path, source))?;
        let number = |field: &str| {
            field
                .parse::<f64>()
                .map_err(|err| ExperimentError::InvalidRecord {
                    path: path.to_path_buf(),
                    record: index + 1,
                    message: format!("{field:?} is not a number: {err}"),
                })
        };
        let values = record
            .iter()
            .map(number)
            .collect::<Result<Vec<f64>, _>>()?;
        let [latitude, longitude, times @ ..] = values.as_slice() else {
            return Err(ExperimentError::InvalidRecord {
                path: path.to_path_buf(),
                record: index + 1,
                message: "expected latitude, longitude and travel times".into(),
            });
        };
        if let Some(bad) = times.iter().find(|t| !(t.is_finite() && **t >= 0.0)) {
            return Err(ExperimentError::InvalidRecord {
                path: path.to_path_buf(),
                record: index + 1,
                message: format!("travel time {bad} is not a non-negative number of seconds"),
            });
        }
        nodes.push(Location::new(*latitude, *longitude));
        times_secs.push(times.to_vec());
    }

    Ok(MatrixTravelTimes::from_seconds(
        LocationSet::new(nodes),
        times_secs,
    )?)
}
