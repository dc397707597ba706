//! Travel-time oracles: nearest-point and point-to-point duration queries.
//!
//! Three implementations:
//!
//! - **`MatrixTravelTimes`**: a fixed node set with a square table of travel
//!   times between nodes. Arbitrary points are snapped to the nearest node.
//!   With feature `precomputed` the table can be loaded from / saved to a
//!   bincode file.
//! - **`H3GridTravelTimes`**: snaps points to H3 cell centroids and estimates
//!   times from great-circle distance at a constant average speed.
//! - **`CachedTravelTimes`**: LRU cache in front of any oracle.
//!
//! Oracles are shared between the case generator, the selector and the
//! coverage tracker as `Arc<dyn TravelTimeOracle>`.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use h3o::Resolution;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::{ONE_HOUR_MS, ONE_SEC_MS};
use crate::model::Location;

/// Representative point of the oracle's network nearest to a query point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestPoint {
    pub point: Location,
    /// Distance from the query point to `point`, in kilometres.
    pub distance_km: f64,
    /// Oracle-specific identifier of the representative (node index, H3 cell, ...).
    pub id: u64,
}

/// Trait for travel-time backends. Implementations must be `Send + Sync` so a
/// single oracle can be shared across replications running in parallel.
pub trait TravelTimeOracle: Send + Sync {
    /// Snap `point` to the nearest representative point known to the oracle.
    fn closest(&self, point: Location) -> ClosestPoint;

    /// Travel time from `from` to `to` in milliseconds.
    fn get_time(&self, from: Location, to: Location) -> u64;
}

#[derive(Error, Debug)]
pub enum TravelTimesError {
    #[error("travel-time table has no nodes")]
    Empty,
    #[error("travel-time table has {rows} row(s) for {nodes} node(s), row {row} has {columns} column(s)")]
    Shape {
        nodes: usize,
        rows: usize,
        row: usize,
        columns: usize,
    },
    #[error("travel time from node {row} to node {column} is {seconds} s")]
    InvalidTime { row: usize, column: usize, seconds: f64 },
}

/// An ordered set of points with nearest-neighbour lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationSet {
    pub locations: Vec<Location>,
}

impl LocationSet {
    pub fn new(locations: Vec<Location>) -> Self {
        Self { locations }
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Index, location and distance (km) of the nearest member. Ties go to the lowest index.
    pub fn closest(&self, point: &Location) -> Option<(usize, Location, f64)> {
        let mut best: Option<(usize, Location, f64)> = None;
        for (index, candidate) in self.locations.iter().enumerate() {
            let distance = point.haversine_km(candidate);
            match best {
                Some((_, _, best_distance)) if distance >= best_distance => {}
                _ => best = Some((index, *candidate, distance)),
            }
        }
        best
    }
}

// ---------------------------------------------------------------------------
// Matrix oracle
// ---------------------------------------------------------------------------

/// Travel times between a fixed set of nodes; `times_ms[i][j]` is the time from node `i` to node `j`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixTravelTimes {
    nodes: LocationSet,
    times_ms: Vec<Vec<u64>>,
}

impl MatrixTravelTimes {
    pub fn new(nodes: LocationSet, times_ms: Vec<Vec<u64>>) -> Result<Self, TravelTimesError> {
        if nodes.is_empty() {
            return Err(TravelTimesError::Empty);
        }
        let shape_error = |row: usize, columns: usize| TravelTimesError::Shape {
            nodes: nodes.len(),
            rows: times_ms.len(),
            row,
            columns,
        };
        if times_ms.len() != nodes.len() {
            return Err(shape_error(0, times_ms.first().map_or(0, Vec::len)));
        }
        if let Some((row, columns)) = times_ms
            .iter()
            .map(Vec::len)
            .enumerate()
            .find(|(_, columns)| *columns != nodes.len())
        {
            return Err(shape_error(row, columns));
        }
        Ok(Self { nodes, times_ms })
    }

    /// Builds a table from times in seconds, the unit travel-time datasets use.
    /// Negative and non-finite times are rejected.
    pub fn from_seconds(nodes: LocationSet, times_secs: Vec<Vec<f64>>) -> Result<Self, TravelTimesError> {
        let mut times_ms = Vec::with_capacity(times_secs.len());
        for (row, secs_row) in times_secs.into_iter().enumerate() {
            let mut ms_row = Vec::with_capacity(secs_row.len());
            for (column, seconds) in secs_row.into_iter().enumerate() {
                if !(seconds.is_finite() && seconds >= 0.0) {
                    return Err(TravelTimesError::InvalidTime {
                        row,
                        column,
                        seconds,
                    });
                }
                ms_row.push((seconds * ONE_SEC_MS as f64).round() as u64);
            }
            times_ms.push(ms_row);
        }
        Self::new(nodes, times_ms)
    }

    pub fn nodes(&self) -> &LocationSet {
        &self.nodes
    }

    fn node_index(&self, point: &Location) -> usize {
        // Non-empty by construction.
        self.nodes.closest(point).map_or(0, |(index, _, _)| index)
    }
}

impl TravelTimeOracle for MatrixTravelTimes {
    fn closest(&self, point: Location) -> ClosestPoint {
        match self.nodes.closest(&point) {
            Some((index, location, distance_km)) => ClosestPoint {
                point: location,
                distance_km,
                id: index as u64,
            },
            None => ClosestPoint {
                point,
                distance_km: 0.0,
                id: 0,
            },
        }
    }

    fn get_time(&self, from: Location, to: Location) -> u64 {
        let i = self.node_index(&from);
        let j = self.node_index(&to);
        self.times_ms[i][j]
    }
}

#[cfg(feature = "precomputed")]
pub mod precomputed {
    use std::fs;
    use std::path::Path;

    use thiserror::Error;

    use super::{MatrixTravelTimes, TravelTimesError};

    #[derive(Error, Debug)]
    pub enum PrecomputedError {
        #[error("failed to read travel-time table: {0}")]
        Io(#[from] std::io::Error),
        #[error("failed to decode travel-time table: {0}")]
        Decode(#[from] bincode::Error),
        #[error(transparent)]
        Table(#[from] TravelTimesError),
    }

    impl MatrixTravelTimes {
        /// Load a bincode-serialized table.
        pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PrecomputedError> {
            let data = fs::read(path)?;
            let table: MatrixTravelTimes = bincode::deserialize(&data)?;
            Ok(MatrixTravelTimes::new(table.nodes, table.times_ms)?)
        }

        pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), PrecomputedError> {
            let data = bincode::serialize(self)?;
            fs::write(path, data)?;
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// H3 grid oracle
// ---------------------------------------------------------------------------

/// Average city speed used when estimating times from distance (km/h).
pub const DEFAULT_SPEED_KMH: f64 = 40.0;

/// Estimates travel times along great circles between H3 cell centroids.
#[derive(Debug, Clone, Copy)]
pub struct H3GridTravelTimes {
    pub resolution: Resolution,
    pub speed_kmh: f64,
}

impl Default for H3GridTravelTimes {
    fn default() -> Self {
        Self {
            resolution: Resolution::Nine,
            speed_kmh: DEFAULT_SPEED_KMH,
        }
    }
}

impl H3GridTravelTimes {
    pub fn new(resolution: Resolution, speed_kmh: f64) -> Self {
        Self {
            resolution,
            speed_kmh,
        }
    }
}

impl TravelTimeOracle for H3GridTravelTimes {
    fn closest(&self, point: Location) -> ClosestPoint {
        match point.to_cell(self.resolution) {
            Some(cell) => {
                let centroid = Location::from(cell);
                ClosestPoint {
                    point: centroid,
                    distance_km: point.haversine_km(&centroid),
                    id: u64::from(cell),
                }
            }
            None => ClosestPoint {
                point,
                distance_km: 0.0,
                id: 0,
            },
        }
    }

    fn get_time(&self, from: Location, to: Location) -> u64 {
        if self.speed_kmh <= 0.0 {
            return u64::MAX;
        }
        let from = self.closest(from).point;
        let to = self.closest(to).point;
        let distance_km = from.haversine_km(&to);
        (distance_km / self.speed_kmh * ONE_HOUR_MS as f64).round() as u64
    }
}

// ---------------------------------------------------------------------------
// Caching wrapper
// ---------------------------------------------------------------------------

type PointKey = (u64, u64);

fn point_key(point: &Location) -> PointKey {
    (point.latitude.to_bits(), point.longitude.to_bits())
}

/// LRU-cached wrapper around any [`TravelTimeOracle`].
///
/// Keys are the exact bit patterns of the query coordinates, so only repeated
/// queries for identical points hit the cache.
pub struct CachedTravelTimes<O> {
    inner: O,
    closest_cache: Mutex<LruCache<PointKey, ClosestPoint>>,
    time_cache: Mutex<LruCache<(PointKey, PointKey), u64>>,
}

impl<O: TravelTimeOracle> CachedTravelTimes<O> {
    pub fn new(inner: O, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            closest_cache: Mutex::new(LruCache::new(capacity)),
            time_cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn inner(&self) -> &O {
        &self.inner
    }
}

impl<O: TravelTimeOracle> TravelTimeOracle for CachedTravelTimes<O> {
    fn closest(&self, point: Location) -> ClosestPoint {
        let key = point_key(&point);
        if let Ok(mut cache) = self.closest_cache.lock() {
            if let Some(hit) = cache.get(&key) {
                return *hit;
            }
        }
        let result = self.inner.closest(point);
        if let Ok(mut cache) = self.closest_cache.lock() {
            cache.put(key, result);
        }
        result
    }

    fn get_time(&self, from: Location, to: Location) -> u64 {
        let key = (point_key(&from), point_key(&to));
        if let Ok(mut cache) = self.time_cache.lock() {
            if let Some(hit) = cache.get(&key) {
                return *hit;
            }
        }
        let result = self.inner.get_time(from, to);
        if let Ok(mut cache) = self.time_cache.lock() {
            cache.put(key, result);
        }
        result
    }
}
