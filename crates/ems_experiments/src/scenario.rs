//! Loaded inputs of an experiment and the per-replication simulator built from them.

use std::path::Path;
use std::sync::Arc;

use ems_core::cases::{CaseStream, RandomCaseStream, ReplayCaseStream};
use ems_core::coverage::CoverageTracker;
use ems_core::fleet::round_robin_fleet;
use ems_core::generators::{
    BoundingBoxLocation, DurationGenerator, ExponentialDuration, LocationGenerator,
    LocationSetSampler, TimeOfDayDuration, WeightedPriority,
};
use ems_core::selection::{AmbulanceSelector, ClosestAmbulanceSelector, FirstAvailableSelector};
use ems_core::simulator::EventDrivenSimulator;
use ems_core::travel::{
    CachedTravelTimes, H3GridTravelTimes, LocationSet, MatrixTravelTimes, TravelTimeOracle,
};
use ems_core::treatment::TravelTreatment;
use h3o::Resolution;
use tracing::info;

use crate::config::{SelectorKind, Settings};
use crate::dataset::{load_cases, load_points, load_travel_times, CaseDataset};
use crate::error::ExperimentError;

/// Everything a replication needs, shared read-only across worker threads.
pub struct Scenario {
    pub settings: Settings,
    pub bases: LocationSet,
    pub demands: LocationSet,
    pub hospitals: LocationSet,
    /// Replayed cases; synthetic cases are generated per replication when `None`.
    pub cases: Option<CaseDataset>,
    pub oracle: Arc<dyn TravelTimeOracle>,
}

impl Scenario {
    pub fn load(settings: Settings) -> Result<Self, ExperimentError> {
        settings.validate()?;

        let mut bases = match &settings.bases {
            Some(file) => load_points(settings.resolve(file))?,
            None => LocationSet::default(),
        };
        if let Some(count) = settings.num_bases {
            bases.locations.truncate(count);
        }
        if bases.is_empty() {
            return Err(ExperimentError::Config("the bases file has no bases".into()));
        }
        let demands = match &settings.demands {
            Some(file) => load_points(settings.resolve(file))?,
            None => LocationSet::default(),
        };
        let hospitals = match &settings.hospitals {
            Some(file) => load_points(settings.resolve(file))?,
            None => LocationSet::default(),
        };
        let cases = match &settings.cases {
            Some(file) => Some(load_cases(settings.resolve(file))?),
            None => None,
        };
        let oracle: Arc<dyn TravelTimeOracle> = match &settings.times {
            Some(file) => Arc::new(CachedTravelTimes::new(
                load_matrix(&settings.resolve(file))?,
                settings.cache_capacity,
            )),
            None => Arc::new(CachedTravelTimes::new(
                H3GridTravelTimes::new(Resolution::Nine, settings.speed_kmh),
                settings.cache_capacity,
            )),
        };

        info!(
            bases = bases.len(),
            demands = demands.len(),
            hospitals = hospitals.len(),
            cases = cases.as_ref().map(|c| c.cases.len()),
            "scenario loaded"
        );

        Ok(Self {
            settings,
            bases,
            demands,
            hospitals,
            cases,
            oracle,
        })
    }

    /// Assemble a scenario from in-memory inputs, e.g. in tests.
    pub fn from_parts(
        settings: Settings,
        bases: LocationSet,
        demands: LocationSet,
        cases: Option<CaseDataset>,
        oracle: Arc<dyn TravelTimeOracle>,
    ) -> Self {
        Self {
            settings,
            bases,
            demands,
            hospitals: LocationSet::default(),
            cases,
            oracle,
        }
    }

    pub fn with_hospitals(mut self, hospitals: LocationSet) -> Self {
        self.hospitals = hospitals;
        self
    }

    /// A fresh simulator for one replication. Only synthetic cases depend on `seed`.
    pub fn build_simulator(&self, seed: u64) -> EventDrivenSimulator {
        let settings = &self.settings;
        let fleet = round_robin_fleet(&self.bases, settings.num_ambulances);

        let selector: Box<dyn AmbulanceSelector> = match settings.selector {
            SelectorKind::Closest => {
                let selector = ClosestAmbulanceSelector::new(Arc::clone(&self.oracle));
                match settings.max_travel_ms() {
                    Some(limit) => Box::new(selector.with_max_travel_time_ms(limit)),
                    None => Box::new(selector),
                }
            }
            SelectorKind::FirstAvailable => Box::new(FirstAvailableSelector),
        };

        let treatment = TravelTreatment::new(Arc::clone(&self.oracle), settings.on_scene_ms())
            .with_hospitals(self.hospitals.clone(), settings.at_hospital_ms());

        let simulator = EventDrivenSimulator::new(
            fleet,
            self.case_stream(seed),
            selector,
            Box::new(treatment),
        );
        if self.demands.is_empty() {
            return simulator;
        }
        simulator.with_coverage(Box::new(CoverageTracker::new(
            self.demands.clone(),
            Arc::clone(&self.oracle),
            settings.r1_ms(),
        )))
    }

    fn case_stream(&self, seed: u64) -> Box<dyn CaseStream> {
        if let Some(dataset) = &self.cases {
            let replay = ReplayCaseStream::sorted(dataset.cases.iter().cloned());
            return match self.settings.num_cases {
                Some(count) => Box::new(replay.with_quantity(count)),
                None => Box::new(replay),
            };
        }

        let locations: Box<dyn LocationGenerator> =
            match LocationSetSampler::new(self.demands.clone(), seed.wrapping_add(1)) {
                Some(sampler) => Box::new(sampler),
                None => {
                    let (lat_min, lat_max, lng_min, lng_max) = extent(&self.bases);
                    Box::new(BoundingBoxLocation::new(
                        lat_min,
                        lat_max,
                        lng_min,
                        lng_max,
                        seed.wrapping_add(1),
                    ))
                }
            };
        let rate = self.settings.arrival_rate_per_hour;
        let durations: Box<dyn DurationGenerator> = match self.settings.hourly_profile {
            // Synthetic time 0 is midnight.
            Some(profile) => {
                Box::new(TimeOfDayDuration::new(rate, 0, seed).with_daily_profile(profile))
            }
            None => Box::new(ExponentialDuration::new(rate, seed)),
        };
        let stream = RandomCaseStream::new(
            0,
            durations,
            locations,
            Box::new(WeightedPriority::historical(seed.wrapping_add(2))),
        );
        match self.settings.num_cases {
            Some(count) => Box::new(stream.with_quantity(count)),
            None => Box::new(stream),
        }
    }
}

/// A CSV travel-time table, or a bincode one when the path ends in `.bin`.
fn load_matrix(path: &Path) -> Result<MatrixTravelTimes, ExperimentError> {
    if path.extension().and_then(|ext| ext.to_str()) != Some("bin") {
        return load_travel_times(path);
    }
    #[cfg(feature = "precomputed")]
    {
        MatrixTravelTimes::from_file(path).map_err(|source| ExperimentError::Precomputed {
            path: path.to_path_buf(),
            source,
        })
    }
    #[cfg(not(feature = "precomputed"))]
    {
        Err(ExperimentError::Config(format!(
            "{} is a precomputed table; rebuild with feature `precomputed` to load it",
            path.display()
        )))
    }
}

/// `(lat_min, lat_max, lng_min, lng_max)` of a non-empty set.
fn extent(points: &LocationSet) -> (f64, f64, f64, f64) {
    points.locations.iter().fold(
        (f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY),
        |(lat_min, lat_max, lng_min, lng_max), p| {
            (
                lat_min.min(p.latitude),
                lat_max.max(p.latitude),
                lng_min.min(p.longitude),
                lng_max.max(p.longitude),
            )
        },
    )
}
