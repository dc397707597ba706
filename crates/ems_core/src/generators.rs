//! Generators for synthetic case streams: inter-arrival durations, incident
//! locations and priorities.
//!
//! Each generator is sampled at the simulated timestamp of the case being
//! created and carries its own seeded RNG, so a stream built from the same
//! seeds always yields the same cases.

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::clock::{SimTime, ONE_HOUR_MS};
use crate::model::{Location, Priority};
use crate::travel::LocationSet;

/// Trait for sampling the time until the next case arrives (in milliseconds).
///
/// Samples must be non-negative. A negative or NaN sample is a contract
/// violation and makes the case stream fail; `f64::INFINITY` means no further
/// arrivals.
pub trait DurationGenerator: Send + std::fmt::Debug {
    fn generate(&mut self, timestamp: SimTime) -> f64;
}

pub trait LocationGenerator: Send + std::fmt::Debug {
    fn generate(&mut self, timestamp: SimTime) -> Location;
}

pub trait PriorityGenerator: Send + std::fmt::Debug {
    fn generate(&mut self, timestamp: SimTime) -> Priority;
}

/// Constant inter-arrival time.
#[derive(Debug, Clone)]
pub struct FixedDuration {
    pub interval_ms: f64,
}

impl FixedDuration {
    pub fn new(interval_ms: f64) -> Self {
        Self { interval_ms }
    }

    /// Create from rate (cases per hour).
    pub fn from_hourly_rate(rate_per_hour: f64) -> Self {
        if rate_per_hour <= 0.0 {
            return Self {
                interval_ms: f64::INFINITY,
            };
        }
        Self {
            interval_ms: ONE_HOUR_MS as f64 / rate_per_hour,
        }
    }
}

impl DurationGenerator for FixedDuration {
    fn generate(&mut self, _timestamp: SimTime) -> f64 {
        self.interval_ms
    }
}

/// Sample from exponential: -ln(U) / lambda, where U is uniform [0,1). Result in ms.
fn sample_exponential_ms<R: Rng>(rng: &mut R, rate_per_hour: f64) -> f64 {
    if rate_per_hour <= 0.0 {
        return f64::INFINITY;
    }
    let u: f64 = rng.gen();
    let u = u.max(1e-10); // Avoid log(0)
    -u.ln() / rate_per_hour * ONE_HOUR_MS as f64
}

/// Exponential inter-arrival times (Poisson arrivals at a constant rate).
#[derive(Debug, Clone)]
pub struct ExponentialDuration {
    /// Expected number of cases per hour.
    pub rate_per_hour: f64,
    rng: StdRng,
}

impl ExponentialDuration {
    pub fn new(rate_per_hour: f64, seed: u64) -> Self {
        Self {
            rate_per_hour: rate_per_hour.max(0.0),
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl DurationGenerator for ExponentialDuration {
    fn generate(&mut self, _timestamp: SimTime) -> f64 {
        sample_exponential_ms(&mut self.rng, self.rate_per_hour)
    }
}

/// Exponential inter-arrival times whose rate varies by hour of day and day of week.
#[derive(Debug, Clone)]
pub struct TimeOfDayDuration {
    /// Average rate (cases per hour) before multipliers.
    pub base_rate_per_hour: f64,
    /// Indexed as [day_of_week][hour_of_day], 0 = Monday. Default is 1.0 for all times.
    pub multipliers: [[f64; 24]; 7],
    /// Real-world time (ms since Unix epoch) corresponding to simulation time 0.
    pub epoch_ms: i64,
    rng: StdRng,
}

impl TimeOfDayDuration {
    pub fn new(base_rate_per_hour: f64, epoch_ms: i64, seed: u64) -> Self {
        Self {
            base_rate_per_hour: base_rate_per_hour.max(0.0),
            multipliers: [[1.0; 24]; 7],
            epoch_ms,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn set_multiplier(mut self, day_of_week: usize, hour: usize, multiplier: f64) -> Self {
        if day_of_week < 7 && hour < 24 {
            self.multipliers[day_of_week][hour] = multiplier.max(0.0);
        }
        self
    }

    /// Apply the same hourly profile to every day of the week.
    pub fn with_daily_profile(mut self, multipliers: [f64; 24]) -> Self {
        for day in self.multipliers.iter_mut() {
            for (slot, mult) in day.iter_mut().zip(multipliers) {
                *slot = mult.max(0.0);
            }
        }
        self
    }

    /// Multiplier in force at `sim_time_ms` and the milliseconds left until it may change.
    fn rate_multiplier(&self, sim_time_ms: SimTime) -> (f64, u64) {
        let real_ms = self
            .epoch_ms
            .saturating_add(i64::try_from(sim_time_ms).unwrap_or(i64::MAX));
        let hour_ms = ONE_HOUR_MS as i64;
        let hours_since_epoch = real_ms.div_euclid(hour_ms);
        // Unix epoch (1970-01-01) was a Thursday (day 3)
        let day_of_week = (hours_since_epoch.div_euclid(24) + 3).rem_euclid(7) as usize;
        let hour = hours_since_epoch.rem_euclid(24) as usize;
        let left = (hour_ms - real_ms.rem_euclid(hour_ms)) as u64;
        (self.multipliers[day_of_week][hour], left)
    }
}

impl DurationGenerator for TimeOfDayDuration {
    /// Inverts the integrated rate hour by hour, so hours with a zero
    /// multiplier are skipped rather than ending the arrivals. Infinite only
    /// when the whole week has a zero rate.
    fn generate(&mut self, timestamp: SimTime) -> f64 {
        let weekly: f64 = self.multipliers.iter().flatten().sum();
        if !(self.base_rate_per_hour > 0.0 && weekly > 0.0) {
            return f64::INFINITY;
        }

        let u: f64 = self.rng.gen();
        let mut budget = -u.max(1e-10).ln();
        let mut elapsed: u64 = 0;
        loop {
            let (multiplier, left) = self.rate_multiplier(timestamp.saturating_add(elapsed));
            let rate_per_ms = self.base_rate_per_hour * multiplier / ONE_HOUR_MS as f64;
            let available = rate_per_ms * left as f64;
            if rate_per_ms > 0.0 && budget <= available {
                return elapsed as f64 + budget / rate_per_ms;
            }
            budget -= available;
            elapsed = elapsed.saturating_add(left);
        }
    }
}

/// Uniform incident locations within a lat/lng bounding box.
#[derive(Debug, Clone)]
pub struct BoundingBoxLocation {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lng_min: f64,
    pub lng_max: f64,
    rng: StdRng,
}

impl BoundingBoxLocation {
    pub fn new(lat_min: f64, lat_max: f64, lng_min: f64, lng_max: f64, seed: u64) -> Self {
        Self {
            lat_min: lat_min.min(lat_max),
            lat_max: lat_max.max(lat_min),
            lng_min: lng_min.min(lng_max),
            lng_max: lng_max.max(lng_min),
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl LocationGenerator for BoundingBoxLocation {
    fn generate(&mut self, _timestamp: SimTime) -> Location {
        let latitude = self.rng.gen_range(self.lat_min..=self.lat_max);
        let longitude = self.rng.gen_range(self.lng_min..=self.lng_max);
        Location::new(latitude, longitude)
    }
}

/// Picks incident locations uniformly from a fixed set (e.g. the demand points).
#[derive(Debug, Clone)]
pub struct LocationSetSampler {
    locations: LocationSet,
    rng: StdRng,
}

impl LocationSetSampler {
    /// Returns `None` for an empty set.
    pub fn new(locations: LocationSet, seed: u64) -> Option<Self> {
        if locations.is_empty() {
            return None;
        }
        Some(Self {
            locations,
            rng: StdRng::seed_from_u64(seed),
        })
    }
}

impl LocationGenerator for LocationSetSampler {
    fn generate(&mut self, _timestamp: SimTime) -> Location {
        let index = self.rng.gen_range(0..self.locations.len());
        self.locations.locations[index]
    }
}

#[derive(Debug, Clone)]
pub struct FixedPriority(pub Priority);

impl PriorityGenerator for FixedPriority {
    fn generate(&mut self, _timestamp: SimTime) -> Priority {
        self.0
    }
}

/// Priority frequencies observed in the historical case data, for priorities 1 to 4.
pub const HISTORICAL_PRIORITY_WEIGHTS: [(Priority, f64); 4] = [
    (1, 0.033_970_976),
    (2, 0.037_818_821),
    (3, 0.199_428_320),
    (4, 0.728_781_882),
];

/// Categorical priorities with fixed weights.
#[derive(Debug, Clone)]
pub struct WeightedPriority {
    priorities: Vec<Priority>,
    index: WeightedIndex<f64>,
    rng: StdRng,
}

impl WeightedPriority {
    /// Returns `None` when the weights are empty, negative, or all zero.
    pub fn new(weights: &[(Priority, f64)], seed: u64) -> Option<Self> {
        let index = WeightedIndex::new(weights.iter().map(|(_, w)| *w)).ok()?;
        Some(Self {
            priorities: weights.iter().map(|(p, _)| *p).collect(),
            index,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn historical(seed: u64) -> Self {
        Self::new(&HISTORICAL_PRIORITY_WEIGHTS, seed).expect("historical weights are positive")
    }
}

impl PriorityGenerator for WeightedPriority {
    fn generate(&mut self, _timestamp: SimTime) -> Priority {
        self.priorities[self.index.sample(&mut self.rng)]
    }
}
