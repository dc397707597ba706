pub mod cases;
pub mod clock;
pub mod coverage;
pub mod error;
pub mod fleet;
pub mod generators;
pub mod model;
pub mod selection;
pub mod simulator;
pub mod telemetry;
pub mod travel;
pub mod treatment;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use error::{Result, SimError};
