pub mod closest;
pub mod first_available;
pub mod selector;

pub use closest::ClosestAmbulanceSelector;
pub use first_available::FirstAvailableSelector;
pub use selector::AmbulanceSelector;
