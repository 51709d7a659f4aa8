//! Core business logic abstractions

pub mod currency;
pub mod household;
pub mod indicator;
pub mod log;
pub mod observation;

// Re-export main types for cleaner imports
pub use currency::CurrencyRateProvider;
pub use household::HouseholdStatsProvider;
pub use indicator::{IndicatorObservation, IndicatorProvider, YearRange};
pub use observation::{HouseholdMeasureMap, IndicatorResult, ObservationRecord, ObservationValue};
