//! Household statistics abstractions

use async_trait::async_trait;

use super::observation::{HouseholdMeasureMap, ObservationRecord};

/// Source of household-level series. Implementations fail soft: any upstream
/// or decoding problem yields `None` or an empty map.
#[async_trait]
pub trait HouseholdStatsProvider: Send + Sync {
    /// Latest median disposable income with its currency.
    async fn latest_disposable_income(&self, country: &str) -> Option<ObservationRecord>;

    /// Latest observation of every published household measure.
    async fn household_measures(&self, country: &str) -> HouseholdMeasureMap;
}
