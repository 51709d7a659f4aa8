//! Statistics indicator abstractions

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Datelike, Utc};
use std::fmt::Display;

use super::observation::{IndicatorResult, ObservationValue};

/// Inclusive range of calendar years.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    pub fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    /// From `start` up to the last completed calendar year.
    pub fn through_last_year(start: i32) -> Self {
        Self::new(start, Utc::now().year() - 1)
    }
}

impl Display for YearRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

/// One point of an indicator series as published, value possibly missing.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorObservation {
    pub value: Option<ObservationValue>,
    pub date: String,
}

#[async_trait]
pub trait IndicatorProvider: Send + Sync {
    /// Observations of `indicator` for `country`, most recent first.
    async fn fetch_observations(
        &self,
        country: &str,
        indicator: &str,
        years: YearRange,
    ) -> Result<Vec<IndicatorObservation>>;
}

/// First observation with a value, scanning in the order given.
pub fn first_non_null<I>(observations: I) -> Option<IndicatorResult>
where
    I: IntoIterator<Item = IndicatorObservation>,
{
    observations.into_iter().find_map(|obs| {
        obs.value.map(|value| IndicatorResult {
            value,
            year: obs.date,
        })
    })
}
