//! Observation types shared by every provider and the selection rules
//! that pick the latest point of a series.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;

/// A single observed value. Upstreams publish numbers, but some series
/// carry textual values which are passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObservationValue {
    Number(f64),
    Text(String),
}

impl ObservationValue {
    /// Numeric view of the value, parsing textual values when possible.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ObservationValue::Number(n) => Some(*n),
            ObservationValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl Display for ObservationValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObservationValue::Number(n) => write!(f, "{n}"),
            ObservationValue::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Latest observation of one named indicator for a country.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorResult {
    pub value: ObservationValue,
    pub year: String,
}

/// A decoded time-series point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservationRecord {
    pub year: String,
    pub value: ObservationValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

/// Latest observation per measure code.
pub type HouseholdMeasureMap = BTreeMap<String, ObservationRecord>;

/// Whether an observation dated `candidate` replaces one dated `current`.
///
/// Years compare as plain strings, which orders four-digit years correctly.
/// Equal years keep the entry seen first.
pub fn supersedes(candidate: &str, current: &str) -> bool {
    candidate > current
}

/// Picks the greatest-year record, first-seen on ties.
pub fn latest_by_year<I>(records: I) -> Option<ObservationRecord>
where
    I: IntoIterator<Item = ObservationRecord>,
{
    records.into_iter().fold(None, |latest, record| match latest {
        Some(current) if !supersedes(&record.year, &current.year) => Some(current),
        _ => Some(record),
    })
}

/// Groups records by measure code, keeping the greatest-year record of each
/// group under the same tie-break as [`latest_by_year`].
pub fn latest_by_measure<I>(records: I) -> HouseholdMeasureMap
where
    I: IntoIterator<Item = (String, ObservationRecord)>,
{
    let mut latest = HouseholdMeasureMap::new();
    for (measure, record) in records {
        match latest.get(&measure) {
            Some(current) if !supersedes(&record.year, &current.year) => {}
            _ => {
                latest.insert(measure, record);
            }
        }
    }
    latest
}
