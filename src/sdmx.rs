//! Decoder for SDMX-JSON data messages requested with
//! `dimensionAtObservation=AllDimensions`.
//!
//! Each observation is keyed by colon-separated indices, one per observation
//! dimension, into the value lists declared under `structures[0]`. The value
//! array holds the observation value followed by one index per observation
//! attribute (or `null` when the attribute is not set).

use serde::Deserialize;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde_json::Value as JsonValue;
use std::fmt;
use thiserror::Error;

use crate::core::ObservationValue;

pub const TIME_PERIOD: &str = "TIME_PERIOD";
pub const MEASURE: &str = "MEASURE";
pub const CURRENCY: &str = "CURRENCY";

/// Ways an upstream message can fail to match the expected schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Invalid SDMX-JSON document: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Missing section: {0}")]
    MissingSection(&'static str),
    #[error("Missing component: {0}")]
    MissingComponent(&'static str),
    #[error("Observation key '{key}' has {found} parts, expected {expected}")]
    MalformedKey {
        key: String,
        expected: usize,
        found: usize,
    },
    #[error("Index {index} out of range for component {component} in observation '{key}'")]
    IndexOutOfRange {
        component: String,
        index: String,
        key: String,
    },
    #[error("Unsupported observation value in '{key}': {value}")]
    UnsupportedValue { key: String, value: JsonValue },
}

/// Which series shape is being decoded, and therefore which components
/// must be present besides `TIME_PERIOD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesKind {
    DisposableIncome,
    Household,
}

impl SeriesKind {
    fn required_components(self) -> &'static [&'static str] {
        match self {
            SeriesKind::DisposableIncome => &[TIME_PERIOD, CURRENCY],
            SeriesKind::Household => &[TIME_PERIOD, MEASURE],
        }
    }
}

/// An observation with its key resolved to labels.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedObservation {
    pub year: String,
    pub value: ObservationValue,
    pub measure: Option<String>,
    pub currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Message {
    data: Option<MessageData>,
}

#[derive(Debug, Deserialize)]
struct MessageData {
    #[serde(rename = "dataSets", default)]
    data_sets: Vec<DataSet>,
    #[serde(default)]
    structures: Vec<Structure>,
}

#[derive(Debug, Deserialize)]
struct DataSet {
    #[serde(default)]
    observations: Option<ObservationEntries>,
}

#[derive(Debug, Deserialize)]
struct Structure {
    #[serde(default)]
    dimensions: Option<ComponentGroup>,
    #[serde(default)]
    attributes: Option<ComponentGroup>,
}

#[derive(Debug, Default, Deserialize)]
struct ComponentGroup {
    #[serde(default)]
    observation: Vec<Component>,
}

/// A dimension or attribute and its positional value list.
#[derive(Debug, Deserialize)]
struct Component {
    id: String,
    #[serde(default)]
    values: Vec<ComponentValue>,
}

#[derive(Debug, Deserialize)]
struct ComponentValue {
    id: String,
}

/// Observation entries in document order.
#[derive(Debug, Default)]
struct ObservationEntries(Vec<(String, Vec<JsonValue>)>);

impl<'de> Deserialize<'de> for ObservationEntries {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = ObservationEntries;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of observation keys to value arrays")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, values)) = map.next_entry::<String, Vec<JsonValue>>()? {
                    entries.push((key, values));
                }
                Ok(ObservationEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

/// Where a component's index lives for each observation.
enum Slot {
    /// Position within the colon-separated key.
    Key(usize),
    /// Position within the value array.
    Value(usize),
}

struct Resolver<'a> {
    component: &'a Component,
    slot: Slot,
}

impl<'a> Resolver<'a> {
    fn find(structure: &'a Structure, id: &str) -> Option<Self> {
        let dimensions = structure
            .dimensions
            .as_ref()
            .map(|d| d.observation.as_slice())
            .unwrap_or_default();
        if let Some(pos) = dimensions.iter().position(|c| c.id == id) {
            return Some(Resolver {
                component: &dimensions[pos],
                slot: Slot::Key(pos),
            });
        }

        let attributes = structure
            .attributes
            .as_ref()
            .map(|a| a.observation.as_slice())
            .unwrap_or_default();
        attributes
            .iter()
            .position(|c| c.id == id)
            .map(|pos| Resolver {
                component: &attributes[pos],
                slot: Slot::Value(pos + 1),
            })
    }

    fn resolve(
        &self,
        key: &str,
        key_parts: &[&str],
        values: &[JsonValue],
    ) -> Result<Option<String>, SchemaError> {
        let raw = match self.slot {
            Slot::Key(pos) => key_parts[pos].to_string(),
            Slot::Value(pos) => match values.get(pos) {
                None | Some(JsonValue::Null) => return Ok(None),
                Some(JsonValue::Number(n)) => n.to_string(),
                Some(other) => other.to_string(),
            },
        };

        raw.parse::<usize>()
            .ok()
            .and_then(|index| self.component.values.get(index))
            .map(|value| Some(value.id.clone()))
            .ok_or_else(|| SchemaError::IndexOutOfRange {
                component: self.component.id.clone(),
                index: raw,
                key: key.to_string(),
            })
    }
}

fn observation_value(
    key: &str,
    values: &[JsonValue],
) -> Result<Option<ObservationValue>, SchemaError> {
    match values.first() {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::Number(n)) => match n.as_f64() {
            Some(v) => Ok(Some(ObservationValue::Number(v))),
            None => Err(SchemaError::UnsupportedValue {
                key: key.to_string(),
                value: JsonValue::Number(n.clone()),
            }),
        },
        Some(JsonValue::String(s)) => Ok(Some(ObservationValue::Text(s.clone()))),
        Some(other) => Err(SchemaError::UnsupportedValue {
            key: key.to_string(),
            value: other.clone(),
        }),
    }
}

/// Decodes every observation of an SDMX-JSON message in document order.
///
/// Observations without a value are skipped.
pub fn decode(body: &str, kind: SeriesKind) -> Result<Vec<DecodedObservation>, SchemaError> {
    let message: Message = serde_json::from_str(body)?;
    let data = message.data.ok_or(SchemaError::MissingSection("data"))?;

    let observations = data
        .data_sets
        .into_iter()
        .next()
        .and_then(|ds| ds.observations)
        .ok_or(SchemaError::MissingSection("dataSets[0].observations"))?;
    let structure = data
        .structures
        .first()
        .ok_or(SchemaError::MissingSection("structures[0]"))?;

    let dimension_count = structure
        .dimensions
        .as_ref()
        .map(|d| d.observation.len())
        .ok_or(SchemaError::MissingSection("structures[0].dimensions"))?;

    for &id in kind.required_components() {
        if Resolver::find(structure, id).is_none() {
            return Err(SchemaError::MissingComponent(id));
        }
    }
    let time = Resolver::find(structure, TIME_PERIOD)
        .ok_or(SchemaError::MissingComponent(TIME_PERIOD))?;
    let measure = Resolver::find(structure, MEASURE);
    let currency = Resolver::find(structure, CURRENCY);

    let mut decoded = Vec::with_capacity(observations.0.len());
    for (key, values) in &observations.0 {
        let parts: Vec<&str> = key.split(':').collect();
        if parts.len() != dimension_count {
            return Err(SchemaError::MalformedKey {
                key: key.clone(),
                expected: dimension_count,
                found: parts.len(),
            });
        }

        let Some(value) = observation_value(key, values)? else {
            continue;
        };
        let Some(year) = time.resolve(key, &parts, values)? else {
            continue;
        };
        let measure = match &measure {
            Some(r) => r.resolve(key, &parts, values)?,
            None => None,
        };
        let currency = match &currency {
            Some(r) => r.resolve(key, &parts, values)?,
            None => None,
        };

        decoded.push(DecodedObservation {
            year,
            value,
            measure,
            currency,
        });
    }

    Ok(decoded)
}


#[cfg(test)]
mod tests {
    use super::fixtures::message;
    use super::*;
    use serde_json::json;

    const AREA: (&str, &[&str]) = ("REF_AREA", &["FRA"]);
    const FREQ: (&str, &[&str]) = ("FREQ", &["A"]);
    const YEARS: (&str, &[&str]) = (TIME_PERIOD, &["2019", "2020", "2021", "2018"]);
    const MEASURES: (&str, &[&str]) = (MEASURE, &["B1GQ_POP", "P31S14_POP", "SAV_RATIO"]);

    #[test]
    fn test_household_fixture_reproduces_triples() {
        let expected = [
            ("B1GQ_POP", "2019", 41000.5),
            ("P31S14_POP", "2020", 22000.0),
            ("SAV_RATIO", "2018", 14.2),
            ("B1GQ_POP", "2021", 43000.0),
        ];
        let body = message(
            &[AREA, FREQ, MEASURES, YEARS],
            &[],
            &[
                ("0:0:0:0", json!([41000.5])),
                ("0:0:1:1", json!([22000.0])),
                ("0:0:2:3", json!([14.2])),
                ("0:0:0:2", json!([43000.0])),
            ],
        );

        let decoded = decode(&body, SeriesKind::Household).unwrap();
        let triples: Vec<(&str, &str, f64)> = decoded
            .iter()
            .map(|o| {
                (
                    o.measure.as_deref().unwrap(),
                    o.year.as_str(),
                    o.value.as_f64().unwrap(),
                )
            })
            .collect();
        assert_eq!(triples, expected);
    }

    #[test]
    fn test_currency_from_dimension() {
        let body = message(
            &[AREA, (CURRENCY, &["EUR"]), YEARS],
            &[],
            &[("0:0:2", json!([31000]))],
        );
        let decoded = decode(&body, SeriesKind::DisposableIncome).unwrap();
        assert_eq!(
            decoded,
            vec![DecodedObservation {
                year: "2021".into(),
                value: ObservationValue::Number(31000.0),
                measure: None,
                currency: Some("EUR".into()),
            }]
        );
    }

    #[test]
    fn test_currency_from_attribute() {
        let body = message(
            &[AREA, YEARS],
            &[("OBS_STATUS", &["A"]), (CURRENCY, &["USD", "EUR"])],
            &[("0:1", json!([30000, 0, 1])), ("0:0", json!([29000, null, null]))],
        );
        let decoded = decode(&body, SeriesKind::DisposableIncome).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].currency.as_deref(), Some("EUR"));
        assert_eq!(decoded[0].year, "2020");
        assert!(decoded[1].currency.is_none());
    }

    #[test]
    fn test_null_and_text_values() {
        let body = message(
            &[AREA, MEASURES, YEARS],
            &[],
            &[("0:0:0", json!([null])), ("0:1:1", json!(["12.5"]))],
        );
        let decoded = decode(&body, SeriesKind::Household).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].value, ObservationValue::Text("12.5".into()));
    }

    #[test]
    fn test_missing_data_sets() {
        let body = json!({
            "data": { "structures": [{ "dimensions": { "observation": [] } }] }
        })
        .to_string();
        let err = decode(&body, SeriesKind::Household).unwrap_err();
        assert!(matches!(err, SchemaError::MissingSection("dataSets[0].observations")));
    }

    #[test]
    fn test_missing_structures() {
        let body = json!({
            "data": { "dataSets": [{ "observations": {} }] }
        })
        .to_string();
        let err = decode(&body, SeriesKind::DisposableIncome).unwrap_err();
        assert!(matches!(err, SchemaError::MissingSection("structures[0]")));
    }

    #[test]
    fn test_missing_required_component() {
        let body = message(&[AREA, YEARS], &[], &[("0:0", json!([1.0]))]);
        let err = decode(&body, SeriesKind::Household).unwrap_err();
        assert_eq!(err.to_string(), "Missing component: MEASURE");
    }

    #[test]
    fn test_index_out_of_range() {
        let body = message(&[AREA, MEASURES, YEARS], &[], &[("0:0:9", json!([1.0]))]);
        let err = decode(&body, SeriesKind::Household).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Index 9 out of range for component TIME_PERIOD in observation '0:0:9'"
        );
    }

    #[test]
    fn test_malformed_key() {
        let body = message(&[AREA, MEASURES, YEARS], &[], &[("0:0", json!([1.0]))]);
        let err = decode(&body, SeriesKind::Household).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::MalformedKey {
                expected: 3,
                found: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_json() {
        let err = decode("<GenericData/>", SeriesKind::Household).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidJson(_)));
    }
}
