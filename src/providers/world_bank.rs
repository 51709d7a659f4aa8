use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use super::{endpoint, http_client};
use crate::core::{IndicatorObservation, IndicatorProvider, ObservationValue, YearRange};

pub struct WorldBankProvider {
    base_url: String,
}

impl WorldBankProvider {
    pub fn new(base_url: &str) -> Self {
        WorldBankProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn indicator_url(&self, country: &str, indicator: &str, years: YearRange) -> Result<Url> {
        endpoint(
            &self.base_url,
            &["v2", "country", country, "indicator", indicator],
            &format!("format=json&date={years}"),
        )
    }
}

#[derive(Deserialize, Debug)]
struct WorldBankPoint {
    value: Option<ObservationValue>,
    date: String,
}

/// Slot 1 of the response array holds the observations. Error payloads
/// have a single element and empty series carry `null` there.
fn parse_points(pages: Vec<Value>) -> Result<Vec<WorldBankPoint>> {
    match pages.into_iter().nth(1) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(points) => Ok(serde_json::from_value(points)?),
    }
}

#[async_trait]
impl IndicatorProvider for WorldBankProvider {
    #[instrument(
        name = "WorldBankFetch",
        skip(self),
        fields(country = %country, indicator = %indicator)
    )]
    async fn fetch_observations(
        &self,
        country: &str,
        indicator: &str,
        years: YearRange,
    ) -> Result<Vec<IndicatorObservation>> {
        let url = self.indicator_url(country, indicator, years)?;
        debug!("Requesting indicator data from {}", url);

        let client = http_client()?;
        let response = client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for indicator: {} URL: {}", e, indicator, url))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for indicator: {}",
                response.status(),
                indicator
            ));
        }

        let text = response.text().await?;
        let pages: Vec<Value> = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse JSON response for {}: {}", indicator, e))?;
        let points = parse_points(pages)
            .map_err(|e| anyhow!("Unexpected observation list for {}: {}", indicator, e))?;

        debug!(count = points.len(), "Received indicator observations");

        Ok(points
            .into_iter()
            .map(|p| IndicatorObservation {
                value: p.value,
                date: p.date,
            })
            .collect())
    }
}
