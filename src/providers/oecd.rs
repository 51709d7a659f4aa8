use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Url;
use tracing::{debug, instrument, warn};

use super::{endpoint, http_client};
use crate::config::{DatasetConfig, OecdProviderConfig};
use crate::core::observation::{latest_by_measure, latest_by_year};
use crate::core::{HouseholdMeasureMap, HouseholdStatsProvider, ObservationRecord};
use crate::sdmx::{self, DecodedObservation, SeriesKind};

/// Household series from the OECD SDMX REST service.
pub struct OecdProvider {
    base_url: String,
    disposable_income: DatasetConfig,
    household: DatasetConfig,
}

impl OecdProvider {
    pub fn new(config: &OecdProviderConfig) -> Self {
        OecdProvider {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            disposable_income: config.disposable_income.clone(),
            household: config.household.clone(),
        }
    }

    fn data_url(&self, dataset: &DatasetConfig, country: &str) -> Result<Url> {
        let years = dataset.years();
        endpoint(
            &self.base_url,
            &["data", &dataset.flow, &format!("{}.{}", country, dataset.key)],
            &format!(
                "startPeriod={}&endPeriod={}&dimensionAtObservation=AllDimensions&format=jsondata",
                years.start, years.end
            ),
        )
    }

    #[instrument(name = "OecdFetch", skip(self, dataset), fields(country = %country, kind = ?kind))]
    async fn fetch_series(
        &self,
        dataset: &DatasetConfig,
        country: &str,
        kind: SeriesKind,
    ) -> Result<Vec<DecodedObservation>> {
        let url = self.data_url(dataset, country)?;
        debug!("Requesting SDMX data from {}", url);

        let client = http_client()?;
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for dataflow: {}", e, dataset.flow))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for dataflow: {}",
                response.status(),
                dataset.flow
            ));
        }

        let body = response.text().await?;
        let observations = sdmx::decode(&body, kind)
            .with_context(|| format!("Malformed upstream schema for dataflow: {}", dataset.flow))?;
        debug!(count = observations.len(), "Decoded SDMX observations");
        Ok(observations)
    }
}

#[async_trait]
impl HouseholdStatsProvider for OecdProvider {
    async fn latest_disposable_income(&self, country: &str) -> Option<ObservationRecord> {
        let observations = match self
            .fetch_series(&self.disposable_income, country, SeriesKind::DisposableIncome)
            .await
        {
            Ok(observations) => observations,
            Err(e) => {
                warn!(error = ?e, country, "Error fetching OECD disposable income");
                return None;
            }
        };

        latest_by_year(observations.into_iter().map(|o| ObservationRecord {
            year: o.year,
            value: o.value,
            currency: o.currency,
        }))
    }

    async fn household_measures(&self, country: &str) -> HouseholdMeasureMap {
        let observations = match self
            .fetch_series(&self.household, country, SeriesKind::Household)
            .await
        {
            Ok(observations) => observations,
            Err(e) => {
                warn!(error = ?e, country, "Error fetching OECD household data");
                return HouseholdMeasureMap::new();
            }
        };

        latest_by_measure(observations.into_iter().filter_map(|o| {
            let measure = o.measure?;
            Some((
                measure,
                ObservationRecord {
                    year: o.year,
                    value: o.value,
                    currency: o.currency,
                },
            ))
        }))
    }
}
