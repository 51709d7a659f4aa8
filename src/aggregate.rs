//! Merges indicator, household and currency data for one country.

use anyhow::Result;
use futures::future::try_join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, IndicatorSpec};
use crate::core::currency::convert;
use crate::core::indicator::first_non_null;
use crate::core::{
    CurrencyRateProvider, HouseholdMeasureMap, HouseholdStatsProvider, IndicatorProvider,
    IndicatorResult, ObservationRecord, YearRange,
};
use crate::providers::{
    exchange_rate::ExchangeRateProvider, oecd::OecdProvider, world_bank::WorldBankProvider,
};

/// Disposable income with its converted value, when a rate was available.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisposableIncome {
    #[serde(flatten)]
    pub record: ObservationRecord,
    #[serde(rename = "usdValue", skip_serializing_if = "Option::is_none")]
    pub usd_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct AggregatedResponse {
    #[serde(flatten)]
    pub indicators: BTreeMap<String, IndicatorResult>,
    #[serde(
        rename = "oecdDisposableIncome",
        skip_serializing_if = "Option::is_none"
    )]
    pub oecd_disposable_income: Option<DisposableIncome>,
    #[serde(rename = "oecdHouseholdData", skip_serializing_if = "Option::is_none")]
    pub oecd_household_data: Option<HouseholdMeasureMap>,
}

/// Latest non-null observation of each configured indicator.
///
/// Queries run concurrently and the first failure fails the whole fetch.
/// Indicators without any value are left out.
pub async fn fetch_indicators(
    provider: &dyn IndicatorProvider,
    indicators: &[IndicatorSpec],
    country: &str,
    years: YearRange,
) -> Result<BTreeMap<String, IndicatorResult>> {
    let requests = indicators
        .iter()
        .map(|spec| provider.fetch_observations(country, &spec.code, years));
    let responses = try_join_all(requests).await?;

    Ok(indicators
        .iter()
        .zip(responses)
        .filter_map(|(spec, observations)| {
            let latest = first_non_null(observations);
            if latest.is_none() {
                debug!(indicator = %spec.name, "No non-null observation");
            }
            latest.map(|result| (spec.name.clone(), result))
        })
        .collect())
}

pub struct Aggregator {
    indicator_provider: Arc<dyn IndicatorProvider>,
    household_provider: Arc<dyn HouseholdStatsProvider>,
    currency_provider: Arc<dyn CurrencyRateProvider>,
    indicators: Vec<IndicatorSpec>,
    start_year: i32,
    target_currency: String,
}

impl Aggregator {
    pub fn new(
        indicator_provider: Arc<dyn IndicatorProvider>,
        household_provider: Arc<dyn HouseholdStatsProvider>,
        currency_provider: Arc<dyn CurrencyRateProvider>,
        indicators: Vec<IndicatorSpec>,
    ) -> Self {
        Aggregator {
            indicator_provider,
            household_provider,
            currency_provider,
            indicators,
            start_year: 2017,
            target_currency: "USD".to_string(),
        }
    }

    pub fn with_start_year(mut self, start_year: i32) -> Self {
        self.start_year = start_year;
        self
    }

    pub fn with_target_currency(mut self, currency: &str) -> Self {
        self.target_currency = currency.to_string();
        self
    }

    /// Wires the live upstream providers described by `config`.
    pub fn from_config(config: &AppConfig) -> Self {
        let providers = &config.providers;
        if providers.exchange_rate.missing_required_key() {
            warn!(
                "No exchange rate API key configured, set {} to enable usdValue",
                crate::config::EXCHANGE_RATE_API_KEY_ENV
            );
        }
        Aggregator::new(
            Arc::new(WorldBankProvider::new(&providers.world_bank.base_url)),
            Arc::new(OecdProvider::new(&providers.oecd)),
            Arc::new(ExchangeRateProvider::new(
                &providers.exchange_rate.base_url,
                providers.exchange_rate.api_key.as_deref(),
            )),
            config.indicators.clone(),
        )
        .with_start_year(config.start_year)
        .with_target_currency(&config.target_currency)
    }

    /// Builds the merged response for `country`.
    ///
    /// Only the indicator step can fail; household data and the currency
    /// conversion degrade to missing fields.
    pub async fn aggregate(&self, country: &str) -> Result<AggregatedResponse> {
        info!(country, "Aggregating country data");

        let indicators = fetch_indicators(
            self.indicator_provider.as_ref(),
            &self.indicators,
            country,
            YearRange::through_last_year(self.start_year),
        )
        .await?;
        let mut response = AggregatedResponse {
            indicators,
            ..Default::default()
        };

        if let Some(record) = self.household_provider.latest_disposable_income(country).await {
            let usd_value = self.converted_value(&record).await;
            response.oecd_disposable_income = Some(DisposableIncome { record, usd_value });
        }

        let household = self.household_provider.household_measures(country).await;
        if !household.is_empty() {
            response.oecd_household_data = Some(household);
        }

        Ok(response)
    }

    async fn converted_value(&self, record: &ObservationRecord) -> Option<String> {
        let (Some(amount), Some(currency)) = (record.value.as_f64(), record.currency.as_deref())
        else {
            debug!(value = %record.value, "Disposable income is not convertible");
            return None;
        };

        convert(
            self.currency_provider.as_ref(),
            amount,
            currency,
            &self.target_currency,
        )
        .await
        .map(|converted| format!("{converted:.2}"))
    }
}
