use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use super::http_client;
use crate::core::CurrencyRateProvider;

/// Live rates from an exchangerate-api compatible service.
pub struct ExchangeRateProvider {
    base_url: String,
    api_key: Option<String>,
}

impl ExchangeRateProvider {
    pub fn new(base_url: &str, api_key: Option<&str>) -> Self {
        ExchangeRateProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(str::to_string),
        }
    }

    fn latest_url(&self, from: &str) -> String {
        match &self.api_key {
            Some(key) => format!("{}/{}/latest/{}", self.base_url, key, from),
            None => format!("{}/latest/{}", self.base_url, from),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    result: Option<String>,
    #[serde(rename = "error-type")]
    error_type: Option<String>,
    #[serde(default)]
    conversion_rates: HashMap<String, f64>,
}

#[async_trait]
impl CurrencyRateProvider for ExchangeRateProvider {
    async fn get_rate(&self, from: &str, to: &str) -> Result<f64> {
        let url = self.latest_url(from);
        debug!("Requesting {} rates", from);

        let client = http_client()?;
        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for base currency: {}", e, from))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for base currency: {}",
                response.status(),
                from
            ));
        }

        let text = response.text().await?;
        let data: LatestRatesResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse JSON response for {}: {}", from, e))?;

        if data.result.as_deref() == Some("error") {
            return Err(anyhow!(
                "Exchange rate API error: {} for base currency: {}",
                data.error_type.as_deref().unwrap_or("unknown"),
                from
            ));
        }

        data.conversion_rates
            .get(to)
            .copied()
            .ok_or_else(|| anyhow!("No rate found for currency pair: {}{}", from, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn create_mock_server(request_path: &str, status: u16, mock_response: &str) -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(request_path))
            .respond_with(ResponseTemplate::new(status).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        mock_server
    }

    const EUR_RATES: &str = r#"{
        "result": "success",
        "base_code": "EUR",
        "conversion_rates": { "EUR": 1, "USD": 1.0821, "GBP": 0.8571 }
    }"#;

    #[tokio::test]
    async fn test_successful_rate_fetch() {
        let mock_server = create_mock_server("/latest/EUR", 200, EUR_RATES).await;
        let provider = ExchangeRateProvider::new(&mock_server.uri(), None);

        let rate = provider
            .get_rate("EUR", "USD")
            .await
            .expect("Failed to get rate");
        assert_eq!(rate, 1.0821);
    }

    #[tokio::test]
    async fn test_api_key_in_path() {
        let mock_server = create_mock_server("/k3y/latest/EUR", 200, EUR_RATES).await;
        let provider = ExchangeRateProvider::new(&mock_server.uri(), Some("k3y"));

        let rate = provider.get_rate("EUR", "GBP").await.unwrap();
        assert_eq!(rate, 0.8571);
    }

    #[tokio::test]
    async fn test_unknown_target_currency() {
        let mock_server = create_mock_server("/latest/EUR", 200, EUR_RATES).await;
        let provider = ExchangeRateProvider::new(&mock_server.uri(), None);

        let result = provider.get_rate("EUR", "XXX").await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "No rate found for currency pair: EURXXX"
        );
    }

    #[tokio::test]
    async fn test_api_error_result() {
        let mock_response = r#"{ "result": "error", "error-type": "invalid-key" }"#;
        let mock_server = create_mock_server("/latest/EUR", 200, mock_response).await;
        let provider = ExchangeRateProvider::new(&mock_server.uri(), None);

        let result = provider.get_rate("EUR", "USD").await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "Exchange rate API error: invalid-key for base currency: EUR"
        );
    }

    #[tokio::test]
    async fn test_http_error_response() {
        let mock_server = create_mock_server("/latest/EUR", 500, "").await;
        let provider = ExchangeRateProvider::new(&mock_server.uri(), None);

        let result = provider.get_rate("EUR", "USD").await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "HTTP error: 500 Internal Server Error for base currency: EUR"
        );
    }
}
