//! Currency conversion abstractions

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

#[async_trait]
pub trait CurrencyRateProvider: Send + Sync {
    async fn get_rate(&self, from: &str, to: &str) -> Result<f64>;
}

/// Converts `amount` between currencies, or `None` when no rate is available.
///
/// Failures are logged and never propagated.
pub async fn convert(
    provider: &dyn CurrencyRateProvider,
    amount: f64,
    from: &str,
    to: &str,
) -> Option<f64> {
    match provider.get_rate(from, to).await {
        Ok(rate) => {
            debug!(from, to, rate, "Converted currency");
            Some(amount * rate)
        }
        Err(e) => {
            warn!(error = ?e, from, to, "Error converting currency");
            None
        }
    }
}
