use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};

use super::error::ApiError;
use crate::aggregate::{AggregatedResponse, Aggregator};

/// GET /api/worldbank query string
#[derive(Debug, Deserialize)]
pub struct CountryQuery {
    pub country: Option<String>,
}

/// GET /health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// GET /api/worldbank - Latest indicators for one country
pub async fn country_data(
    State(aggregator): State<Arc<Aggregator>>,
    query: Result<Query<CountryQuery>, QueryRejection>,
) -> Result<Json<AggregatedResponse>, ApiError> {
    // A repeated or undecodable `country` leaves no single code to look up
    let Query(query) = query.map_err(|rejection| {
        warn!(error = %rejection, "Rejected query string");
        ApiError::MissingCountry
    })?;

    let country = match query.country.as_deref().map(str::trim) {
        Some(country) if !country.is_empty() => country,
        _ => {
            warn!("Request without country parameter");
            return Err(ApiError::MissingCountry);
        }
    };

    aggregator.aggregate(country).await.map(Json).map_err(|e| {
        error!(error = ?e, country, "Error fetching data");
        ApiError::FetchFailed
    })
}

/// GET /health - Health check
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
