mod error;
mod handlers;

pub use error::{ApiError, ErrorBody, FETCH_FAILED, MISSING_COUNTRY};

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::aggregate::Aggregator;

/// Build the application router
pub fn router(aggregator: Arc<Aggregator>) -> Router {
    Router::new()
        .route("/api/worldbank", get(handlers::country_data))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(aggregator)
}
