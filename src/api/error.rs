use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

pub const FETCH_FAILED: &str = "Failed to fetch data";
pub const MISSING_COUNTRY: &str = "Missing country parameter";

/// API-layer error type. Every variant is rendered as `200` with an
/// `error` field so clients always receive a JSON body.
#[derive(Debug)]
pub enum ApiError {
    /// Any failure of the aggregation itself
    FetchFailed,

    /// No `country` query parameter
    MissingCountry,
}

/// JSON error response body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error = match self {
            ApiError::FetchFailed => FETCH_FAILED,
            ApiError::MissingCountry => MISSING_COUNTRY,
        };

        (StatusCode::OK, Json(ErrorBody { error })).into_response()
    }
}
