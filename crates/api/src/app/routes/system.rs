use axum::{extract::OriginalUri, http::StatusCode};

use crate::app::errors::ApiError;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Fallback for every unmatched route.
pub async fn not_found(OriginalUri(uri): OriginalUri) -> ApiError {
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or(uri.path());
    ApiError::route_not_found(path)
}
