//! HTTP API application wiring (Axum router + middleware chain).
//!
//! - `services.rs`: repositories and the session manager shared by handlers
//! - `routes/`: HTTP routes + handlers (one file per resource)
//! - `dto.rs`: request bodies, the JSON extractor and response envelopes
//! - `errors.rs`: the error envelope and its rendering middleware
//! - `cookies.rs`: the `jwt` session cookie

use std::sync::Arc;

use axum::{Extension, Router, middleware::from_fn, middleware::from_fn_with_state, routing::get};
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::middleware;
use crate::rate_limit::{self, RateLimiter};

pub mod cookies;
pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use services::AppServices;

/// Request bodies above this size are rejected with 413.
pub const MAX_BODY_BYTES: usize = 10 * 1024;

/// Build the full HTTP router (public entrypoint used by `main.rs` and the tests).
///
/// Outermost first: tracing, security headers, error rendering, body limit,
/// timeout, then the per-IP rate limiter on `/api`.
pub fn build_app(services: Arc<AppServices>) -> Router {
    let config = &services.config;
    let limiter = Arc::new(RateLimiter::new(config.rate_limit_max, config.rate_limit_window));

    let api = Router::new()
        .nest("/v1", routes::router(&services))
        .layer(from_fn_with_state(limiter, rate_limit::rate_limit));

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api", api)
        .fallback(routes::system::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(from_fn(middleware::security_headers))
                .layer(from_fn_with_state(config.environment, errors::render_errors))
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
                .layer(TimeoutLayer::new(config.request_timeout))
                .layer(Extension(services.clone())),
        )
}
