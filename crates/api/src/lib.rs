//! HTTP API: configuration, routing, middleware and request/response mapping.

pub mod app;
pub mod authz;
pub mod config;
pub mod context;
pub mod middleware;
pub mod rate_limit;

pub use app::build_app;
pub use app::services::AppServices;
pub use config::{AppConfig, ConfigError, Environment};
