use std::sync::Arc;

use axum::Router;

use crate::app::services::AppServices;

pub mod reviews;
pub mod system;
pub mod tours;
pub mod users;

/// Router for the versioned `/api/v1` tree. Access rules are attached per route.
pub fn router(services: &Arc<AppServices>) -> Router {
    Router::new()
        .nest("/tours", tours::router(services))
        .nest("/users", users::router(services))
        .nest("/reviews", reviews::router(services))
}
