//! Route-level role gate.
//!
//! Runs after [`crate::middleware::protect`], which attaches the
//! [`CurrentUser`] this guard inspects.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use natours_auth::{AuthError, Role, authorize};

use crate::app::errors::ApiError;
use crate::context::CurrentUser;

pub const ADMIN: &[Role] = &[Role::Admin];
pub const TOUR_MANAGERS: &[Role] = &[Role::Admin, Role::LeadGuide];
pub const TOUR_STAFF: &[Role] = &[Role::Admin, Role::LeadGuide, Role::Guide];
pub const REVIEWERS: &[Role] = &[Role::User];

/// Middleware: reject the request unless the caller holds one of `allowed`.
pub async fn restrict_to(
    State(allowed): State<&'static [Role]>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = req
        .extensions()
        .get::<CurrentUser>()
        .ok_or(AuthError::NotLoggedIn)?;

    if let Err(err) = authorize(user.role(), allowed) {
        tracing::debug!(user_id = %user.id(), role = %user.role(), "role not permitted");
        return Err(AuthError::from(err).into());
    }

    Ok(next.run(req).await)
}
