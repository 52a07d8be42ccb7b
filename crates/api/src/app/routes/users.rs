use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::{StatusCode, header},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Json, Router,
};
use chrono::{Duration, Utc};
use serde_json::{Value, json};

use natours_auth::{
    AdminUserUpdate, AuthError, NewPassword, PasswordChange, ProfileUpdate, Registration, Session,
    User, UserRepository, UserView,
};
use natours_core::{ApiFeatures, DocumentQuery, DomainError, UserId};

use crate::app::cookies;
use crate::app::dto::{self, ApiJson, ForgotPasswordRequest, LoginRequest, RawParams};
use crate::app::errors::{ApiError, ErrorKind};
use crate::app::services::AppServices;
use crate::context::CurrentUser;
use crate::{authz, middleware};

pub fn router(services: &Arc<AppServices>) -> Router {
    let protect = from_fn_with_state(services.clone(), middleware::protect);

    let public = Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", get(logout))
        .route("/forgotPassword", post(forgot_password))
        .route("/resetPassword/:token", patch(reset_password));

    let members = Router::new()
        .route("/updateMyPassword", patch(update_password).post(update_password))
        .route("/me", get(get_me))
        .route("/updateMe", patch(update_me))
        .route("/updateMyProfile", post(update_me))
        .route("/deleteMe", delete(delete_me))
        .route("/deleteMyProfile", delete(delete_me))
        .route_layer(protect.clone());

    let admins = Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", get(get_user).patch(update_user).delete(delete_user))
        .route_layer(from_fn_with_state(authz::ADMIN, authz::restrict_to))
        .route_layer(protect);

    public.merge(members).merge(admins)
}

pub async fn signup(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(input): ApiJson<Registration>,
) -> Result<Response, ApiError> {
    let session = services.sessions.register(input).await?;
    session_response(&services, StatusCode::CREATED, session)
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(input): ApiJson<LoginRequest>,
) -> Result<Response, ApiError> {
    let session = services
        .sessions
        .authenticate(&input.email, &input.password)
        .await?;
    session_response(&services, StatusCode::OK, session)
}

pub async fn logout() -> impl IntoResponse {
    (
        [(header::SET_COOKIE, cookies::logout_cookie(Utc::now()))],
        Json(json!({"status": "success"})),
    )
}

pub async fn forgot_password(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(input): ApiJson<ForgotPasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    services
        .sessions
        .request_password_reset(&input.email, &reset_url_base(&services))
        .await?;

    Ok(Json(json!({"status": "success", "message": "Token sent to email!"})))
}

pub async fn reset_password(
    Extension(services): Extension<Arc<AppServices>>,
    Path(token): Path<String>,
    ApiJson(input): ApiJson<NewPassword>,
) -> Result<Response, ApiError> {
    let session = services.sessions.complete_password_reset(&token, input).await?;
    session_response(&services, StatusCode::OK, session)
}

pub async fn update_password(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    ApiJson(input): ApiJson<PasswordChange>,
) -> Result<Response, ApiError> {
    let session = services.sessions.change_password(user.id(), input).await?;
    session_response(&services, StatusCode::OK, session)
}

pub async fn get_me(Extension(user): Extension<CurrentUser>) -> Result<Json<Value>, ApiError> {
    Ok(dto::success("user", dto::to_json(&user.view())?))
}

pub async fn update_me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    ApiJson(input): ApiJson<ProfileUpdate>,
) -> Result<Json<Value>, ApiError> {
    let updated = services.sessions.update_profile(user.id(), input).await?;
    Ok(dto::success("user", dto::to_json(&UserView::from(&updated))?))
}

pub async fn delete_me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<StatusCode, ApiError> {
    services.sessions.deactivate(user.id()).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Query(raw): Query<RawParams>,
) -> Result<Json<Value>, ApiError> {
    let params = dto::query_params(raw);
    let query = ApiFeatures::new(DocumentQuery::new(), &params)
        .filter()
        .sort()
        .select()
        .paginate()
        .into_query();

    let users = services.users.list_active(query).await?;
    Ok(dto::listing("users", users))
}

pub async fn create_user() -> ApiError {
    ApiError::new(
        ErrorKind::Internal,
        "This route is not defined! Please use /signup instead",
    )
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let user = find_active_user(&services, &id).await?;
    Ok(dto::success("user", dto::to_json(&UserView::from(&user))?))
}

/// Role, activation and profile fields. Passwords change only through their own routes.
pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<AdminUserUpdate>,
) -> Result<Json<Value>, ApiError> {
    if input.touches_password() {
        return Err(AuthError::PasswordFieldsNotAllowed.into());
    }

    let mut user = find_active_user(&services, &id).await?;
    input.apply_to(&mut user)?;
    let user = services.users.save(user).await?;

    tracing::info!(user_id = %user.id, role = %user.role, active = user.active, "user updated by admin");
    Ok(dto::success("user", dto::to_json(&UserView::from(&user))?))
}

pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: UserId = id.parse()?;
    if !services.users.delete(id).await? {
        return Err(user_not_found());
    }

    tracing::info!(user_id = %id, "user deleted by admin");
    Ok(StatusCode::NO_CONTENT)
}

async fn find_active_user(services: &AppServices, id: &str) -> Result<User, ApiError> {
    let id: UserId = id.parse()?;
    services
        .users
        .find_by_id(id)
        .await?
        .filter(|user| user.active)
        .ok_or_else(user_not_found)
}

fn user_not_found() -> ApiError {
    DomainError::not_found("user").into()
}

/// `{status, token, data: {user}}` plus the `jwt` cookie.
fn session_response(services: &AppServices, status: StatusCode, session: Session) -> Result<Response, ApiError> {
    let config = &services.config;
    let lifetime = Duration::try_days(config.jwt_cookie_expires_in_days).unwrap_or(config.jwt_expires_in);
    let cookie = cookies::session_cookie(
        &session.token,
        Utc::now() + lifetime,
        config.environment.is_production(),
    );

    let body = json!({
        "status": "success",
        "token": session.token,
        "data": {"user": dto::to_json(&UserView::from(&session.user))?},
    });
    Ok((status, [(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

/// Absolute prefix the raw reset token is appended to in the mailed link.
///
/// Always the configured origin; request headers are client-controlled.
fn reset_url_base(services: &AppServices) -> String {
    format!("{}/api/v1/users/resetPassword", services.config.public_base_url())
}
