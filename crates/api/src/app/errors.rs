//! Client-facing error envelope.
//!
//! Handlers return [`ApiError`]; its `IntoResponse` writes a minimal
//! `{status, message}` body and stashes the error in the response extensions.
//! [`render_errors`] then re-renders every error response for the current
//! [`Environment`]: verbose in development, sanitized in production. Bare
//! error responses produced outside the handlers (timeouts, body limits,
//! extractor rejections, 405s) are wrapped in the same envelope.

use std::backtrace::Backtrace;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

use natours_auth::AuthError;
use natours_core::{DomainError, QueryError, StoreError};

use crate::config::Environment;

const GENERIC_MESSAGE: &str = "Something went very wrong!";
const MAX_BARE_BODY: usize = 4 * 1024;

tokio::task_local! {
    /// Set by [`render_errors`] for the request being handled: errors raised
    /// inside it record a backtrace only when this is `true`.
    static CAPTURE_BACKTRACE: bool;
}

fn capture_backtrace() -> Backtrace {
    if CAPTURE_BACKTRACE.try_with(|capture| *capture).unwrap_or(false) {
        Backtrace::force_capture()
    } else {
        Backtrace::disabled()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Auth,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    Timeout,
    Conflict,
    PayloadTooLarge,
    RateLimited,
    Internal,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Auth => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ErrorKind::Timeout => StatusCode::REQUEST_TIMEOUT,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => ErrorKind::Auth,
            StatusCode::FORBIDDEN => ErrorKind::Forbidden,
            StatusCode::NOT_FOUND => ErrorKind::NotFound,
            StatusCode::METHOD_NOT_ALLOWED => ErrorKind::MethodNotAllowed,
            StatusCode::REQUEST_TIMEOUT => ErrorKind::Timeout,
            StatusCode::CONFLICT => ErrorKind::Conflict,
            StatusCode::PAYLOAD_TOO_LARGE => ErrorKind::PayloadTooLarge,
            StatusCode::TOO_MANY_REQUESTS => ErrorKind::RateLimited,
            s if s.is_client_error() => ErrorKind::Validation,
            _ => ErrorKind::Internal,
        }
    }
}

/// A normalized request failure.
///
/// `operational` errors are expected outcomes whose message is safe to show.
/// Anything else is a bug or an infrastructure failure and is hidden in
/// production.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    pub status: StatusCode,
    pub operational: bool,
    pub detail: Option<String>,
    pub backtrace: Arc<Backtrace>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: kind.status(),
            operational: true,
            detail: None,
            backtrace: Arc::new(capture_backtrace()),
        }
    }

    /// An unexpected failure. The message is only ever shown in development.
    pub fn internal(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self {
            operational: false,
            detail: Some(detail.clone()),
            ..Self::new(ErrorKind::Internal, detail)
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn route_not_found(path: &str) -> Self {
        Self::not_found(format!("Can't find {path} on this server!"))
    }

    pub fn rate_limited() -> Self {
        Self::new(
            ErrorKind::RateLimited,
            "Too many requests from this IP, please try again in an hour!",
        )
    }

    /// `fail` for client errors, `error` for server errors.
    pub fn envelope_status(&self) -> &'static str {
        if self.status.is_client_error() { "fail" } else { "error" }
    }

    /// The JSON body for `environment`.
    pub fn body(&self, environment: Environment) -> (StatusCode, Value) {
        match environment {
            Environment::Development => (
                self.status,
                json!({
                    "status": self.envelope_status(),
                    "message": self.message,
                    "error": {
                        "kind": format!("{:?}", self.kind),
                        "statusCode": self.status.as_u16(),
                        "isOperational": self.operational,
                        "detail": self.detail,
                    },
                    "stack": self.backtrace.to_string(),
                }),
            ),
            Environment::Production if self.operational => (
                self.status,
                json!({"status": self.envelope_status(), "message": self.message}),
            ),
            Environment::Production => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"status": "error", "message": GENERIC_MESSAGE}),
            ),
        }
    }

    /// Classify a bare error response that did not come from a handler.
    fn from_bare(status: StatusCode, body: &str) -> Self {
        let kind = ErrorKind::from_status(status);
        let message = match kind {
            ErrorKind::Timeout => "Request took too long to complete. Please try again.".to_string(),
            ErrorKind::PayloadTooLarge => "Request body is too large.".to_string(),
            _ if !body.trim().is_empty() => body.trim().to_string(),
            _ => status.canonical_reason().unwrap_or("Request failed").to_string(),
        };
        Self {
            status,
            operational: !status.is_server_error(),
            ..Self::new(kind, message)
        }
    }
}

impl core::fmt::Display for ApiError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.body(Environment::Production);
        let mut response = (status, axum::Json(body)).into_response();
        *response.status_mut() = self.status;
        response.extensions_mut().insert(self);
        response
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match &err {
            DomainError::Validation(_) | DomainError::InvalidId(_) => ApiError::validation(err.to_string()),
            DomainError::NotFound(_) => ApiError::not_found(err.to_string()),
            DomainError::Conflict(_) => ApiError::new(ErrorKind::Conflict, err.to_string()),
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate { value, .. } => ApiError::new(
                ErrorKind::Conflict,
                format!("Duplicate field value: \"{value}\". Please use another value!"),
            ),
            StoreError::Query(err) => err.into(),
            other => ApiError::internal(other.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Validation(err) => err.into(),
            AuthError::Store(err) => err.into(),
            AuthError::MissingCredentials
            | AuthError::ResetTokenInvalid
            | AuthError::PasswordFieldsNotAllowed => ApiError::validation(err.to_string()),
            AuthError::InvalidCredentials
            | AuthError::NotLoggedIn
            | AuthError::InvalidToken
            | AuthError::TokenExpired
            | AuthError::AccountGone
            | AuthError::PasswordChanged
            | AuthError::WrongCurrentPassword => ApiError::new(ErrorKind::Auth, err.to_string()),
            AuthError::Forbidden(_) => ApiError::new(ErrorKind::Forbidden, err.to_string()),
            AuthError::MailDelivery(ref source) => {
                let detail = source.to_string();
                ApiError::new(ErrorKind::Internal, err.to_string()).with_detail(detail)
            }
            AuthError::Hashing(_) | AuthError::Signing(_) => ApiError::internal(err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::new(ErrorKind::PayloadTooLarge, "Request body is too large.");
        }
        ApiError::validation(rejection.body_text())
    }
}

/// Render every error response in the envelope for `environment`.
///
/// In development, errors raised while the request is handled carry a
/// backtrace regardless of `RUST_BACKTRACE`.
pub async fn render_errors(State(environment): State<Environment>, req: Request, next: Next) -> Response {
    let capture = !environment.is_production();
    let response = CAPTURE_BACKTRACE.scope(capture, next.run(req)).await;
    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let error = match parts.extensions.remove::<ApiError>() {
        Some(error) => error,
        None => {
            let bytes = axum::body::to_bytes(body, MAX_BARE_BODY).await.unwrap_or_default();
            let body = String::from_utf8_lossy(&bytes);
            CAPTURE_BACKTRACE.sync_scope(capture, || ApiError::from_bare(status, &body))
        }
    };

    if !error.operational {
        tracing::error!(
            kind = ?error.kind,
            status = error.status.as_u16(),
            detail = ?error.detail,
            "unexpected error"
        );
    }

    let (status, body) = error.body(environment);
    parts.status = status;
    parts.headers.remove(header::CONTENT_LENGTH);
    parts
        .headers
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Response::from_parts(parts, Body::from(body.to_string()))
}
