use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::Value;

use natours_core::{ApiFeatures, DocumentQuery, DomainError, ReviewId, TourId};
use natours_tours::NewReview;

use crate::app::dto::{self, ApiJson, RawParams};
use crate::app::errors::ApiError;
use crate::app::routes::tours::tour_not_found;
use crate::app::services::AppServices;
use crate::context::CurrentUser;
use crate::{authz, middleware};

/// `/reviews`: every route requires a session; posting requires the `user` role.
pub fn router(services: &Arc<AppServices>) -> Router {
    let protect = from_fn_with_state(services.clone(), middleware::protect);

    let readers = Router::new()
        .route("/", get(list_reviews))
        .route("/:id", get(get_review))
        .route_layer(protect.clone());

    let writers = Router::new()
        .route("/", post(create_review))
        .route_layer(from_fn_with_state(authz::REVIEWERS, authz::restrict_to))
        .route_layer(protect);

    readers.merge(writers)
}

pub async fn list_reviews(
    Extension(services): Extension<Arc<AppServices>>,
    Query(raw): Query<RawParams>,
) -> Result<Json<Value>, ApiError> {
    find_reviews(&services, DocumentQuery::new(), raw).await
}

/// `GET /tours/:id/reviews`
pub async fn list_reviews_for_tour(
    Extension(services): Extension<Arc<AppServices>>,
    Path(tour_id): Path<String>,
    Query(raw): Query<RawParams>,
) -> Result<Json<Value>, ApiError> {
    let tour_id: TourId = tour_id.parse()?;
    let base = DocumentQuery::new().where_eq("tour", tour_id.to_string());
    find_reviews(&services, base, raw).await
}

async fn find_reviews(services: &AppServices, base: DocumentQuery, raw: RawParams) -> Result<Json<Value>, ApiError> {
    let params = dto::query_params(raw);
    let query = ApiFeatures::new(base, &params)
        .filter()
        .sort()
        .select()
        .paginate()
        .into_query();

    let reviews = services.reviews.list(query).await?;
    let reviews = reviews.iter().map(dto::to_json).collect::<Result<Vec<_>, _>>()?;
    Ok(dto::listing("reviews", reviews))
}

pub async fn get_review(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id: ReviewId = id.parse()?;
    let review = services
        .reviews
        .get(id)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::not_found("review")))?;

    Ok(dto::success("review", dto::to_json(&review)?))
}

pub async fn create_review(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    ApiJson(input): ApiJson<NewReview>,
) -> Result<impl IntoResponse, ApiError> {
    insert_review(&services, &user, input, None).await
}

/// `POST /tours/:id/reviews`: the tour defaults to the one in the path.
pub async fn create_review_for_tour(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(tour_id): Path<String>,
    ApiJson(input): ApiJson<NewReview>,
) -> Result<impl IntoResponse, ApiError> {
    let tour_id: TourId = tour_id.parse()?;
    insert_review(&services, &user, input, Some(tour_id)).await
}

async fn insert_review(
    services: &AppServices,
    user: &CurrentUser,
    mut input: NewReview,
    path_tour: Option<TourId>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    input.tour = input.tour.or(path_tour);
    input.user = input.user.or(Some(user.id()));

    if let Some(tour) = input.tour {
        if services.tours.get(tour).await?.is_none() {
            return Err(tour_not_found());
        }
    }

    let review = input.validate(Utc::now())?;
    let review = services.reviews.insert(review).await?;

    tracing::info!(review_id = %review.id, user_id = %user.id(), "review created");
    Ok((StatusCode::CREATED, dto::success("review", dto::to_json(&review)?)))
}
