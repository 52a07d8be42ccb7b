use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::Value;

use natours_core::{ApiFeatures, DomainError, QueryParams, TourId};
use natours_infra::TourRepository;
use natours_tours::{Tour, TourDraft, monthly_plan, tour_stats, with_virtuals};

use crate::app::dto::{self, ApiJson, RawParams};
use crate::app::errors::ApiError;
use crate::app::routes::reviews;
use crate::app::services::AppServices;
use crate::{authz, middleware};

const TOP_TOURS_LIMIT: &str = "5";
const TOP_TOURS_SORT: &str = "-ratingsAverage,price";
const TOP_TOURS_FIELDS: &str = "name,price,ratingsAverage,summary,difficulty";

pub fn router(services: &Arc<AppServices>) -> Router {
    let protect = from_fn_with_state(services.clone(), middleware::protect);

    let public = Router::new()
        .route("/top-5-cheap", get(top_five_cheap))
        .route("/tour-stats", get(get_tour_stats))
        .route("/get-tour-stats", get(get_tour_stats))
        .route("/:id", get(get_tour));

    let members = Router::new()
        .route("/", get(list_tours))
        .route("/:id/reviews", get(reviews::list_reviews_for_tour))
        .route_layer(protect.clone());

    let reviewers = Router::new()
        .route("/:id/reviews", post(reviews::create_review_for_tour))
        .route_layer(from_fn_with_state(authz::REVIEWERS, authz::restrict_to))
        .route_layer(protect.clone());

    let staff = Router::new()
        .route("/monthly-plan/:year", get(get_monthly_plan))
        .route_layer(from_fn_with_state(authz::TOUR_STAFF, authz::restrict_to))
        .route_layer(protect.clone());

    let managers = Router::new()
        .route("/", post(create_tour))
        .route("/:id", patch(update_tour).delete(delete_tour))
        .route_layer(from_fn_with_state(authz::TOUR_MANAGERS, authz::restrict_to))
        .route_layer(protect);

    public
        .merge(members)
        .merge(reviewers)
        .merge(staff)
        .merge(managers)
}

pub async fn list_tours(
    Extension(services): Extension<Arc<AppServices>>,
    Query(raw): Query<RawParams>,
) -> Result<Json<Value>, ApiError> {
    find_tours(&services, dto::query_params(raw)).await
}

/// The five best rated tours, cheapest first among equals.
pub async fn top_five_cheap(
    Extension(services): Extension<Arc<AppServices>>,
    Query(raw): Query<RawParams>,
) -> Result<Json<Value>, ApiError> {
    let mut params = dto::query_params(raw);
    params.set("limit", TOP_TOURS_LIMIT);
    params.set("sort", TOP_TOURS_SORT);
    params.set("fields", TOP_TOURS_FIELDS);
    find_tours(&services, params).await
}

async fn find_tours(services: &AppServices, params: QueryParams) -> Result<Json<Value>, ApiError> {
    let query = ApiFeatures::new(TourRepository::base_query(), &params)
        .filter()
        .sort()
        .select()
        .paginate()
        .into_query();

    let tours = services.tours.list(&query).await?;
    Ok(dto::listing("tours", tours))
}

pub async fn get_tour(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id: TourId = id.parse()?;
    let tour = services.tours.get(id).await?.ok_or_else(tour_not_found)?;
    Ok(dto::success("tour", render_tour(&tour)?))
}

pub async fn create_tour(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(draft): ApiJson<TourDraft>,
) -> Result<impl IntoResponse, ApiError> {
    let tour = draft.validate(TourId::new(), Utc::now())?;
    let tour = services.tours.insert(tour).await?;

    tracing::info!(tour_id = %tour.id, name = %tour.name, "tour created");
    Ok((StatusCode::CREATED, dto::success("tour", render_tour(&tour)?)))
}

pub async fn update_tour(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<TourDraft>,
) -> Result<Json<Value>, ApiError> {
    let id: TourId = id.parse()?;
    let current = services.tours.get(id).await?.ok_or_else(tour_not_found)?;

    let updated = current.patched(patch)?;
    let saved = services
        .tours
        .replace(updated)
        .await?
        .ok_or_else(tour_not_found)?;

    Ok(dto::success("tour", render_tour(&saved)?))
}

pub async fn delete_tour(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: TourId = id.parse()?;
    if !services.tours.delete(id).await? {
        return Err(tour_not_found());
    }

    tracing::info!(tour_id = %id, "tour deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_tour_stats(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<Json<Value>, ApiError> {
    let tours = services.tours.all().await?;
    let stats = tour_stats(&tours);
    Ok(dto::success("stats", dto::to_json(&stats)?))
}

pub async fn get_monthly_plan(
    Extension(services): Extension<Arc<AppServices>>,
    Path(year): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let year: i32 = year
        .trim()
        .parse()
        .map_err(|_| ApiError::validation(format!("Invalid year: {year}")))?;

    let tours = services.tours.all().await?;
    let plan = monthly_plan(&tours, year);
    Ok(dto::success("plan", dto::to_json(&plan)?))
}

pub(crate) fn tour_not_found() -> ApiError {
    DomainError::not_found("tour").into()
}

/// A single tour as the list endpoint would render it.
fn render_tour(tour: &Tour) -> Result<Value, ApiError> {
    let doc = dto::to_json(tour)?;
    Ok(with_virtuals(TourRepository::base_query().projection().apply(doc)))
}
