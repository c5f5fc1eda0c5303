//! Suite request queue endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use test_genie_core::suite::{NewSuiteRequest, SuiteRequest};

use crate::error::{parse_uuid, AppError};
use crate::AppState;

const DEFAULT_LIST_LIMIT: usize = 50;
const MAX_LIST_LIMIT: usize = 500;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_requests).post(create_request))
        .route("/latest", get(latest_request))
        .route("/:id", get(get_request))
}

#[derive(Deserialize)]
struct ListQuery {
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct LatestQuery {
    scenario: Option<String>,
}

async fn create_request(
    State(state): State<AppState>,
    body: Result<Json<NewSuiteRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SuiteRequest>), AppError> {
    let Json(input) = body?;
    let request = state.orchestrator.queue_request(input)?;
    Ok((StatusCode::CREATED, Json(request)))
}

async fn list_requests(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<SuiteRequest>>, AppError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    Ok(Json(state.repo.list_suite_requests(limit)?))
}

async fn latest_request(
    State(state): State<AppState>,
    Query(query): Query<LatestQuery>,
) -> Result<Json<SuiteRequest>, AppError> {
    let scenario = query
        .scenario
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("scenario query parameter is required".into()))?;

    state
        .repo
        .latest_suite_request(scenario.trim())?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No suite requests for scenario {}", scenario)))
}

async fn get_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuiteRequest>, AppError> {
    let id = parse_uuid(&id)?;
    state
        .repo
        .get_suite_request(&id)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Suite request {} not found", id)))
}
