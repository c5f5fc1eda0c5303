//! Replay export endpoints

use axum::{extract::rejection::JsonRejection, extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use test_genie_core::replay::{
    build_replay_movie_spec, enforce_watermark_requirements, harmonize_spec, ReplayBuildRequest,
    ReplayMovieSpec, WatermarkAudit,
};
use test_genie_core::GenieError;

use crate::error::AppError;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/build", post(build))
        .route("/harmonize", post(harmonize))
}

#[derive(Deserialize)]
struct BuildBody {
    #[serde(flatten)]
    request: ReplayBuildRequest,
    #[serde(default)]
    watermark_required: bool,
}

#[derive(Deserialize)]
struct HarmonizeBody {
    #[serde(default)]
    baseline: Option<ReplayMovieSpec>,
    #[serde(default)]
    incoming: Option<ReplayMovieSpec>,
    #[serde(default)]
    execution_id: String,
    #[serde(default)]
    accent_color: Option<String>,
    #[serde(default)]
    watermark_required: bool,
}

#[derive(Serialize)]
struct ExportResponse {
    spec: ReplayMovieSpec,
    watermark: WatermarkAudit,
}

async fn build(
    State(state): State<AppState>,
    body: Result<Json<BuildBody>, JsonRejection>,
) -> Result<Json<ReplayMovieSpec>, AppError> {
    let Json(body) = body?;
    let mut spec =
        build_replay_movie_spec(&body.request, state.clock.now()).map_err(GenieError::from)?;
    let watermark = enforce_watermark_requirements(&mut spec, body.watermark_required);

    tracing::info!(
        execution_id = %spec.execution.execution_id,
        frames = spec.summary.frame_count,
        watermark_enforced = watermark.was_enforced,
        "Built replay movie spec"
    );
    Ok(Json(spec))
}

async fn harmonize(
    State(state): State<AppState>,
    body: Result<Json<HarmonizeBody>, JsonRejection>,
) -> Result<Json<ExportResponse>, AppError> {
    let Json(body) = body?;
    let mut spec = harmonize_spec(
        body.baseline.as_ref(),
        body.incoming.as_ref(),
        &body.execution_id,
        body.accent_color.as_deref(),
        state.clock.now(),
    )
    .map_err(GenieError::from)?;
    let watermark = enforce_watermark_requirements(&mut spec, body.watermark_required);
    Ok(Json(ExportResponse { spec, watermark }))
}
