//! Agent management endpoints

use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use test_genie_core::agents::{Agent, ScopeLock, SpawnRequest};
use test_genie_core::safety::{validate_scenario_name, validate_scope_paths};
use test_genie_core::GenieError;

use crate::error::AppError;
use crate::AppState;

const DEFAULT_LIST_LIMIT: usize = 50;
const MAX_LIST_LIMIT: usize = 500;

/// Build the agents router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_agents))
        .route("/spawn", post(spawn_agents))
        .route("/active", get(list_active))
        .route("/locks", get(list_locks))
        .route("/check-conflicts", post(check_conflicts))
        .route("/validate-paths", post(validate_paths))
        .route("/stop-all", post(stop_all))
        .route("/cleanup", post(cleanup))
        .route("/:id", get(get_agent))
        .route("/:id/stop", post(stop_agent))
}

#[derive(Deserialize)]
struct ListQuery {
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct ScopeRequest {
    scenario: String,
    #[serde(default)]
    paths: Vec<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct CleanupRequest {
    older_than_hours: Option<u64>,
}

/// Outcome for one prompt of a spawn request
#[derive(Serialize)]
pub struct SpawnResult {
    pub prompt_index: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<Agent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<String>,
}

#[derive(Serialize)]
pub struct SpawnResponse {
    pub spawned: usize,
    pub failed: usize,
    pub results: Vec<SpawnResult>,
}

#[derive(Serialize)]
struct ConflictResponse {
    has_conflicts: bool,
    conflicting_agent_ids: Vec<String>,
    normalized_paths: Vec<String>,
}

#[derive(Serialize)]
struct PathError {
    path: String,
    error: String,
    code: String,
}

#[derive(Serialize)]
struct ValidatePathsResponse {
    valid: bool,
    normalized_paths: Vec<String>,
    errors: Vec<PathError>,
}

#[derive(Serialize)]
struct StopAllResponse {
    count: usize,
    stopped: Vec<String>,
}

#[derive(Serialize)]
struct CleanupResponse {
    removed: usize,
}

/// Spawn one agent per prompt; fails outright only when every prompt failed
async fn spawn_agents(
    State(state): State<AppState>,
    body: Result<Json<SpawnRequest>, JsonRejection>,
) -> Result<Json<SpawnResponse>, AppError> {
    let Json(request) = body?;
    let outcomes = state.supervisor.spawn(&request)?;

    let mut first_error: Option<GenieError> = None;
    let mut results = Vec::with_capacity(outcomes.len());
    for (prompt_index, outcome) in outcomes.into_iter().enumerate() {
        results.push(match outcome {
            Ok(agent) => SpawnResult {
                prompt_index,
                success: true,
                agent: Some(agent),
                error: None,
                code: None,
                conflicts: Vec::new(),
            },
            Err(e) => {
                let result = SpawnResult {
                    prompt_index,
                    success: false,
                    agent: None,
                    error: Some(e.to_string()),
                    code: Some(e.kind().as_str().to_string()),
                    conflicts: e.conflicting_agents().to_vec(),
                };
                first_error.get_or_insert(e);
                result
            }
        });
    }

    let spawned = results.iter().filter(|r| r.success).count();
    if spawned == 0 {
        if let Some(err) = first_error {
            return Err(err.into());
        }
    }

    Ok(Json(SpawnResponse {
        spawned,
        failed: results.len() - spawned,
        results,
    }))
}

async fn list_agents(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Json<Vec<Agent>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    Json(state.registry.list_all(limit))
}

async fn list_active(State(state): State<AppState>) -> Json<Vec<Agent>> {
    Json(state.registry.list_active())
}

async fn list_locks(State(state): State<AppState>) -> Json<Vec<ScopeLock>> {
    Json(state.registry.active_locks())
}

async fn get_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Agent>, AppError> {
    state
        .registry
        .get(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Agent {} not found", id)))
}

async fn check_conflicts(
    State(state): State<AppState>,
    body: Result<Json<ScopeRequest>, JsonRejection>,
) -> Result<Json<ConflictResponse>, AppError> {
    let Json(request) = body?;
    validate_scenario_name(&request.scenario)?;
    let scenario = request.scenario.trim();
    let normalized = validate_scope_paths(scenario, &request.paths, &state.config.repo_root)?;

    let conflicting = state.registry.check_conflicts(scenario, &normalized);
    Ok(Json(ConflictResponse {
        has_conflicts: !conflicting.is_empty(),
        conflicting_agent_ids: conflicting,
        normalized_paths: normalized,
    }))
}

/// Dry-run scope validation, one verdict per path
async fn validate_paths(
    State(state): State<AppState>,
    body: Result<Json<ScopeRequest>, JsonRejection>,
) -> Result<Json<ValidatePathsResponse>, AppError> {
    let Json(request) = body?;
    validate_scenario_name(&request.scenario)?;
    let scenario = request.scenario.trim();

    let mut normalized_paths = Vec::new();
    let mut errors = Vec::new();
    for path in &request.paths {
        match validate_scope_paths(scenario, std::slice::from_ref(path), &state.config.repo_root) {
            Ok(mut cleaned) => normalized_paths.append(&mut cleaned),
            Err(e) => errors.push(PathError {
                path: path.clone(),
                error: e.to_string(),
                code: e.kind().as_str().to_string(),
            }),
        }
    }

    Ok(Json(ValidatePathsResponse {
        valid: errors.is_empty(),
        normalized_paths,
        errors,
    }))
}

async fn stop_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Agent>, AppError> {
    let agent = state.registry.stop(&id)?;
    tracing::info!(agent_id = %id, scenario = %agent.scenario, "Agent stopped by user");
    state.bus.broadcast_agent_stopped(&id);
    state.bus.broadcast_agent_updated(&agent);
    Ok(Json(agent))
}

async fn stop_all(State(state): State<AppState>) -> Json<StopAllResponse> {
    let stopped = state.registry.stop_all();
    tracing::info!(count = stopped.len(), "Stopped all agents");
    state.bus.broadcast_agents_stopped_all(stopped.len());
    Json(StopAllResponse {
        count: stopped.len(),
        stopped,
    })
}

async fn cleanup(
    State(state): State<AppState>,
    body: Option<Json<CleanupRequest>>,
) -> Json<CleanupResponse> {
    let retention = body
        .and_then(|Json(req)| req.older_than_hours)
        .map(|hours| Duration::from_secs(hours * 60 * 60))
        .unwrap_or(state.config.agent_retention);
    Json(CleanupResponse {
        removed: state.registry.cleanup_completed(retention),
    })
}

#[cfg(test)]
mod tests {
    use crate::build_router;
    use crate::test_support::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use test_genie_core::agents::Agent;
    use test_genie_core::events::EventFilter;
    use tower::ServiceExt;

    #[tokio::test]
    async fn spawn_rejects_blocked_tools() {
        let (state, _dir) = create_test_state();
        let app = build_router(state);

        let response = app
            .oneshot(post_json(
                "/api/v1/agents/spawn",
                json!({
                    "scenario": "demo",
                    "prompts": ["Write unit tests"],
                    "tools": ["bash"]
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["code"], "BLOCKED_TOOL");
    }

    #[tokio::test]
    async fn spawn_rejects_dangerous_prompts_and_traversal() {
        let (state, _dir) = create_test_state();
        let app = build_router(state);

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/v1/agents/spawn",
                json!({"scenario": "demo", "prompts": ["then DROP TABLE users"]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["code"], "DANGEROUS_PROMPT_PATTERN");

        let response = app
            .oneshot(post_json(
                "/api/v1/agents/spawn",
                json!({
                    "scenario": "demo",
                    "prompts": ["Write tests"],
                    "scope": ["../../etc/passwd"]
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["code"], "PATH_TRAVERSAL");
    }

    #[tokio::test]
    async fn conflicts_reflect_registered_locks() {
        let (state, _dir) = create_test_state();
        let holder = Agent::pending("demo", "Write api tests", "sonnet", state.clock.now())
            .with_scope(vec!["api".into()]);
        let holder = state.registry.register(holder).unwrap();
        let app = build_router(state);

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/v1/agents/check-conflicts",
                json!({"scenario": "demo", "paths": ["api/handlers/"]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["has_conflicts"], true);
        assert_eq!(body["conflicting_agent_ids"], json!([holder.id]));

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/v1/agents/check-conflicts",
                json!({"scenario": "demo", "paths": ["ui"]}),
            ))
            .await
            .unwrap();
        assert_eq!(json_body(response).await["has_conflicts"], false);

        let response = app.oneshot(get("/api/v1/agents/locks")).await.unwrap();
        assert_eq!(json_body(response).await.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn validate_paths_reports_each_entry() {
        let (state, _dir) = create_test_state();
        let app = build_router(state);

        let response = app
            .oneshot(post_json(
                "/api/v1/agents/validate-paths",
                json!({"scenario": "demo", "paths": ["api/", "../other", "ui/./components"]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["valid"], false);
        assert_eq!(body["normalized_paths"], json!(["api", "ui/components"]));
        assert_eq!(body["errors"][0]["path"], "../other");
        assert_eq!(body["errors"][0]["code"], "PATH_TRAVERSAL");
    }

    #[tokio::test]
    async fn stop_lifecycle() {
        let (state, _dir) = create_test_state();
        let mut events = state.bus.subscribe(EventFilter::Agents);
        let agent = state
            .registry
            .register(Agent::pending("demo", "Write tests", "sonnet", state.clock.now()))
            .unwrap();
        let app = build_router(state);

        let response = app
            .clone()
            .oneshot(post_json(&format!("/api/v1/agents/{}/stop", agent.id), json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "stopped");
        assert_eq!(body["error"], "stopped by user");
        assert_eq!(events.recv().await.unwrap().event_type(), "agent_stopped");

        let response = app
            .clone()
            .oneshot(post_json(&format!("/api/v1/agents/{}/stop", agent.id), json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = app
            .clone()
            .oneshot(post_json("/api/v1/agents/missing/stop", json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .clone()
            .oneshot(post_json("/api/v1/agents/stop-all", json!({})))
            .await
            .unwrap();
        assert_eq!(json_body(response).await["count"], 0);

        let response = app
            .oneshot(get(&format!("/api/v1/agents/{}", agent.id)))
            .await
            .unwrap();
        assert_eq!(json_body(response).await["status"], "stopped");
    }

    #[tokio::test]
    async fn cleanup_accepts_empty_body() {
        let (state, _dir) = create_test_state();
        let app = build_router(state);

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/api/v1/agents/cleanup")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["removed"], 0);
    }
}
