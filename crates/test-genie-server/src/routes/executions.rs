//! Suite execution endpoints, synchronous and SSE-streamed.

use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::header,
    response::{
        sse::{Event, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

use test_genie_core::events::{EventPayload, ExecutionEvent};
use test_genie_core::suite::{EventCallback, SuiteExecutionRequest, SuiteExecutionResult};
use test_genie_core::SharedClock;

use crate::error::{parse_uuid, AppError};
use crate::AppState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);
const DEFAULT_LIST_LIMIT: usize = 20;
const MAX_LIST_LIMIT: usize = 200;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_executions).post(execute))
        .route("/stream", post(execute_stream))
        .route("/:id", get(get_execution))
}

#[derive(Deserialize)]
struct ListQuery {
    scenario: Option<String>,
    limit: Option<usize>,
    offset: Option<usize>,
}

async fn execute(
    State(state): State<AppState>,
    body: Result<Json<SuiteExecutionRequest>, JsonRejection>,
) -> Result<Json<SuiteExecutionResult>, AppError> {
    let Json(request) = body?;
    let cancel = CancellationToken::new();
    // Dropped with the handler future when the client goes away
    let _guard = cancel.clone().drop_guard();

    let result = state.orchestrator.execute(&request, cancel).await?;
    Ok(Json(result))
}

/// Sequences every frame written to one SSE connection
struct SseSink {
    tx: mpsc::UnboundedSender<Result<Event, Infallible>>,
    sequence: AtomicU64,
    clock: SharedClock,
}

impl SseSink {
    fn send(&self, event: &ExecutionEvent) -> bool {
        let mut event = event.clone();
        event.sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let frame = Event::default()
            .event(event.event_type())
            .data(event.to_json());
        self.tx.send(Ok(frame)).is_ok()
    }

    fn send_payload(&self, payload: EventPayload) -> bool {
        self.send(&ExecutionEvent::new(payload, self.clock.now(), 0))
    }
}

async fn execute_stream(
    State(state): State<AppState>,
    body: Result<Json<SuiteExecutionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = body?;

    let (tx, rx) = mpsc::unbounded_channel::<Result<Event, Infallible>>();
    let sink = Arc::new(SseSink {
        tx,
        sequence: AtomicU64::new(1),
        clock: state.clock.clone(),
    });
    let cancel = CancellationToken::new();

    let callback: EventCallback = {
        let sink = sink.clone();
        Arc::new(move |event: &ExecutionEvent| {
            sink.send(event);
        })
    };

    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        let execution = orchestrator.execute_with_events(&request, cancel.clone(), callback);
        tokio::pin!(execution);

        let mut heartbeat = tokio::time::interval_at(
            tokio::time::Instant::now() + HEARTBEAT_INTERVAL,
            HEARTBEAT_INTERVAL,
        );

        loop {
            tokio::select! {
                result = &mut execution => {
                    if let Err(e) = result {
                        tracing::warn!(
                            scenario = %request.scenario_name,
                            error = %e,
                            "Streamed execution failed"
                        );
                        sink.send_payload(
                            EventPayload::Error {
                                message: e.to_string(),
                                kind: e.kind(),
                            },
                        );
                    }
                    break;
                }
                _ = heartbeat.tick() => {
                    sink.send_payload(EventPayload::Heartbeat {});
                }
                _ = sink.tx.closed(), if !cancel.is_cancelled() => {
                    tracing::info!(
                        scenario = %request.scenario_name,
                        "SSE client disconnected, cancelling execution"
                    );
                    cancel.cancel();
                }
            }
        }
    });

    Ok((
        [(header::CONNECTION, "keep-alive")],
        Sse::new(event_stream(rx)),
    ))
}

fn event_stream(
    rx: mpsc::UnboundedReceiver<Result<Event, Infallible>>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    UnboundedReceiverStream::new(rx)
}

async fn list_executions(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<SuiteExecutionResult>>, AppError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    let scenario = query.scenario.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let executions = state
        .repo
        .list_executions(scenario, limit, query.offset.unwrap_or(0))?;
    Ok(Json(executions))
}

async fn get_execution(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuiteExecutionResult>, AppError> {
    let id = parse_uuid(&id)?;
    state
        .repo
        .get_execution(&id)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Execution {} not found", id)))
}

#[cfg(test)]
mod tests {
    use crate::build_router;
    use crate::test_support::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use tower::ServiceExt;

    fn write_phase(root: &std::path::Path, phase: &str, body: &str) {
        let dir = root.join("scenarios/demo/test/phases");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(format!("test-{}.sh", phase)),
            format!("#!/usr/bin/env bash\n{}\n", body),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn unknown_phase_is_bad_request() {
        let (state, _dir) = create_test_state();
        let app = build_router(state);

        let response = app
            .oneshot(post_json(
                "/api/v1/executions",
                json!({"scenario_name": "demo", "phases": ["fuzzing"]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_suite_request_is_not_found() {
        let (state, _dir) = create_test_state();
        let app = build_router(state);

        let response = app
            .oneshot(post_json(
                "/api/v1/executions",
                json!({
                    "scenario_name": "demo",
                    "phases": ["unit"],
                    "suite_request_id": uuid::Uuid::new_v4().to_string()
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn sync_execution_records_history() {
        let (state, dir) = create_test_state();
        write_phase(dir.path(), "unit", "echo unit ok");
        let app = build_router(state);

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/v1/executions",
                json!({"scenario_name": "demo", "phases": ["unit"]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let result = json_body(response).await;
        assert_eq!(result["success"], true);
        assert_eq!(result["phase_summary"]["passed"], 1);

        let id = result["execution_id"].as_str().unwrap();
        let response = app
            .clone()
            .oneshot(get(&format!("/api/v1/executions/{}", id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(get("/api/v1/executions?scenario=demo&limit=5"))
            .await
            .unwrap();
        assert_eq!(json_body(response).await.as_array().unwrap().len(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stream_emits_phase_events_then_complete() {
        let (state, dir) = create_test_state();
        write_phase(dir.path(), "unit", "echo running unit tests");
        let app = build_router(state);

        let response = app
            .oneshot(post_json(
                "/api/v1/executions/stream",
                json!({"scenario_name": "demo", "phases": ["unit"], "fail_fast": true}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"].to_str().unwrap(),
            "text/event-stream"
        );

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();

        let start = text.find("event: phase_start").expect("phase_start");
        let end = text.find("event: phase_end").expect("phase_end");
        let complete = text.find("event: complete").expect("complete");
        assert!(start < end && end < complete);
        assert!(text.contains("event: observation"));
        assert!(text.contains(r#""status":"completed""#));
        assert!(text.contains(r#""phase_summary":{"total":1,"passed":1,"failed":0,"skipped":0}"#));
    }

    #[tokio::test]
    async fn stream_reports_validation_failure_as_error_event() {
        let (state, _dir) = create_test_state();
        let app = build_router(state);

        let response = app
            .oneshot(post_json(
                "/api/v1/executions/stream",
                json!({"scenario_name": "demo", "preset": "quick", "skip": ["structure", "unit"]}),
            ))
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("event: error"));
        assert!(!text.contains("event: complete"));
    }
}
