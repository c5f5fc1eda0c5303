//! test-genie server
//!
//! HTTP, SSE and WebSocket surface for the test-genie control plane.
//! The binary and the `test-genie serve` command both start it via `start_server()`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{Method, StatusCode},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use test_genie_core::agents::{AgentRegistry, AgentSupervisor, SupervisorConfig, MAX_AGENT_TIMEOUT};
use test_genie_core::events::EventBus;
use test_genie_core::storage::{SqliteRepository, SuiteRepository};
use test_genie_core::suite::{QueueSnapshot, ScriptPhase, SuiteOrchestrator};
use test_genie_core::{GenieConfig, SharedClock, SystemClock};

pub mod error;
pub mod routes;
pub mod ws;

const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);
/// Connections that send no complete request head within this window are closed
pub const IDLE_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GenieConfig>,
    pub clock: SharedClock,
    pub registry: Arc<AgentRegistry>,
    pub supervisor: Arc<AgentSupervisor>,
    pub bus: Arc<EventBus>,
    pub orchestrator: Arc<SuiteOrchestrator>,
    pub repo: Arc<dyn SuiteRepository>,
    /// Connected WebSocket dashboards.
    pub ws_clients: Arc<AtomicUsize>,
}

impl AppState {
    /// Wire every component from configuration and a repository.
    pub fn new(config: GenieConfig, repo: Arc<dyn SuiteRepository>, clock: SharedClock) -> Self {
        let registry = Arc::new(AgentRegistry::new(clock.clone(), config.lock_timeout));
        let bus = Arc::new(EventBus::new(clock.clone()));
        let supervisor = Arc::new(AgentSupervisor::new(
            registry.clone(),
            bus.clone(),
            clock.clone(),
            SupervisorConfig::from_genie(&config),
        ));
        let orchestrator = Arc::new(
            SuiteOrchestrator::new(
                repo.clone(),
                clock.clone(),
                Arc::new(ScriptPhase::new(config.scenarios_root.clone())),
            )
            .with_bus(bus.clone()),
        );

        Self {
            config: Arc::new(config),
            clock,
            registry,
            supervisor,
            bus,
            orchestrator,
            repo,
            ws_clients: Arc::new(AtomicUsize::new(0)),
        }
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws::agents::handler))
        .nest("/api", routes::api_router())
        .layer(cors)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            MAX_AGENT_TIMEOUT,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Periodically drop completed agents past the retention window.
pub fn spawn_cleanup_task(
    registry: Arc<AgentRegistry>,
    retention: Duration,
    interval: Duration,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = registry.cleanup_completed(retention);
                    if removed > 0 {
                        tracing::info!(removed, "Cleaned up completed agents");
                    }
                }
            }
        }
    })
}

/// Start the test-genie server and block until shutdown.
pub async fn start_server(config: GenieConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    let repo: Arc<dyn SuiteRepository> = Arc::new(SqliteRepository::open(&config.db_path)?);
    let state = AppState::new(config, repo, Arc::new(SystemClock));

    let shutdown = CancellationToken::new();
    let cleanup = spawn_cleanup_task(
        state.registry.clone(),
        state.config.agent_retention,
        CLEANUP_INTERVAL,
        shutdown.clone(),
    );

    tracing::info!(
        db = %state.config.db_path.display(),
        scenarios = %state.config.scenarios_root.display(),
        "test-genie server listening on http://{}",
        addr
    );

    let registry = state.registry.clone();
    let app = build_router(state);
    let listener = TcpListener::bind(addr).await?;

    let signal = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutdown signal received");
        signal.cancel();
    });
    serve_connections(listener, app, IDLE_READ_TIMEOUT, shutdown.clone()).await;

    let _ = cleanup.await;
    let stopped = registry.stop_all();
    if !stopped.is_empty() {
        tracing::info!(count = stopped.len(), "Stopped running agents on shutdown");
    }

    Ok(())
}

/// Accept connections until `shutdown` fires, then drain in-flight ones
///
/// Each connection gets a header read timeout so idle clients cannot hold
/// sockets open indefinitely.
pub async fn serve_connections(
    listener: TcpListener,
    app: Router,
    idle_read_timeout: Duration,
    shutdown: CancellationToken,
) {
    let mut builder = auto::Builder::new(TokioExecutor::new());
    builder
        .http1()
        .timer(TokioTimer::new())
        .header_read_timeout(idle_read_timeout);
    let builder = Arc::new(builder);
    let connections = tokio_util::task::TaskTracker::new();

    loop {
        let (stream, remote) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to accept connection");
                    continue;
                }
            },
            _ = shutdown.cancelled() => break,
        };

        let builder = builder.clone();
        let service = TowerToHyperService::new(app.clone());
        let shutdown = shutdown.clone();
        connections.spawn(async move {
            let conn = builder.serve_connection_with_upgrades(TokioIo::new(stream), service);
            tokio::pin!(conn);
            let result = tokio::select! {
                result = conn.as_mut() => result,
                _ = shutdown.cancelled() => {
                    conn.as_mut().graceful_shutdown();
                    conn.await
                }
            };
            if let Err(e) = result {
                tracing::debug!(remote = %remote, error = %e, "Connection closed with error");
            }
        });
    }

    connections.close();
    connections.wait().await;
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match state.repo.ping() {
        Ok(()) => "ok".to_string(),
        Err(e) => {
            tracing::warn!("Health check database ping failed: {}", e);
            format!("error: {}", e)
        }
    };
    let queue = state.repo.queue_snapshot().unwrap_or_default();
    let healthy = database == "ok";

    Json(HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: state.clock.now(),
        dependencies: HealthDependencies { database },
        active_agents: state.registry.count_active(),
        websocket_clients: state.ws_clients.load(Ordering::Relaxed),
        queue,
    })
}

#[derive(Serialize)]
struct HealthDependencies {
    database: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    timestamp: DateTime<Utc>,
    dependencies: HealthDependencies,
    active_agents: usize,
    websocket_clients: usize,
    queue: QueueSnapshot,
}


#[cfg(test)]
mod tests {
    use super::test_support::{create_test_state, get, json_body};
    use super::*;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_reports_dependencies_and_queue() {
        let (state, _dir) = create_test_state();
        let app = build_router(state);

        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["dependencies"]["database"], "ok");
        assert_eq!(body["active_agents"], 0);
        assert_eq!(body["queue"]["queued"], 0);
    }

    #[tokio::test]
    async fn idle_connections_are_closed() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let (state, _dir) = create_test_state();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let server = tokio::spawn(serve_connections(
            listener,
            build_router(state),
            Duration::from_millis(200),
            shutdown.clone(),
        ));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"GET /health HTTP/1.1\r\n").await.unwrap();

        let mut buf = Vec::new();
        let closed = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut buf)).await;
        assert!(closed.is_ok(), "stalled connection was not closed");

        shutdown.cancel();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn served_connections_answer_requests() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let (state, _dir) = create_test_state();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let server = tokio::spawn(serve_connections(
            listener,
            build_router(state),
            IDLE_READ_TIMEOUT,
            shutdown.clone(),
        ));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut buf = Vec::new();
        tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert!(String::from_utf8_lossy(&buf).starts_with("HTTP/1.1 200"));

        shutdown.cancel();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn cleanup_task_stops_on_shutdown() {
        let (state, _dir) = create_test_state();
        let shutdown = CancellationToken::new();
        let handle = spawn_cleanup_task(
            state.registry.clone(),
            Duration::from_secs(1),
            Duration::from_millis(10),
            shutdown.clone(),
        );
        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown.cancel();
        handle.await.unwrap();
    }
}
