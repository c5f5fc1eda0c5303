//! API routes

use axum::Router;

use crate::AppState;

mod agents;
mod executions;
mod replay;
mod suite_requests;

/// Build the API router with all endpoints
pub fn api_router() -> Router<AppState> {
    Router::new().nest(
        "/v1",
        Router::new()
            .nest("/suite-requests", suite_requests::router())
            .nest("/executions", executions::router())
            .nest("/agents", agents::router())
            .nest("/replay", replay::router()),
    )
}
