//! HTTP surface: the Prometheus scrape endpoint and a liveness probe.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;

use azdo_metrics::Registry;
use azdo_metrics::prometheus::CONTENT_TYPE;

/// Shared state for the handlers.
#[derive(Clone)]
pub struct ServerState {
    pub registry: Arc<Registry>,
}

/// Build the exporter router.
pub fn build_router(registry: Arc<Registry>) -> Router {
    Router::new()
        .route("/metrics", get(prometheus_metrics))
        .route("/healthz", get(healthz))
        .with_state(ServerState { registry })
}

/// GET /metrics
///
/// Renders every registered family. Each family is read under its own lock,
/// so a scrape never observes a half-applied commit.
pub async fn prometheus_metrics(State(state): State<ServerState>) -> impl IntoResponse {
    let body = state.registry.render();
    (StatusCode::OK, [("content-type", CONTENT_TYPE)], body)
}

/// GET /healthz
pub async fn healthz() -> &'static str {
    "ok"
}
