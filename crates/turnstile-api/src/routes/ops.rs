//! Liveness, readiness and Prometheus endpoints

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use crate::state::{AppState, MetricsHandle};

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// GET /health
///
/// Answers as long as the process is serving requests.
async fn health() -> Json<HealthResponse> {
    metrics::counter!("turnstile_health_checks_total", "probe" => "live").increment(1);
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /healthz
///
/// Also requires the identity store to answer, since no credential can be
/// checked without it.
async fn ready(State(state): State<AppState>) -> Response {
    metrics::counter!("turnstile_health_checks_total", "probe" => "ready").increment(1);

    match state.identities().database().ping().await {
        Ok(()) => Json(HealthResponse {
            status: "healthy",
            version: env!("CARGO_PKG_VERSION"),
        })
        .into_response(),
        Err(e) => {
            warn!("Readiness check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unavailable",
                    version: env!("CARGO_PKG_VERSION"),
                }),
            )
                .into_response()
        }
    }
}

async fn render_metrics(State(handle): State<Arc<MetricsHandle>>) -> String {
    handle.render()
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/healthz", get(ready))
}

/// `/metrics`, carrying its own state so it can be mounted only when a
/// recorder is installed
pub fn metrics_routes(handle: Arc<MetricsHandle>) -> Router {
    Router::new()
        .route("/metrics", get(render_metrics))
        .with_state(handle)
}
