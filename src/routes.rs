//! REST routes and health check handlers.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use http::StatusCode;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;

use crate::error::ApiError;

/// Build version.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Build REST routes with the given metrics handle.
pub fn rest_routes(metrics: PrometheusHandle) -> Router {
    Router::new()
        .route("/", get(|| async { "api-boundary" }))
        .route("/health", get(health_handler))
        .route("/health/live", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .fallback(not_found_handler)
        .with_state(metrics)
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: VERSION,
    })
}

async fn metrics_handler(State(metrics): State<PrometheusHandle>) -> String {
    metrics.render()
}

async fn not_found_handler() -> ApiError {
    ApiError::http(StatusCode::NOT_FOUND, "Resource not found")
}
