//! Router assembly: routes plus the ordered middleware stack.

use std::time::Duration;

use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;

use crate::config::Config;
use crate::logger::RequestLogger;
use crate::middleware::{ContextLayer, EnvelopeLayer, LoggingLayer};
use crate::routes::rest_routes;

/// Build the application router with the boundary pipeline applied.
pub fn build_app(config: &Config, metrics: PrometheusHandle) -> Router {
    let mode = config.environment;

    // Executes top-to-bottom on request: context capture first, then
    // logging, then enveloping, so exit records observe the status the
    // normalizer resolved.
    let pipeline = ServiceBuilder::new()
        .layer(ContextLayer::new(mode, config.max_logged_body_bytes))
        .layer(LoggingLayer::new(RequestLogger::new(mode)))
        .layer(EnvelopeLayer::new(mode))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs,
        )));

    rest_routes(metrics).layer(pipeline)
}
