//! Health check and metrics endpoints.

use axum::{http::StatusCode, Json};
use telemetry::{health, metrics, MetricsSnapshot};

use crate::response::HealthResponse;

/// GET /health - Full health check.
pub async fn health_handler() -> Json<HealthResponse> {
    let report = health().report();
    let snapshot = metrics().snapshot();

    Json(HealthResponse {
        status: report.status.as_str().to_string(),
        gateway_connected: health().gateway.is_healthy(),
        metering_connected: health().metering.is_healthy(),
        upstream_errors: snapshot.upstream_rejections + snapshot.transport_failures,
        components: report.components,
    })
}

/// GET /health/ready - Readiness probe (gateway configured and reachable).
pub async fn ready_handler() -> StatusCode {
    if health().is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /health/live - Liveness probe (service is running).
pub async fn live_handler() -> StatusCode {
    if health().is_alive() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /metrics - In-process counters as JSON.
pub async fn metrics_handler() -> Json<MetricsSnapshot> {
    Json(metrics().snapshot())
}
