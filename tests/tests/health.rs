//! Tests for health and metrics endpoints.
//!
//! Health state is process-global. Only the readiness test writes it; the
//! rest assert shape and ranges rather than exact values.

use axum::http::StatusCode;
use integration_tests::{fixtures, setup::TestContext};
use serde_json::Value;
use telemetry::health;

#[tokio::test]
async fn test_health_endpoint_structure() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server.get("/health").await;
    response.assert_status_ok();

    let body: Value = response.json();
    for field in ["status", "gateway_connected", "metering_connected", "upstream_errors"] {
        assert!(body.get(field).is_some(), "Response should have '{field}' field");
    }

    let status = body["status"].as_str().unwrap_or("");
    assert!(
        matches!(status, "healthy" | "degraded" | "unhealthy"),
        "unexpected status '{status}'"
    );

    let components: Vec<&str> = body["components"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(components, vec!["gateway", "metering"]);
}

#[tokio::test]
async fn test_ready_follows_gateway_health() {
    let ctx = TestContext::new();
    let server = ctx.server();
    let gateway = &health().gateway;

    gateway.set_configured(true);
    gateway.set_healthy();
    server.get("/health/ready").await.assert_status_ok();

    gateway.set_unhealthy("gateway returned 503 Service Unavailable");
    server
        .get("/health/ready")
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);

    gateway.set_healthy();
    gateway.set_configured(false);
    server
        .get("/health/ready")
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_live_endpoint() {
    let ctx = TestContext::new();
    let server = ctx.server();

    server.get("/health/live").await.assert_status_ok();
}

#[tokio::test]
async fn test_metrics_count_proxy_operations() {
    let ctx = TestContext::new();
    ctx.gateway.seed(vec![fixtures::consumer("my-app")]);
    let server = ctx.server();

    let before: Value = server.get("/metrics").await.json();
    server.get("/api/consumers").await.assert_status_ok();
    server
        .get("/api/usage?subject=my-app")
        .await
        .assert_status_ok();
    let after: Value = server.get("/metrics").await.json();

    let grew = |field: &str| after[field].as_u64().unwrap() > before[field].as_u64().unwrap();
    assert!(grew("consumers_listed"));
    assert!(grew("usage_queries"));
    assert!(after.get("upstream_latency_mean_ms").is_some());
}
