//! The reqwest upstream clients against stub HTTP servers.

use axum::http::Method;
use chrono::Utc;
use console_core::{
    resolve_time_range, ConsumerPatch, CreateConsumerRequest, Error, MeterQuery, UpdateConsumerRequest,
    WindowSize,
};
use gateway_client::{ConsumerGateway, GatewayClient, GatewayConfig};
use integration_tests::{fixtures, stub::StubUpstream};
use metering_client::{MeteringClient, MeteringConfig, UsageMeter};
use serde_json::json;

fn gateway(stub: &StubUpstream) -> GatewayClient {
    GatewayClient::new(GatewayConfig {
        base_url: format!("{}/v1", stub.base_url()),
        api_key: Some("zpka_test".into()),
        account: "acct".into(),
        bucket: "bkt".into(),
        ..Default::default()
    })
    .unwrap()
}

fn metering(stub: &StubUpstream) -> MeteringClient {
    MeteringClient::new(MeteringConfig {
        base_url: stub.base_url(),
        api_key: Some("om_test".into()),
        ..Default::default()
    })
    .unwrap()
}

fn patch(name: &str) -> ConsumerPatch {
    serde_json::from_value::<UpdateConsumerRequest>(json!({
        "metadata": { "limits": { "tokens": 10, "requests": 2 } }
    }))
    .unwrap()
    .into_upstream(name)
    .unwrap()
}

#[tokio::test]
async fn test_list_uses_fixed_page_and_bearer_auth() {
    let stub = StubUpstream::start().await;
    stub.respond_json(
        200,
        json!({ "data": [fixtures::consumer_json("alpha")], "offset": 0, "limit": 1000 }),
    );

    let list = gateway(&stub).list_consumers().await.unwrap();
    assert_eq!(list.data.len(), 1);
    assert_eq!(list.data[0].name, "alpha");

    let request = stub.last_request();
    assert_eq!(request.method, Method::GET);
    assert_eq!(request.path, "/v1/accounts/acct/key-buckets/bkt/consumers");
    assert_eq!(request.query_value("limit"), Some("1000"));
    assert_eq!(request.query_value("offset"), Some("0"));
    assert_eq!(request.authorization.as_deref(), Some("Bearer zpka_test"));
}

#[tokio::test]
async fn test_list_unexpected_envelope_is_empty() {
    let stub = StubUpstream::start().await;
    let client = gateway(&stub);

    stub.respond_json(200, json!({ "items": [] }));
    assert!(client.list_consumers().await.unwrap().data.is_empty());

    stub.respond(200, "<html>maintenance</html>");
    assert!(client.list_consumers().await.unwrap().data.is_empty());
}

#[tokio::test]
async fn test_list_skips_unreadable_record_and_keeps_the_rest() {
    let stub = StubUpstream::start().await;
    let mut legacy = fixtures::consumer_json("legacy");
    legacy["metadata"]["limits"]["tokens"] = json!("100");
    legacy["metadata"]["limits"]["requests"] = json!(10.0);
    let mut broken = fixtures::consumer_json("broken");
    broken["name"] = json!(["not", "a", "name"]);
    stub.respond_json(
        200,
        json!({
            "data": [fixtures::consumer_json("alpha"), legacy, broken],
            "offset": null,
            "limit": 1000
        }),
    );

    let list = gateway(&stub).list_consumers().await.unwrap();
    let names: Vec<&str> = list.data.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "legacy"]);
    let limits = list.data[1].limits().unwrap();
    assert_eq!(limits.tokens, Some(100));
    assert_eq!(limits.requests, Some(10));
    assert_eq!(list.offset, 0);
}

#[tokio::test]
async fn test_update_with_unreadable_echo_returns_sent_state() {
    let stub = StubUpstream::start().await;
    stub.respond(200, "OK");

    let updated = gateway(&stub).update_consumer(&patch("my-app")).await.unwrap();
    assert_eq!(updated.name, "my-app");
    let limits = updated.limits().unwrap();
    assert_eq!(limits.tokens, Some(10));
    assert_eq!(limits.requests, Some(2));
    assert_eq!(limits.time_window_minutes, Some(2));
}

#[tokio::test]
async fn test_create_requests_non_expiring_key() {
    let stub = StubUpstream::start().await;
    let mut created = fixtures::consumer_json("new-app");
    created["apiKeys"] = json!([{ "id": "key_1", "key": "zpka_issued_once" }]);
    stub.respond_json(200, created);

    let body = CreateConsumerRequest {
        name: "New App".into(),
        ..Default::default()
    }
    .into_upstream()
    .unwrap();
    let result = gateway(&stub).create_consumer(&body).await.unwrap();

    assert_eq!(result.consumer.name, "new-app");
    assert_eq!(result.api_key.as_deref(), Some("zpka_issued_once"));

    let request = stub.last_request();
    assert_eq!(request.method, Method::POST);
    assert_eq!(request.query_value("with-api-key"), Some("true"));
    assert_eq!(request.query_value("no-key-expiration"), Some("true"));

    let sent = request.json();
    assert_eq!(sent["name"], "new-app");
    assert_eq!(sent["managers"], json!([]));
    assert_eq!(sent["metadata"]["limits"]["timeWindowMinutes"], 1);
    assert_eq!(sent["metadata"]["model"], "gpt-4o");
}

#[tokio::test]
async fn test_create_without_keys_issues_nothing() {
    let stub = StubUpstream::start().await;
    stub.respond_json(200, fixtures::consumer_json("new-app"));

    let body = CreateConsumerRequest {
        name: "new-app".into(),
        ..Default::default()
    }
    .into_upstream()
    .unwrap();
    let result = gateway(&stub).create_consumer(&body).await.unwrap();
    assert!(result.api_key.is_none());
}

#[tokio::test]
async fn test_update_patches_by_name() {
    let stub = StubUpstream::start().await;
    stub.respond_json(200, fixtures::consumer_json("my-app"));

    gateway(&stub).update_consumer(&patch("my-app")).await.unwrap();

    let request = stub.last_request();
    assert_eq!(request.method, Method::PATCH);
    assert_eq!(request.path, "/v1/accounts/acct/key-buckets/bkt/consumers/my-app");
    let sent = request.json();
    assert_eq!(sent["name"], "my-app");
    assert_eq!(sent["metadata"]["limits"]["tokens"], 10);
    assert_eq!(sent["metadata"]["limits"]["timeWindowMinutes"], 2);
}

#[tokio::test]
async fn test_rejection_carries_status_and_raw_body() {
    let stub = StubUpstream::start().await;
    stub.respond(422, r#"{"type":"validation","detail":"bad name"}"#);

    let err = gateway(&stub)
        .update_consumer(&patch("my-app"))
        .await
        .unwrap_err();

    assert_eq!(err.http_status(), 422);
    assert_eq!(err.details(), Some(r#"{"type":"validation","detail":"bad name"}"#));
    assert_eq!(err.to_string(), "Failed to update consumer: 422 Unprocessable Entity");
}

#[tokio::test]
async fn test_delete_sends_no_body() {
    let stub = StubUpstream::start().await;
    stub.respond(204, "");

    gateway(&stub).delete_consumer("my-app").await.unwrap();

    let request = stub.last_request();
    assert_eq!(request.method, Method::DELETE);
    assert!(request.path.ends_with("/consumers/my-app"));
    assert!(request.body.is_empty());
}

#[tokio::test]
async fn test_unreachable_gateway_is_transport_error() {
    let client = GatewayClient::new(GatewayConfig {
        base_url: "http://127.0.0.1:1".into(),
        api_key: Some("zpka_test".into()),
        timeout_secs: 2,
        ..Default::default()
    })
    .unwrap();

    let err = client.list_consumers().await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)), "got {err:?}");
    assert_eq!(err.http_status(), 502);
}

#[tokio::test]
async fn test_meter_query_parameters() {
    let stub = StubUpstream::start().await;
    stub.respond_json(
        200,
        json!({
            "from": "2025-06-04T00:00:00Z",
            "to": "2025-07-04T00:00:00Z",
            "windowSize": "DAY",
            "data": [
                { "value": 42.0, "windowStart": "2025-07-03T00:00:00Z", "windowEnd": "2025-07-04T00:00:00Z",
                  "subject": "my-app", "groupBy": { "model": "gpt-4o" } }
            ]
        }),
    );

    let query = MeterQuery {
        meter: "tokens_total".into(),
        range: resolve_time_range("30d", "30d", Utc::now()),
        window_size: WindowSize::Day,
        subjects: vec!["my-app".into()],
        group_by: vec!["model".into()],
        window_time_zone: Some("UTC".into()),
    };
    let series = metering(&stub).query_meter(&query).await.unwrap();
    assert_eq!(series.total(), 42.0);
    assert_eq!(series.totals_by_model()[0].model, "gpt-4o");

    let request = stub.last_request();
    assert_eq!(request.method, Method::GET);
    assert_eq!(request.path, "/api/v1/meters/tokens_total/query");
    assert_eq!(request.query_value("windowSize"), Some("DAY"));
    assert_eq!(request.query_values("subject"), vec!["my-app"]);
    assert_eq!(request.query_values("groupBy"), vec!["model"]);
    assert_eq!(request.query_value("windowTimeZone"), Some("UTC"));
    assert_eq!(request.query_value("from"), Some(query.range.from_iso().as_str()));
    assert_eq!(request.authorization.as_deref(), Some("Bearer om_test"));
}

#[tokio::test]
async fn test_meter_garbage_body_is_empty_series() {
    let stub = StubUpstream::start().await;
    stub.respond(200, "not json");

    let query = MeterQuery {
        meter: "http_request".into(),
        range: resolve_time_range("24h", "24h", Utc::now()),
        window_size: WindowSize::Hour,
        subjects: vec!["my-app".into()],
        group_by: vec![],
        window_time_zone: None,
    };
    let series = metering(&stub).query_meter(&query).await.unwrap();
    assert!(series.data.is_empty());
}
