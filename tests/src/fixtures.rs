//! Test fixtures.

use console_core::{Consumer, ConsumerLimits, ConsumerMetadata, UsageRow, UsageSeries};
use serde_json::{json, Map, Value};
use uuid::Uuid;

/// A stored consumer with full limits.
pub fn consumer(name: &str) -> Consumer {
    Consumer {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        created_on: Some("2025-07-01T00:00:00.000Z".into()),
        description: Some(String::new()),
        metadata: Some(ConsumerMetadata {
            limits: Some(ConsumerLimits {
                tokens: Some(1000),
                requests: Some(100),
                time_window_minutes: Some(1),
                budget: Some(0.1),
            }),
            model: Some("gpt-4o".into()),
            extra: Default::default(),
        }),
        ..Default::default()
    }
}

/// Upstream consumer JSON as the gateway returns it.
pub fn consumer_json(name: &str) -> Value {
    json!({
        "id": Uuid::new_v4().to_string(),
        "name": name,
        "createdOn": "2025-07-01T00:00:00.000Z",
        "updatedOn": "2025-07-01T00:00:00.000Z",
        "description": "",
        "metadata": {
            "limits": { "tokens": 1000, "requests": 100, "timeWindowMinutes": 1, "budget": 0.1 },
            "model": "gpt-4o"
        }
    })
}

/// Create body as the console form sends it.
pub fn create_body(name: &str, tokens: Value, request_limit: Value, money_limit: Value) -> Value {
    json!({
        "name": name,
        "description": "integration test",
        "metadata": {
            "limits": {
                "tokens": tokens,
                "requestLimit": request_limit,
                "moneyLimit": money_limit
            },
            "model": "gpt-4o-mini"
        }
    })
}

fn row(value: f64, start: &str, model: Option<&str>) -> UsageRow {
    let mut group_by = Map::new();
    if let Some(model) = model {
        group_by.insert("model".into(), Value::String(model.into()));
    }
    UsageRow {
        subject: Some("my-app".into()),
        value,
        window_start: start.into(),
        window_end: start.into(),
        group_by,
    }
}

/// Hourly request counts.
pub fn request_series() -> UsageSeries {
    UsageSeries {
        data: vec![
            row(12.0, "2025-07-04T05:00:00Z", None),
            row(30.0, "2025-07-04T06:00:00Z", None),
        ],
        window_size: Some("HOUR".into()),
        ..Default::default()
    }
}

/// Daily token totals across two models.
pub fn model_series() -> UsageSeries {
    UsageSeries {
        data: vec![
            row(1500.0, "2025-07-03T00:00:00Z", Some("gpt-4o")),
            row(500.0, "2025-07-04T00:00:00Z", Some("gpt-4o")),
            row(250.0, "2025-07-04T00:00:00Z", Some("gpt-4o-mini")),
        ],
        window_size: Some("DAY".into()),
        ..Default::default()
    }
}
