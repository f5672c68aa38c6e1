//! Usage query endpoints.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use console_core::{
    resolve_time_range, Error, MeterQuery, ModelUsageParams, UsageParams, UsageResponse,
    WindowSize, DEFAULT_METRIC, DEFAULT_MODEL_USAGE_RANGE, DEFAULT_USAGE_RANGE, MODEL_GROUP_BY,
    MODEL_USAGE_METER,
};
use telemetry::metrics;
use tracing::debug;

use crate::response::ApiError;
use crate::state::AppState;

/// `subject` is mandatory and checked before anything is forwarded.
fn require_subject(subject: Option<String>) -> Result<String, Error> {
    subject
        .filter(|s| !s.trim().is_empty())
        .ok_or(Error::MissingParameter("Subject"))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// GET /api/usage?subject&metric&timeRange&windowSize
pub async fn usage_handler(
    State(state): State<AppState>,
    Query(params): Query<UsageParams>,
) -> Result<Json<UsageResponse>, ApiError> {
    let subject = require_subject(params.subject)?;
    let metric = non_blank(params.metric).unwrap_or_else(|| DEFAULT_METRIC.to_string());
    let time_range =
        non_blank(params.time_range).unwrap_or_else(|| DEFAULT_USAGE_RANGE.to_string());
    let window_size = params
        .window_size
        .as_deref()
        .map(WindowSize::coerce)
        .unwrap_or(WindowSize::Hour);

    let range = resolve_time_range(&time_range, DEFAULT_USAGE_RANGE, Utc::now());
    let query = MeterQuery {
        meter: metric.clone(),
        range,
        window_size,
        subjects: vec![subject.clone()],
        group_by: Vec::new(),
        window_time_zone: state.metering.window_time_zone(),
    };

    debug!(subject = %subject, metric = %metric, window_size = window_size.as_str(), "Usage query");
    let data = state.metering.query_meter(&query).await?;
    metrics().usage_queries.inc();

    Ok(Json(UsageResponse {
        subject,
        metric,
        window_size,
        time_range,
        start_time: range.from_iso(),
        end_time: range.to_iso(),
        data,
    }))
}

/// GET /api/model-usage?subject&timeRange
///
/// Daily token totals grouped by model.
pub async fn model_usage_handler(
    State(state): State<AppState>,
    Query(params): Query<ModelUsageParams>,
) -> Result<Json<UsageResponse>, ApiError> {
    let subject = require_subject(params.subject)?;
    let time_range =
        non_blank(params.time_range).unwrap_or_else(|| DEFAULT_MODEL_USAGE_RANGE.to_string());

    let range = resolve_time_range(&time_range, DEFAULT_MODEL_USAGE_RANGE, Utc::now());
    let query = MeterQuery {
        meter: MODEL_USAGE_METER.to_string(),
        range,
        window_size: WindowSize::Day,
        subjects: vec![subject.clone()],
        group_by: vec![MODEL_GROUP_BY.to_string()],
        window_time_zone: state.metering.window_time_zone(),
    };

    debug!(subject = %subject, time_range = %time_range, "Model usage query");
    let data = state.metering.query_meter(&query).await?;
    metrics().usage_queries.inc();

    Ok(Json(UsageResponse {
        subject,
        metric: MODEL_USAGE_METER.to_string(),
        window_size: WindowSize::Day,
        time_range,
        start_time: range.from_iso(),
        end_time: range.to_iso(),
        data,
    }))
}
