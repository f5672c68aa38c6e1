//! Usage query model.
//!
//! Symbolic time ranges (`"24h"`, `"30d"`) resolve to absolute timestamps
//! relative to "now"; window sizes are coerced into the metering API's
//! fixed enumeration.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Metric queried when the caller does not name one.
pub const DEFAULT_METRIC: &str = "http_request";

/// Meter backing the per-model distribution.
pub const MODEL_USAGE_METER: &str = "tokens_total";

/// Dimension the per-model distribution is grouped by.
pub const MODEL_GROUP_BY: &str = "model";

/// Fallback window for general usage queries.
pub const DEFAULT_USAGE_RANGE: &str = "24h";

/// Fallback window for model usage queries.
pub const DEFAULT_MODEL_USAGE_RANGE: &str = "30d";

/// Metering aggregation granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WindowSize {
    Minute,
    Hour,
    Day,
    Month,
}

impl WindowSize {
    /// Case-insensitive parse; anything unrecognized becomes `Hour`.
    pub fn coerce(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "MINUTE" => Self::Minute,
            "HOUR" => Self::Hour,
            "DAY" => Self::Day,
            "MONTH" => Self::Month,
            _ => Self::Hour,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minute => "MINUTE",
            Self::Hour => "HOUR",
            Self::Day => "DAY",
            Self::Month => "MONTH",
        }
    }
}

/// Absolute query window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl ResolvedRange {
    pub fn from_iso(&self) -> String {
        iso(self.from)
    }

    pub fn to_iso(&self) -> String {
        iso(self.to)
    }
}

fn iso(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse `<digits>h` or `<digits>d` into a span.
pub fn parse_time_range(token: &str) -> Option<Duration> {
    let token = token.trim();
    let (digits, hours_per_unit) = if let Some(d) = token.strip_suffix('h') {
        (d, 1)
    } else if let Some(d) = token.strip_suffix('d') {
        (d, 24)
    } else {
        return None;
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let count: i64 = digits.parse().ok()?;
    Duration::try_hours(count.checked_mul(hours_per_unit)?)
}

/// Resolve a symbolic range ending at `now`, falling back to `fallback`
/// when `token` is not understood.
pub fn resolve_time_range(token: &str, fallback: &str, now: DateTime<Utc>) -> ResolvedRange {
    let span = parse_time_range(token)
        .or_else(|| parse_time_range(fallback))
        .unwrap_or_else(|| Duration::hours(24));
    let from = now.checked_sub_signed(span).unwrap_or(DateTime::<Utc>::MIN_UTC);

    ResolvedRange { from, to: now }
}

/// A meter query as the metering API accepts it.
#[derive(Debug, Clone, PartialEq)]
pub struct MeterQuery {
    pub meter: String,
    pub range: ResolvedRange,
    pub window_size: WindowSize,
    pub subjects: Vec<String>,
    pub group_by: Vec<String>,
    pub window_time_zone: Option<String>,
}

/// One aggregated window returned by the metering API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub window_start: String,
    #[serde(default)]
    pub window_end: String,
    #[serde(default)]
    pub group_by: Map<String, Value>,
}

/// Per-model token total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelUsage {
    pub model: String,
    pub total: f64,
}

/// Metering API query result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSeries {
    #[serde(default)]
    pub data: Vec<UsageRow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_size: Option<String>,
}

impl UsageSeries {
    /// Sum of every row's value.
    pub fn total(&self) -> f64 {
        self.data.iter().map(|r| r.value).sum()
    }

    /// Sum values per `groupBy.model`. Rows without a model count as `"unknown"`.
    pub fn totals_by_model(&self) -> Vec<ModelUsage> {
        let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
        for row in &self.data {
            let model = row
                .group_by
                .get(MODEL_GROUP_BY)
                .and_then(Value::as_str)
                .filter(|m| !m.is_empty())
                .unwrap_or("unknown");
            *totals.entry(model).or_default() += row.value;
        }

        totals
            .into_iter()
            .map(|(model, total)| ModelUsage {
                model: model.to_string(),
                total,
            })
            .collect()
    }
}

/// Query string of `GET /api/usage`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_size: Option<String>,
}

/// Query string of `GET /api/model-usage`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelUsageParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<String>,
}

/// Response of both usage routes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageResponse {
    pub subject: String,
    pub metric: String,
    pub window_size: WindowSize,
    pub time_range: String,
    pub start_time: String,
    pub end_time: String,
    pub data: UsageSeries,
}
