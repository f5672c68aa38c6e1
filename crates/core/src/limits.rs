//! Limit normalization.
//!
//! The console form is loose: every field is optional and numbers may arrive
//! as JSON numbers or as strings. The gateway wants every limit present and
//! numeric. [`normalize_limits`] bridges the two, filling gaps from either
//! [`CREATE_DEFAULTS`] or [`UPDATE_DEFAULTS`].
//!
//! Values that are present but not usable numbers are rejected here rather
//! than forwarded upstream.

use serde::{Deserialize, Serialize};

use crate::consumer::ConsumerMetadata;
use crate::error::{Error, Result};

/// Model assumed when the form leaves it blank.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// The form shows money limits scaled up by this factor.
pub const MONEY_LIMIT_SCALE: f64 = 1000.0;

/// Defaults applied to absent form fields.
///
/// `None` for tokens/requests means the field is required.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimitDefaults {
    pub tokens: Option<u64>,
    pub requests: Option<u64>,
    pub time_window_minutes: u64,
    pub budget: f64,
    pub model: &'static str,
}

/// Defaults for a newly created consumer.
pub const CREATE_DEFAULTS: LimitDefaults = LimitDefaults {
    tokens: Some(100),
    requests: Some(10),
    time_window_minutes: 1,
    budget: 0.1,
    model: DEFAULT_MODEL,
};

/// Defaults for an update. The 2 minute window differs from create on purpose.
pub const UPDATE_DEFAULTS: LimitDefaults = LimitDefaults {
    tokens: None,
    requests: None,
    time_window_minutes: 2,
    budget: 0.1,
    model: DEFAULT_MODEL,
};

/// A numeric form value: either a JSON number or numeric text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericInput {
    Number(f64),
    Text(String),
}

impl NumericInput {
    /// Parse to a finite, non-negative number. Blank text counts as absent.
    fn to_number(&self, field: &'static str) -> Result<Option<f64>> {
        let value = match self {
            Self::Number(n) => *n,
            Self::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Ok(None);
                }
                trimmed
                    .parse::<f64>()
                    .map_err(|_| Error::invalid_limit(field, s.clone()))?
            }
        };

        if !value.is_finite() || value < 0.0 {
            return Err(Error::invalid_limit(field, self.to_string()));
        }
        Ok(Some(value))
    }

    fn to_whole(&self, field: &'static str) -> Result<Option<u64>> {
        match self.to_number(field)? {
            None => Ok(None),
            Some(v) if v.fract() == 0.0 && v <= u64::MAX as f64 => Ok(Some(v as u64)),
            Some(_) => Err(Error::invalid_limit(field, self.to_string())),
        }
    }
}

impl std::fmt::Display for NumericInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for NumericInput {
    fn from(v: u64) -> Self {
        Self::Number(v as f64)
    }
}

impl From<f64> for NumericInput {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<&str> for NumericInput {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// Limit fields as the operator entered them.
///
/// Accepts both the form names (`requestLimit`, `timeWindow`) and the
/// gateway names (`requests`, `timeWindowMinutes`). `moneyLimit` is in form
/// units; `budget` is already in gateway units.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitForm {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<NumericInput>,
    #[serde(
        default,
        rename = "requests",
        alias = "requestLimit",
        skip_serializing_if = "Option::is_none"
    )]
    pub request_limit: Option<NumericInput>,
    #[serde(
        default,
        rename = "timeWindowMinutes",
        alias = "timeWindow",
        skip_serializing_if = "Option::is_none"
    )]
    pub time_window: Option<NumericInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub money_limit: Option<NumericInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<NumericInput>,
    /// Travels as `metadata.model`, not inside `limits`.
    #[serde(skip)]
    pub model: Option<String>,
}

impl LimitForm {
    /// Fill every absent field from a consumer's current metadata, so an
    /// update resends the previous value instead of dropping it.
    pub fn or_previous(mut self, previous: Option<&ConsumerMetadata>) -> Self {
        let Some(previous) = previous else {
            return self;
        };

        if let Some(limits) = previous.limits.as_ref() {
            if is_absent(&self.tokens) {
                self.tokens = limits.tokens.map(NumericInput::from);
            }
            if is_absent(&self.request_limit) {
                self.request_limit = limits.requests.map(NumericInput::from);
            }
            if is_absent(&self.time_window) {
                self.time_window = limits.time_window_minutes.map(NumericInput::from);
            }
            if is_absent(&self.money_limit) && is_absent(&self.budget) {
                self.budget = limits.budget.map(NumericInput::from);
            }
        }
        if self.model.as_deref().map_or(true, |m| m.trim().is_empty()) {
            self.model = previous.model.clone();
        }
        self
    }
}

fn is_absent(value: &Option<NumericInput>) -> bool {
    match value {
        None => true,
        Some(NumericInput::Text(s)) => s.trim().is_empty(),
        Some(NumericInput::Number(_)) => false,
    }
}

/// Limits exactly as the gateway expects them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamLimits {
    pub tokens: u64,
    pub requests: u64,
    pub time_window_minutes: u64,
    pub budget: f64,
}

/// The `metadata` object sent to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamMetadata {
    pub limits: UpstreamLimits,
    pub model: String,
}

/// Convert a form into gateway metadata.
pub fn normalize_limits(form: &LimitForm, defaults: &LimitDefaults) -> Result<UpstreamMetadata> {
    let tokens = whole_or(form.tokens.as_ref(), "tokens", defaults.tokens)?;
    let requests = whole_or(form.request_limit.as_ref(), "requests", defaults.requests)?;
    let time_window_minutes = whole_or(
        form.time_window.as_ref(),
        "timeWindowMinutes",
        Some(defaults.time_window_minutes),
    )?;

    let money = match form.money_limit.as_ref() {
        Some(m) => m.to_number("moneyLimit")?,
        None => None,
    };
    let budget = match money {
        Some(m) => m / MONEY_LIMIT_SCALE,
        None => match form.budget.as_ref() {
            Some(b) => b.to_number("budget")?.unwrap_or(defaults.budget),
            None => defaults.budget,
        },
    };

    let model = form
        .model
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(defaults.model)
        .to_string();

    Ok(UpstreamMetadata {
        limits: UpstreamLimits {
            tokens,
            requests,
            time_window_minutes,
            budget,
        },
        model,
    })
}

fn whole_or(
    input: Option<&NumericInput>,
    field: &'static str,
    default: Option<u64>,
) -> Result<u64> {
    let parsed = match input {
        Some(v) => v.to_whole(field)?,
        None => None,
    };
    parsed.or(default).ok_or(Error::MissingField(field))
}
