//! Unified error types for the consumer console.
//!
//! Error codes:
//! - CONFIG_001: Upstream credential not configured
//! - VALID_001-003: Request validation errors
//! - UPSTREAM_001: Upstream rejected the request
//! - NET_001-002: Transport and response decoding failures
//! - INTERNAL_001: Anything else

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Validation error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorCode {
    /// VALID_001: Malformed body or missing query parameter
    InvalidRequest,
    /// VALID_002: Required limit field absent
    MissingField,
    /// VALID_003: Limit value is not a usable number
    InvalidLimit,
}

impl ValidationErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "VALID_001",
            Self::MissingField => "VALID_002",
            Self::InvalidLimit => "VALID_003",
        }
    }
}

/// Unified error type for the consumer console.
#[derive(Debug, Error)]
pub enum Error {
    /// An upstream credential is missing. Raised before any network call.
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("{0} parameter is required")]
    MissingParameter(&'static str),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid value for {field}: {value}")]
    InvalidLimit { field: &'static str, value: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Non-2xx from an upstream API. `body` is the raw upstream text.
    #[error("Failed to {action}: {status} {reason}")]
    Upstream {
        action: &'static str,
        status: u16,
        reason: String,
        body: String,
    },

    #[error("upstream unreachable: {0}")]
    Transport(String),

    #[error("invalid upstream response: {0}")]
    Decode(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn invalid_limit(field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidLimit {
            field,
            value: value.into(),
        }
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn upstream(
        action: &'static str,
        status: u16,
        reason: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self::Upstream {
            action,
            status,
            reason: reason.into(),
            body: body.into(),
        }
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get the HTTP status code for this error.
    ///
    /// Upstream rejections mirror the upstream status.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotConfigured(_) => 500,
            Self::MissingParameter(_) => 400,
            Self::MissingField(_) => 400,
            Self::InvalidLimit { .. } => 400,
            Self::InvalidRequest(_) => 400,
            Self::Upstream { status, .. } => *status,
            Self::Transport(_) => 502,
            Self::Decode(_) => 502,
            Self::Serialization(_) => 500,
            Self::Internal(_) => 500,
        }
    }

    /// Get the stable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotConfigured(_) => "CONFIG_001",
            Self::MissingParameter(_) | Self::InvalidRequest(_) => {
                ValidationErrorCode::InvalidRequest.code()
            }
            Self::MissingField(_) => ValidationErrorCode::MissingField.code(),
            Self::InvalidLimit { .. } => ValidationErrorCode::InvalidLimit.code(),
            Self::Upstream { .. } => "UPSTREAM_001",
            Self::Transport(_) => "NET_001",
            Self::Decode(_) => "NET_002",
            Self::Serialization(_) | Self::Internal(_) => "INTERNAL_001",
        }
    }

    /// Raw upstream body for rejections, if any.
    pub fn details(&self) -> Option<&str> {
        match self {
            Self::Upstream { body, .. } => Some(body),
            _ => None,
        }
    }
}
