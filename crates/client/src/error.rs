//! Client-side errors.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// Non-2xx from the console API, with its structured error body.
    #[error("{message} ({status})")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
        details: Option<String>,
    },

    #[error("console unreachable: {0}")]
    Transport(String),

    #[error("invalid console response: {0}")]
    Decode(String),

    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Raw upstream body relayed by the console, if any.
    pub fn details(&self) -> Option<&str> {
        match self {
            Self::Api { details, .. } => details.as_deref(),
            _ => None,
        }
    }
}
