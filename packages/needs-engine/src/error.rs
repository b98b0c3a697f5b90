use thiserror::Error;

use crate::assessment::types::SessionId;

/// Field-level rejection of an interaction sample. Fatal to the single request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("interaction sample must be a JSON object")]
    NotAnObject,
    #[error("missing required field `{field}`")]
    MissingField { field: String },
    #[error("field `{field}` must be numeric")]
    NotNumeric { field: String },
    #[error("field `{field}` must not be negative (got {value})")]
    Negative { field: String, value: f64 },
    #[error("field `{field}` must be an object")]
    NotAnObjectField { field: String },
    #[error("field `{field}` must be a string")]
    NotString { field: String },
    #[error("invalid deviceType `{value}`, expected one of mobile|tablet|desktop")]
    InvalidDeviceType { value: String },
    #[error("sensory preferences sum to zero")]
    ZeroSensorySum,
}

impl ValidationError {
    /// Name of the offending field, when the error is tied to one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::MissingField { field }
            | Self::NotNumeric { field }
            | Self::Negative { field, .. }
            | Self::NotAnObjectField { field }
            | Self::NotString { field } => Some(field),
            Self::InvalidDeviceType { .. } => Some("deviceType"),
            Self::NotAnObject | Self::ZeroSensorySum => None,
        }
    }
}

/// Failure of the inference collaborator. Absorbed by fusion, never surfaced to callers.
#[derive(Debug, Error)]
pub enum ExternalServiceError {
    #[error("inference provider not configured: {0}")]
    NotConfigured(&'static str),
    #[error("inference call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("JSON decode failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed inference response: {0}")]
    Malformed(String),
}

/// Lookup miss in adjustment tables. Recovered by applying neutral weights.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("unknown cultural background `{0}`")]
    UnknownCulture(String),
    #[error("unknown socioeconomic context `{0}`")]
    UnknownSocioeconomicContext(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("unknown session {0}")]
    UnknownSession(SessionId),
    #[error("stale answer event for session {session_id}: expected sequence {expected}, got {received}")]
    StaleSequence {
        session_id: SessionId,
        expected: u64,
        received: u64,
    },
    #[error("out-of-order answer event for session {session_id}: expected sequence {expected}, got {received}")]
    OutOfOrder {
        session_id: SessionId,
        expected: u64,
        received: u64,
    },
    #[error("question count must be at least 1")]
    EmptySession,
}
