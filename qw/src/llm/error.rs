//! Oracle call errors

use std::time::Duration;
use thiserror::Error;

/// Wait reported for a 429 that carries no usable `retry-after` header
const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);

/// Statuses a local model server answers with while loading or overloaded
const TRANSIENT_STATUSES: [u16; 5] = [408, 500, 502, 503, 504];

/// Failure of a single oracle call
#[derive(Debug, Error)]
pub enum LlmError {
    /// 429 from the backend; handed to the caller without another attempt
    #[error("Backend is rate limiting requests, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("Backend returned {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Could not reach backend: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unusable backend response: {0}")]
    InvalidResponse(String),

    #[error("Backend did not answer within {0:?}")]
    Timeout(Duration),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LlmError {
    /// Classify a non-success HTTP status
    pub fn from_status(status: u16, message: String, retry_after: Option<Duration>) -> Self {
        if status == 429 {
            LlmError::RateLimited {
                retry_after: retry_after.unwrap_or(DEFAULT_RATE_LIMIT_WAIT),
            }
        } else {
            LlmError::ApiError { status, message }
        }
    }

    /// Whether repeating the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::ApiError { status, .. } => TRANSIENT_STATUSES.contains(status),
            LlmError::Network(_) | LlmError::Timeout(_) => true,
            LlmError::RateLimited { .. } | LlmError::InvalidResponse(_) | LlmError::Json(_) => false,
        }
    }
}
