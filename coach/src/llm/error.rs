//! LLM error types

use std::time::Duration;

use thiserror::Error;
use tracing::debug;

/// Errors that can occur during LLM operations
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl LlmError {
    /// Convert an event-source failure, reading the body of non-2xx responses
    pub(crate) async fn from_event_source(err: reqwest_eventsource::Error, timeout: Option<Duration>) -> Self {
        debug!(%err, "LlmError::from_event_source: called");
        match err {
            reqwest_eventsource::Error::InvalidStatusCode(status, response) => {
                let message = response.text().await.unwrap_or_default();
                LlmError::ApiError {
                    status: status.as_u16(),
                    message,
                }
            }
            reqwest_eventsource::Error::Transport(e) => match timeout {
                Some(limit) if e.is_timeout() => LlmError::Timeout(limit),
                _ => LlmError::Network(e),
            },
            other => LlmError::InvalidResponse(other.to_string()),
        }
    }

    /// HTTP status if the provider rejected the request
    pub fn status(&self) -> Option<u16> {
        match self {
            LlmError::ApiError { status, .. } => Some(*status),
            _ => None,
        }
    }
}
