use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

use crate::auth::AuthError;

/// Failure of a single access review call.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("failed to obtain access token: {0}")]
    Token(#[from] AuthError),

    #[error("failed to encode access review: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("request to upstream failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("request to upstream timed out after {0:?}")]
    Timeout(Duration),

    #[error("got non-200 status from upstream")]
    Status(StatusCode),

    #[error("failed to decode upstream response: {0}")]
    Decode(#[source] serde_json::Error),
}

impl ReviewError {
    /// The upstream status, when the failure was a non-2xx response.
    pub fn upstream_status(&self) -> Option<StatusCode> {
        match self {
            ReviewError::Status(status) => Some(*status),
            _ => None,
        }
    }
}
