//! Custody API error kinds.

use std::time::Duration;
use thiserror::Error;

/// Result alias for custody operations.
pub type CustodyResult<T> = std::result::Result<T, CustodyError>;

/// Errors produced by [`CustodyClient`](crate::CustodyClient).
#[derive(Debug, Clone, Error)]
pub enum CustodyError {
    /// Connection failure or request timeout.
    #[error("custody http error: {0}")]
    Http(String),

    /// Non-success HTTP status with the API's error message.
    #[error("custody api error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Activity reached a terminal state other than completed.
    #[error("custody activity {activity_id} ended with status {status}")]
    ActivityFailed { activity_id: String, status: String },

    /// Activity was still pending after the polling budget.
    #[error("custody activity {activity_id} still pending after {waited:?}")]
    ActivityTimeout { activity_id: String, waited: Duration },

    /// API key material could not be loaded or used.
    #[error("invalid custody api key: {0}")]
    Stamp(String),

    /// Response did not contain the expected fields.
    #[error("unexpected custody response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for CustodyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for CustodyError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}
