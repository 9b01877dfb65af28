//! API Error Differentiation
//!
//! Classifies HTTP failures from the Metaculus and LLM provider APIs into
//! transient errors (worth retrying) and fatal errors (not worth retrying).

use thiserror::Error;

/// Structured API error types shared by all remote calls.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Request exceeded its per-call timeout
    #[error("request timed out")]
    Timeout,
    /// Connection-level failure (DNS, refused, reset)
    #[error("connection failed: {0}")]
    Connect(String),
    /// Rate limited by the remote API (HTTP 429)
    #[error("rate limited by remote API")]
    RateLimited,
    /// Server-side failure (HTTP 5xx)
    #[error("server error {status}")]
    ServerError { status: u16 },
    /// Token/key authentication rejected (HTTP 401/403)
    #[error("authentication failed")]
    AuthFailed,
    /// Request rejected by the API (other 4xx)
    #[error("bad request {status}: {body}")]
    BadRequest { status: u16, body: String },
    /// Response body did not have the expected shape
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl ApiError {
    /// Classify an HTTP response status into a structured error
    pub fn from_response(status: u16, body: &str) -> Self {
        match status {
            429 => ApiError::RateLimited,
            401 | 403 => ApiError::AuthFailed,
            s if s >= 500 => ApiError::ServerError { status: s },
            s => ApiError::BadRequest {
                status: s,
                body: truncate(body, 300),
            },
        }
    }

    /// Classify a transport-level reqwest error
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_connect() {
            ApiError::Connect(err.to_string())
        } else if err.is_decode() {
            ApiError::MalformedResponse(err.to_string())
        } else {
            ApiError::Connect(err.to_string())
        }
    }

    /// Whether this error is transient and worth retrying with backoff
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::Timeout
                | ApiError::Connect(_)
                | ApiError::RateLimited
                | ApiError::ServerError { .. }
        )
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &s[..end])
    }
}
