//! Error types for the remote API client

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("unexpected response ({status}): {message}")]
    Unexpected { status: u16, message: String },

    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("stream error: {0}")]
    Stream(String),
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

/// Prefer a JSON `message` (or `error`) field, fall back to the raw body.
fn extract_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body)
        && let Some(message) = parsed.message.or(parsed.error)
        && !message.trim().is_empty()
    {
        return message;
    }
    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("no response body")
            .to_string()
    } else {
        body.to_string()
    }
}

impl ApiError {
    /// Map a non-success HTTP status and body to an error.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = extract_message(status, body);
        match status.as_u16() {
            400 | 422 => ApiError::BadRequest(message),
            401 => ApiError::Unauthorized(message),
            403 => ApiError::Forbidden(message),
            404 => ApiError::NotFound(message),
            409 => ApiError::Conflict(message),
            429 => ApiError::RateLimited(message),
            code @ 500..=599 => ApiError::Server {
                status: code,
                message,
            },
            code => ApiError::Unexpected {
                status: code,
                message,
            },
        }
    }

    /// Classify a transport error. The flag is true when it is worth retrying.
    pub(crate) fn from_transport(err: reqwest::Error) -> (Self, bool) {
        if err.is_timeout() {
            (ApiError::Timeout, true)
        } else if err.is_connect() {
            (ApiError::Network(err.to_string()), true)
        } else if err.is_decode() {
            (ApiError::Decode(err.to_string()), false)
        } else {
            (ApiError::Network(err.to_string()), false)
        }
    }

    /// Whether a status-derived error may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::RateLimited(_) | ApiError::Server { .. } | ApiError::Timeout
        )
    }

    pub fn is_auth_error(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_) | ApiError::Forbidden(_))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_variants() {
        let cases = [
            (400, "BadRequest"),
            (422, "BadRequest"),
            (401, "Unauthorized"),
            (403, "Forbidden"),
            (404, "NotFound"),
            (409, "Conflict"),
            (429, "RateLimited"),
            (503, "Server"),
            (418, "Unexpected"),
        ];
        for (code, expected) in cases {
            let err = ApiError::from_status(StatusCode::from_u16(code).unwrap(), "");
            let name = format!("{err:?}");
            assert!(name.starts_with(expected), "{code} mapped to {name}");
        }
    }

    #[test]
    fn message_comes_from_json_body() {
        let err = ApiError::from_status(
            StatusCode::NOT_FOUND,
            r#"{"code":404,"message":"sandbox sbx_1 not found"}"#,
        );
        assert_eq!(err.to_string(), "not found: sandbox sbx_1 not found");

        let err = ApiError::from_status(StatusCode::BAD_REQUEST, r#"{"error":"bad template"}"#);
        assert_eq!(err.to_string(), "bad request: bad template");

        let err = ApiError::from_status(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(err.to_string(), "server error (502): upstream down");
    }

    #[test]
    fn only_transient_errors_retry() {
        assert!(ApiError::RateLimited(String::new()).is_retryable());
        assert!(ApiError::Timeout.is_retryable());
        assert!(!ApiError::NotFound(String::new()).is_retryable());
        assert!(!ApiError::Unauthorized(String::new()).is_retryable());
    }
}
