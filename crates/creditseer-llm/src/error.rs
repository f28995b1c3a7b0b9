//! Provider errors

use creditseer_domain::ServiceError;
use thiserror::Error;

/// Errors that can occur during inference calls
#[derive(Error, Debug)]
pub enum LlmError {
    /// Network or API communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// The request did not complete in time
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Invalid response from the provider
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Model not available
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// Provider is misconfigured (e.g. missing API key)
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<LlmError> for ServiceError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Communication(msg) => ServiceError::Unavailable(msg),
            LlmError::Timeout(secs) => ServiceError::Timeout(secs),
            LlmError::InvalidResponse(msg) => ServiceError::InvalidResponse(msg),
            LlmError::RateLimitExceeded => ServiceError::RateLimited,
            LlmError::ModelNotAvailable(model) => ServiceError::ModelNotAvailable(model),
            LlmError::Config(msg) => ServiceError::Unavailable(msg),
        }
    }
}

/// Map a failed HTTP status to an error
pub(crate) fn status_error(status: reqwest::StatusCode, body: String, model: &str) -> LlmError {
    match status {
        reqwest::StatusCode::NOT_FOUND => LlmError::ModelNotAvailable(model.to_string()),
        reqwest::StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimitExceeded,
        reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
            LlmError::Config(format!("HTTP {}: {}", status, body))
        }
        _ => LlmError::Communication(format!("HTTP {}: {}", status, body)),
    }
}

/// Map a transport error, distinguishing timeouts
pub(crate) fn transport_error(e: reqwest::Error, timeout_secs: u64) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout(timeout_secs)
    } else {
        LlmError::Communication(format!("Request failed: {}", e))
    }
}

/// Whether another attempt may succeed
pub(crate) fn is_retryable(e: &LlmError) -> bool {
    matches!(
        e,
        LlmError::Communication(_) | LlmError::Timeout(_) | LlmError::RateLimitExceeded
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_mapping() {
        assert_eq!(
            ServiceError::from(LlmError::RateLimitExceeded),
            ServiceError::RateLimited
        );
        assert_eq!(ServiceError::from(LlmError::Timeout(9)), ServiceError::Timeout(9));
        assert!(ServiceError::from(LlmError::Communication("refused".into())).is_retryable());
        assert!(!ServiceError::from(LlmError::ModelNotAvailable("m".into())).is_retryable());
    }

    #[test]
    fn test_status_error() {
        let model = "llama3";
        assert!(matches!(
            status_error(reqwest::StatusCode::NOT_FOUND, String::new(), model),
            LlmError::ModelNotAvailable(m) if m == "llama3"
        ));
        assert!(matches!(
            status_error(reqwest::StatusCode::TOO_MANY_REQUESTS, String::new(), model),
            LlmError::RateLimitExceeded
        ));
        assert!(matches!(
            status_error(reqwest::StatusCode::UNAUTHORIZED, "bad key".into(), model),
            LlmError::Config(_)
        ));
        let err = status_error(reqwest::StatusCode::BAD_GATEWAY, "upstream".into(), model);
        assert!(is_retryable(&err));
        assert!(err.to_string().contains("upstream"));
    }
}
