//! Inference calls with a deadline and bounded retries

use crate::config::ExtractorConfig;
use creditseer_domain::{CompletionRequest, InferenceService, ServiceError};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Call `service`, retrying timeouts and transient failures with exponential backoff
///
/// Non-retryable errors are returned at once. Nothing is committed by the
/// caller before the whole stage succeeds, so repeating a call is safe.
pub async fn complete_with_retry<I>(
    service: &I,
    request: &CompletionRequest,
    config: &ExtractorConfig,
) -> Result<String, ServiceError>
where
    I: InferenceService + ?Sized,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        debug!(
            "Inference call to {} (attempt {}/{}, prompt {} chars)",
            service.model_name(),
            attempt,
            config.max_attempts,
            request.prompt.len()
        );

        let err = match timeout(config.inference_timeout(), service.complete(request)).await {
            Ok(Ok(response)) => return Ok(response),
            Ok(Err(e)) => e,
            Err(_) => ServiceError::Timeout(config.inference_timeout_secs),
        };

        if !err.is_retryable() || attempt >= config.max_attempts {
            return Err(err);
        }

        let delay = config.retry_backoff(attempt);
        warn!("Inference call failed ({}), retrying in {:?}", err, delay);
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use creditseer_llm::MockProvider;
    use std::time::Duration;

    fn request() -> CompletionRequest {
        CompletionRequest {
            system: "system".into(),
            prompt: "prompt".into(),
            response_schema: serde_json::json!({}),
            temperature: 0.0,
        }
    }

    fn fast_config(max_attempts: u32) -> ExtractorConfig {
        ExtractorConfig {
            max_attempts,
            retry_backoff_ms: 1,
            ..ExtractorConfig::default()
        }
    }

    #[tokio::test]
    async fn test_retries_transient_errors() {
        let provider = MockProvider::new("ok");
        provider.push_error(ServiceError::Unavailable("down".into()));
        provider.push_error(ServiceError::RateLimited);

        let response = complete_with_retry(&provider, &request(), &fast_config(3))
            .await
            .unwrap();
        assert_eq!(response, "ok");
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let provider = MockProvider::new("ok");
        for _ in 0..3 {
            provider.push_error(ServiceError::Unavailable("down".into()));
        }

        let err = complete_with_retry(&provider, &request(), &fast_config(2))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_error_returns_immediately() {
        let provider = MockProvider::new("ok");
        provider.push_error(ServiceError::ModelNotAvailable("m".into()));

        let err = complete_with_retry(&provider, &request(), &fast_config(5))
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::ModelNotAvailable("m".into()));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_slow_call_times_out() {
        let provider = MockProvider::new("late").with_delay(Duration::from_millis(1500));
        let config = ExtractorConfig {
            inference_timeout_secs: 1,
            ..fast_config(1)
        };

        let err = complete_with_retry(&provider, &request(), &config)
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::Timeout(1));
    }
}
