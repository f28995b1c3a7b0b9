//! Configuration for the extractors

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration shared by the Stage 1 and Stage 2 extractors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Maximum time for a single inference call (seconds)
    pub inference_timeout_secs: u64,

    /// Attempts per inference call, including the first
    pub max_attempts: u32,

    /// Delay before the first retry; doubles on each further retry (milliseconds)
    pub retry_backoff_ms: u64,

    /// Longest chunk text sent in one Stage 1 request (bytes of UTF-8)
    ///
    /// Longer chunks are split into windows at paragraph breaks.
    pub max_chunk_chars: usize,

    /// Maximum blocks sent in one Stage 2 request
    pub max_blocks_per_request: usize,

    /// Sampling temperature for every request
    pub temperature: f32,
}

impl ExtractorConfig {
    /// Get the inference timeout as a Duration
    pub fn inference_timeout(&self) -> Duration {
        Duration::from_secs(self.inference_timeout_secs)
    }

    /// Backoff before retry number `retry` (1-based)
    pub fn retry_backoff(&self, retry: u32) -> Duration {
        let factor = 2u64.saturating_pow(retry.saturating_sub(1));
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.inference_timeout_secs == 0 {
            return Err("inference_timeout_secs must be greater than 0".to_string());
        }
        if self.max_attempts == 0 {
            return Err("max_attempts must be greater than 0".to_string());
        }
        if self.max_chunk_chars < 1_000 {
            return Err("max_chunk_chars must be at least 1000".to_string());
        }
        if self.max_blocks_per_request == 0 {
            return Err("max_blocks_per_request must be greater than 0".to_string());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err("temperature must be between 0.0 and 2.0".to_string());
        }
        Ok(())
    }
}

impl Default for ExtractorConfig {
    /// Default configuration with balanced settings
    fn default() -> Self {
        Self {
            inference_timeout_secs: 120,
            max_attempts: 3,
            retry_backoff_ms: 1_000,
            max_chunk_chars: 60_000,
            max_blocks_per_request: 8,
            temperature: 0.1,
        }
    }
}

impl ExtractorConfig {
    /// Aggressive preset: shorter timeouts, smaller requests for faster processing
    pub fn aggressive() -> Self {
        Self {
            inference_timeout_secs: 60,
            max_attempts: 2,
            retry_backoff_ms: 500,
            max_chunk_chars: 30_000,
            max_blocks_per_request: 4,
            temperature: 0.0,
        }
    }

    /// Lenient preset: longer timeouts, larger requests for slow local models
    pub fn lenient() -> Self {
        Self {
            inference_timeout_secs: 300,
            max_attempts: 5,
            retry_backoff_ms: 2_000,
            max_chunk_chars: 120_000,
            max_blocks_per_request: 12,
            temperature: 0.1,
        }
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ExtractorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_aggressive_config_is_valid() {
        assert!(ExtractorConfig::aggressive().validate().is_ok());
    }

    #[test]
    fn test_lenient_config_is_valid() {
        assert!(ExtractorConfig::lenient().validate().is_ok());
    }

    #[test]
    fn test_invalid_values() {
        let mut config = ExtractorConfig::default();
        config.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = ExtractorConfig::default();
        config.max_blocks_per_request = 0;
        assert!(config.validate().is_err());

        let mut config = ExtractorConfig::default();
        config.temperature = 3.5;
        assert!(config.validate().is_err());

        let mut config = ExtractorConfig::default();
        config.max_chunk_chars = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_backoff_doubles() {
        let config = ExtractorConfig {
            retry_backoff_ms: 100,
            ..ExtractorConfig::default()
        };
        assert_eq!(config.retry_backoff(1), Duration::from_millis(100));
        assert_eq!(config.retry_backoff(2), Duration::from_millis(200));
        assert_eq!(config.retry_backoff(3), Duration::from_millis(400));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = ExtractorConfig::lenient();
        let toml_str = config.to_toml().unwrap();
        let parsed = ExtractorConfig::from_toml(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed = ExtractorConfig::from_toml("max_attempts = 7").unwrap();
        assert_eq!(parsed.max_attempts, 7);
        assert_eq!(parsed.inference_timeout_secs, 120);
    }
}
