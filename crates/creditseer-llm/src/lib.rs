//! CreditSeer Inference Providers
//!
//! Implementations of the `InferenceService` trait from `creditseer-domain`.
//!
//! # Providers
//!
//! - `MockProvider`: Deterministic mock for testing
//! - `OllamaProvider`: Local Ollama API integration
//! - `OpenAiProvider`: Any OpenAI-compatible chat completions endpoint
//!
//! # Examples
//!
//! ```
//! use creditseer_domain::{CompletionRequest, InferenceService};
//! use creditseer_llm::MockProvider;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let provider = MockProvider::new(r#"{"blocks": []}"#);
//! let request = CompletionRequest {
//!     system: String::new(),
//!     prompt: "isolate blocks".into(),
//!     response_schema: serde_json::json!({}),
//!     temperature: 0.0,
//! };
//! assert_eq!(provider.complete(&request).await.unwrap(), r#"{"blocks": []}"#);
//! # }
//! ```

#![warn(missing_docs)]

mod error;
mod mock;
pub mod ollama;
pub mod openai;

pub use error::LlmError;
pub use mock::MockProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
