//! Medex LLM Gateway Layer
//!
//! Implementations of the `CompletionGateway` trait from `medex-domain`.
//!
//! # Gateways
//!
//! - `MockGateway`: Deterministic, latency-injectable mock for testing
//! - `AzureOpenAiGateway`: Azure OpenAI chat-completions deployment
//!
//! # Examples
//!
//! ```
//! use medex_domain::{ChatMessage, CompletionGateway, CompletionRequest};
//! use medex_llm::MockGateway;
//!
//! # async fn example() {
//! let gateway = MockGateway::new(r#"{"name": "Dipirona"}"#);
//! let request = CompletionRequest::new(vec![ChatMessage::user("Dipirona 500mg")]);
//! let completion = gateway.complete(request).await.unwrap();
//! assert_eq!(completion.text, r#"{"name": "Dipirona"}"#);
//! # }
//! ```

#![warn(missing_docs)]

pub mod azure;
pub mod mock;

use thiserror::Error;

pub use azure::{AzureOpenAiGateway, GatewayAuth};
pub use mock::{MockGateway, MockReply};

/// Errors that can occur during gateway calls
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// Network or API communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// Invalid response from the provider
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Deployment or model not available
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// Provider answered with an error status
    #[error("Provider returned HTTP {status}: {body}")]
    Provider {
        /// HTTP status code
        status: u16,
        /// Response body as returned by the provider
        body: String,
    },

    /// Gateway could not be constructed
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic error
    #[error("LLM error: {0}")]
    Other(String),
}
