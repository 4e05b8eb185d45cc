//! Trait definitions for external interactions
//!
//! These traits define the boundaries between domain logic and infrastructure.
//! Infrastructure implementations live in other crates.

use crate::completion::{Completion, CompletionRequest};
use async_trait::async_trait;

/// A chat-completion backend
///
/// Implemented by the infrastructure layer (medex-llm). Credentials, endpoint
/// and model selection are fixed when the implementation is constructed.
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    /// Error type for gateway operations
    type Error: std::fmt::Display + Send + Sync + 'static;

    /// Run one completion call
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, Self::Error>;
}
