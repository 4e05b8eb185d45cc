//! Medex Domain Layer
//!
//! Value types and the trait boundary shared by every other Medex crate.
//! Nothing here performs I/O; infrastructure implementations live in
//! `medex-llm`, orchestration in `medex-extractor`.
//!
//! ## Key Concepts
//!
//! - **Chat message**: one conversation turn (`system` or `user`)
//! - **Response format**: a named JSON Schema the model output must follow
//! - **Completion**: generated text plus the provider's token counters
//! - **Token usage**: input/output token counts, summed per batch
//! - **Completion gateway**: the async trait every model backend implements

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod completion;
pub mod message;
pub mod traits;
pub mod usage;

// Re-exports for convenience
pub use completion::{Completion, CompletionRequest, ResponseFormat};
pub use message::{ChatMessage, Role};
pub use traits::CompletionGateway;
pub use usage::TokenUsage;
