//! Error types for the Extractor

use thiserror::Error;

/// Batch-level errors
///
/// Per-item problems never surface here; they are recorded in that item's
/// [`ItemOutcome`](crate::ItemOutcome).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractorError {
    /// Request carried zero items
    #[error("Batch has no items")]
    EmptyBatch,

    /// An item was empty or whitespace only
    #[error("Item {index} is blank")]
    BlankItem {
        /// Position of the offending item
        index: usize,
    },

    /// Request carried more items than allowed
    #[error("Batch too large: {0} items (max: {1})")]
    BatchTooLarge(usize, usize),

    /// Gateway failure on a path without per-item isolation
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Classification of a single item's failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FailureKind {
    /// Output was not JSON or did not match the record schema
    SchemaViolation,
    /// Transport, timeout or provider-side failure
    GatewayError,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::SchemaViolation => f.write_str("SchemaViolation"),
            FailureKind::GatewayError => f.write_str("GatewayError"),
        }
    }
}
