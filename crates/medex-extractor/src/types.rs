//! Request and response types for extraction

use crate::error::FailureKind;
use medex_domain::TokenUsage;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request to extract one record per input item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRequest {
    /// Free-text item descriptions; order is significant, duplicates allowed
    pub items: Vec<String>,
}

impl ExtractionRequest {
    /// Create a request from any list of strings
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            items: items.into_iter().map(Into::into).collect(),
        }
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when there are no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Attributes extracted from one item description
///
/// Deserialization mirrors the `med_item` schema: `name` is required,
/// every other field is an optional string, and unknown fields are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExtractedRecord {
    /// Item name
    pub name: String,
    /// Manufacturer or brand
    pub brand: Option<String>,
    /// Strength, e.g. "500mg"
    pub concentration: Option<String>,
    /// Unit of measure, without digits
    pub unit: Option<String>,
    /// Presentation, e.g. "Ampola"
    pub form: Option<String>,
    /// Package quantity, e.g. "100ML"
    pub quantity: Option<String>,
    /// Category assigned by the model
    pub category: Option<String>,
    /// Anything else relevant
    pub additional_info: Option<String>,
}

impl ExtractedRecord {
    /// Record with only a name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            brand: None,
            concentration: None,
            unit: None,
            form: None,
            quantity: None,
            category: None,
            additional_info: None,
        }
    }
}

/// Result for one input item, aligned with its position in the batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Record extracted
    Success {
        /// Parsed record
        record: ExtractedRecord,
        /// Tokens spent on this item's call
        usage: TokenUsage,
    },
    /// Extraction failed for this item only
    Failure {
        /// Failure classification
        kind: FailureKind,
        /// Diagnostic message
        message: String,
    },
}

impl ItemOutcome {
    /// Build a failure outcome
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        ItemOutcome::Failure {
            kind,
            message: message.into(),
        }
    }

    /// True for `Success`
    pub fn is_success(&self) -> bool {
        matches!(self, ItemOutcome::Success { .. })
    }

    /// The record, if extraction succeeded
    pub fn record(&self) -> Option<&ExtractedRecord> {
        match self {
            ItemOutcome::Success { record, .. } => Some(record),
            ItemOutcome::Failure { .. } => None,
        }
    }

    /// Usage counted toward the batch total (zero for failures)
    pub fn usage(&self) -> TokenUsage {
        match self {
            ItemOutcome::Success { usage, .. } => *usage,
            ItemOutcome::Failure { .. } => TokenUsage::default(),
        }
    }

    /// Failure kind, if extraction failed
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            ItemOutcome::Success { .. } => None,
            ItemOutcome::Failure { kind, .. } => Some(*kind),
        }
    }
}

/// Result of one batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    /// Identifier used in logs for this batch
    pub batch_id: Uuid,
    /// One outcome per input item, in input order
    pub outcomes: Vec<ItemOutcome>,
    /// Sum of usage over successful outcomes
    pub total_usage: TokenUsage,
    /// Wall-clock time from dispatch to completion
    pub processing_time_ms: u64,
}

impl BatchResult {
    /// Assemble a result, computing the usage total from the outcomes
    pub fn from_outcomes(batch_id: Uuid, outcomes: Vec<ItemOutcome>, processing_time_ms: u64) -> Self {
        let total_usage = outcomes.iter().map(ItemOutcome::usage).sum();
        Self {
            batch_id,
            outcomes,
            total_usage,
            processing_time_ms,
        }
    }

    /// Number of successful items
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Number of failed items
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// True when the batch is non-empty and no item succeeded
    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.succeeded() == 0
    }
}
