//! Single-item extraction

use crate::error::{ExtractorError, FailureKind};
use crate::parser::parse_record;
use crate::prompt::{item_conversation, list_conversation};
use crate::schema::response_format;
use crate::types::ItemOutcome;
use medex_domain::{ChatMessage, Completion, CompletionGateway, CompletionRequest};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Turns one item description into one [`ItemOutcome`]
///
/// Each call makes exactly one gateway request at temperature 0 with the
/// `med_item` schema bound. Nothing is retried.
pub struct ItemExtractor<G: CompletionGateway> {
    gateway: Arc<G>,
    item_timeout: Option<Duration>,
}

impl<G: CompletionGateway> ItemExtractor<G> {
    /// Create an extractor over a gateway
    pub fn new(gateway: G) -> Self {
        Self::from_shared(Arc::new(gateway))
    }

    /// Create an extractor over an already shared gateway
    pub fn from_shared(gateway: Arc<G>) -> Self {
        Self {
            gateway,
            item_timeout: None,
        }
    }

    /// Bound every gateway call by a timeout
    pub fn with_item_timeout(mut self, item_timeout: Option<Duration>) -> Self {
        self.item_timeout = item_timeout;
        self
    }

    /// The underlying gateway
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Extract a record from one item
    ///
    /// Callers must not pass blank items; the orchestrator rejects them
    /// before dispatch.
    pub async fn extract(&self, item: &str) -> ItemOutcome {
        let completion = match self.call(item_conversation(item)).await {
            Ok(completion) => completion,
            Err(message) => {
                warn!("Gateway call failed: {}", message);
                return ItemOutcome::failure(FailureKind::GatewayError, message);
            }
        };

        debug!("Model response length: {} chars", completion.text.len());

        match parse_record(&completion.text) {
            Ok(record) => ItemOutcome::Success {
                record,
                usage: completion.usage,
            },
            Err(reason) => {
                warn!("Model output rejected: {}", reason);
                ItemOutcome::failure(FailureKind::SchemaViolation, reason)
            }
        }
    }

    /// Extract every item with a single combined prompt
    ///
    /// Returns the raw model text; there is no per-item isolation on this path.
    pub async fn extract_combined<S: AsRef<str>>(
        &self,
        items: &[S],
    ) -> Result<Completion, ExtractorError> {
        if items.is_empty() {
            return Err(ExtractorError::EmptyBatch);
        }

        let completion = self
            .call(list_conversation(items))
            .await
            .map_err(ExtractorError::Gateway)?;

        debug!(
            items = items.len(),
            input_tokens = completion.usage.input_tokens,
            output_tokens = completion.usage.output_tokens,
            "combined extraction complete"
        );

        Ok(completion)
    }

    async fn call(&self, messages: Vec<ChatMessage>) -> Result<Completion, String> {
        let request = CompletionRequest::new(messages)
            .with_temperature(0.0)
            .with_response_format(response_format());

        let call = self.gateway.complete(request);
        match self.item_timeout {
            Some(limit) => timeout(limit, call)
                .await
                .map_err(|_| format!("Gateway call timed out after {:?}", limit))?
                .map_err(|e| e.to_string()),
            None => call.await.map_err(|e| e.to_string()),
        }
    }
}
