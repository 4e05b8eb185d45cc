//! Batch fan-out over the item extractor
//!
//! One tokio task per item, gated by a semaphore of `max_concurrency`
//! permits. Tasks are joined in index order, so `outcomes[i]` always belongs
//! to `items[i]` whatever order the gateway answers in. Usage totals are a
//! reduction over the collected outcomes; no counters are shared between
//! tasks.

use crate::config::ExtractorConfig;
use crate::error::{ExtractorError, FailureKind};
use crate::extractor::ItemExtractor;
use crate::types::{BatchResult, ExtractionRequest, ItemOutcome};
use medex_domain::{Completion, CompletionGateway};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Runs a batch of items through an [`ItemExtractor`]
pub struct BatchOrchestrator<G: CompletionGateway> {
    extractor: Arc<ItemExtractor<G>>,
    config: ExtractorConfig,
}

impl<G> BatchOrchestrator<G>
where
    G: CompletionGateway + 'static,
{
    /// Create an orchestrator
    ///
    /// # Errors
    ///
    /// Returns `ExtractorError::Config` if the configuration is invalid.
    pub fn new(gateway: G, config: ExtractorConfig) -> Result<Self, ExtractorError> {
        Self::from_shared(Arc::new(gateway), config)
    }

    /// Create an orchestrator over an already shared gateway
    pub fn from_shared(gateway: Arc<G>, config: ExtractorConfig) -> Result<Self, ExtractorError> {
        config.validate().map_err(ExtractorError::Config)?;

        let extractor = ItemExtractor::from_shared(gateway).with_item_timeout(config.item_timeout());

        Ok(Self {
            extractor: Arc::new(extractor),
            config,
        })
    }

    /// The per-item extractor, also used for combined extraction
    pub fn extractor(&self) -> &ItemExtractor<G> {
        &self.extractor
    }

    /// Active configuration
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Extract every item of a batch
    ///
    /// Returns `Err` only for batch-level rejections, before any gateway
    /// call is made. Per-item failures are reported in the outcomes. If the
    /// returned future is dropped, in-flight item tasks are aborted.
    pub async fn run(&self, request: ExtractionRequest) -> Result<BatchResult, ExtractorError> {
        self.check(&request)?;

        let batch_id = Uuid::now_v7();
        let started = Instant::now();
        let total = request.len();

        info!(
            %batch_id,
            items = total,
            max_concurrency = self.config.max_concurrency,
            "Dispatching batch"
        );

        let permits = Arc::new(Semaphore::new(self.config.max_concurrency));
        let handles: Vec<JoinHandle<ItemOutcome>> = request
            .items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                let extractor = Arc::clone(&self.extractor);
                let permits = Arc::clone(&permits);
                tokio::spawn(async move {
                    let Ok(_permit) = permits.acquire_owned().await else {
                        return ItemOutcome::failure(FailureKind::GatewayError, "dispatch pool closed");
                    };
                    debug!(index, "Extracting item");
                    extractor.extract(&item).await
                })
            })
            .collect();

        let guard = AbortOnDrop(handles.iter().map(JoinHandle::abort_handle).collect());

        let mut outcomes = Vec::with_capacity(total);
        for (index, handle) in handles.into_iter().enumerate() {
            let outcome = handle.await.unwrap_or_else(|e| {
                warn!(%batch_id, index, "Extraction task failed: {}", e);
                ItemOutcome::failure(FailureKind::GatewayError, format!("extraction task failed: {}", e))
            });
            outcomes.push(outcome);
        }
        drop(guard);

        let result = BatchResult::from_outcomes(batch_id, outcomes, elapsed_ms(started));

        info!(
            %batch_id,
            succeeded = result.succeeded(),
            failed = result.failed(),
            input_tokens = result.total_usage.input_tokens,
            output_tokens = result.total_usage.output_tokens,
            elapsed_ms = result.processing_time_ms,
            "Batch complete"
        );

        Ok(result)
    }

    /// Extract every item of a batch with one combined prompt
    ///
    /// Applies the same batch-level checks as [`BatchOrchestrator::run`]
    /// before the single gateway call.
    pub async fn run_combined(&self, request: &ExtractionRequest) -> Result<Completion, ExtractorError> {
        self.check(request)?;
        self.extractor.extract_combined(request.items.as_slice()).await
    }

    /// Batch-level validation, run before anything is dispatched
    fn check(&self, request: &ExtractionRequest) -> Result<(), ExtractorError> {
        if request.is_empty() {
            return Err(ExtractorError::EmptyBatch);
        }
        if request.len() > self.config.max_batch_size {
            return Err(ExtractorError::BatchTooLarge(
                request.len(),
                self.config.max_batch_size,
            ));
        }
        if let Some(index) = request.items.iter().position(|item| item.trim().is_empty()) {
            return Err(ExtractorError::BlankItem { index });
        }
        Ok(())
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Aborts outstanding item tasks if the batch future is dropped early
struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}
