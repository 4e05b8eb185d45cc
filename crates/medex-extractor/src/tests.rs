//! Batch behaviour tests against mock gateways

#[cfg(test)]
mod tests {
    use crate::{
        BatchOrchestrator, ExtractionRequest, ExtractorConfig, FailureKind, ItemOutcome,
    };
    use async_trait::async_trait;
    use medex_domain::{Completion, CompletionGateway, CompletionRequest, TokenUsage};
    use medex_llm::{LlmError, MockGateway, MockReply};
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Deterministic reply: the record name is the item text, usage is
    /// derived from its length so every item has a distinct, checkable cost.
    fn echo_reply(prompt: &str) -> MockReply {
        let record = serde_json::json!({ "name": prompt, "category": "teste" });
        MockReply::Text(
            record.to_string(),
            TokenUsage::new(prompt.len() as u64 + 50, prompt.len() as u64 % 7 + 1),
        )
    }

    fn expected_usage(item: &str) -> TokenUsage {
        TokenUsage::new(item.len() as u64 + 50, item.len() as u64 % 7 + 1)
    }

    /// Scrambled but repeatable delay so later items often finish first
    fn scrambled_latency(prompt: &str) -> Duration {
        let seed = prompt.bytes().fold(17u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        Duration::from_millis(seed % 25)
    }

    fn echo_gateway() -> MockGateway {
        MockGateway::default()
            .with_responder(echo_reply)
            .with_latency(scrambled_latency)
    }

    fn items(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("item-{:03} Dipirona {}mg", i, (i + 1) * 10)).collect()
    }

    fn assert_positional(result_items: &[String], outcomes: &[ItemOutcome]) {
        assert_eq!(result_items.len(), outcomes.len());
        for (item, outcome) in result_items.iter().zip(outcomes) {
            let record = outcome.record().expect("item should succeed");
            assert_eq!(&record.name, item);
            assert_eq!(outcome.usage(), expected_usage(item));
        }
    }

    #[tokio::test]
    async fn test_order_preserved_under_scrambled_latency() {
        let orchestrator =
            BatchOrchestrator::new(echo_gateway(), ExtractorConfig::default()).unwrap();
        let input = items(20);

        let result = orchestrator.run(ExtractionRequest::new(input.clone())).await.unwrap();
        assert_positional(&input, &result.outcomes);
    }

    #[tokio::test]
    async fn test_failure_isolation_middle_item() {
        let mut gateway = echo_gateway();
        gateway.add_error("second", "HTTP 500 from provider");
        let orchestrator = BatchOrchestrator::new(gateway, ExtractorConfig::default()).unwrap();

        let result = orchestrator
            .run(ExtractionRequest::new(["first", "second", "third"]))
            .await
            .unwrap();

        assert_eq!(result.outcomes[0].record().unwrap().name, "first");
        assert_eq!(result.outcomes[1].failure_kind(), Some(FailureKind::GatewayError));
        assert_eq!(result.outcomes[2].record().unwrap().name, "third");
        assert_eq!(result.total_usage, expected_usage("first") + expected_usage("third"));
        assert!(!result.all_failed());
    }

    #[tokio::test]
    async fn test_all_failures_give_zero_usage() {
        let gateway = MockGateway::default()
            .with_responder(|_| MockReply::Error("provider unavailable".to_string()));
        let orchestrator = BatchOrchestrator::new(gateway, ExtractorConfig::default()).unwrap();

        let result = orchestrator.run(ExtractionRequest::new(["a", "b"])).await.unwrap();
        assert!(result.all_failed());
        assert_eq!(result.total_usage, TokenUsage::default());
    }

    #[tokio::test]
    async fn test_schema_violations_are_item_failures() {
        let mut gateway = echo_gateway();
        gateway.add_response("missing name", r#"{"brand": "EMS"}"#, TokenUsage::new(9, 9));
        gateway.add_response(
            "extra field",
            r#"{"name": "Seringa", "size": "10ml"}"#,
            TokenUsage::new(9, 9),
        );
        let orchestrator = BatchOrchestrator::new(gateway, ExtractorConfig::default()).unwrap();

        let result = orchestrator
            .run(ExtractionRequest::new(["missing name", "extra field", "ok"]))
            .await
            .unwrap();

        assert_eq!(result.outcomes[0].failure_kind(), Some(FailureKind::SchemaViolation));
        assert_eq!(result.outcomes[1].failure_kind(), Some(FailureKind::SchemaViolation));
        assert!(result.outcomes[2].is_success());
        assert_eq!(result.total_usage, expected_usage("ok"));
    }

    #[tokio::test]
    async fn test_repeated_runs_are_identical() {
        let orchestrator =
            BatchOrchestrator::new(echo_gateway(), ExtractorConfig::default()).unwrap();
        let input = items(12);

        let first = orchestrator.run(ExtractionRequest::new(input.clone())).await.unwrap();
        let second = orchestrator.run(ExtractionRequest::new(input)).await.unwrap();

        assert_eq!(first.outcomes, second.outcomes);
        assert_eq!(first.total_usage, second.total_usage);
        assert_ne!(first.batch_id, second.batch_id);
    }

    #[tokio::test]
    async fn test_stress_hundred_items() {
        let config = ExtractorConfig {
            max_concurrency: 16,
            ..Default::default()
        };
        let orchestrator = BatchOrchestrator::new(echo_gateway(), config).unwrap();
        let input = items(100);

        let result = orchestrator.run(ExtractionRequest::new(input.clone())).await.unwrap();

        assert_positional(&input, &result.outcomes);
        let expected: TokenUsage = input.iter().map(|i| expected_usage(i)).sum();
        assert_eq!(result.total_usage, expected);
        assert_eq!(orchestrator.extractor().gateway().call_count(), 100);
    }

    /// Gateway that records how many calls overlap
    struct PeakGateway {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        finished: AtomicUsize,
        delay: Duration,
    }

    impl PeakGateway {
        fn new(delay: Duration) -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                finished: AtomicUsize::new(0),
                delay,
            }
        }
    }

    #[async_trait]
    impl CompletionGateway for PeakGateway {
        type Error = LlmError;

        async fn complete(&self, _request: CompletionRequest) -> Result<Completion, LlmError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(Completion {
                text: r#"{"name": "x"}"#.to_string(),
                usage: TokenUsage::new(1, 1),
            })
        }
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let gateway = Arc::new(PeakGateway::new(Duration::from_millis(20)));
        let config = ExtractorConfig {
            max_concurrency: 3,
            ..Default::default()
        };
        let orchestrator = BatchOrchestrator::from_shared(Arc::clone(&gateway), config).unwrap();

        let result = orchestrator
            .run(ExtractionRequest::new(items(12)))
            .await
            .unwrap();

        assert_eq!(result.succeeded(), 12);
        assert!(gateway.peak.load(Ordering::SeqCst) <= 3);
        assert!(gateway.peak.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_dropping_batch_aborts_in_flight_items() {
        let gateway = Arc::new(PeakGateway::new(Duration::from_millis(300)));
        let orchestrator =
            BatchOrchestrator::from_shared(Arc::clone(&gateway), ExtractorConfig::default())
                .unwrap();

        let cut_short = tokio::time::timeout(
            Duration::from_millis(30),
            orchestrator.run(ExtractionRequest::new(items(4))),
        )
        .await;
        assert!(cut_short.is_err());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(gateway.finished.load(Ordering::SeqCst), 0);
    }

    /// Gateway that panics while handling one specific item
    struct PanickingGateway {
        poisoned_item: &'static str,
    }

    #[async_trait]
    impl CompletionGateway for PanickingGateway {
        type Error = LlmError;

        async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError> {
            let item = request.last_user_content().unwrap_or_default().to_string();
            if item == self.poisoned_item {
                panic!("gateway crashed on {}", item);
            }
            Ok(Completion {
                text: serde_json::json!({ "name": item }).to_string(),
                usage: TokenUsage::new(3, 1),
            })
        }
    }

    #[tokio::test]
    async fn test_panicked_item_is_isolated() {
        let gateway = PanickingGateway {
            poisoned_item: "Seringa 5ml",
        };
        let orchestrator = BatchOrchestrator::new(gateway, ExtractorConfig::default()).unwrap();

        let result = orchestrator
            .run(ExtractionRequest::new(["Dipirona", "Seringa 5ml", "Gaze"]))
            .await
            .unwrap();

        assert_eq!(result.outcomes.len(), 3);
        assert_eq!(result.outcomes[0].record().unwrap().name, "Dipirona");
        assert_eq!(result.outcomes[1].failure_kind(), Some(FailureKind::GatewayError));
        assert_eq!(result.outcomes[2].record().unwrap().name, "Gaze");
        assert_eq!(result.total_usage, TokenUsage::new(6, 2));
        assert_eq!(result.succeeded(), 2);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn outcomes_align_with_inputs(
            input in proptest::collection::vec("[a-z]{1,8}( [0-9]{1,3}mg)?", 1..30),
            failing in proptest::collection::vec(any::<bool>(), 30),
            max_concurrency in 1usize..10,
        ) {
            let mut gateway = echo_gateway();
            for (item, fail) in input.iter().zip(&failing) {
                if *fail {
                    gateway.add_error(item.clone(), "injected");
                }
            }
            let config = ExtractorConfig { max_concurrency, ..Default::default() };
            let orchestrator = BatchOrchestrator::new(gateway, config).unwrap();

            let result = tokio_test::block_on(orchestrator.run(ExtractionRequest::new(input.clone())))
                .unwrap();

            prop_assert_eq!(result.outcomes.len(), input.len());

            let mut expected_total = TokenUsage::default();
            for (item, outcome) in input.iter().zip(&result.outcomes) {
                // A duplicate of a failing item fails too, since replies are keyed by text
                let should_fail = input
                    .iter()
                    .zip(&failing)
                    .any(|(other, fail)| other == item && *fail);
                if should_fail {
                    prop_assert_eq!(outcome.failure_kind(), Some(FailureKind::GatewayError));
                } else {
                    prop_assert_eq!(&outcome.record().unwrap().name, item);
                    expected_total += expected_usage(item);
                }
            }
            prop_assert_eq!(result.total_usage, expected_total);
        }
    }
}
