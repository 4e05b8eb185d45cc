//! HTTP request handlers for the extraction service.
//!
//! Decodes `{ "items": [...] }` bodies, runs them through the orchestrator
//! and encodes the result. A rejected batch is a 4xx with no outcomes; a
//! processed batch is a 2xx whose `errors` array must be inspected, except
//! when every item failed, which is reported as 502.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router as AxumRouter,
};
use medex_domain::CompletionGateway;
use medex_extractor::{
    BatchOrchestrator, BatchResult, ExtractedRecord, ExtractionRequest, ExtractorError,
    FailureKind, ItemOutcome,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Shared application state
pub struct AppState<G: CompletionGateway> {
    /// Batch orchestrator wrapping the configured gateway
    pub orchestrator: Arc<BatchOrchestrator<G>>,
    /// Deployment name reported by the health check
    pub deployment: String,
}

impl<G: CompletionGateway> Clone for AppState<G> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: Arc::clone(&self.orchestrator),
            deployment: self.deployment.clone(),
        }
    }
}

impl<G: CompletionGateway + 'static> AppState<G> {
    /// Create state from an orchestrator
    pub fn new(orchestrator: BatchOrchestrator<G>, deployment: impl Into<String>) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            deployment: deployment.into(),
        }
    }
}

/// Extraction request body
#[derive(Debug, Deserialize)]
pub struct ItemsBody {
    /// Item descriptions in order
    #[serde(alias = "Items")]
    pub items: Vec<String>,
}

/// Per-item failure as reported to callers
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemError {
    /// Failure classification
    pub kind: FailureKind,
    /// Diagnostic message
    pub message: String,
}

/// Batch extraction response
///
/// `result[i]` and `errors[i]` both describe `items[i]`; exactly one of them
/// is non-null.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    /// Extracted records, null where the item failed
    pub result: Vec<Option<ExtractedRecord>>,
    /// Failures, null where the item succeeded
    pub errors: Vec<Option<ItemError>>,
    /// Input tokens over successful items
    pub input_tokens: u64,
    /// Output tokens over successful items
    pub output_tokens: u64,
    /// Batch identifier, as logged
    pub batch_id: Uuid,
}

impl From<BatchResult> for BatchResponse {
    fn from(batch: BatchResult) -> Self {
        let (result, errors): (Vec<_>, Vec<_>) = batch
            .outcomes
            .into_iter()
            .map(|outcome| match outcome {
                ItemOutcome::Success { record, .. } => (Some(record), None),
                ItemOutcome::Failure { kind, message } => (None, Some(ItemError { kind, message })),
            })
            .unzip();

        Self {
            result,
            errors,
            input_tokens: batch.total_usage.input_tokens,
            output_tokens: batch.total_usage.output_tokens,
            batch_id: batch.batch_id,
        }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    /// Overall health status
    pub status: String,
    /// Upstream deployment name
    pub deployment: String,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Machine-readable error kind
    pub kind: String,
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    /// Body could not be decoded
    MalformedBody(JsonRejection),
    /// Orchestrator refused or failed the request as a whole
    Extraction(ExtractorError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            AppError::MalformedBody(rejection) => {
                (rejection.status(), "MalformedBody", rejection.body_text())
            }
            AppError::Extraction(e) => {
                let (status, kind) = match &e {
                    ExtractorError::EmptyBatch => (StatusCode::BAD_REQUEST, "EmptyBatch"),
                    ExtractorError::BlankItem { .. } => (StatusCode::BAD_REQUEST, "BlankItem"),
                    ExtractorError::BatchTooLarge(..) => {
                        (StatusCode::PAYLOAD_TOO_LARGE, "BatchTooLarge")
                    }
                    ExtractorError::Gateway(_) => (StatusCode::BAD_GATEWAY, "GatewayError"),
                    ExtractorError::Config(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "ConfigurationError")
                    }
                };
                (status, kind, e.to_string())
            }
        };

        let body = Json(ErrorResponse {
            error: message,
            kind: kind.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<ExtractorError> for AppError {
    fn from(e: ExtractorError) -> Self {
        AppError::Extraction(e)
    }
}

impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        AppError::MalformedBody(e)
    }
}

/// POST /extract - One combined prompt over all items
///
/// Returns the model's JSON text unchanged.
async fn extract<G: CompletionGateway + 'static>(
    State(state): State<AppState<G>>,
    payload: Result<Json<ItemsBody>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(body) = payload?;
    let request = ExtractionRequest::new(body.items);

    let completion = state.orchestrator.run_combined(&request).await?;

    info!(
        items = request.len(),
        input_tokens = completion.usage.input_tokens,
        output_tokens = completion.usage.output_tokens,
        total_tokens = completion.usage.total(),
        "Combined extraction served"
    );

    Ok(([(header::CONTENT_TYPE, "application/json")], completion.text).into_response())
}

/// POST /extractBatch, /extractBatchAzure - One isolated call per item
async fn extract_batch<G: CompletionGateway + 'static>(
    State(state): State<AppState<G>>,
    payload: Result<Json<ItemsBody>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(body) = payload?;

    let batch = state
        .orchestrator
        .run(ExtractionRequest::new(body.items))
        .await?;

    let status = if batch.all_failed() {
        warn!(batch_id = %batch.batch_id, "Every item in the batch failed");
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::OK
    };

    Ok((status, Json(BatchResponse::from(batch))).into_response())
}

/// GET /health - Liveness check
async fn health_check<G: CompletionGateway + 'static>(
    State(state): State<AppState<G>>,
) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "ok".to_string(),
        deployment: state.deployment.clone(),
    })
}

/// Create the axum router with all routes
pub fn create_router<G: CompletionGateway + 'static>(state: AppState<G>) -> AxumRouter {
    AxumRouter::new()
        .route("/extract", post(extract::<G>))
        .route("/extractBatch", post(extract_batch::<G>))
        .route("/extractBatchAzure", post(extract_batch::<G>))
        .route("/health", get(health_check::<G>))
        .with_state(state)
}
