//! Azure OpenAI Gateway Implementation
//!
//! Calls the chat-completions endpoint of an Azure OpenAI deployment.
//!
//! # Features
//!
//! - Async HTTP communication with the deployment
//! - API key or bearer token authentication
//! - JSON Schema response format binding
//! - Timeout handling
//!
//! No retries are performed here; one `complete` call is one HTTP request.
//!
//! # Examples
//!
//! ```no_run
//! use medex_llm::{AzureOpenAiGateway, GatewayAuth};
//!
//! let gateway = AzureOpenAiGateway::new(
//!     "https://my-resource.openai.azure.com",
//!     "gpt-4o-mini",
//!     GatewayAuth::ApiKey("secret".to_string()),
//! )
//! .unwrap();
//! ```

use crate::LlmError;
use async_trait::async_trait;
use medex_domain::{ChatMessage, Completion, CompletionGateway, CompletionRequest, TokenUsage};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Default REST API version
pub const DEFAULT_API_VERSION: &str = "2024-02-15-preview";

/// Default timeout for completion requests (60 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Credential attached to every request
#[derive(Clone, PartialEq, Eq)]
pub enum GatewayAuth {
    /// Sent as the `api-key` header
    ApiKey(String),
    /// Sent as `Authorization: Bearer <token>`
    BearerToken(String),
}

impl fmt::Debug for GatewayAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayAuth::ApiKey(_) => f.write_str("ApiKey(***)"),
            GatewayAuth::BearerToken(_) => f.write_str("BearerToken(***)"),
        }
    }
}

/// Azure OpenAI chat-completions gateway
pub struct AzureOpenAiGateway {
    endpoint: String,
    deployment: String,
    api_version: String,
    auth: GatewayAuth,
    client: reqwest::Client,
}

/// Request body for the chat-completions API
#[derive(Serialize)]
struct ChatCompletionBody<'a> {
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<WireResponseFormat<'a>>,
}

#[derive(Serialize)]
struct WireResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: WireJsonSchema<'a>,
}

#[derive(Serialize)]
struct WireJsonSchema<'a> {
    name: &'a str,
    schema: &'a Value,
}

/// Response from the chat-completions API
#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

impl AzureOpenAiGateway {
    /// Create a gateway for one deployment
    ///
    /// # Parameters
    ///
    /// - `endpoint`: resource URL (e.g., "https://my-resource.openai.azure.com")
    /// - `deployment`: deployment name (e.g., "gpt-4o-mini")
    /// - `auth`: credential sent with every request
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Configuration` if the endpoint or deployment is
    /// empty, or the HTTP client cannot be built.
    pub fn new(
        endpoint: impl Into<String>,
        deployment: impl Into<String>,
        auth: GatewayAuth,
    ) -> Result<Self, LlmError> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        let deployment = deployment.into();

        if endpoint.is_empty() {
            return Err(LlmError::Configuration("endpoint is empty".to_string()));
        }
        if deployment.is_empty() {
            return Err(LlmError::Configuration("deployment is empty".to_string()));
        }

        Ok(Self {
            endpoint,
            deployment,
            api_version: DEFAULT_API_VERSION.to_string(),
            auth,
            client: build_client(Duration::from_secs(DEFAULT_TIMEOUT_SECS))?,
        })
    }

    /// Set the REST API version
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Set the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, LlmError> {
        self.client = build_client(timeout)?;
        Ok(self)
    }

    /// Deployment this gateway targets
    pub fn deployment(&self) -> &str {
        &self.deployment
    }

    /// Full chat-completions URL, without the query string
    pub fn chat_completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions",
            self.endpoint, self.deployment
        )
    }

    async fn send(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        let body = ChatCompletionBody {
            messages: &request.messages,
            temperature: request.temperature,
            response_format: request.response_format.as_ref().map(|format| WireResponseFormat {
                kind: "json_schema",
                json_schema: WireJsonSchema {
                    name: &format.name,
                    schema: &format.schema,
                },
            }),
        };

        let builder = self
            .client
            .post(self.chat_completions_url())
            .query(&[("api-version", self.api_version.as_str())])
            .json(&body);

        let builder = match &self.auth {
            GatewayAuth::ApiKey(key) => builder.header("api-key", key),
            GatewayAuth::BearerToken(token) => builder.bearer_auth(token),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| LlmError::Communication(format!("Request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimitExceeded);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(LlmError::ModelNotAvailable(self.deployment.clone()));
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("response has no content".to_string()))?;

        let usage = parsed
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        debug!(
            deployment = %self.deployment,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "completion received"
        );

        Ok(Completion { text, usage })
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, LlmError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| LlmError::Configuration(format!("Failed to build HTTP client: {}", e)))
}

#[async_trait]
impl CompletionGateway for AzureOpenAiGateway {
    type Error = LlmError;

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError> {
        self.send(&request).await
    }
}
