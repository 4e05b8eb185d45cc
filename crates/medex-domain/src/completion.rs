//! Completion request and response values
//!
//! These describe the gateway contract only. How a backend turns them into
//! wire JSON is its own business.

use crate::message::ChatMessage;
use crate::usage::TokenUsage;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Named JSON Schema constraint on the generated text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFormat {
    /// Schema name reported to the provider
    pub name: String,
    /// JSON Schema document
    pub schema: Value,
}

impl ResponseFormat {
    /// Create a JSON Schema response format
    pub fn json_schema(name: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }
}

/// Everything a gateway needs for one completion call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Ordered conversation turns
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature
    pub temperature: f32,
    /// Optional output constraint
    pub response_format: Option<ResponseFormat>,
}

impl CompletionRequest {
    /// Create a request with temperature 0 and no response format
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            temperature: 0.0,
            response_format: None,
        }
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Bind a response format
    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = Some(format);
        self
    }

    /// Content of the last user turn, if any
    pub fn last_user_content(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == crate::message::Role::User)
            .map(|m| m.content.as_str())
    }
}

/// Successful gateway result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    /// First generated text payload
    pub text: String,
    /// Token counters reported for this call
    pub usage: TokenUsage,
}
