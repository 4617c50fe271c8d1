//! Language-model contract consumed by the orchestrator.
//!
//! The engine never produces completions itself; it calls a [`ModelClient`]
//! with the transcript and the tool schema list and interprets the response.

mod scripted;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::types::{Message, ToolCallRequest, ToolSchema};

pub use scripted::{RecordedRequest, ScriptedModel};

/// Input to one model call.
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub messages: &'a [Message],
    pub tools: &'a [ToolSchema],
    /// Tripped when the run is cancelled; clients may abort early.
    pub cancel: &'a CancellationToken,
}

/// Text and requested tool calls of one model turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ModelResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self {
            text: String::new(),
            tool_calls: calls,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_tool_call(mut self, call: ToolCallRequest) -> Self {
        self.tool_calls.push(call);
        self
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("model call cancelled")]
    Cancelled,

    #[error("model provider error: {message}")]
    Provider { message: String },

    #[error("model call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("invalid model response: {message}")]
    InvalidResponse { message: String },
}

impl ModelError {
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Produces one model turn from the current transcript.
#[async_trait]
pub trait ModelClient: Send + Sync {
    fn name(&self) -> &str {
        "model"
    }

    async fn complete(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ModelError>;
}
