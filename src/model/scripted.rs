//! Deterministic model that replays a queued script.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ModelClient, ModelError, ModelRequest, ModelResponse};
use crate::types::Message;

/// What the model saw on one call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    pub tool_names: Vec<String>,
}

/// Replays queued responses in order and records every request.
///
/// Once the script is exhausted, further calls fail with a provider error.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    script: Mutex<VecDeque<Result<ModelResponse, ModelError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    repeat_last: Option<ModelResponse>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_responses(responses: impl IntoIterator<Item = ModelResponse>) -> Self {
        let model = Self::new();
        for response in responses {
            model.push(response);
        }
        model
    }

    /// Answer with `response` forever once the script runs out.
    pub fn repeating(response: ModelResponse) -> Self {
        Self {
            repeat_last: Some(response),
            ..Self::default()
        }
    }

    pub fn then(self, response: ModelResponse) -> Self {
        self.push(response);
        self
    }

    pub fn then_error(self, error: ModelError) -> Self {
        self.push_error(error);
        self
    }

    pub fn push(&self, response: ModelResponse) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Ok(response));
        }
    }

    pub fn push_error(&self, error: ModelError) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Err(error));
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.requests.lock().ok().and_then(|r| r.last().cloned())
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().map(|s| s.len()).unwrap_or_default()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                messages: request.messages.to_vec(),
                tool_names: request.tools.iter().map(|t| t.name.clone()).collect(),
            });
        }

        if request.cancel.is_cancelled() {
            return Err(ModelError::Cancelled);
        }

        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match (next, &self.repeat_last) {
            (Some(result), _) => result,
            (None, Some(response)) => Ok(response.clone()),
            (None, None) => Err(ModelError::provider("script exhausted")),
        }
    }
}
