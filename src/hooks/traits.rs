//! Observer trait and event types.

use std::fmt;

use crate::agent::{ToolCallRecord, TurnRecord};
use crate::model::ModelResponse;
use crate::types::{Arguments, Message};

/// Points in a run where observers are notified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    ModelCallStart,
    ModelCallEnd,
    ToolCallStart,
    ToolCallEnd,
    TurnEnd,
    Error,
}

impl HookEvent {
    pub fn all() -> &'static [HookEvent] {
        &[
            Self::ModelCallStart,
            Self::ModelCallEnd,
            Self::ToolCallStart,
            Self::ToolCallEnd,
            Self::TurnEnd,
            Self::Error,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ModelCallStart => "model_call_start",
            Self::ModelCallEnd => "model_call_end",
            Self::ToolCallStart => "tool_call_start",
            Self::ToolCallEnd => "tool_call_end",
            Self::TurnEnd => "turn_end",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Borrowed payload of a single notification.
#[derive(Debug, Clone, Copy)]
pub enum RunEvent<'a> {
    ModelCallStart {
        turn: u32,
        messages: &'a [Message],
    },
    ModelCallEnd {
        turn: u32,
        response: &'a ModelResponse,
    },
    ToolCallStart {
        name: &'a str,
        arguments: &'a Arguments,
    },
    ToolCallEnd {
        record: &'a ToolCallRecord,
    },
    TurnEnd {
        record: &'a TurnRecord,
    },
    Error {
        error: &'a crate::Error,
    },
}

impl RunEvent<'_> {
    pub fn kind(&self) -> HookEvent {
        match self {
            Self::ModelCallStart { .. } => HookEvent::ModelCallStart,
            Self::ModelCallEnd { .. } => HookEvent::ModelCallEnd,
            Self::ToolCallStart { .. } => HookEvent::ToolCallStart,
            Self::ToolCallEnd { .. } => HookEvent::ToolCallEnd,
            Self::TurnEnd { .. } => HookEvent::TurnEnd,
            Self::Error { .. } => HookEvent::Error,
        }
    }
}

/// Synchronous run observer. All methods default to no-ops.
///
/// Observers are called in-line, in registration order, and cannot change
/// control flow. A panicking observer is logged and skipped.
pub trait RunObserver: Send + Sync {
    fn name(&self) -> &str {
        "observer"
    }

    fn on_model_call_start(&self, _turn: u32, _messages: &[Message]) {}

    fn on_model_call_end(&self, _turn: u32, _response: &ModelResponse) {}

    fn on_tool_call_start(&self, _name: &str, _arguments: &Arguments) {}

    fn on_tool_call_end(&self, _record: &ToolCallRecord) {}

    fn on_turn_end(&self, _record: &TurnRecord) {}

    fn on_error(&self, _error: &crate::Error) {}
}

/// Observer that funnels every event into one closure.
pub struct FnObserver<F> {
    name: String,
    handler: F,
}

impl<F> FnObserver<F>
where
    F: Fn(&RunEvent<'_>) + Send + Sync,
{
    pub fn new(name: impl Into<String>, handler: F) -> Self {
        Self {
            name: name.into(),
            handler,
        }
    }
}

impl<F> RunObserver for FnObserver<F>
where
    F: Fn(&RunEvent<'_>) + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn on_model_call_start(&self, turn: u32, messages: &[Message]) {
        (self.handler)(&RunEvent::ModelCallStart { turn, messages });
    }

    fn on_model_call_end(&self, turn: u32, response: &ModelResponse) {
        (self.handler)(&RunEvent::ModelCallEnd { turn, response });
    }

    fn on_tool_call_start(&self, name: &str, arguments: &Arguments) {
        (self.handler)(&RunEvent::ToolCallStart { name, arguments });
    }

    fn on_tool_call_end(&self, record: &ToolCallRecord) {
        (self.handler)(&RunEvent::ToolCallEnd { record });
    }

    fn on_turn_end(&self, record: &TurnRecord) {
        (self.handler)(&RunEvent::TurnEnd { record });
    }

    fn on_error(&self, error: &crate::Error) {
        (self.handler)(&RunEvent::Error { error });
    }
}

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl RunObserver for LoggingObserver {
    fn name(&self) -> &str {
        "logging"
    }

    fn on_model_call_start(&self, turn: u32, messages: &[Message]) {
        tracing::debug!(turn, messages = messages.len(), "Model call started");
    }

    fn on_model_call_end(&self, turn: u32, response: &ModelResponse) {
        tracing::debug!(
            turn,
            tool_calls = response.tool_calls.len(),
            text_len = response.text.len(),
            "Model call finished"
        );
    }

    fn on_tool_call_start(&self, name: &str, arguments: &Arguments) {
        tracing::debug!(tool = %name, args = arguments.len(), "Tool call started");
    }

    fn on_tool_call_end(&self, record: &ToolCallRecord) {
        match record.error {
            Some(ref error) => tracing::info!(
                tool = %record.tool_name,
                call_id = %record.call_id,
                error = %error,
                "Tool call failed"
            ),
            None => tracing::debug!(
                tool = %record.tool_name,
                call_id = %record.call_id,
                "Tool call finished"
            ),
        }
    }

    fn on_turn_end(&self, record: &TurnRecord) {
        tracing::debug!(
            turn = record.turn,
            tool_calls = record.tool_calls.len(),
            is_final = record.is_final,
            "Turn finished"
        );
    }

    fn on_error(&self, error: &crate::Error) {
        tracing::warn!(error = %error, category = ?error.category(), "Run error");
    }
}
