//! Run records and result types.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::state::RunMetrics;
use crate::types::{Arguments, Message};

/// Terminal label of a run. Every [`RunResult`] carries exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Completed,
    MaxTurns,
    Error,
    Guardrail,
    LoopDetected,
    Cancelled,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::MaxTurns => "max_turns",
            Self::Error => "error",
            Self::Guardrail => "guardrail",
            Self::LoopDetected => "loop_detected",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One executed (or rejected) tool call. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub call_id: String,
    pub tool_name: String,
    pub arguments: Arguments,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub duration_ms: u64,
}

impl ToolCallRecord {
    pub fn success(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: Arguments,
        output: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            arguments,
            result: Some(output.into()),
            error: None,
            duration_ms: 0,
        }
    }

    pub fn failure(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: Arguments,
        error: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            arguments,
            result: None,
            error: Some(error.into()),
            duration_ms: 0,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Text that was placed into the transcript for this call.
    pub fn output_text(&self) -> &str {
        self.error
            .as_deref()
            .or(self.result.as_deref())
            .unwrap_or_default()
    }
}

/// One model call plus the tool calls it requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    /// 1-based, strictly increasing within a run.
    pub turn: u32,
    pub model_output: String,
    pub tool_calls: Vec<ToolCallRecord>,
    pub is_final: bool,
}

impl TurnRecord {
    pub fn new(turn: u32, model_output: impl Into<String>) -> Self {
        Self {
            turn,
            model_output: model_output.into(),
            tool_calls: Vec::new(),
            is_final: false,
        }
    }
}

/// Outcome of [`Orchestrator::run`](super::Orchestrator::run).
#[derive(Debug, Clone)]
pub struct RunResult {
    pub run_id: String,
    pub final_output: String,
    pub turns: Vec<TurnRecord>,
    pub tool_calls_count: usize,
    pub total_turns: usize,
    pub stop_reason: StopReason,
    /// Full transcript, including the messages the run started from.
    pub messages: Vec<Message>,
    pub metrics: RunMetrics,
}

impl RunResult {
    pub(crate) fn empty(stop_reason: StopReason) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            final_output: String::new(),
            turns: Vec::new(),
            tool_calls_count: 0,
            total_turns: 0,
            stop_reason,
            messages: Vec::new(),
            metrics: RunMetrics::default(),
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.final_output
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.stop_reason.is_success()
    }

    pub fn turn(&self, number: u32) -> Option<&TurnRecord> {
        self.turns.iter().find(|t| t.turn == number)
    }

    /// All tool-call records in execution order.
    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCallRecord> {
        self.turns.iter().flat_map(|t| t.tool_calls.iter())
    }

    #[must_use]
    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }
}
