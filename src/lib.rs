//! # agent-loop
//!
//! Turn-execution engine for tool-calling language-model agents.
//!
//! An [`Orchestrator`] alternates model calls with tool invocations for a
//! bounded number of turns. Along the way it enforces input/output guardrails,
//! checks a per-agent capability manifest, detects repetitive tool usage,
//! honours cancellation and optionally records a span tree per run.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use agent_loop::prelude::*;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> agent_loop::Result<()> {
//!     let model = ScriptedModel::new()
//!         .then(ModelResponse::tool_calls(vec![ToolCallRequest::from_json(
//!             "call_1",
//!             "get_weather",
//!             json!({"city": "Shanghai"}),
//!         )]))
//!         .then(ModelResponse::text("Shanghai is 25°C."));
//!
//!     let orchestrator = Orchestrator::builder(model)
//!         .tool(FnTool::new(
//!             ToolDefinition::new("get_weather", "Current weather")
//!                 .param(ParamSpec::string("city").required()),
//!             |_ctx, _args| async move { Ok(ToolOutput::text("25C")) },
//!         ))
//!         .build()?;
//!
//!     let result = orchestrator.execute("Weather in Shanghai?").await;
//!     assert_eq!(result.stop_reason, StopReason::Completed);
//!     println!("{}", result.text());
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod agent;
pub mod capability;
pub mod config;
pub mod hooks;
pub mod model;
pub mod observability;
pub mod policy;
pub mod prelude;
pub mod repetition;
pub mod tools;
pub mod types;

pub use agent::{
    AgentConfig, GuardScope, Orchestrator, OrchestratorBuilder, RunMetrics, RunResult, StopReason,
    ToolCallRecord, ToolStats, TurnRecord,
};
pub use capability::{CapabilityDecision, CapabilityGate, CapabilitySet, SkillCapability, ToolGrant};
pub use config::{ConfigBuilder, ConfigError, ConfigProvider, ConfigProviderExt};
pub use hooks::{FnObserver, HookEvent, HookManager, LoggingObserver, RunEvent, RunObserver};
pub use model::{ModelClient, ModelError, ModelRequest, ModelResponse, ScriptedModel};
pub use observability::{
    InMemorySink, MetricsRegistry, SpanKind, SpanRecord, SpanRecorder, SpanSink, SpanStatus,
    TracingSink,
};
pub use policy::{PolicyCheck, PolicyContext, PolicyDecision, PolicyGate, PolicyViolation};
pub use repetition::{RepetitionConfig, RepetitionGuard, Verdict};
pub use tools::{FnTool, SchemaTool, Tool, ToolCatalog, ToolContext};
pub use types::{
    Arguments, Message, ParamSpec, ParamType, Role, ToolCallRequest, ToolDefinition, ToolError,
    ToolOutput, ToolResult, ToolSchema,
};

/// Error type for agent-loop operations.
///
/// [`Orchestrator::run`] never returns these; they describe failures of
/// construction and loading, and are handed to observers as they happen.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The model call failed.
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// An input or output guardrail rejected the text.
    #[error("Guardrail violation: {0}")]
    Guardrail(#[from] PolicyViolation),

    /// The same call was about to be repeated past the configured threshold.
    #[error("{message}")]
    LoopDetected { message: String },

    /// Validation or execution of a tool call failed.
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Run cancelled")]
    Cancelled,

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Capability manifest could not be parsed.
    #[error("YAML parsing failed: {0}")]
    Yaml(#[from] serde_yaml_bw::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A policy pattern failed to compile.
    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),
}

/// Error category for unified error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Configuration, manifest or pattern errors
    Configuration,
    /// Model call failures
    Model,
    /// Guardrail and loop-detection tripwires
    Policy,
    /// Tool validation, denial or handler errors
    Tool,
    Cancellation,
    /// IO and serialization errors
    Internal,
}

impl Error {
    pub fn loop_detected(message: impl Into<String>) -> Self {
        Error::LoopDetected {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::Yaml(_) | Error::Regex(_) => ErrorCategory::Configuration,
            Error::Model(ModelError::Cancelled) | Error::Cancelled => ErrorCategory::Cancellation,
            Error::Model(_) => ErrorCategory::Model,
            Error::Guardrail(_) | Error::LoopDetected { .. } => ErrorCategory::Policy,
            Error::Tool(_) => ErrorCategory::Tool,
            Error::Json(_) | Error::Io(_) => ErrorCategory::Internal,
        }
    }

    /// Stop reason a run ends with when this error is fatal to it.
    ///
    /// `None` for errors the loop absorbs (tool failures) or that never
    /// occur inside a run.
    pub fn stop_reason(&self) -> Option<StopReason> {
        match self.category() {
            ErrorCategory::Cancellation => Some(StopReason::Cancelled),
            ErrorCategory::Model => Some(StopReason::Error),
            ErrorCategory::Policy => match self {
                Error::LoopDetected { .. } => Some(StopReason::LoopDetected),
                _ => Some(StopReason::Guardrail),
            },
            ErrorCategory::Tool | ErrorCategory::Configuration | ErrorCategory::Internal => None,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.stop_reason().is_some()
    }

    pub fn is_configuration_error(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }
}

pub type Result<T> = std::result::Result<T, Error>;
