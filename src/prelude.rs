//! Prelude module for convenient imports.
//!
//! ```rust
//! use agent_loop::prelude::*;
//! ```

// Core types
pub use crate::Error;
pub use crate::Result;
pub use crate::agent::{
    AgentConfig, GuardScope, Orchestrator, RunResult, StopReason, ToolCallRecord, TurnRecord,
};

// Model
pub use crate::model::{ModelClient, ModelError, ModelRequest, ModelResponse, ScriptedModel};

// Tools
pub use crate::tools::{FnTool, SchemaTool, Tool, ToolCatalog, ToolContext};
pub use crate::types::{
    Arguments, Message, ParamSpec, Role, ToolCallRequest, ToolDefinition, ToolError, ToolOutput,
    ToolResult,
};

// Gates
pub use crate::capability::{CapabilitySet, SkillCapability, ToolGrant};
pub use crate::policy::{DenyPatterns, FnCheck, MaxLength, PolicyDecision, PolicyGate};
pub use crate::repetition::RepetitionConfig;

// Observability
pub use crate::hooks::{HookManager, RunObserver};
pub use crate::observability::{InMemorySink, SpanRecorder};
