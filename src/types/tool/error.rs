//! Tool error types.

use thiserror::Error;

/// Errors produced while validating or executing a tool call.
///
/// Every variant is non-fatal to a run: the orchestrator renders it as a
/// tool-role message so the model can adapt on the next turn.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("missing required argument '{argument}' for tool {tool}")]
    MissingArgument { tool: String, argument: String },

    #[error("invalid argument '{argument}' for tool {tool}: {message}")]
    InvalidArgument {
        tool: String,
        argument: String,
        message: String,
    },

    #[error("permission denied: {tool}: {reason}")]
    PermissionDenied { tool: String, reason: String },

    #[error("execution failed: {message}")]
    ExecutionFailed { message: String },

    #[error("tool {tool} panicked: {message}")]
    Panicked { tool: String, message: String },
}

impl ToolError {
    pub fn unknown_tool(name: impl Into<String>) -> Self {
        Self::UnknownTool { name: name.into() }
    }

    pub fn missing_argument(tool: impl Into<String>, argument: impl Into<String>) -> Self {
        Self::MissingArgument {
            tool: tool.into(),
            argument: argument.into(),
        }
    }

    pub fn invalid_argument(
        tool: impl Into<String>,
        argument: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidArgument {
            tool: tool.into(),
            argument: argument.into(),
            message: message.into(),
        }
    }

    pub fn permission_denied(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PermissionDenied {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    pub fn execution_failed(message: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            message: message.into(),
        }
    }

    pub fn panicked(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Panicked {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// True for errors raised before the handler ran (argument validation).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::UnknownTool { .. } | Self::MissingArgument { .. } | Self::InvalidArgument { .. }
        )
    }

    pub fn contains(&self, pattern: &str) -> bool {
        self.to_string().contains(pattern)
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        Self::execution_failed(err.to_string())
    }
}
