//! Per-call execution context handed to tool handlers.

use tokio_util::sync::CancellationToken;

/// Context for a single tool invocation.
///
/// Cloning is cheap; the cancellation token is shared with the owning run.
#[derive(Debug, Clone)]
pub struct ToolContext {
    tool_name: String,
    call_id: String,
    run_id: Option<String>,
    cancel: CancellationToken,
}

impl ToolContext {
    pub fn new(
        tool_name: impl Into<String>,
        call_id: impl Into<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            call_id: call_id.into(),
            run_id: None,
            cancel,
        }
    }

    /// Context with a fresh, never-cancelled token. Useful outside a run.
    pub fn detached(tool_name: impl Into<String>) -> Self {
        Self::new(tool_name, String::new(), CancellationToken::new())
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the owning run is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}
