//! Turn-execution engine.

mod config;
mod events;
mod execution;
mod executor;
mod state;

#[cfg(test)]
mod tests;

pub use config::{AgentConfig, DEFAULT_MAX_TURNS, GuardScope};
pub use events::{RunResult, StopReason, ToolCallRecord, TurnRecord};
pub use executor::{Orchestrator, OrchestratorBuilder};
pub use state::{RunMetrics, ToolStats};
