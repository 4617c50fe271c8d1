//! Per-run execution metrics.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub model_calls: usize,
    pub model_time_ms: u64,
    pub tool_calls: usize,
    pub tool_errors: usize,
    pub tool_stats: HashMap<String, ToolStats>,
    pub capability_denials: usize,
    /// Flood and ping-pong warnings injected into the transcript.
    pub loop_warnings: usize,
    pub execution_time_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolStats {
    pub calls: usize,
    pub total_time_ms: u64,
    pub errors: usize,
}

impl RunMetrics {
    pub fn record_tool(&mut self, name: &str, duration_ms: u64, is_error: bool) {
        self.tool_calls += 1;
        let stats = self.tool_stats.entry(name.to_string()).or_default();
        stats.calls += 1;
        stats.total_time_ms += duration_ms;
        if is_error {
            stats.errors += 1;
            self.tool_errors += 1;
        }
    }

    pub fn record_model_call(&mut self, duration_ms: u64) {
        self.model_calls += 1;
        self.model_time_ms += duration_ms;
    }

    pub fn record_denial(&mut self) {
        self.capability_denials += 1;
    }

    pub fn record_loop_warning(&mut self) {
        self.loop_warnings += 1;
    }

    pub fn avg_tool_time_ms(&self) -> f64 {
        if self.tool_calls == 0 {
            return 0.0;
        }
        let total: u64 = self.tool_stats.values().map(|s| s.total_time_ms).sum();
        total as f64 / self.tool_calls as f64
    }
}
