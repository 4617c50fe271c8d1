//! Run tracing and metrics.
//!
//! Traces are opt-in per orchestrator:
//!
//! ```rust
//! use std::sync::Arc;
//! use agent_loop::observability::{InMemorySink, SpanKind, SpanRecorder, SpanStatus};
//!
//! let sink = Arc::new(InMemorySink::new());
//! let recorder = SpanRecorder::new(sink.clone());
//!
//! let trace = recorder.new_trace("run-1", "agent");
//! let span = trace.open_span(SpanKind::ToolCall, "get_weather");
//! trace.close_span(span, SpanStatus::Ok, None);
//! trace.finish(SpanStatus::Ok, None);
//!
//! assert_eq!(sink.len(), 2);
//! ```

mod metrics;
mod spans;

pub use metrics::{Counter, Gauge, Histogram, MetricsRegistry, MetricsSummary};
pub use spans::{
    InMemorySink, SpanHandle, SpanKind, SpanRecord, SpanRecorder, SpanSink, SpanStatus, Trace,
    TracingSink,
};
