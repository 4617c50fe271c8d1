//! Hierarchical run traces.
//!
//! A [`SpanRecorder`] starts one [`Trace`] per run. Every span opened on the
//! trace is a child of the run's root `agent` span and is exported to the
//! configured [`SpanSink`] when closed. A disabled recorder produces inert
//! traces: no ids are allocated and no records are built.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    Agent,
    ModelCall,
    ToolCall,
    PolicyCheck,
}

impl SpanKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::ModelCall => "model_call",
            Self::ToolCall => "tool_call",
            Self::PolicyCheck => "policy_check",
        }
    }
}

impl fmt::Display for SpanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanStatus {
    Ok,
    Error,
}

/// A closed span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanRecord {
    pub trace_id: String,
    pub id: u64,
    pub parent_id: Option<u64>,
    pub kind: SpanKind,
    pub name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    pub status: SpanStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl SpanRecord {
    pub fn duration_ms(&self) -> i64 {
        (self.ended_at - self.started_at).num_milliseconds()
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// Destination for closed spans. Shared sinks must tolerate concurrent runs.
pub trait SpanSink: Send + Sync {
    fn export(&self, span: SpanRecord);
}

/// Keeps every exported span in memory.
#[derive(Debug, Default)]
pub struct InMemorySink {
    spans: Mutex<Vec<SpanRecord>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SpanRecord>> {
        self.spans.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn spans(&self) -> Vec<SpanRecord> {
        self.lock().clone()
    }

    pub fn trace(&self, trace_id: &str) -> Vec<SpanRecord> {
        self.spans()
            .into_iter()
            .filter(|s| s.trace_id == trace_id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl SpanSink for InMemorySink {
    fn export(&self, span: SpanRecord) {
        self.lock().push(span);
    }
}

/// Forwards closed spans to `tracing` as events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl SpanSink for TracingSink {
    fn export(&self, span: SpanRecord) {
        match span.status {
            SpanStatus::Ok => tracing::debug!(
                target: "agent_loop::spans",
                trace_id = %span.trace_id,
                span_id = span.id,
                parent_id = ?span.parent_id,
                kind = span.kind.as_str(),
                name = %span.name,
                duration_ms = span.duration_ms(),
                attributes = ?span.attributes,
                "span closed"
            ),
            SpanStatus::Error => tracing::warn!(
                target: "agent_loop::spans",
                trace_id = %span.trace_id,
                span_id = span.id,
                parent_id = ?span.parent_id,
                kind = span.kind.as_str(),
                name = %span.name,
                duration_ms = span.duration_ms(),
                error = span.error.as_deref().unwrap_or_default(),
                "span failed"
            ),
        }
    }
}

/// Factory for per-run traces.
#[derive(Clone)]
pub struct SpanRecorder {
    sink: Arc<dyn SpanSink>,
    enabled: bool,
}

impl SpanRecorder {
    pub fn new(sink: Arc<dyn SpanSink>) -> Self {
        Self {
            sink,
            enabled: true,
        }
    }

    pub fn disabled() -> Self {
        Self {
            sink: Arc::new(TracingSink),
            enabled: false,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Start a trace whose root `agent` span opens now.
    pub fn new_trace(&self, trace_id: &str, name: &str) -> Trace {
        if !self.enabled {
            return Trace { inner: None };
        }
        Trace {
            inner: Some(TraceInner {
                sink: Arc::clone(&self.sink),
                trace_id: trace_id.to_string(),
                next_id: AtomicU64::new(2),
                root: OpenSpan::new(1, None, SpanKind::Agent, name),
            }),
        }
    }
}

impl Default for SpanRecorder {
    fn default() -> Self {
        Self::disabled()
    }
}

impl fmt::Debug for SpanRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpanRecorder")
            .field("enabled", &self.enabled)
            .finish()
    }
}

struct OpenSpan {
    id: u64,
    parent_id: Option<u64>,
    kind: SpanKind,
    name: String,
    attributes: BTreeMap<String, String>,
    started_at: DateTime<Utc>,
}

impl OpenSpan {
    fn new(id: u64, parent_id: Option<u64>, kind: SpanKind, name: &str) -> Self {
        Self {
            id,
            parent_id,
            kind,
            name: name.to_string(),
            attributes: BTreeMap::new(),
            started_at: Utc::now(),
        }
    }

    fn close(self, trace_id: &str, status: SpanStatus, error: Option<&str>) -> SpanRecord {
        SpanRecord {
            trace_id: trace_id.to_string(),
            id: self.id,
            parent_id: self.parent_id,
            kind: self.kind,
            name: self.name,
            attributes: self.attributes,
            status,
            error: error.map(str::to_string),
            started_at: self.started_at,
            ended_at: Utc::now(),
        }
    }
}

struct TraceInner {
    sink: Arc<dyn SpanSink>,
    trace_id: String,
    next_id: AtomicU64,
    root: OpenSpan,
}

/// One run's span tree.
pub struct Trace {
    inner: Option<TraceInner>,
}

impl Trace {
    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.inner.as_ref().map(|i| i.trace_id.as_str())
    }

    /// Attach an attribute to the root span.
    pub fn set_attribute(&mut self, key: &str, value: impl fmt::Display) {
        if let Some(ref mut inner) = self.inner {
            inner.root.attributes.insert(key.to_string(), value.to_string());
        }
    }

    pub fn open_span(&self, kind: SpanKind, name: &str) -> SpanHandle {
        SpanHandle(self.inner.as_ref().map(|inner| {
            let id = inner.next_id.fetch_add(1, Ordering::Relaxed);
            OpenSpan::new(id, Some(inner.root.id), kind, name)
        }))
    }

    pub fn close_span(&self, span: SpanHandle, status: SpanStatus, error: Option<&str>) {
        if let (Some(inner), Some(open)) = (&self.inner, span.0) {
            inner.sink.export(open.close(&inner.trace_id, status, error));
        }
    }

    /// Close the root span.
    pub fn finish(mut self, status: SpanStatus, error: Option<&str>) {
        self.close_root(status, error);
    }

    fn close_root(&mut self, status: SpanStatus, error: Option<&str>) {
        if let Some(inner) = self.inner.take() {
            let record = inner.root.close(&inner.trace_id, status, error);
            inner.sink.export(record);
        }
    }
}

// An unfinished trace still exports its root span.
impl Drop for Trace {
    fn drop(&mut self) {
        self.close_root(SpanStatus::Error, Some("dropped"));
    }
}

/// An open child span. Inert when tracing is disabled.
pub struct SpanHandle(Option<OpenSpan>);

impl SpanHandle {
    pub fn id(&self) -> Option<u64> {
        self.0.as_ref().map(|s| s.id)
    }

    pub fn set_attribute(&mut self, key: &str, value: impl fmt::Display) {
        if let Some(ref mut span) = self.0 {
            span.attributes.insert(key.to_string(), value.to_string());
        }
    }
}
