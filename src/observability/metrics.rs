//! Cross-run metrics aggregation.
//!
//! A [`MetricsRegistry`] can be shared by several orchestrators; every run
//! folds its [`RunMetrics`](crate::agent::RunMetrics) into it when it ends.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use dashmap::DashMap;

use crate::agent::{RunResult, StopReason};

/// Thread-safe atomic counter.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Thread-safe atomic gauge.
#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicI64,
}

impl Gauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        self.value.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Fixed-bucket histogram.
#[derive(Debug)]
pub struct Histogram {
    buckets: Vec<AtomicU64>,
    bucket_bounds: Vec<f64>,
    sum: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    pub fn new(bucket_bounds: Vec<f64>) -> Self {
        let buckets = (0..=bucket_bounds.len())
            .map(|_| AtomicU64::new(0))
            .collect();
        Self {
            buckets,
            bucket_bounds,
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    pub fn default_latency() -> Self {
        Self::new(vec![
            10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0, 10000.0, 30000.0, 60000.0,
        ])
    }

    pub fn observe(&self, value: f64) {
        let idx = self
            .bucket_bounds
            .iter()
            .position(|&bound| value <= bound)
            .unwrap_or(self.bucket_bounds.len());

        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
        self.sum.fetch_add((value * 1000.0) as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Observations per bucket; the last bucket is the overflow bucket.
    pub fn bucket_counts(&self) -> Vec<u64> {
        self.buckets
            .iter()
            .map(|b| b.load(Ordering::Relaxed))
            .collect()
    }

    /// Sum in the original unit; stored scaled by 1000.
    pub fn sum_ms(&self) -> f64 {
        self.sum.load(Ordering::Relaxed) as f64 / 1000.0
    }
}

/// Counters shared across runs.
#[derive(Debug)]
pub struct MetricsRegistry {
    pub runs_total: Counter,
    pub active_runs: Gauge,
    pub turns_total: Counter,
    pub model_calls: Counter,
    pub tool_calls: Counter,
    pub tool_errors: Counter,
    pub capability_denials: Counter,
    pub loop_warnings: Counter,
    pub run_latency_ms: Histogram,
    stop_reasons: DashMap<StopReason, u64>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            runs_total: Counter::new(),
            active_runs: Gauge::new(),
            turns_total: Counter::new(),
            model_calls: Counter::new(),
            tool_calls: Counter::new(),
            tool_errors: Counter::new(),
            capability_denials: Counter::new(),
            loop_warnings: Counter::new(),
            run_latency_ms: Histogram::default_latency(),
            stop_reasons: DashMap::new(),
        }
    }

    pub fn record_run_start(&self) {
        self.runs_total.inc();
        self.active_runs.inc();
    }

    /// A run whose future was dropped before it produced a result.
    pub fn record_run_dropped(&self) {
        self.active_runs.dec();
    }

    pub fn record_run_end(&self, result: &RunResult) {
        self.active_runs.dec();

        let metrics = &result.metrics;
        self.turns_total.add(result.total_turns as u64);
        self.model_calls.add(metrics.model_calls as u64);
        self.tool_calls.add(result.tool_calls_count as u64);
        self.tool_errors.add(metrics.tool_errors as u64);
        self.capability_denials.add(metrics.capability_denials as u64);
        self.loop_warnings.add(metrics.loop_warnings as u64);
        self.run_latency_ms.observe(metrics.execution_time_ms as f64);
        *self.stop_reasons.entry(result.stop_reason).or_default() += 1;
    }

    pub fn runs_with(&self, reason: StopReason) -> u64 {
        self.stop_reasons.get(&reason).map(|c| *c).unwrap_or(0)
    }

    pub fn summary(&self) -> MetricsSummary {
        let count = self.run_latency_ms.count();
        let avg_latency_ms = if count > 0 {
            self.run_latency_ms.sum_ms() / count as f64
        } else {
            0.0
        };

        MetricsSummary {
            total_runs: self.runs_total.get(),
            completed_runs: self.runs_with(StopReason::Completed),
            total_turns: self.turns_total.get(),
            total_tool_calls: self.tool_calls.get(),
            failed_tool_calls: self.tool_errors.get(),
            avg_latency_ms,
        }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of a [`MetricsRegistry`] for display.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSummary {
    pub total_runs: u64,
    pub completed_runs: u64,
    pub total_turns: u64,
    pub total_tool_calls: u64,
    pub failed_tool_calls: u64,
    pub avg_latency_ms: f64,
}
