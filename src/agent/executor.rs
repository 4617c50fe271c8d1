//! Orchestrator structure and construction.

use std::sync::{Arc, Mutex, PoisonError};

use super::config::{AgentConfig, GuardScope};
use crate::capability::{CapabilityGate, CapabilitySet};
use crate::hooks::{HookManager, RunObserver};
use crate::model::ModelClient;
use crate::observability::{MetricsRegistry, SpanRecorder, SpanSink, TracingSink};
use crate::policy::{PolicyCheck, PolicyGate};
use crate::repetition::{RepetitionConfig, RepetitionGuard};
use crate::tools::{Tool, ToolCatalog};

/// Drives the bounded model/tool loop for one agent.
///
/// The catalog, span sink and metrics registry may be shared with other
/// orchestrators; everything else belongs to this instance.
pub struct Orchestrator {
    pub(crate) model: Arc<dyn ModelClient>,
    pub(crate) tools: ToolCatalog,
    pub(crate) policy: PolicyGate,
    pub(crate) capabilities: CapabilityGate,
    pub(crate) hooks: HookManager,
    pub(crate) spans: SpanRecorder,
    pub(crate) metrics: Option<Arc<MetricsRegistry>>,
    pub(crate) config: AgentConfig,
    pub(crate) shared_guard: Mutex<RepetitionGuard>,
}

impl Orchestrator {
    pub fn builder(model: impl ModelClient + 'static) -> OrchestratorBuilder {
        OrchestratorBuilder::new(Arc::new(model))
    }

    pub fn with_model(model: Arc<dyn ModelClient>) -> OrchestratorBuilder {
        OrchestratorBuilder::new(model)
    }

    #[must_use]
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    #[must_use]
    pub fn tools(&self) -> &ToolCatalog {
        &self.tools
    }

    #[must_use]
    pub fn hooks(&self) -> &HookManager {
        &self.hooks
    }

    #[must_use]
    pub fn policy(&self) -> &PolicyGate {
        &self.policy
    }

    #[must_use]
    pub fn capabilities(&self) -> &CapabilityGate {
        &self.capabilities
    }

    pub fn metrics(&self) -> Option<&Arc<MetricsRegistry>> {
        self.metrics.as_ref()
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Clear the history carried between runs under [`GuardScope::Shared`].
    pub fn reset_repetition_history(&self) {
        self.shared_guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reset();
    }

    /// Number of calls in the carried-over history.
    pub fn repetition_history_len(&self) -> usize {
        self.shared_guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub(crate) fn start_guard(&self) -> RepetitionGuard {
        match self.config.guard_scope {
            GuardScope::PerRun => RepetitionGuard::new(self.config.repetition.clone()),
            GuardScope::Shared => self
                .shared_guard
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }

    pub(crate) fn finish_guard(&self, guard: RepetitionGuard) {
        if self.config.guard_scope == GuardScope::Shared {
            *self
                .shared_guard
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = guard;
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("model", &self.model.name())
            .field("tools", &self.tools.names())
            .field("observers", &self.hooks.observer_names())
            .field("config", &self.config)
            .finish()
    }
}

pub struct OrchestratorBuilder {
    model: Arc<dyn ModelClient>,
    tools: ToolCatalog,
    policy: PolicyGate,
    capabilities: CapabilityGate,
    hooks: HookManager,
    sink: Option<Arc<dyn SpanSink>>,
    metrics: Option<Arc<MetricsRegistry>>,
    config: AgentConfig,
}

impl OrchestratorBuilder {
    pub fn new(model: Arc<dyn ModelClient>) -> Self {
        Self {
            model,
            tools: ToolCatalog::new(),
            policy: PolicyGate::new(),
            capabilities: CapabilityGate::unrestricted(),
            hooks: HookManager::new(),
            sink: None,
            metrics: None,
            config: AgentConfig::default(),
        }
    }

    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn max_turns(mut self, max_turns: u32) -> Self {
        self.config.max_turns = max_turns;
        self
    }

    pub fn timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    pub fn repetition(mut self, repetition: RepetitionConfig) -> Self {
        self.config.repetition = repetition;
        self
    }

    pub fn guard_scope(mut self, scope: GuardScope) -> Self {
        self.config.guard_scope = scope;
        self
    }

    /// Share an existing catalog; registrations made later stay visible.
    pub fn catalog(mut self, tools: ToolCatalog) -> Self {
        self.tools = tools;
        self
    }

    pub fn tool<T: Tool + 'static>(self, tool: T) -> Self {
        self.tools.register(tool);
        self
    }

    pub fn tool_arc(self, tool: Arc<dyn Tool>) -> Self {
        self.tools.register_arc(tool);
        self
    }

    pub fn policy(mut self, policy: PolicyGate) -> Self {
        self.policy = policy;
        self
    }

    pub fn input_check<C: PolicyCheck + 'static>(mut self, check: C) -> Self {
        self.policy.add_input(Arc::new(check));
        self
    }

    pub fn output_check<C: PolicyCheck + 'static>(mut self, check: C) -> Self {
        self.policy.add_output(Arc::new(check));
        self
    }

    pub fn capabilities(mut self, set: CapabilitySet) -> Self {
        self.capabilities = CapabilityGate::new(set);
        self
    }

    pub fn capability_gate(mut self, gate: CapabilityGate) -> Self {
        self.capabilities = gate;
        self
    }

    pub fn observer<O: RunObserver + 'static>(mut self, observer: O) -> Self {
        self.hooks.register(observer);
        self
    }

    pub fn observer_arc(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.hooks.register_arc(observer);
        self
    }

    pub fn hooks(mut self, hooks: HookManager) -> Self {
        self.hooks = hooks;
        self
    }

    /// Enable tracing into `sink`.
    pub fn span_sink(mut self, sink: Arc<dyn SpanSink>) -> Self {
        self.sink = Some(sink);
        self.config.tracing = true;
        self
    }

    pub fn tracing(mut self, enabled: bool) -> Self {
        self.config.tracing = enabled;
        self
    }

    pub fn metrics(mut self, registry: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(registry);
        self
    }

    pub fn build(self) -> crate::Result<Orchestrator> {
        self.config.validate()?;

        let sink = self.sink.unwrap_or_else(|| Arc::new(TracingSink));
        let spans = SpanRecorder::new(sink).with_enabled(self.config.tracing);
        let shared_guard = Mutex::new(RepetitionGuard::new(self.config.repetition.clone()));

        tracing::debug!(
            name = %self.config.name,
            tools = self.tools.len(),
            observers = self.hooks.len(),
            restricted = self.capabilities.is_restricted(),
            "Built orchestrator"
        );

        Ok(Orchestrator {
            model: self.model,
            tools: self.tools,
            policy: self.policy,
            capabilities: self.capabilities,
            hooks: self.hooks,
            spans,
            metrics: self.metrics,
            config: self.config,
            shared_guard,
        })
    }
}
