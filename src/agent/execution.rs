//! The bounded model/tool loop.

use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::events::{RunResult, StopReason, ToolCallRecord, TurnRecord};
use super::executor::Orchestrator;
use super::state::RunMetrics;
use crate::model::{ModelRequest, ModelResponse};
use crate::observability::{MetricsRegistry, SpanHandle, SpanKind, SpanStatus, Trace};
use crate::policy::{PolicyContext, PolicyStage, PolicyViolation};
use crate::repetition::RepetitionGuard;
use crate::tools::ToolContext;
use crate::types::{Message, ToolCallRequest, ToolError, ToolSchema};

/// Mutable state of one run. Never shared between runs.
struct RunContext {
    run_id: String,
    trace: Trace,
    messages: Vec<Message>,
    turns: Vec<TurnRecord>,
    metrics: RunMetrics,
    guard: RepetitionGuard,
    final_output: String,
}

enum CallOutcome {
    Recorded(ToolCallRecord),
    /// A fatal repetition verdict; carries the guard's message.
    LoopDetected(String),
}

/// Cancels the run token when the deadline passes; aborted on drop.
struct Deadline(JoinHandle<()>);

impl Deadline {
    fn start(token: CancellationToken, timeout: Duration) -> Self {
        Self(tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => {
                    warn!(timeout_ms = timeout.as_millis() as u64, "Run deadline exceeded, cancelling");
                    token.cancel();
                }
                _ = token.cancelled() => {}
            }
        }))
    }
}

impl Drop for Deadline {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Keeps the registry's active-run gauge balanced if the run future is dropped.
struct ActiveRun<'a>(Option<&'a MetricsRegistry>);

impl<'a> ActiveRun<'a> {
    fn start(registry: Option<&'a MetricsRegistry>) -> Self {
        if let Some(registry) = registry {
            registry.record_run_start();
        }
        Self(registry)
    }

    fn end(mut self, result: &RunResult) {
        if let Some(registry) = self.0.take() {
            registry.record_run_end(result);
        }
    }
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        if let Some(registry) = self.0.take() {
            warn!("Run dropped before finishing");
            registry.record_run_dropped();
        }
    }
}

impl Orchestrator {
    /// Run `input` with no history, extra context or external cancellation.
    pub async fn execute(&self, input: &str) -> RunResult {
        self.run(input, &[], None, CancellationToken::new()).await
    }

    /// Execute one run. Failures are folded into [`RunResult::stop_reason`].
    ///
    /// The transcript starts with the system prompt, then `extra_context` as a
    /// second system message, then `history`, then `input` as a user message.
    #[instrument(skip_all, fields(agent = %self.config.name, run_id = tracing::field::Empty))]
    pub async fn run(
        &self,
        input: &str,
        history: &[Message],
        extra_context: Option<&str>,
        cancel: CancellationToken,
    ) -> RunResult {
        let started = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        tracing::Span::current().record("run_id", run_id.as_str());

        let active = ActiveRun::start(self.metrics.as_deref());

        // The deadline trips a child so the caller's token is left untouched.
        let cancel = cancel.child_token();
        let _deadline = self
            .config
            .timeout
            .map(|timeout| Deadline::start(cancel.clone(), timeout));

        let mut trace = self.spans.new_trace(&run_id, &self.config.name);
        trace.set_attribute("model", self.model.name());

        let mut ctx = RunContext {
            run_id,
            trace,
            messages: self.initial_transcript(input, history, extra_context),
            turns: Vec::new(),
            metrics: RunMetrics::default(),
            guard: self.start_guard(),
            final_output: String::new(),
        };

        info!(
            input_len = input.len(),
            history = history.len(),
            tools = self.tools.len(),
            "Starting run"
        );

        let stop_reason = self.drive(&mut ctx, input, &cancel).await;
        self.finish(ctx, stop_reason, started, active)
    }

    fn initial_transcript(
        &self,
        input: &str,
        history: &[Message],
        extra_context: Option<&str>,
    ) -> Vec<Message> {
        let mut messages = Vec::with_capacity(history.len() + 3);
        if let Some(prompt) = self.config.system_prompt.as_deref().filter(|p| !p.is_empty()) {
            messages.push(Message::system(prompt));
        }
        if let Some(context) = extra_context.filter(|c| !c.is_empty()) {
            messages.push(Message::system(context));
        }
        messages.extend_from_slice(history);
        messages.push(Message::user(input));
        messages
    }

    async fn drive(
        &self,
        ctx: &mut RunContext,
        input: &str,
        cancel: &CancellationToken,
    ) -> StopReason {
        if cancel.is_cancelled() {
            debug!("Cancelled before the first turn");
            return StopReason::Cancelled;
        }

        if self.policy.has_input_checks()
            && let Err(violation) = self.check_policy(ctx, input, PolicyContext::input())
        {
            ctx.final_output = violation.message;
            return StopReason::Guardrail;
        }

        let schemas = self.tools.schemas();
        let mut last_output: Option<String> = None;

        for turn in 1..=self.config.max_turns {
            if cancel.is_cancelled() {
                debug!(turn, "Cancelled at turn start");
                ctx.final_output = last_output.unwrap_or_default();
                return StopReason::Cancelled;
            }

            debug!(turn, messages = ctx.messages.len(), "Starting turn");

            let response = match self.call_model(ctx, turn, &schemas, cancel).await {
                Ok(response) => response,
                Err(reason) => return reason,
            };
            last_output = Some(response.text.clone());

            if !response.has_tool_calls() {
                return self.finish_turn(ctx, turn, response.text);
            }

            let ModelResponse { text, tool_calls } = response;
            ctx.messages
                .push(Message::assistant_with_tool_calls(text.clone(), tool_calls.clone()));

            let mut record = TurnRecord::new(turn, text);
            let mut terminal = None;

            for call in &tool_calls {
                if cancel.is_cancelled() {
                    debug!(turn, tool = %call.name, "Cancelled before tool dispatch");
                    terminal = Some(StopReason::Cancelled);
                    break;
                }

                match self.execute_call(ctx, turn, call, cancel).await {
                    CallOutcome::Recorded(call_record) => record.tool_calls.push(call_record),
                    CallOutcome::LoopDetected(message) => {
                        ctx.final_output = message;
                        terminal = Some(StopReason::LoopDetected);
                        break;
                    }
                }
            }

            self.hooks.turn_end(&record);
            ctx.turns.push(record);

            if let Some(reason) = terminal {
                if reason == StopReason::Cancelled {
                    ctx.final_output = last_output.unwrap_or_default();
                }
                return reason;
            }
        }

        warn!(max_turns = self.config.max_turns, "Max turns reached");
        ctx.final_output = last_output.unwrap_or_default();
        StopReason::MaxTurns
    }

    async fn call_model(
        &self,
        ctx: &mut RunContext,
        turn: u32,
        schemas: &[ToolSchema],
        cancel: &CancellationToken,
    ) -> Result<ModelResponse, StopReason> {
        self.hooks.model_call_start(turn, &ctx.messages);

        let mut span = ctx.trace.open_span(SpanKind::ModelCall, self.model.name());
        span.set_attribute("turn", turn);

        let started = Instant::now();
        let result = self
            .model
            .complete(ModelRequest {
                messages: &ctx.messages,
                tools: schemas,
                cancel,
            })
            .await;
        let duration_ms = started.elapsed().as_millis() as u64;
        ctx.metrics.record_model_call(duration_ms);

        match result {
            Ok(response) => {
                debug!(
                    turn,
                    duration_ms,
                    tool_calls = response.tool_calls.len(),
                    "Model call completed"
                );
                span.set_attribute("tool_calls", response.tool_calls.len());
                ctx.trace.close_span(span, SpanStatus::Ok, None);
                self.hooks.model_call_end(turn, &response);
                Ok(response)
            }
            Err(e) if e.is_cancelled() || cancel.is_cancelled() => {
                debug!(turn, error = %e, "Model call cancelled");
                ctx.trace
                    .close_span(span, SpanStatus::Error, Some("cancelled"));
                self.hooks.error(&crate::Error::Cancelled);
                Err(StopReason::Cancelled)
            }
            Err(e) => {
                warn!(turn, error = %e, "Model call failed");
                let message = e.to_string();
                ctx.trace
                    .close_span(span, SpanStatus::Error, Some(&message));
                self.hooks.error(&crate::Error::Model(e));
                ctx.final_output = message;
                Err(StopReason::Error)
            }
        }
    }

    /// Handle a response without tool calls: output checks, then completion.
    fn finish_turn(&self, ctx: &mut RunContext, turn: u32, text: String) -> StopReason {
        if !text.is_empty()
            && self.policy.has_output_checks()
            && let Err(violation) = self.check_policy(ctx, &text, PolicyContext::output(turn))
        {
            // Kept for audit, but the rejected text never enters the transcript.
            let record = TurnRecord::new(turn, text);
            self.hooks.turn_end(&record);
            ctx.turns.push(record);
            ctx.final_output = violation.message;
            return StopReason::Guardrail;
        }

        ctx.messages.push(Message::assistant(text.clone()));
        let mut record = TurnRecord::new(turn, text.clone());
        record.is_final = true;
        self.hooks.turn_end(&record);
        ctx.turns.push(record);
        ctx.final_output = text;
        StopReason::Completed
    }

    fn check_policy(
        &self,
        ctx: &RunContext,
        text: &str,
        policy: PolicyContext,
    ) -> Result<(), PolicyViolation> {
        let mut span = ctx
            .trace
            .open_span(SpanKind::PolicyCheck, &policy.stage.to_string());
        span.set_attribute("turn", policy.turn);

        let result = match policy.stage {
            PolicyStage::Input => self.policy.check_input(text, &policy),
            PolicyStage::Output => self.policy.check_output(text, &policy),
        };

        match result {
            Ok(()) => {
                ctx.trace.close_span(span, SpanStatus::Ok, None);
                Ok(())
            }
            Err(violation) => {
                warn!(
                    stage = %violation.stage,
                    check = %violation.check,
                    message = %violation.message,
                    "Guardrail triggered"
                );
                span.set_attribute("check", &violation.check);
                ctx.trace
                    .close_span(span, SpanStatus::Error, Some(&violation.message));
                self.hooks
                    .error(&crate::Error::Guardrail(violation.clone()));
                Err(violation)
            }
        }
    }

    /// Gate, validate, loop-check and run one requested call.
    async fn execute_call(
        &self,
        ctx: &mut RunContext,
        turn: u32,
        call: &ToolCallRequest,
        cancel: &CancellationToken,
    ) -> CallOutcome {
        let mut span = ctx.trace.open_span(SpanKind::ToolCall, &call.name);
        span.set_attribute("call_id", &call.id);
        span.set_attribute("turn", turn);

        let decision = self.capabilities.evaluate(&call.name);
        if !decision.allowed {
            let reason = decision
                .reason
                .unwrap_or_else(|| format!("tool '{}' is not permitted", call.name));
            warn!(tool = %call.name, reason = %reason, "Tool call denied");
            ctx.metrics.record_denial();
            let error = ToolError::permission_denied(&call.name, reason);
            return CallOutcome::Recorded(self.reject(ctx, call, error, span));
        }
        if let Some(ref skill) = decision.skill {
            span.set_attribute("skill", skill);
        }
        if let Some(ref grant) = decision.grant {
            span.set_attribute("tier", &grant.tier);
        }

        let prepared = match self.tools.prepare(&call.name, call.arguments.clone()) {
            Ok(prepared) => prepared,
            Err(error) => {
                debug!(tool = %call.name, error = %error, "Tool call rejected");
                return CallOutcome::Recorded(self.reject(ctx, call, error, span));
            }
        };
        let arguments = prepared.arguments().clone();

        if let Some(verdict) = ctx.guard.check(&call.name, &arguments) {
            let message = verdict.message();
            if verdict.is_fatal() {
                warn!(tool = %call.name, verdict = verdict.kind(), "Loop detected, aborting run");
                ctx.trace.close_span(span, SpanStatus::Error, Some(&message));
                self.hooks.error(&crate::Error::LoopDetected {
                    message: message.clone(),
                });
                return CallOutcome::LoopDetected(message);
            }
            warn!(tool = %call.name, verdict = verdict.kind(), "Injecting loop warning");
            span.set_attribute("loop_warning", verdict.kind());
            ctx.metrics.record_loop_warning();
            ctx.messages.push(Message::system(message));
        }

        self.hooks.tool_call_start(&call.name, &arguments);

        let tool_ctx = ToolContext::new(&call.name, &call.id, cancel.clone())
            .with_run_id(ctx.run_id.as_str());
        let started = Instant::now();
        let result = prepared.invoke(&tool_ctx).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        ctx.guard.record(&call.name, &arguments);
        ctx.metrics
            .record_tool(&call.name, duration_ms, result.is_err());
        debug!(tool = %call.name, duration_ms, is_error = result.is_err(), "Tool call completed");

        let record = match result {
            Ok(output) => {
                let text = output.to_text();
                ctx.messages
                    .push(Message::tool_result(&call.id, &call.name, text.as_str()));
                ctx.trace.close_span(span, SpanStatus::Ok, None);
                ToolCallRecord::success(&call.id, &call.name, arguments, text)
            }
            Err(error) => {
                let text = error.to_string();
                ctx.messages
                    .push(Message::tool_error(&call.id, &call.name, text.as_str()));
                ctx.trace.close_span(span, SpanStatus::Error, Some(&text));
                self.hooks.error(&crate::Error::Tool(error));
                ToolCallRecord::failure(&call.id, &call.name, arguments, text)
            }
        }
        .with_duration(duration_ms);

        self.hooks.tool_call_end(&record);
        CallOutcome::Recorded(record)
    }

    /// Record a call that never reached its handler.
    fn reject(
        &self,
        ctx: &mut RunContext,
        call: &ToolCallRequest,
        error: ToolError,
        span: SpanHandle,
    ) -> ToolCallRecord {
        let text = error.to_string();
        ctx.messages
            .push(Message::tool_error(&call.id, &call.name, text.as_str()));
        ctx.metrics.record_tool(&call.name, 0, true);
        ctx.trace.close_span(span, SpanStatus::Error, Some(&text));
        self.hooks.error(&crate::Error::Tool(error));

        let record = ToolCallRecord::failure(&call.id, &call.name, call.arguments.clone(), text);
        self.hooks.tool_call_end(&record);
        record
    }

    fn finish(
        &self,
        ctx: RunContext,
        stop_reason: StopReason,
        started: Instant,
        active: ActiveRun<'_>,
    ) -> RunResult {
        let RunContext {
            run_id,
            mut trace,
            messages,
            turns,
            mut metrics,
            guard,
            final_output,
        } = ctx;

        self.finish_guard(guard);
        metrics.execution_time_ms = started.elapsed().as_millis() as u64;

        let tool_calls_count = turns.iter().map(|t| t.tool_calls.len()).sum();
        trace.set_attribute("stop_reason", stop_reason);
        trace.set_attribute("turns", turns.len());
        trace.set_attribute("tool_calls", tool_calls_count);
        match stop_reason {
            StopReason::Completed => trace.finish(SpanStatus::Ok, None),
            StopReason::Error | StopReason::Guardrail | StopReason::LoopDetected => {
                trace.finish(SpanStatus::Error, Some(&final_output))
            }
            StopReason::MaxTurns | StopReason::Cancelled => {
                trace.finish(SpanStatus::Error, Some(stop_reason.as_str()))
            }
        }

        let result = RunResult {
            run_id,
            final_output,
            total_turns: turns.len(),
            tool_calls_count,
            turns,
            stop_reason,
            messages,
            metrics,
        };

        active.end(&result);

        info!(
            stop_reason = %result.stop_reason,
            turns = result.total_turns,
            tool_calls = result.tool_calls_count,
            model_calls = result.metrics.model_calls,
            execution_time_ms = result.metrics.execution_time_ms,
            "Run finished"
        );

        result
    }
}
