//! Orchestrator scenario tests.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use helpers::*;

use crate::agent::{GuardScope, StopReason};
use crate::capability::{CapabilitySet, SkillCapability, ToolGrant};
use crate::model::{ModelError, ModelResponse, ScriptedModel};
use crate::observability::{InMemorySink, MetricsRegistry, SpanKind, SpanStatus};
use crate::policy::{DenyPatterns, FnCheck, MaxLength, PolicyDecision};
use crate::repetition::RepetitionConfig;
use crate::tools::{FnTool, ToolContext};
use crate::types::{Message, Role, ToolDefinition, ToolOutput};

fn weather_script() -> ScriptedModel {
    ScriptedModel::new()
        .then(calls(vec![call(
            "call_1",
            "get_weather",
            json!({"city": "Shanghai"}),
        )]))
        .then(ModelResponse::text("Shanghai is 25°C."))
}

fn tool_messages(messages: &[Message]) -> Vec<&Message> {
    messages.iter().filter(|m| m.role == Role::Tool).collect()
}

// =============================================================================
// End-to-end
// =============================================================================

#[tokio::test]
async fn test_weather_scenario() {
    let model = Arc::new(weather_script());
    let counter = Counter::default();
    let orchestrator = builder(&model)
        .tool_arc(weather_tool(&counter))
        .build()
        .unwrap();

    let result = orchestrator.execute("What's the weather in Shanghai?").await;

    assert_eq!(result.stop_reason, StopReason::Completed);
    assert_eq!(result.final_output, "Shanghai is 25°C.");
    assert_eq!(result.tool_calls_count, 1);
    assert_eq!(result.total_turns, 2);
    assert_eq!(counter.get(), 1);
    assert_consistent(&result);

    let first = &result.turns[0];
    assert!(!first.is_final);
    assert_eq!(first.tool_calls[0].result.as_deref(), Some("25C"));
    assert_eq!(first.tool_calls[0].arguments["unit"], "celsius");
    assert!(result.turns[1].is_final);

    let roles: Vec<Role> = result.messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]
    );
    assert_eq!(result.messages[2].tool_call_id.as_deref(), Some("call_1"));
    assert_eq!(result.messages[2].content, "25C");

    // Second model call saw the tool result and the schema list.
    let request = model.last_request().unwrap();
    assert_eq!(request.messages.len(), 3);
    assert_eq!(request.tool_names, vec!["get_weather".to_string()]);
    assert_eq!(result.metrics.model_calls, 2);
}

#[tokio::test]
async fn test_transcript_order() {
    let model = Arc::new(ScriptedModel::new().then(ModelResponse::text("hi")));
    let orchestrator = builder(&model)
        .system_prompt("You are terse.")
        .build()
        .unwrap();

    let history = vec![Message::user("earlier"), Message::assistant("noted")];
    let result = orchestrator
        .run("now", &history, Some("User prefers metric units."), CancellationToken::new())
        .await;

    let contents: Vec<&str> = result.messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(
        contents,
        vec!["You are terse.", "User prefers metric units.", "earlier", "noted", "now", "hi"]
    );
    assert_eq!(result.messages[1].role, Role::System);
}

#[tokio::test]
async fn test_tool_context_is_populated() {
    let model = Arc::new(
        ScriptedModel::new()
            .then(calls(vec![call("call_9", "inspect", json!({}))]))
            .then(ModelResponse::text("ok")),
    );
    let orchestrator = builder(&model)
        .tool(FnTool::new(
            ToolDefinition::new("inspect", "Report context"),
            |ctx: ToolContext, _args| async move {
                Ok(ToolOutput::text(format!(
                    "{}/{}/{}",
                    ctx.tool_name(),
                    ctx.call_id(),
                    ctx.run_id().is_some()
                )))
            },
        ))
        .build()
        .unwrap();

    let result = orchestrator.execute("go").await;
    assert_eq!(
        result.turns[0].tool_calls[0].result.as_deref(),
        Some("inspect/call_9/true")
    );
}

// =============================================================================
// Tool-level failures are non-fatal
// =============================================================================

#[tokio::test]
async fn test_missing_required_argument() {
    let model = Arc::new(
        ScriptedModel::new()
            .then(calls(vec![call("c1", "get_weather", json!({}))]))
            .then(ModelResponse::text("I need a city.")),
    );
    let counter = Counter::default();
    let orchestrator = builder(&model)
        .tool_arc(weather_tool(&counter))
        .build()
        .unwrap();

    let result = orchestrator.execute("weather?").await;

    assert_eq!(result.stop_reason, StopReason::Completed);
    assert_eq!(counter.get(), 0);
    assert_eq!(model.call_count(), 2);
    let tool_msgs = tool_messages(&result.messages);
    assert_eq!(tool_msgs.len(), 1);
    assert!(tool_msgs[0].is_error);
    assert!(tool_msgs[0].content.contains("missing required argument 'city'"));
    assert!(result.turns[0].tool_calls[0].is_error());
    assert_consistent(&result);
}

#[tokio::test]
async fn test_invalid_enum_argument() {
    let model = Arc::new(
        ScriptedModel::new()
            .then(calls(vec![call(
                "c1",
                "get_weather",
                json!({"city": "Oslo", "unit": "kelvin"}),
            )]))
            .then(ModelResponse::text("sorry")),
    );
    let counter = Counter::default();
    let orchestrator = builder(&model)
        .tool_arc(weather_tool(&counter))
        .build()
        .unwrap();

    let result = orchestrator.execute("weather?").await;
    assert_eq!(counter.get(), 0);
    assert!(tool_messages(&result.messages)[0].content.contains("is not one of"));
}

#[tokio::test]
async fn test_unknown_tool() {
    let model = Arc::new(
        ScriptedModel::new()
            .then(calls(vec![call("c1", "teleport", json!({}))]))
            .then(ModelResponse::text("cannot")),
    );
    let orchestrator = builder(&model).build().unwrap();

    let result = orchestrator.execute("go").await;
    assert_eq!(result.stop_reason, StopReason::Completed);
    assert_eq!(
        tool_messages(&result.messages)[0].content,
        "unknown tool: teleport"
    );
}

#[tokio::test]
async fn test_handler_error_and_panic() {
    let model = Arc::new(
        ScriptedModel::new()
            .then(calls(vec![
                call("c1", "flaky", json!({})),
                call("c2", "bomb", json!({})),
            ]))
            .then(ModelResponse::text("recovered")),
    );
    let orchestrator = builder(&model)
        .tool_arc(failing_tool("flaky", "upstream timeout"))
        .tool_arc(panicking_tool("bomb"))
        .build()
        .unwrap();

    let result = orchestrator.execute("go").await;

    assert_eq!(result.stop_reason, StopReason::Completed);
    assert_eq!(result.final_output, "recovered");
    let records = &result.turns[0].tool_calls;
    assert_eq!(records.len(), 2);
    assert!(records[0].output_text().contains("upstream timeout"));
    assert!(records[1].output_text().contains("handler exploded"));
    assert_eq!(result.metrics.tool_errors, 2);
}

// =============================================================================
// Capability gate
// =============================================================================

#[tokio::test]
async fn test_capability_denial() {
    let model = Arc::new(
        ScriptedModel::new()
            .then(calls(vec![call("c1", "shell", json!({"value": "rm"}))]))
            .then(ModelResponse::text("not allowed")),
    );
    let shell_calls = Counter::default();
    let weather_calls = Counter::default();
    let orchestrator = builder(&model)
        .tool_arc(echo_tool("shell", &shell_calls))
        .tool_arc(weather_tool(&weather_calls))
        .capabilities(CapabilitySet::new().tool("get_weather"))
        .build()
        .unwrap();

    let result = orchestrator.execute("clean up").await;

    assert_eq!(result.stop_reason, StopReason::Completed);
    assert_eq!(shell_calls.get(), 0);
    let denial = tool_messages(&result.messages)[0];
    assert!(denial.is_error);
    assert!(denial.content.contains("not in the capability manifest"));
    assert_eq!(result.metrics.capability_denials, 1);
    assert_eq!(result.tool_calls_count, 1);
}

#[tokio::test]
async fn test_capability_grant_allows_skill_tool() {
    let model = Arc::new(
        ScriptedModel::new()
            .then(calls(vec![call("c1", "search", json!({"value": "rust"}))]))
            .then(ModelResponse::text("found")),
    );
    let counter = Counter::default();
    let sink = Arc::new(InMemorySink::new());
    let orchestrator = builder(&model)
        .tool_arc(echo_tool("search", &counter))
        .capabilities(
            CapabilitySet::new().skill(
                SkillCapability::new("research")
                    .grant("search", ToolGrant::new("standard").with_rate_limit(10, 60)),
            ),
        )
        .span_sink(sink.clone())
        .build()
        .unwrap();

    let result = orchestrator.execute("look it up").await;
    assert_eq!(counter.get(), 1);
    assert_eq!(result.stop_reason, StopReason::Completed);

    let tool_span = sink
        .spans()
        .into_iter()
        .find(|s| s.kind == SpanKind::ToolCall)
        .unwrap();
    assert_eq!(tool_span.attribute("skill"), Some("research"));
    assert_eq!(tool_span.attribute("tier"), Some("standard"));
}

// =============================================================================
// Repetition guard
// =============================================================================

#[tokio::test]
async fn test_consecutive_repeat_is_fatal() {
    let model = Arc::new(ScriptedModel::repeating(calls(vec![call(
        "c",
        "search",
        json!({"value": "same"}),
    )])));
    let counter = Counter::default();
    let orchestrator = builder(&model)
        .tool_arc(echo_tool("search", &counter))
        .build()
        .unwrap();

    let result = orchestrator.execute("loop").await;

    assert_eq!(result.stop_reason, StopReason::LoopDetected);
    assert_eq!(counter.get(), 3, "fourth call must never be dispatched");
    assert!(result.final_output.starts_with("Loop detected"));
    assert_eq!(result.tool_calls_count, 3);
    assert_eq!(result.total_turns, 4);
    assert!(result.turns[3].tool_calls.is_empty());
    assert_consistent(&result);
}

#[tokio::test]
async fn test_repeat_detected_across_number_spellings() {
    let mut model = ScriptedModel::new();
    for (i, n) in [json!(1), json!(1.0), json!(1), json!(1.0), json!(1)]
        .into_iter()
        .enumerate()
    {
        model = model.then(calls(vec![call(&format!("p{}", i), "page", json!({"value": n}))]));
    }
    let model = Arc::new(model.then(ModelResponse::text("paged")));
    let counter = Counter::default();
    let orchestrator = builder(&model)
        .tool_arc(echo_tool("page", &counter))
        .build()
        .unwrap();

    let result = orchestrator.execute("page through").await;

    assert_eq!(result.stop_reason, StopReason::LoopDetected);
    assert_eq!(counter.get(), 3);
    assert_consistent(&result);
}

#[tokio::test]
async fn test_flood_warning_is_not_fatal() {
    let mut requests = vec![
        call("c0", "read", json!({"value": "a"})),
        call("c1", "list", json!({})),
    ];
    for (i, v) in ["b", "c", "d", "e", "f"].iter().enumerate() {
        requests.push(call(&format!("r{}", i), "read", json!({"value": v})));
    }
    let model = Arc::new(
        ScriptedModel::new()
            .then(calls(requests))
            .then(ModelResponse::text("done reading")),
    );
    let reads = Counter::default();
    let lists = Counter::default();
    let orchestrator = builder(&model)
        .tool_arc(echo_tool("read", &reads))
        .tool_arc(echo_tool("list", &lists))
        .build()
        .unwrap();

    let result = orchestrator.execute("read everything").await;

    assert_eq!(result.stop_reason, StopReason::Completed);
    assert_eq!(reads.get(), 6);
    let warnings: Vec<&Message> = result
        .messages
        .iter()
        .filter(|m| m.role == Role::System && m.content.contains("has been called"))
        .collect();
    assert!(!warnings.is_empty());
    assert!(result.metrics.loop_warnings >= 1);
    assert_eq!(result.tool_calls_count, 7);
}

#[tokio::test]
async fn test_pingpong_warning() {
    let model = Arc::new(
        ScriptedModel::new()
            .then(calls(vec![
                call("c1", "open", json!({"value": 1})),
                call("c2", "close", json!({"value": 1})),
                call("c3", "open", json!({"value": 1})),
                call("c4", "close", json!({"value": 1})),
            ]))
            .then(ModelResponse::text("stuck")),
    );
    let counter = Counter::default();
    let orchestrator = builder(&model)
        .tool_arc(echo_tool("open", &counter))
        .tool_arc(echo_tool("close", &counter))
        .build()
        .unwrap();

    let result = orchestrator.execute("toggle").await;

    assert_eq!(result.stop_reason, StopReason::Completed);
    assert_eq!(counter.get(), 4);
    assert_eq!(result.metrics.loop_warnings, 1);
    assert!(
        result
            .messages
            .iter()
            .any(|m| m.role == Role::System && m.content.contains("alternating"))
    );
}

#[tokio::test]
async fn test_per_run_guard_starts_fresh() {
    let script = || calls(vec![call("c", "search", json!({"value": "x"}))]);
    let model = Arc::new(
        ScriptedModel::new()
            .then(script())
            .then(script())
            .then(ModelResponse::text("a"))
            .then(script())
            .then(ModelResponse::text("b")),
    );
    let counter = Counter::default();
    let orchestrator = builder(&model)
        .tool_arc(echo_tool("search", &counter))
        .build()
        .unwrap();

    assert_eq!(orchestrator.execute("one").await.stop_reason, StopReason::Completed);
    assert_eq!(orchestrator.execute("two").await.stop_reason, StopReason::Completed);
    assert_eq!(counter.get(), 3);
    assert_eq!(orchestrator.repetition_history_len(), 0);
}

#[tokio::test]
async fn test_shared_guard_carries_history() {
    let script = || calls(vec![call("c", "search", json!({"value": "x"}))]);
    let model = Arc::new(
        ScriptedModel::new()
            .then(script())
            .then(script())
            .then(ModelResponse::text("a"))
            .then(script())
            .then(ModelResponse::text("b"))
            .then(script())
            .then(ModelResponse::text("c")),
    );
    let counter = Counter::default();
    let orchestrator = builder(&model)
        .tool_arc(echo_tool("search", &counter))
        .guard_scope(GuardScope::Shared)
        .build()
        .unwrap();

    assert_eq!(orchestrator.execute("one").await.stop_reason, StopReason::Completed);
    assert_eq!(orchestrator.repetition_history_len(), 2);

    // Third identical call in a row across runs is still fine; the fourth is not.
    assert_eq!(orchestrator.execute("two").await.stop_reason, StopReason::Completed);
    orchestrator.reset_repetition_history();
    assert_eq!(orchestrator.repetition_history_len(), 0);

    assert_eq!(orchestrator.execute("three").await.stop_reason, StopReason::Completed);
    assert_eq!(counter.get(), 4);
}

#[tokio::test]
async fn test_shared_guard_detects_loop_across_runs() {
    let model = Arc::new(ScriptedModel::repeating(calls(vec![call(
        "c",
        "search",
        json!({"value": "x"}),
    )])));
    let counter = Counter::default();
    let orchestrator = builder(&model)
        .tool_arc(echo_tool("search", &counter))
        .guard_scope(GuardScope::Shared)
        .max_turns(2)
        .build()
        .unwrap();

    assert_eq!(orchestrator.execute("one").await.stop_reason, StopReason::MaxTurns);
    let second = orchestrator.execute("two").await;
    assert_eq!(second.stop_reason, StopReason::LoopDetected);
    assert_eq!(counter.get(), 3);
}

#[tokio::test]
async fn test_disabled_detectors() {
    let model = Arc::new(ScriptedModel::repeating(calls(vec![call(
        "c",
        "search",
        json!({"value": "x"}),
    )])));
    let counter = Counter::default();
    let orchestrator = builder(&model)
        .tool_arc(echo_tool("search", &counter))
        .repetition(RepetitionConfig::disabled())
        .max_turns(5)
        .build()
        .unwrap();

    let result = orchestrator.execute("loop").await;
    assert_eq!(result.stop_reason, StopReason::MaxTurns);
    assert_eq!(counter.get(), 5);
}

// =============================================================================
// Policy gate
// =============================================================================

#[tokio::test]
async fn test_input_guardrail_skips_model() {
    let model = Arc::new(ScriptedModel::repeating(ModelResponse::text("never")));
    let orchestrator = builder(&model)
        .input_check(FnCheck::new("always_fail", |_, _| {
            PolicyDecision::fail("blocked input")
        }))
        .build()
        .unwrap();

    let result = orchestrator.execute("hello").await;

    assert_eq!(result.stop_reason, StopReason::Guardrail);
    assert_eq!(model.call_count(), 0);
    assert!(result.turns.is_empty());
    assert_eq!(result.final_output, "blocked input");
}

#[tokio::test]
async fn test_input_guardrail_passes() {
    let model = Arc::new(ScriptedModel::new().then(ModelResponse::text("fine")));
    let orchestrator = builder(&model)
        .input_check(MaxLength::new(100))
        .build()
        .unwrap();

    let result = orchestrator.execute("short").await;
    assert_eq!(result.stop_reason, StopReason::Completed);
}

#[tokio::test]
async fn test_output_guardrail_keeps_text_out_of_transcript() {
    let model = Arc::new(ScriptedModel::new().then(ModelResponse::text("the password is hunter2")));
    let observer = RecordingObserver::default();
    let orchestrator = builder(&model)
        .output_check(DenyPatterns::new([r"password"]).unwrap().named("secrets"))
        .observer(observer.clone())
        .build()
        .unwrap();

    let result = orchestrator.execute("tell me").await;

    assert_eq!(result.stop_reason, StopReason::Guardrail);
    assert_eq!(result.total_turns, 1);
    assert!(!result.turns[0].is_final);
    assert_eq!(result.turns[0].model_output, "the password is hunter2");
    assert_eq!(result.final_output, "matched denied pattern 'password'");
    assert!(result.messages.iter().all(|m| !m.content.contains("hunter2")));
    assert!(observer.events().contains(&"error:Policy".to_string()));
}

#[tokio::test]
async fn test_output_check_skipped_for_empty_text() {
    let model = Arc::new(ScriptedModel::new().then(ModelResponse::text("")));
    let orchestrator = builder(&model)
        .output_check(FnCheck::new("never_empty", |_, _| PolicyDecision::fail("x")))
        .build()
        .unwrap();

    let result = orchestrator.execute("hi").await;
    assert_eq!(result.stop_reason, StopReason::Completed);
}

// =============================================================================
// Model failures, cancellation and limits
// =============================================================================

#[tokio::test]
async fn test_model_error() {
    let model = Arc::new(ScriptedModel::new().then_error(ModelError::provider("503")));
    let observer = RecordingObserver::default();
    let orchestrator = builder(&model).observer(observer.clone()).build().unwrap();

    let result = orchestrator.execute("hi").await;

    assert_eq!(result.stop_reason, StopReason::Error);
    assert_eq!(result.final_output, "model provider error: 503");
    assert!(result.turns.is_empty());
    assert_eq!(
        observer.events(),
        vec!["model_call_start:1".to_string(), "error:Model".to_string()]
    );
}

#[tokio::test]
async fn test_model_error_after_tool_turn_keeps_turns() {
    let model = Arc::new(
        ScriptedModel::new()
            .then(calls(vec![call("c1", "get_weather", json!({"city": "Rome"}))]))
            .then_error(ModelError::provider("late")),
    );
    let counter = Counter::default();
    let orchestrator = builder(&model)
        .tool_arc(weather_tool(&counter))
        .build()
        .unwrap();

    let result = orchestrator.execute("hi").await;
    assert_eq!(result.stop_reason, StopReason::Error);
    assert_eq!(result.total_turns, 1);
    assert_eq!(result.tool_calls_count, 1);
    assert_consistent(&result);
}

#[tokio::test]
async fn test_cancelled_model_error() {
    let model = Arc::new(ScriptedModel::new().then_error(ModelError::Cancelled));
    let orchestrator = builder(&model).build().unwrap();

    let result = orchestrator.execute("hi").await;
    assert_eq!(result.stop_reason, StopReason::Cancelled);
}

#[tokio::test]
async fn test_cancel_before_first_turn() {
    let model = Arc::new(ScriptedModel::repeating(ModelResponse::text("never")));
    let orchestrator = builder(&model).build().unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = orchestrator.run("hi", &[], None, cancel).await;

    assert_eq!(result.stop_reason, StopReason::Cancelled);
    assert!(result.turns.is_empty());
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn test_cancel_between_tool_calls() {
    let model = Arc::new(
        ScriptedModel::new()
            .then(calls(vec![
                call("c1", "stop", json!({})),
                call("c2", "after", json!({})),
            ]))
            .then(ModelResponse::text("unreachable")),
    );
    let after = Counter::default();
    let orchestrator = builder(&model)
        .tool(FnTool::new(
            ToolDefinition::new("stop", "Cancels the run"),
            |ctx: ToolContext, _args| async move {
                ctx.cancellation_token().cancel();
                Ok(ToolOutput::text("stopping"))
            },
        ))
        .tool_arc(echo_tool("after", &after))
        .build()
        .unwrap();

    let caller_token = CancellationToken::new();
    let result = orchestrator
        .run("go", &[], None, caller_token.clone())
        .await;

    assert_eq!(result.stop_reason, StopReason::Cancelled);
    assert_eq!(after.get(), 0);
    assert_eq!(model.call_count(), 1);
    assert_eq!(result.total_turns, 1);
    assert_eq!(result.tool_calls_count, 1);
    assert!(!caller_token.is_cancelled());
    assert_consistent(&result);
}

#[tokio::test]
async fn test_timeout_cancels_run() {
    let model = Arc::new(ScriptedModel::repeating(calls(vec![call(
        "c",
        "wait",
        json!({}),
    )])));
    let orchestrator = builder(&model)
        .tool(FnTool::new(
            ToolDefinition::new("wait", "Waits for cancellation"),
            |ctx: ToolContext, _args| async move {
                ctx.cancelled().await;
                Ok(ToolOutput::text("interrupted"))
            },
        ))
        .timeout(Duration::from_millis(50))
        .build()
        .unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), orchestrator.execute("wait"))
        .await
        .unwrap();

    assert_eq!(result.stop_reason, StopReason::Cancelled);
    assert_eq!(result.total_turns, 1);
}

#[tokio::test]
async fn test_max_turns_uses_last_output() {
    let model = Arc::new(ScriptedModel::repeating(
        calls(vec![call("c", "search", json!({"value": "x"}))]).with_text("still searching"),
    ));
    let counter = Counter::default();
    let orchestrator = builder(&model)
        .tool_arc(echo_tool("search", &counter))
        .max_turns(2)
        .build()
        .unwrap();

    let result = orchestrator.execute("find").await;

    assert_eq!(result.stop_reason, StopReason::MaxTurns);
    assert_eq!(result.final_output, "still searching");
    assert_eq!(result.total_turns, 2);
    assert!(result.turns.iter().all(|t| !t.is_final));
    assert_consistent(&result);
}

// =============================================================================
// Observers, spans and metrics
// =============================================================================

#[tokio::test]
async fn test_observer_order() {
    let model = Arc::new(weather_script());
    let observer = RecordingObserver::default();
    let counter = Counter::default();
    let orchestrator = builder(&model)
        .tool_arc(weather_tool(&counter))
        .observer(observer.clone())
        .build()
        .unwrap();

    orchestrator.execute("weather").await;

    assert_eq!(
        observer.events(),
        vec![
            "model_call_start:1",
            "model_call_end:1",
            "tool_call_start:get_weather",
            "tool_call_end:get_weather",
            "turn_end:1",
            "model_call_start:2",
            "model_call_end:2",
            "turn_end:2",
        ]
    );
}

#[tokio::test]
async fn test_denied_call_reports_end_without_start() {
    let model = Arc::new(
        ScriptedModel::new()
            .then(calls(vec![call("c1", "get_weather", json!({"city": "Oslo"}))]))
            .then(ModelResponse::text("ok")),
    );
    let observer = RecordingObserver::default();
    let counter = Counter::default();
    let orchestrator = builder(&model)
        .tool_arc(weather_tool(&counter))
        .capabilities(CapabilitySet::new().tool("other"))
        .observer(observer.clone())
        .build()
        .unwrap();

    orchestrator.execute("weather").await;

    let events = observer.events();
    assert!(!events.iter().any(|e| e.starts_with("tool_call_start")));
    assert!(events.contains(&"tool_call_end:get_weather".to_string()));
    assert!(events.contains(&"error:Tool".to_string()));
}

#[tokio::test]
async fn test_panicking_observer_does_not_break_run() {
    let model = Arc::new(weather_script());
    let counter = Counter::default();
    let orchestrator = builder(&model)
        .tool_arc(weather_tool(&counter))
        .observer(crate::hooks::FnObserver::new("bad", |_| panic!("observer bug")))
        .build()
        .unwrap();

    let result = orchestrator.execute("weather").await;
    assert_eq!(result.stop_reason, StopReason::Completed);
}

#[tokio::test]
async fn test_span_tree() {
    let model = Arc::new(weather_script());
    let sink = Arc::new(InMemorySink::new());
    let counter = Counter::default();
    let orchestrator = builder(&model)
        .tool_arc(weather_tool(&counter))
        .input_check(MaxLength::new(1000))
        .span_sink(sink.clone())
        .build()
        .unwrap();

    let result = orchestrator.execute("weather").await;
    let spans = sink.trace(&result.run_id);

    let root = spans.iter().find(|s| s.kind == SpanKind::Agent).unwrap();
    assert_eq!(root.parent_id, None);
    assert_eq!(root.status, SpanStatus::Ok);
    assert_eq!(root.attribute("stop_reason"), Some("completed"));

    let children: Vec<_> = spans.iter().filter(|s| s.kind != SpanKind::Agent).collect();
    assert!(children.iter().all(|s| s.parent_id == Some(root.id)));
    let kinds: Vec<SpanKind> = children.iter().map(|s| s.kind).collect();
    assert_eq!(
        kinds,
        vec![
            SpanKind::PolicyCheck,
            SpanKind::ModelCall,
            SpanKind::ToolCall,
            SpanKind::ModelCall
        ]
    );
    assert_eq!(spans.len(), 5);
}

#[tokio::test]
async fn test_tracing_disabled_records_nothing() {
    let model = Arc::new(weather_script());
    let sink = Arc::new(InMemorySink::new());
    let counter = Counter::default();
    let orchestrator = builder(&model)
        .tool_arc(weather_tool(&counter))
        .span_sink(sink.clone())
        .tracing(false)
        .build()
        .unwrap();

    orchestrator.execute("weather").await;
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_dropped_run_releases_gauge_and_trace() {
    let registry = Arc::new(MetricsRegistry::new());
    let sink = Arc::new(InMemorySink::new());
    let model = Arc::new(ScriptedModel::repeating(calls(vec![call(
        "c",
        "hang",
        json!({}),
    )])));
    let orchestrator = builder(&model)
        .tool(FnTool::new(
            ToolDefinition::new("hang", "Never returns"),
            |_ctx, _args| std::future::pending::<crate::types::ToolResult>(),
        ))
        .metrics(registry.clone())
        .span_sink(sink.clone())
        .build()
        .unwrap();

    let outcome =
        tokio::time::timeout(Duration::from_millis(50), orchestrator.execute("hang")).await;

    assert!(outcome.is_err());
    assert_eq!(registry.summary().total_runs, 1);
    assert_eq!(registry.active_runs.get(), 0);
    let root = sink
        .spans()
        .into_iter()
        .find(|s| s.kind == SpanKind::Agent)
        .unwrap();
    assert_eq!(root.status, SpanStatus::Error);
    assert_eq!(root.error.as_deref(), Some("dropped"));
}

#[tokio::test]
async fn test_metrics_registry() {
    let registry = Arc::new(MetricsRegistry::new());
    let model = Arc::new(weather_script().then_error(ModelError::provider("down")));
    let counter = Counter::default();
    let orchestrator = builder(&model)
        .tool_arc(weather_tool(&counter))
        .metrics(registry.clone())
        .build()
        .unwrap();

    orchestrator.execute("first").await;
    orchestrator.execute("second").await;

    let summary = registry.summary();
    assert_eq!(summary.total_runs, 2);
    assert_eq!(summary.completed_runs, 1);
    assert_eq!(summary.total_tool_calls, 1);
    assert_eq!(registry.runs_with(StopReason::Error), 1);
}
