//! Test helpers for orchestrator scenarios.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::agent::{Orchestrator, OrchestratorBuilder, ToolCallRecord, TurnRecord};
use crate::hooks::RunObserver;
use crate::model::{ModelResponse, ScriptedModel};
use crate::tools::{FnTool, Tool};
use crate::types::{
    Arguments, Message, ParamSpec, ToolCallRequest, ToolDefinition, ToolError, ToolOutput,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn call(id: &str, name: &str, args: serde_json::Value) -> ToolCallRequest {
    ToolCallRequest::from_json(id, name, args)
}

pub fn calls(requests: Vec<ToolCallRequest>) -> ModelResponse {
    ModelResponse::tool_calls(requests)
}

pub fn builder(model: &Arc<ScriptedModel>) -> OrchestratorBuilder {
    init_tracing();
    Orchestrator::with_model(model.clone())
}

/// Shared invocation counter for a test tool.
#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// `get_weather(city)` answering "25C" for every city.
pub fn weather_tool(counter: &Counter) -> Arc<dyn Tool> {
    let counter = counter.clone();
    Arc::new(FnTool::new(
        ToolDefinition::new("get_weather", "Current weather for a city")
            .param(ParamSpec::string("city").required())
            .param(
                ParamSpec::string("unit")
                    .default_value("celsius")
                    .one_of(["celsius", "fahrenheit"]),
            ),
        move |_ctx, _args| {
            counter.bump();
            async move { Ok(ToolOutput::text("25C")) }
        },
    ))
}

/// Tool that echoes its `value` argument.
pub fn echo_tool(name: &str, counter: &Counter) -> Arc<dyn Tool> {
    let counter = counter.clone();
    Arc::new(FnTool::new(
        ToolDefinition::new(name, "Echo the value argument").param(ParamSpec::new(
            "value",
            crate::types::ParamType::Any,
        )),
        move |ctx, args| {
            counter.bump();
            async move {
                Ok(ToolOutput::text(format!(
                    "{}:{}",
                    ctx.tool_name(),
                    args.get("value").cloned().unwrap_or_default()
                )))
            }
        },
    ))
}

pub fn failing_tool(name: &str, message: &str) -> Arc<dyn Tool> {
    let message = message.to_string();
    Arc::new(FnTool::new(
        ToolDefinition::new(name, "Always fails"),
        move |_ctx, _args| {
            let message = message.clone();
            async move { Err(ToolError::execution_failed(message)) }
        },
    ))
}

pub fn panicking_tool(name: &str) -> Arc<dyn Tool> {
    Arc::new(FnTool::new(
        ToolDefinition::new(name, "Panics when called"),
        |_ctx, _args: Arguments| async move {
            if true {
                panic!("handler exploded");
            }
            Ok(ToolOutput::empty())
        },
    ))
}

/// Records every observer callback as `event:detail`.
#[derive(Clone, Default)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<String>>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl RunObserver for RecordingObserver {
    fn name(&self) -> &str {
        "recording"
    }

    fn on_model_call_start(&self, turn: u32, _messages: &[Message]) {
        self.push(format!("model_call_start:{}", turn));
    }

    fn on_model_call_end(&self, turn: u32, _response: &ModelResponse) {
        self.push(format!("model_call_end:{}", turn));
    }

    fn on_tool_call_start(&self, name: &str, _arguments: &Arguments) {
        self.push(format!("tool_call_start:{}", name));
    }

    fn on_tool_call_end(&self, record: &ToolCallRecord) {
        self.push(format!("tool_call_end:{}", record.tool_name));
    }

    fn on_turn_end(&self, record: &TurnRecord) {
        self.push(format!("turn_end:{}", record.turn));
    }

    fn on_error(&self, error: &crate::Error) {
        self.push(format!("error:{:?}", error.category()));
    }
}

/// Every run-level invariant that must hold regardless of stop reason.
pub fn assert_consistent(result: &crate::agent::RunResult) {
    assert_eq!(result.total_turns, result.turns.len());
    assert_eq!(result.tool_calls_count, result.tool_calls().count());
    for (i, turn) in result.turns.iter().enumerate() {
        assert_eq!(turn.turn as usize, i + 1, "turn numbers must be 1..N");
    }
    let finals = result.turns.iter().filter(|t| t.is_final).count();
    assert!(finals <= 1);
    if finals == 1 {
        assert!(result.turns.last().is_some_and(|t| t.is_final));
    }
}
