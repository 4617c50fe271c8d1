//! Ordered, panic-isolated observer dispatch.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use super::RunObserver;
use crate::agent::{ToolCallRecord, TurnRecord};
use crate::model::ModelResponse;
use crate::tools::panic_message;
use crate::types::{Arguments, Message};

#[derive(Clone, Default)]
pub struct HookManager {
    observers: Vec<Arc<dyn RunObserver>>,
}

impl HookManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<O: RunObserver + 'static>(&mut self, observer: O) {
        self.observers.push(Arc::new(observer));
    }

    pub fn register_arc(&mut self, observer: Arc<dyn RunObserver>) {
        self.observers.push(observer);
    }

    pub fn unregister(&mut self, name: &str) {
        self.observers.retain(|o| o.name() != name);
    }

    pub fn observer_names(&self) -> Vec<&str> {
        self.observers.iter().map(|o| o.name()).collect()
    }

    pub fn has_observer(&self, name: &str) -> bool {
        self.observers.iter().any(|o| o.name() == name)
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    fn each(&self, event: &'static str, f: impl Fn(&dyn RunObserver)) {
        for observer in &self.observers {
            let result = catch_unwind(AssertUnwindSafe(|| f(observer.as_ref())));
            if let Err(payload) = result {
                tracing::warn!(
                    observer = observer.name(),
                    event,
                    panic = %panic_message(payload.as_ref()),
                    "Observer panicked"
                );
            }
        }
    }

    pub fn model_call_start(&self, turn: u32, messages: &[Message]) {
        self.each("model_call_start", |o| o.on_model_call_start(turn, messages));
    }

    pub fn model_call_end(&self, turn: u32, response: &ModelResponse) {
        self.each("model_call_end", |o| o.on_model_call_end(turn, response));
    }

    pub fn tool_call_start(&self, name: &str, arguments: &Arguments) {
        self.each("tool_call_start", |o| o.on_tool_call_start(name, arguments));
    }

    pub fn tool_call_end(&self, record: &ToolCallRecord) {
        self.each("tool_call_end", |o| o.on_tool_call_end(record));
    }

    pub fn turn_end(&self, record: &TurnRecord) {
        self.each("turn_end", |o| o.on_turn_end(record));
    }

    pub fn error(&self, error: &crate::Error) {
        self.each("error", |o| o.on_error(error));
    }
}

impl std::fmt::Debug for HookManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookManager")
            .field("observers", &self.observer_names())
            .finish()
    }
}
