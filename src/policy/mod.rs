//! Input and output guardrails with tripwire semantics.
//!
//! Checks run in registration order and the first failure wins:
//!
//! ```rust
//! use agent_loop::policy::{MaxLength, PolicyContext, PolicyGate};
//!
//! let gate = PolicyGate::new().input(MaxLength::new(5));
//! assert!(gate.check_input("hello world", &PolicyContext::input()).is_err());
//! ```

mod builtin;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use builtin::{DenyPatterns, FnCheck, MaxLength};

/// Which side of the model call a check guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyStage {
    Input,
    Output,
}

impl fmt::Display for PolicyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Output => f.write_str("output"),
        }
    }
}

/// Auxiliary metadata passed to checks alongside the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyContext {
    pub stage: PolicyStage,
    /// Turn that produced the text; 0 for the user input.
    pub turn: u32,
}

impl PolicyContext {
    pub fn input() -> Self {
        Self {
            stage: PolicyStage::Input,
            turn: 0,
        }
    }

    pub fn output(turn: u32) -> Self {
        Self {
            stage: PolicyStage::Output,
            turn,
        }
    }
}

/// Outcome of a single check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    Pass,
    Fail(String),
}

impl PolicyDecision {
    pub fn pass() -> Self {
        Self::Pass
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail(message.into())
    }

    pub fn passed(&self) -> bool {
        matches!(self, Self::Pass)
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Pass => None,
            Self::Fail(message) => Some(message),
        }
    }
}

/// A pure check over text. Must not mutate shared state.
pub trait PolicyCheck: Send + Sync {
    fn name(&self) -> &str;
    fn check(&self, text: &str, context: &PolicyContext) -> PolicyDecision;
}

/// The first failing check of a gate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{stage} guardrail '{check}' triggered: {message}")]
pub struct PolicyViolation {
    pub check: String,
    pub stage: PolicyStage,
    pub message: String,
}

/// Ordered input and output check lists.
#[derive(Clone, Default)]
pub struct PolicyGate {
    input: Vec<Arc<dyn PolicyCheck>>,
    output: Vec<Arc<dyn PolicyCheck>>,
}

impl PolicyGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input<C: PolicyCheck + 'static>(mut self, check: C) -> Self {
        self.input.push(Arc::new(check));
        self
    }

    pub fn output<C: PolicyCheck + 'static>(mut self, check: C) -> Self {
        self.output.push(Arc::new(check));
        self
    }

    pub fn add_input(&mut self, check: Arc<dyn PolicyCheck>) {
        self.input.push(check);
    }

    pub fn add_output(&mut self, check: Arc<dyn PolicyCheck>) {
        self.output.push(check);
    }

    pub fn has_input_checks(&self) -> bool {
        !self.input.is_empty()
    }

    pub fn has_output_checks(&self) -> bool {
        !self.output.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.input.is_empty() && self.output.is_empty()
    }

    pub fn check_input(&self, text: &str, context: &PolicyContext) -> Result<(), PolicyViolation> {
        run_checks(&self.input, text, context)
    }

    pub fn check_output(&self, text: &str, context: &PolicyContext) -> Result<(), PolicyViolation> {
        run_checks(&self.output, text, context)
    }
}

impl fmt::Debug for PolicyGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |checks: &[Arc<dyn PolicyCheck>]| {
            checks.iter().map(|c| c.name().to_string()).collect::<Vec<_>>()
        };
        f.debug_struct("PolicyGate")
            .field("input", &names(&self.input))
            .field("output", &names(&self.output))
            .finish()
    }
}

fn run_checks(
    checks: &[Arc<dyn PolicyCheck>],
    text: &str,
    context: &PolicyContext,
) -> Result<(), PolicyViolation> {
    for check in checks {
        if let PolicyDecision::Fail(message) = check.check(text, context) {
            return Err(PolicyViolation {
                check: check.name().to_string(),
                stage: context.stage,
                message,
            });
        }
    }
    Ok(())
}
