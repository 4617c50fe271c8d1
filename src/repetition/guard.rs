//! Sliding-window detector for repetitive tool calling.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::canonical::args_hash;
use super::config::RepetitionConfig;
use crate::types::Arguments;

/// Tool name plus canonical argument hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallSignature {
    pub tool: String,
    pub args_hash: u64,
}

impl CallSignature {
    pub fn new(tool: &str, args: &Arguments) -> Self {
        Self {
            tool: tool.to_string(),
            args_hash: args_hash(&serde_json::Value::Object(args.clone())),
        }
    }
}

/// Classification of a candidate call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Verdict {
    /// Same tool and arguments as each of the last `count` calls. Fatal.
    Repeat { tool: String, count: usize },
    /// One tool dominates the window. Warning only.
    Flood {
        tool: String,
        count: usize,
        window: usize,
    },
    /// Strict alternation between two signatures. Warning only.
    #[serde(rename = "pingpong")]
    PingPong {
        first: String,
        second: String,
        length: usize,
    },
}

impl Verdict {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Repeat { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Repeat { .. } => "repeat",
            Self::Flood { .. } => "flood",
            Self::PingPong { .. } => "pingpong",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Repeat { tool, count } => format!(
                "Loop detected: tool '{}' was already called {} times in a row with identical arguments",
                tool, count
            ),
            Self::Flood {
                tool,
                count,
                window,
            } => format!(
                "Warning: tool '{}' has been called {} times in the last {} calls. Consider a different approach.",
                tool, count, window
            ),
            Self::PingPong {
                first,
                second,
                length,
            } => format!(
                "Warning: alternating between '{}' and '{}' for {} calls without progress. Consider a different approach.",
                first, second, length
            ),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Bounded history of executed calls.
///
/// [`check`](Self::check) classifies a candidate against history without
/// mutating it; [`record`](Self::record) appends after execution.
#[derive(Debug, Clone, Default)]
pub struct RepetitionGuard {
    config: RepetitionConfig,
    history: VecDeque<CallSignature>,
}

impl RepetitionGuard {
    pub fn new(config: RepetitionConfig) -> Self {
        Self {
            history: VecDeque::with_capacity(config.window_size),
            config,
        }
    }

    pub fn config(&self) -> &RepetitionConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn history(&self) -> impl Iterator<Item = &CallSignature> {
        self.history.iter()
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }

    /// Evaluate detectors in order repeat, flood, ping-pong; first hit wins.
    pub fn check(&self, tool: &str, args: &Arguments) -> Option<Verdict> {
        let candidate = CallSignature::new(tool, args);

        if self.config.detect_repeat
            && let Some(verdict) = self.detect_repeat(&candidate)
        {
            return Some(verdict);
        }
        if self.config.detect_flood
            && let Some(verdict) = self.detect_flood(&candidate)
        {
            return Some(verdict);
        }
        if self.config.detect_pingpong {
            return self.detect_pingpong(&candidate);
        }
        None
    }

    pub fn record(&mut self, tool: &str, args: &Arguments) {
        self.history.push_back(CallSignature::new(tool, args));
        while self.history.len() > self.config.window_size {
            self.history.pop_front();
        }
    }

    fn detect_repeat(&self, candidate: &CallSignature) -> Option<Verdict> {
        let n = self.config.repeat_threshold;
        if n == 0 || self.history.len() < n {
            return None;
        }
        self.history
            .iter()
            .rev()
            .take(n)
            .all(|sig| sig == candidate)
            .then(|| Verdict::Repeat {
                tool: candidate.tool.clone(),
                count: n,
            })
    }

    fn detect_flood(&self, candidate: &CallSignature) -> Option<Verdict> {
        let window = self.config.window_size;
        let count = 1 + self
            .history
            .iter()
            .rev()
            .take(window.saturating_sub(1))
            .filter(|sig| sig.tool == candidate.tool)
            .count();

        (count > self.config.flood_threshold).then(|| Verdict::Flood {
            tool: candidate.tool.clone(),
            count,
            window,
        })
    }

    fn detect_pingpong(&self, candidate: &CallSignature) -> Option<Verdict> {
        let other = self.history.back()?;
        if other == candidate {
            return None;
        }

        // Walk back while the sequence keeps alternating candidate/other.
        let mut length = 1;
        for (i, sig) in self.history.iter().rev().enumerate() {
            let expected = if i % 2 == 0 { other } else { candidate };
            if sig != expected {
                break;
            }
            length += 1;
        }

        (length >= self.config.pingpong_length).then(|| Verdict::PingPong {
            first: candidate.tool.clone(),
            second: other.tool.clone(),
            length,
        })
    }
}
