//! Built-in policy checks.

use regex::Regex;

use super::{PolicyCheck, PolicyContext, PolicyDecision};

/// Rejects text longer than a character limit.
#[derive(Debug, Clone)]
pub struct MaxLength {
    max_chars: usize,
}

impl MaxLength {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }
}

impl PolicyCheck for MaxLength {
    fn name(&self) -> &str {
        "max_length"
    }

    fn check(&self, text: &str, _context: &PolicyContext) -> PolicyDecision {
        let len = text.chars().count();
        if len > self.max_chars {
            PolicyDecision::fail(format!(
                "text is {} characters, limit is {}",
                len, self.max_chars
            ))
        } else {
            PolicyDecision::pass()
        }
    }
}

/// Rejects text matching any of a list of regular expressions.
#[derive(Debug, Clone)]
pub struct DenyPatterns {
    name: String,
    patterns: Vec<Regex>,
}

impl DenyPatterns {
    pub fn new<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            name: "deny_patterns".to_string(),
            patterns,
        })
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl PolicyCheck for DenyPatterns {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, text: &str, _context: &PolicyContext) -> PolicyDecision {
        match self.patterns.iter().find(|re| re.is_match(text)) {
            Some(re) => PolicyDecision::fail(format!("matched denied pattern '{}'", re.as_str())),
            None => PolicyDecision::pass(),
        }
    }
}

/// Check backed by a closure.
pub struct FnCheck<F> {
    name: String,
    check: F,
}

impl<F> FnCheck<F>
where
    F: Fn(&str, &PolicyContext) -> PolicyDecision + Send + Sync,
{
    pub fn new(name: impl Into<String>, check: F) -> Self {
        Self {
            name: name.into(),
            check,
        }
    }
}

impl<F> PolicyCheck for FnCheck<F>
where
    F: Fn(&str, &PolicyContext) -> PolicyDecision + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, text: &str, context: &PolicyContext) -> PolicyDecision {
        (self.check)(text, context)
    }
}
