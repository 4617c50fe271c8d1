//! Orchestrator configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, ConfigProvider, ConfigProviderExt, ConfigResult};
use crate::repetition::RepetitionConfig;

pub const DEFAULT_MAX_TURNS: u32 = 10;

/// Lifetime of the repetition history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardScope {
    /// Every run starts with an empty history.
    #[default]
    PerRun,
    /// History carries over between sequential runs on one orchestrator.
    Shared,
}

impl GuardScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PerRun => "per_run",
            Self::Shared => "shared",
        }
    }
}

impl fmt::Display for GuardScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GuardScope {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "per_run" | "run" => Ok(Self::PerRun),
            "shared" => Ok(Self::Shared),
            other => Err(ConfigError::invalid(
                "agent.guard_scope",
                format!("unknown scope '{}', expected per_run or shared", other),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    pub system_prompt: Option<String>,
    pub max_turns: u32,
    /// Run deadline. Expiry cancels the run.
    #[serde(rename = "timeout_ms", with = "timeout_ms")]
    pub timeout: Option<Duration>,
    /// Record spans for every run.
    pub tracing: bool,
    pub repetition: RepetitionConfig,
    pub guard_scope: GuardScope,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "agent".to_string(),
            system_prompt: None,
            max_turns: DEFAULT_MAX_TURNS,
            timeout: None,
            tracing: false,
            repetition: RepetitionConfig::default(),
            guard_scope: GuardScope::PerRun,
        }
    }
}

impl AgentConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.tracing = enabled;
        self
    }

    pub fn with_repetition(mut self, repetition: RepetitionConfig) -> Self {
        self.repetition = repetition;
        self
    }

    pub fn with_guard_scope(mut self, scope: GuardScope) -> Self {
        self.guard_scope = scope;
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_turns == 0 {
            return Err(ConfigError::invalid("agent.max_turns", "must be at least 1"));
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::invalid(
                "agent.timeout_ms",
                "must be greater than zero",
            ));
        }
        self.repetition.validate()
    }

    /// Read overrides from `provider` on top of the defaults, then validate.
    pub async fn load<P>(provider: &P) -> crate::Result<Self>
    where
        P: ConfigProvider + ?Sized,
    {
        let mut config = Self::default();

        if let Some(name) = provider.get::<String>("agent.name").await? {
            config.name = name;
        }
        if let Some(prompt) = provider.get::<String>("agent.system_prompt").await? {
            config.system_prompt = Some(prompt);
        }
        if let Some(max_turns) = provider.get::<u32>("agent.max_turns").await? {
            config.max_turns = max_turns;
        }
        if let Some(ms) = provider.get::<u64>("agent.timeout_ms").await? {
            config.timeout = Some(Duration::from_millis(ms));
        }
        if let Some(enabled) = provider.get::<bool>("agent.tracing").await? {
            config.tracing = enabled;
        }
        if let Some(scope) = provider.get::<String>("agent.guard_scope").await? {
            config.guard_scope = scope.parse::<GuardScope>()?;
        }

        let repetition = &mut config.repetition;
        if let Some(v) = provider.get::<usize>("repetition.window_size").await? {
            repetition.window_size = v;
        }
        if let Some(v) = provider.get::<usize>("repetition.repeat_threshold").await? {
            repetition.repeat_threshold = v;
        }
        if let Some(v) = provider.get::<usize>("repetition.flood_threshold").await? {
            repetition.flood_threshold = v;
        }
        if let Some(v) = provider.get::<usize>("repetition.pingpong_length").await? {
            repetition.pingpong_length = v;
        }

        config.validate()?;
        tracing::debug!(
            name = %config.name,
            max_turns = config.max_turns,
            guard_scope = %config.guard_scope,
            "Loaded agent configuration"
        );
        Ok(config)
    }
}

mod timeout_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}
