//! Per-agent tool allow-lists with optional grant metadata.
//!
//! A manifest is written in YAML:
//!
//! ```yaml
//! tools: [get_weather]
//! skills:
//!   - name: research
//!     tools: [read_file]
//!     grants:
//!       web_search:
//!         tier: standard
//!         rate_limit: { max_calls: 10, period_secs: 60 }
//! ```

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Call budget attached to a grant. Carried as metadata, not enforced here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    pub max_calls: u32,
    pub period_secs: u64,
}

/// Permission metadata for one tool within one skill.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ToolGrant {
    #[serde(default)]
    pub tier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimit>,
}

impl ToolGrant {
    pub fn new(tier: impl Into<String>) -> Self {
        Self {
            tier: tier.into(),
            rate_limit: None,
        }
    }

    pub fn with_rate_limit(mut self, max_calls: u32, period_secs: u64) -> Self {
        self.rate_limit = Some(RateLimit {
            max_calls,
            period_secs,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SkillCapability {
    pub name: String,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub grants: HashMap<String, ToolGrant>,
}

impl SkillCapability {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn tool(mut self, tool: impl Into<String>) -> Self {
        self.tools.push(tool.into());
        self
    }

    pub fn grant(mut self, tool: impl Into<String>, grant: ToolGrant) -> Self {
        self.grants.insert(tool.into(), grant);
        self
    }
}

/// Tool manifest of an agent identity.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CapabilitySet {
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub skills: Vec<SkillCapability>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tool(mut self, tool: impl Into<String>) -> Self {
        self.tools.push(tool.into());
        self
    }

    pub fn skill(mut self, skill: SkillCapability) -> Self {
        self.skills.push(skill);
        self
    }

    pub fn from_yaml(content: &str) -> crate::Result<Self> {
        Ok(serde_yaml_bw::from_str(content)?)
    }

    pub async fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_yaml(&content)
    }

    /// Every tool named anywhere in the set.
    pub fn manifest(&self) -> BTreeSet<&str> {
        let mut names: BTreeSet<&str> = self.tools.iter().map(String::as_str).collect();
        for skill in &self.skills {
            names.extend(skill.tools.iter().map(String::as_str));
            names.extend(skill.grants.keys().map(String::as_str));
        }
        names
    }

    pub fn has_manifest(&self) -> bool {
        !self.tools.is_empty()
            || self
                .skills
                .iter()
                .any(|s| !s.tools.is_empty() || !s.grants.is_empty())
    }

    pub fn evaluate(&self, tool: &str) -> CapabilityDecision {
        if !self.has_manifest() {
            return CapabilityDecision::allow();
        }

        if let Some((skill, grant)) = self
            .skills
            .iter()
            .find_map(|s| s.grants.get(tool).map(|g| (s, g)))
        {
            return CapabilityDecision {
                allowed: true,
                reason: None,
                grant: Some(grant.clone()),
                skill: Some(skill.name.clone()),
            };
        }

        if let Some(skill) = self.skills.iter().find(|s| s.tools.iter().any(|t| t == tool)) {
            return CapabilityDecision {
                skill: Some(skill.name.clone()),
                ..CapabilityDecision::allow()
            };
        }

        if self.tools.iter().any(|t| t == tool) {
            return CapabilityDecision::allow();
        }

        CapabilityDecision::deny(format!("tool '{}' is not in the capability manifest", tool))
    }
}

/// Result of evaluating one tool-call request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityDecision {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant: Option<ToolGrant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill: Option<String>,
}

impl CapabilityDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            grant: None,
            skill: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            grant: None,
            skill: None,
        }
    }
}

/// Optional capability set bound to an orchestrator. `None` allows every tool.
#[derive(Debug, Clone, Default)]
pub struct CapabilityGate {
    set: Option<Arc<CapabilitySet>>,
}

impl CapabilityGate {
    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn new(set: CapabilitySet) -> Self {
        Self {
            set: Some(Arc::new(set)),
        }
    }

    pub fn capabilities(&self) -> Option<&CapabilitySet> {
        self.set.as_deref()
    }

    pub fn is_restricted(&self) -> bool {
        self.set.as_ref().is_some_and(|s| s.has_manifest())
    }

    pub fn evaluate(&self, tool: &str) -> CapabilityDecision {
        evaluate(self.capabilities(), tool)
    }
}

impl From<CapabilitySet> for CapabilityGate {
    fn from(set: CapabilitySet) -> Self {
        Self::new(set)
    }
}

pub fn evaluate(set: Option<&CapabilitySet>, tool: &str) -> CapabilityDecision {
    match set {
        Some(set) => set.evaluate(tool),
        None => CapabilityDecision::allow(),
    }
}
