//! Layered configuration: earlier providers take priority.

use std::collections::BTreeSet;

use super::ConfigResult;
use super::provider::ConfigProvider;

#[derive(Default)]
pub struct CompositeConfigProvider {
    providers: Vec<Box<dyn ConfigProvider>>,
}

impl CompositeConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider with lower priority than those already added.
    pub fn add_provider(&mut self, provider: Box<dyn ConfigProvider>) {
        self.providers.push(provider);
    }

    pub fn provider(mut self, provider: Box<dyn ConfigProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[async_trait::async_trait]
impl ConfigProvider for CompositeConfigProvider {
    fn name(&self) -> &str {
        "composite"
    }

    async fn get_raw(&self, key: &str) -> ConfigResult<Option<String>> {
        for provider in &self.providers {
            if let Some(value) = provider.get_raw(key).await? {
                tracing::trace!(key, provider = provider.name(), "Resolved config key");
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    async fn list_keys(&self, prefix: &str) -> ConfigResult<Vec<String>> {
        let mut keys = BTreeSet::new();
        for provider in &self.providers {
            keys.extend(provider.list_keys(prefix).await?);
        }
        Ok(keys.into_iter().collect())
    }
}

impl std::fmt::Debug for CompositeConfigProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeConfigProvider")
            .field("providers", &self.provider_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfigProvider;

    #[tokio::test]
    async fn test_first_provider_wins() {
        let composite = CompositeConfigProvider::new()
            .provider(Box::new(
                MemoryConfigProvider::named("override").with("agent.max_turns", "3"),
            ))
            .provider(Box::new(
                MemoryConfigProvider::named("defaults")
                    .with("agent.max_turns", "10")
                    .with("agent.name", "base"),
            ));

        assert_eq!(
            composite.get_raw("agent.max_turns").await.unwrap(),
            Some("3".to_string())
        );
        assert_eq!(
            composite.get_raw("agent.name").await.unwrap(),
            Some("base".to_string())
        );
        assert_eq!(
            composite.list_keys("agent.").await.unwrap(),
            vec!["agent.max_turns", "agent.name"]
        );
        assert_eq!(composite.provider_names(), vec!["override", "defaults"]);
    }
}
