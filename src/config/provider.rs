//! Configuration provider trait.

use serde::de::DeserializeOwned;

use super::{ConfigError, ConfigResult};

/// Read-only key/value configuration source.
///
/// Keys are dotted paths such as `agent.max_turns`.
#[async_trait::async_trait]
pub trait ConfigProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &str;

    async fn get_raw(&self, key: &str) -> ConfigResult<Option<String>>;

    /// Keys starting with `prefix`, sorted.
    async fn list_keys(&self, prefix: &str) -> ConfigResult<Vec<String>>;
}

/// Typed access on top of [`ConfigProvider::get_raw`].
pub trait ConfigProviderExt: ConfigProvider {
    /// Parse a value as JSON. A raw value that is not valid JSON is tried as
    /// a plain string, so `AGENT_LOOP_AGENT_NAME=helper` reads as `"helper"`.
    fn get<T: DeserializeOwned + Send>(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = ConfigResult<Option<T>>> + Send
    where
        Self: Sync,
    {
        async move {
            let Some(raw) = self.get_raw(key).await? else {
                return Ok(None);
            };
            let parsed = serde_json::from_str::<T>(&raw)
                .or_else(|_| serde_json::from_value::<T>(serde_json::Value::String(raw.clone())));
            match parsed {
                Ok(value) => Ok(Some(value)),
                Err(e) => Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: format!("cannot parse '{}': {}", raw, e),
                }),
            }
        }
    }

    fn require<T: DeserializeOwned + Send>(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = ConfigResult<T>> + Send
    where
        Self: Sync,
    {
        async move {
            self.get(key).await?.ok_or_else(|| ConfigError::NotFound {
                key: key.to_string(),
            })
        }
    }
}

impl<P: ConfigProvider + ?Sized> ConfigProviderExt for P {}
