//! Tool trait definitions.

use std::future::Future;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;

use super::context::ToolContext;
use crate::types::{Arguments, ToolDefinition, ToolError, ToolResult, params_from_schema};

/// Core tool trait for all tool implementations.
///
/// Handlers receive arguments that were already validated against
/// [`Tool::definition`] by the catalog.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn definition(&self) -> ToolDefinition;
    async fn execute(&self, input: Arguments, context: &ToolContext) -> ToolResult;
}

/// Schema-based tool trait with automatic JSON schema generation.
///
/// The parameter list used for validation is extracted from the derived
/// schema and the schema itself is exported unchanged.
#[async_trait]
pub trait SchemaTool: Send + Sync {
    type Input: JsonSchema + DeserializeOwned + Send;
    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    async fn handle(&self, input: Self::Input, context: &ToolContext) -> ToolResult;

    fn input_schema() -> serde_json::Value {
        let schema = schemars::schema_for!(Self::Input);
        let mut value =
            serde_json::to_value(schema).unwrap_or_else(|_| serde_json::json!({"type": "object"}));

        if let Some(obj) = value.as_object_mut() {
            obj.remove("$schema");
            if !obj.contains_key("properties") {
                obj.insert(
                    "properties".to_string(),
                    serde_json::Value::Object(serde_json::Map::new()),
                );
            }
        }

        value
    }
}

#[async_trait]
impl<T: SchemaTool + 'static> Tool for T {
    fn name(&self) -> &str {
        T::NAME
    }

    fn definition(&self) -> ToolDefinition {
        let schema = T::input_schema();
        ToolDefinition::new(T::NAME, T::DESCRIPTION)
            .params(params_from_schema(&schema))
            .with_raw_schema(schema)
    }

    async fn execute(&self, input: Arguments, context: &ToolContext) -> ToolResult {
        match serde_json::from_value::<T::Input>(serde_json::Value::Object(input)) {
            Ok(typed) => SchemaTool::handle(self, typed, context).await,
            Err(e) => Err(ToolError::invalid_argument(T::NAME, "input", e.to_string())),
        }
    }
}

/// Tool backed by an async closure.
///
/// ```ignore
/// let tool = FnTool::new(
///     ToolDefinition::new("get_weather", "Current weather")
///         .param(ParamSpec::string("city").required()),
///     |_ctx, args| async move { Ok(ToolOutput::text(format!("25C in {}", args["city"]))) },
/// );
/// ```
pub struct FnTool<F> {
    definition: ToolDefinition,
    handler: F,
}

impl<F, Fut> FnTool<F>
where
    F: Fn(ToolContext, Arguments) -> Fut + Send + Sync,
    Fut: Future<Output = ToolResult> + Send,
{
    pub fn new(definition: ToolDefinition, handler: F) -> Self {
        Self {
            definition,
            handler,
        }
    }
}

#[async_trait]
impl<F, Fut> Tool for FnTool<F>
where
    F: Fn(ToolContext, Arguments) -> Fut + Send + Sync,
    Fut: Future<Output = ToolResult> + Send,
{
    fn name(&self) -> &str {
        &self.definition.name
    }

    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, input: Arguments, context: &ToolContext) -> ToolResult {
        (self.handler)(context.clone(), input).await
    }
}
