//! Tool definition types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::ToolError;
use super::params::{Arguments, ParamSpec, prepare_arguments};

/// Registered description of a tool: name, description and declared parameters.
///
/// Immutable once registered in a [`ToolCatalog`](crate::tools::ToolCatalog).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ParamSpec>,
    /// Replaces the schema generated from `parameters` when exported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_schema: Option<Value>,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
            raw_schema: None,
        }
    }

    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.parameters.push(spec);
        self
    }

    pub fn params(mut self, specs: impl IntoIterator<Item = ParamSpec>) -> Self {
        self.parameters.extend(specs);
        self
    }

    pub fn with_raw_schema(mut self, schema: Value) -> Self {
        self.raw_schema = Some(schema);
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&ParamSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// JSON Schema for the tool input.
    pub fn input_schema(&self) -> Value {
        if let Some(ref raw) = self.raw_schema {
            return raw.clone();
        }

        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.schema()))
            .collect();
        let required: Vec<Value> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| Value::String(p.name.clone()))
            .collect();

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    pub fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema(),
        }
    }

    pub fn prepare(&self, args: Arguments) -> Result<Arguments, ToolError> {
        prepare_arguments(&self.name, &self.parameters, args)
    }
}

/// Machine-readable tool descriptor handed to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}
