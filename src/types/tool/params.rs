//! Declared tool parameters and argument validation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::ToolError;

/// Dynamically typed argument map passed to tool handlers.
pub type Arguments = Map<String, Value>;

/// Declared type of a tool parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    #[default]
    Any,
}

impl ParamType {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
            Self::Any => true,
        }
    }

    /// JSON Schema type keyword, `None` for [`ParamType::Any`].
    pub fn schema_name(&self) -> Option<&'static str> {
        match self {
            Self::String => Some("string"),
            Self::Integer => Some("integer"),
            Self::Number => Some("number"),
            Self::Boolean => Some("boolean"),
            Self::Array => Some("array"),
            Self::Object => Some("object"),
            Self::Any => None,
        }
    }

    fn from_schema_name(name: &str) -> Self {
        match name {
            "string" => Self::String,
            "integer" => Self::Integer,
            "number" => Self::Number,
            "boolean" => Self::Boolean,
            "array" => Self::Array,
            "object" => Self::Object,
            _ => Self::Any,
        }
    }
}

/// One declared parameter of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type", default)]
    pub param_type: ParamType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub allowed: Vec<Value>,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: String::new(),
            required: false,
            default: None,
            allowed: Vec::new(),
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::String)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Integer)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Number)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Boolean)
    }

    pub fn array(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Array)
    }

    pub fn object(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Object)
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn one_of(mut self, values: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        self.allowed = values.into_iter().map(Into::into).collect();
        self
    }

    /// JSON Schema fragment for this parameter.
    pub fn schema(&self) -> Value {
        let mut obj = Map::new();
        if let Some(name) = self.param_type.schema_name() {
            obj.insert("type".into(), Value::String(name.into()));
        }
        if !self.description.is_empty() {
            obj.insert("description".into(), Value::String(self.description.clone()));
        }
        if let Some(ref default) = self.default {
            obj.insert("default".into(), default.clone());
        }
        if !self.allowed.is_empty() {
            obj.insert("enum".into(), Value::Array(self.allowed.clone()));
        }
        Value::Object(obj)
    }

    fn check(&self, tool: &str, value: &Value) -> Result<(), ToolError> {
        if !self.param_type.matches(value) {
            return Err(ToolError::invalid_argument(
                tool,
                &self.name,
                format!(
                    "expected {}, got {}",
                    self.param_type.schema_name().unwrap_or("any"),
                    json_type_name(value)
                ),
            ));
        }
        if !self.allowed.is_empty() && !self.allowed.contains(value) {
            let allowed: Vec<String> = self.allowed.iter().map(Value::to_string).collect();
            return Err(ToolError::invalid_argument(
                tool,
                &self.name,
                format!("{} is not one of [{}]", value, allowed.join(", ")),
            ));
        }
        Ok(())
    }
}

/// Derive parameter specs from a JSON Schema object (`properties` + `required`).
pub fn params_from_schema(schema: &Value) -> Vec<ParamSpec> {
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Vec::new();
    };

    properties
        .iter()
        .map(|(name, prop)| {
            let param_type = match prop.get("type") {
                Some(Value::String(t)) => ParamType::from_schema_name(t),
                // `Option<T>` is rendered as ["T", "null"]
                Some(Value::Array(types)) => types
                    .iter()
                    .filter_map(Value::as_str)
                    .find(|t| *t != "null")
                    .map(ParamType::from_schema_name)
                    .unwrap_or_default(),
                _ => ParamType::Any,
            };
            ParamSpec {
                name: name.clone(),
                param_type,
                description: prop
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                required: required.contains(&name.as_str()),
                default: prop.get("default").filter(|d| !d.is_null()).cloned(),
                allowed: prop
                    .get("enum")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default(),
            }
        })
        .collect()
}

/// Fill defaults, reject missing required arguments and check declared types.
///
/// `null` counts as absent. Arguments without a declared spec pass through.
pub fn prepare_arguments(
    tool: &str,
    params: &[ParamSpec],
    mut args: Arguments,
) -> Result<Arguments, ToolError> {
    for param in params {
        let present = args.get(&param.name).is_some_and(|v| !v.is_null());
        if present {
            continue;
        }
        match (&param.default, param.required) {
            (Some(default), _) => {
                args.insert(param.name.clone(), default.clone());
            }
            (None, true) => return Err(ToolError::missing_argument(tool, &param.name)),
            (None, false) => {
                args.remove(&param.name);
            }
        }
    }

    for param in params {
        if let Some(value) = args.get(&param.name) {
            param.check(tool, value)?;
        }
    }

    Ok(args)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
