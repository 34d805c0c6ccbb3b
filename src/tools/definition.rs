//! Tool definitions: parameter schema, message templates, flags and the
//! implementation capability.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::context::{ExecutionContext, ToolError};

/// Primitive JSON types a parameter may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    /// Parse a JSON-schema type name
    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "integer" => Some(Self::Integer),
            "boolean" => Some(Self::Boolean),
            "object" => Some(Self::Object),
            "array" => Some(Self::Array),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }

    /// Check whether `value` is of this type
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON type name of an actual argument value, for error messages
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

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(default)]
    pub description: String,
}

/// Required names plus per-parameter primitive types
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSchema {
    pub required: Vec<String>,
    pub properties: BTreeMap<String, ParameterSpec>,
}

impl ParameterSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a required parameter
    pub fn required(mut self, name: &str, param_type: ParamType, description: &str) -> Self {
        self.required.push(name.to_string());
        self.optional(name, param_type, description)
    }

    /// Add an optional parameter
    pub fn optional(mut self, name: &str, param_type: ParamType, description: &str) -> Self {
        self.properties.insert(
            name.to_string(),
            ParameterSpec {
                param_type,
                description: description.to_string(),
            },
        );
        self
    }

    /// Parse a `{type:"object", required, properties}` JSON schema
    pub fn from_json_schema(schema: &Value) -> Result<Self, ToolError> {
        if !schema.is_object() {
            return Err(ToolError::InvalidDefinition("parameters must be an object".to_string()));
        }

        let mut parsed = Self::new();

        if let Some(properties) = schema["properties"].as_object() {
            for (name, spec) in properties {
                let type_name = spec["type"].as_str().ok_or_else(|| {
                    ToolError::InvalidDefinition(format!("parameter '{}' has no type", name))
                })?;
                let param_type = ParamType::from_name(type_name).ok_or_else(|| {
                    ToolError::InvalidDefinition(format!("parameter '{}' has unsupported type '{}'", name, type_name))
                })?;
                parsed = parsed.optional(name, param_type, spec["description"].as_str().unwrap_or_default());
            }
        }

        if let Some(required) = schema["required"].as_array() {
            for name in required {
                let name = name
                    .as_str()
                    .ok_or_else(|| ToolError::InvalidDefinition("required entries must be strings".to_string()))?;
                if !parsed.properties.contains_key(name) {
                    return Err(ToolError::InvalidDefinition(format!(
                        "required parameter '{}' is not declared in properties",
                        name
                    )));
                }
                parsed.required.push(name.to_string());
            }
        }

        Ok(parsed)
    }

    pub fn to_json_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": self.required,
            "properties": self.properties,
        })
    }

    /// Check required presence and primitive types of supplied arguments
    ///
    /// Arguments not declared in the schema are passed through unchecked.
    pub fn validate(&self, tool: &str, args: &Value) -> Result<(), ToolError> {
        let empty = serde_json::Map::new();
        let supplied = match args {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => {
                return Err(ToolError::Validation {
                    tool: tool.to_string(),
                    message: format!("arguments must be an object, got {}", json_type_name(other)),
                });
            }
        };

        for name in &self.required {
            if !supplied.contains_key(name) {
                return Err(ToolError::Validation {
                    tool: tool.to_string(),
                    message: format!("missing required parameter '{}'", name),
                });
            }
        }

        for (name, value) in supplied {
            if let Some(spec) = self.properties.get(name)
                && !spec.param_type.matches(value)
            {
                return Err(ToolError::Validation {
                    tool: tool.to_string(),
                    message: format!(
                        "parameter '{}' expected {} but got {}",
                        name,
                        spec.param_type,
                        json_type_name(value)
                    ),
                });
            }
        }

        Ok(())
    }
}

/// Human-readable phrases for each state; `{{{param}}}` placeholders allowed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolMessages {
    pub pending: String,
    pub executing: String,
    pub completed: String,
}

impl ToolMessages {
    pub fn for_tool(name: &str) -> Self {
        Self {
            pending: format!("Preparing {}", name),
            executing: format!("Running {}", name),
            completed: format!("Finished {}", name),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolFlags {
    pub readonly: bool,
    pub is_instant: bool,
    pub requires_confirmation: bool,
}

/// The implementation behind a tool
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: Value, ctx: &ExecutionContext) -> eyre::Result<Value>;

    /// Name of the tool this handler forwards every call to, if any
    fn delegate(&self) -> Option<&str> {
        None
    }
}

/// Adapter that lets an async closure act as a `ToolHandler`
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> ToolHandler for FnHandler<F>
where
    F: Fn(Value, ExecutionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = eyre::Result<Value>> + Send + 'static,
{
    async fn call(&self, args: Value, ctx: &ExecutionContext) -> eyre::Result<Value> {
        (self.0)(args, ctx.clone()).await
    }
}

/// Wrap an async closure; it receives its own copy of the context
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn ToolHandler>
where
    F: Fn(Value, ExecutionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = eyre::Result<Value>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// A registered tool. Never mutated once registered; re-register to replace.
#[derive(Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: ParameterSchema,
    pub messages: ToolMessages,
    pub flags: ToolFlags,
    pub handler: Arc<dyn ToolHandler>,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, handler: Arc<dyn ToolHandler>) -> Self {
        let name = name.into();
        Self {
            messages: ToolMessages::for_tool(&name),
            name,
            description: description.into(),
            parameters: ParameterSchema::new(),
            flags: ToolFlags::default(),
            handler,
        }
    }

    pub fn with_parameters(mut self, parameters: ParameterSchema) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_messages(mut self, messages: ToolMessages) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_flags(mut self, flags: ToolFlags) -> Self {
        self.flags = flags;
        self
    }

    /// `{name, function:{name, description, parameters}}`
    pub fn to_function_schema(&self) -> Value {
        json!({
            "name": self.name,
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters.to_json_schema(),
            }
        })
    }
}

impl fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("flags", &self.flags)
            .finish()
    }
}
