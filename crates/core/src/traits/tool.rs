//! MCP-style tool interface
//!
//! A tool declares a JSON schema for its arguments and a side-effect class.
//! Tool failures are values: `ToolError` is turned into an `{"error": ...}`
//! payload for the model and never aborts the call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::session::CallContext;

/// Default timeout for tool execution (30 seconds)
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;

/// What running a tool does to the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffect {
    /// Reads only
    ReadOnly,
    /// Changes directory, ledger, calendar or sends something
    Mutating,
    /// Ends this agent's part of the call on success
    Terminal,
}

impl SideEffect {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Terminal)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadOnly => "read_only",
            Self::Mutating => "mutating",
            Self::Terminal => "terminal",
        }
    }
}

/// Tool schema exposed to the conversational model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: InputSchema,
}

/// JSON schema of a tool's arguments (object type only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertySchema>,
    #[serde(default)]
    pub required: Vec<String>,
}

impl InputSchema {
    pub fn object() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: BTreeMap::new(),
            required: Vec::new(),
        }
    }

    /// Add a property
    pub fn property(mut self, name: &str, schema: PropertySchema, required: bool) -> Self {
        self.properties.insert(name.to_string(), schema);
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    /// Required names that are not declared as properties
    pub fn undeclared_required(&self) -> Vec<&str> {
        self.required
            .iter()
            .filter(|r| !self.properties.contains_key(r.as_str()))
            .map(String::as_str)
            .collect()
    }
}

/// Schema of a single argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub prop_type: String,
    pub description: String,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
}

impl PropertySchema {
    fn of(prop_type: &str, desc: &str) -> Self {
        Self {
            prop_type: prop_type.to_string(),
            description: desc.to_string(),
            enum_values: None,
            default: None,
            minimum: None,
            maximum: None,
        }
    }

    pub fn string(desc: &str) -> Self {
        Self::of("string", desc)
    }

    pub fn number(desc: &str) -> Self {
        Self::of("number", desc)
    }

    pub fn integer(desc: &str) -> Self {
        Self::of("integer", desc)
    }

    pub fn boolean(desc: &str) -> Self {
        Self::of("boolean", desc)
    }

    /// String restricted to a closed set of values
    pub fn enum_type(desc: &str, values: Vec<String>) -> Self {
        Self {
            enum_values: Some(values),
            ..Self::of("string", desc)
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.minimum = Some(min);
        self.maximum = Some(max);
        self
    }
}

/// Check one argument value against its property schema
pub fn validate_property(name: &str, schema: &PropertySchema, value: &Value) -> Result<(), ToolError> {
    let type_ok = match schema.prop_type.as_str() {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        _ => true,
    };
    if !type_ok {
        return Err(ToolError::invalid_params(format!(
            "{} must be of type {}",
            name, schema.prop_type
        )));
    }

    if let (Some(allowed), Some(s)) = (&schema.enum_values, value.as_str()) {
        if !allowed.iter().any(|a| a == s) {
            return Err(ToolError::invalid_params(format!(
                "{} must be one of: {}",
                name,
                allowed.join(", ")
            )));
        }
    }

    if let Some(n) = value.as_f64() {
        if schema.minimum.is_some_and(|min| n < min) || schema.maximum.is_some_and(|max| n > max) {
            return Err(ToolError::invalid_params(format!("{} is out of range", name)));
        }
    }

    Ok(())
}

/// Tool result content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    Json { value: Value },
}

/// Output of a tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text { text: text.into() }],
            is_error: false,
        }
    }

    pub fn json(value: Value) -> Self {
        Self {
            content: vec![ContentBlock::Json { value }],
            is_error: false,
        }
    }

    /// Structured `{"error": message}` result
    pub fn error(message: impl Into<String>) -> Self {
        Self::error_with(message, Map::new())
    }

    /// `{"error": message}` plus extra fields
    pub fn error_with(message: impl Into<String>, mut fields: Map<String, Value>) -> Self {
        fields.insert("error".into(), Value::String(message.into()));
        Self {
            content: vec![ContentBlock::Json {
                value: Value::Object(fields),
            }],
            is_error: true,
        }
    }

    /// Plain text failure signal
    pub fn text_error(text: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::text(text)
        }
    }

    /// Single JSON value handed to the model
    ///
    /// One JSON block is passed through, anything else is flattened to text.
    pub fn to_value(&self) -> Value {
        match self.content.as_slice() {
            [ContentBlock::Json { value }] => value.clone(),
            blocks => Value::String(
                blocks
                    .iter()
                    .map(|b| match b {
                        ContentBlock::Text { text } => text.clone(),
                        ContentBlock::Json { value } => value.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
        }
    }

    /// The `error` field of a structured failure, or the text of a plain one
    pub fn error_message(&self) -> Option<String> {
        if !self.is_error {
            return None;
        }
        match self.to_value() {
            Value::Object(map) => map.get("error").and_then(|e| e.as_str()).map(String::from),
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Tool error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidParams,
    NotFound,
    Timeout,
    Internal,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidParams => "invalid_params",
            Self::NotFound => "not_found",
            Self::Timeout => "timeout",
            Self::Internal => "internal",
        }
    }
}

/// Tool failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolError {
    pub code: ErrorCode,
    pub message: String,
}

impl ToolError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParams, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    pub fn timeout(tool: &str, secs: u64) -> Self {
        Self::new(
            ErrorCode::Timeout,
            format!("Tool '{}' timed out after {} seconds", tool, secs),
        )
    }

    /// Payload handed back to the model
    pub fn to_output(&self) -> ToolOutput {
        ToolOutput::error(self.message.clone())
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for ToolError {}

impl From<ToolError> for crate::Error {
    fn from(err: ToolError) -> Self {
        crate::Error::Tool(err.to_string())
    }
}

/// A callable action exposed to the conversational model
#[async_trait]
pub trait Tool: Send + Sync {
    /// Wire name
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn schema(&self) -> ToolSchema;

    fn side_effect(&self) -> SideEffect;

    /// Run the tool for the given call
    async fn execute(&self, ctx: &CallContext, input: Value) -> Result<ToolOutput, ToolError>;

    /// Check required arguments and declared argument types
    fn validate(&self, input: &Value) -> Result<(), ToolError> {
        let schema = self.schema().input_schema;
        let empty = Map::new();
        let args = match input {
            Value::Object(map) => map,
            Value::Null => &empty,
            _ => return Err(ToolError::invalid_params("arguments must be an object")),
        };

        for name in &schema.required {
            if args.get(name).map_or(true, Value::is_null) {
                return Err(ToolError::invalid_params(format!("{} is required", name)));
            }
        }

        for (name, value) in args {
            if value.is_null() {
                continue;
            }
            if let Some(prop) = schema.properties.get(name) {
                validate_property(name, prop, value)?;
            }
        }

        Ok(())
    }

    /// Own execution bound in seconds; `None` takes the registry default
    fn timeout_secs(&self) -> Option<u64> {
        None
    }
}

/// Read an optional string argument, treating blanks as absent
pub fn optional_str<'a>(input: &'a Value, name: &str) -> Option<&'a str> {
    input
        .get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Read a required string argument
pub fn required_str<'a>(input: &'a Value, name: &str) -> Result<&'a str, ToolError> {
    optional_str(input, name).ok_or_else(|| ToolError::invalid_params(format!("{} is required", name)))
}

/// Argument map for tests and fakes
pub fn args(pairs: &[(&str, Value)]) -> Value {
    let map: Map<String, Value> = pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
    json!(map)
}
