//! Tool Schemas
//!
//! Two forms of the same information:
//!
//! - [`ToolSchema`] / [`ParameterSchema`] are what tool authors declare. Types
//!   are given by name (`"integer"`, `"string"`, ...), the same way they are
//!   written in documentation or received from a remote tool provider.
//! - [`ToolDescriptor`] / [`ParameterDescriptor`] are the validated form the
//!   catalog dispatches on. Types are a closed set ([`ParamType`]), so
//!   anything that cannot be schematized is rejected at registration time.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AgentError, Result};

// ============================================================================
// Declared form
// ============================================================================

/// Parameter definition as declared by a tool author
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// Declared type name (string, integer, number, boolean, enum, object)
    #[serde(rename = "type")]
    pub param_type: String,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,

    /// Default value if not provided
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Enum of allowed values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
}

impl ParameterSchema {
    pub fn required(
        name: impl Into<String>,
        param_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            description: description.into(),
            required: true,
            default: None,
            enum_values: None,
        }
    }

    pub fn optional(
        name: impl Into<String>,
        param_type: impl Into<String>,
        description: impl Into<String>,
        default: Option<Value>,
    ) -> Self {
        Self {
            required: false,
            default,
            ..Self::required(name, param_type, description)
        }
    }

    pub fn with_enum<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_values = Some(values.into_iter().map(|v| Value::String(v.into())).collect());
        self
    }
}

/// Tool definition as declared by a tool author
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to the model)
    pub description: String,

    /// Parameter definitions, in declaration order
    pub parameters: Vec<ParameterSchema>,

    /// Declared return type name
    #[serde(default = "default_returns")]
    pub returns: String,

    /// Category for grouping
    #[serde(default)]
    pub category: Option<String>,

    /// Whether tool has side effects
    #[serde(default)]
    pub has_side_effects: bool,
}

fn default_returns() -> String {
    "string".into()
}

impl ToolSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
            returns: default_returns(),
            category: None,
            has_side_effects: false,
        }
    }

    pub fn param(mut self, parameter: ParameterSchema) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn returns(mut self, type_name: impl Into<String>) -> Self {
        self.returns = type_name.into();
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

// ============================================================================
// Validated form
// ============================================================================

/// Semantic parameter type. Closed set; anything else is rejected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Float,
    Boolean,
    Enum(Vec<String>),
    Structured,
}

impl ParamType {
    /// Resolve a declared type name. A string type carrying `enum_values`
    /// becomes an enum; `"enum"` without values is not schematizable.
    pub fn from_declared(type_name: &str, enum_values: Option<&[Value]>) -> Option<Self> {
        match type_name.trim().to_ascii_lowercase().as_str() {
            "string" | "str" => match enum_values {
                Some(values) => Self::enum_of(values),
                None => Some(Self::String),
            },
            "enum" => enum_values.and_then(Self::enum_of),
            "integer" | "int" => Some(Self::Integer),
            "number" | "float" => Some(Self::Float),
            "boolean" | "bool" => Some(Self::Boolean),
            "object" | "structured" | "array" => Some(Self::Structured),
            _ => None,
        }
    }

    fn enum_of(values: &[Value]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        values
            .iter()
            .map(|v| v.as_str().map(String::from))
            .collect::<Option<Vec<_>>>()
            .map(Self::Enum)
    }

    /// Type name as presented to models and on the wire
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String | Self::Enum(_) => "string",
            Self::Integer => "integer",
            Self::Float => "number",
            Self::Boolean => "boolean",
            Self::Structured => "object",
        }
    }

    /// Coerce a supplied value to this type
    pub fn coerce(&self, value: &Value) -> std::result::Result<Value, String> {
        match (self, value) {
            (Self::String, Value::String(_)) => Ok(value.clone()),
            (Self::String, Value::Number(n)) => Ok(Value::String(n.to_string())),
            (Self::String, Value::Bool(b)) => Ok(Value::String(b.to_string())),

            (Self::Integer, Value::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    return Ok(Value::from(i));
                }
                match n.as_f64() {
                    #[allow(clippy::cast_possible_truncation)]
                    Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Ok(Value::from(f as i64)),
                    _ => Err(format!("expected integer, got {n}")),
                }
            }
            (Self::Integer, Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| format!("expected integer, got \"{s}\"")),

            (Self::Float, Value::Number(n)) => n
                .as_f64()
                .map(Value::from)
                .ok_or_else(|| format!("expected number, got {n}")),
            (Self::Float, Value::String(s)) => match s.trim().parse::<f64>() {
                Ok(f) if f.is_finite() => Ok(Value::from(f)),
                _ => Err(format!("expected number, got \"{s}\"")),
            },

            (Self::Boolean, Value::Bool(_)) => Ok(value.clone()),
            (Self::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(format!("expected boolean, got \"{s}\"")),
            },

            (Self::Enum(allowed), Value::String(s)) if allowed.iter().any(|a| a == s) => {
                Ok(value.clone())
            }
            (Self::Enum(allowed), _) => Err(format!("expected one of [{}]", allowed.join(", "))),

            (Self::Structured, Value::Object(_) | Value::Array(_)) => Ok(value.clone()),

            (kind, other) => Err(format!(
                "expected {}, got {}",
                kind.type_name(),
                json_type_name(other)
            )),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Semantic return type tag
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReturnType {
    String,
    Number,
    Boolean,
    Structured,
}

impl ReturnType {
    pub fn from_declared(type_name: &str) -> Option<Self> {
        match type_name.trim().to_ascii_lowercase().as_str() {
            "string" | "str" => Some(Self::String),
            "number" | "integer" | "int" | "float" => Some(Self::Number),
            "boolean" | "bool" => Some(Self::Boolean),
            "object" | "structured" | "array" => Some(Self::Structured),
            _ => None,
        }
    }

    pub fn type_name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Structured => "object",
        }
    }
}

/// A validated parameter
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterDescriptor {
    pub name: String,
    pub kind: ParamType,
    pub required: bool,
    pub description: String,
    pub default: Option<Value>,
}

/// A validated, immutable tool descriptor. `name` is the sole dispatch key.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterDescriptor>,
    pub return_type: ReturnType,
}

impl ToolDescriptor {
    /// Validate a declared schema
    pub fn from_schema(schema: &ToolSchema) -> Result<Self> {
        let mut parameters: Vec<ParameterDescriptor> = Vec::with_capacity(schema.parameters.len());

        for param in &schema.parameters {
            if parameters.iter().any(|p| p.name == param.name) {
                return Err(AgentError::Config(format!(
                    "tool '{}' declares parameter '{}' twice",
                    schema.name, param.name
                )));
            }

            let kind = ParamType::from_declared(&param.param_type, param.enum_values.as_deref())
                .ok_or_else(|| AgentError::UnsupportedParameterType {
                    tool: schema.name.clone(),
                    parameter: param.name.clone(),
                    type_name: param.param_type.clone(),
                })?;

            // Defaults are stored in coerced form; validate inserts them as-is
            let default = param
                .default
                .as_ref()
                .filter(|v| !v.is_null())
                .map(|v| kind.coerce(v))
                .transpose()
                .map_err(|e| {
                    AgentError::Config(format!(
                        "tool '{}' has an invalid default for parameter '{}': {e}",
                        schema.name, param.name
                    ))
                })?;

            parameters.push(ParameterDescriptor {
                name: param.name.clone(),
                kind,
                required: param.required,
                description: param.description.clone(),
                default,
            });
        }

        let return_type = ReturnType::from_declared(&schema.returns).ok_or_else(|| {
            AgentError::UnsupportedParameterType {
                tool: schema.name.clone(),
                parameter: "<return>".into(),
                type_name: schema.returns.clone(),
            }
        })?;

        Ok(Self {
            name: schema.name.clone(),
            description: schema.description.clone(),
            parameters,
            return_type,
        })
    }

    /// Rebuild a descriptor from the wire form sent by a tool provider.
    ///
    /// `parameter_schema` is an ordered object of
    /// `name -> {type, required, description, default, enum}`.
    pub fn from_wire(
        name: &str,
        description: &str,
        parameter_schema: &Value,
        returns: Option<&str>,
    ) -> Result<Self> {
        let empty = Map::new();
        let entries = match parameter_schema {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => {
                return Err(AgentError::ProtocolDecodeError(format!(
                    "parameterSchema for '{name}' must be an object, got {}",
                    json_type_name(other)
                )));
            }
        };

        let mut schema = ToolSchema::new(name, description).returns(returns.unwrap_or("string"));
        for (param_name, spec) in entries {
            let type_name = spec.get("type").and_then(Value::as_str).ok_or_else(|| {
                AgentError::ProtocolDecodeError(format!(
                    "parameter '{param_name}' of '{name}' has no type"
                ))
            })?;
            schema.parameters.push(ParameterSchema {
                name: param_name.clone(),
                param_type: type_name.to_string(),
                description: spec
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                required: spec.get("required").and_then(Value::as_bool).unwrap_or(false),
                default: spec.get("default").filter(|v| !v.is_null()).cloned(),
                enum_values: spec.get("enum").and_then(Value::as_array).cloned(),
            });
        }

        Self::from_schema(&schema)
    }

    /// Ordered `name -> {type, required, description, default, enum}` object
    pub fn parameter_schema(&self) -> Value {
        let mut out = Map::new();
        for param in &self.parameters {
            let mut spec = Map::new();
            spec.insert("type".into(), Value::from(param.kind.type_name()));
            spec.insert("required".into(), Value::Bool(param.required));
            spec.insert("description".into(), Value::from(param.description.clone()));
            if let Some(default) = &param.default {
                spec.insert("default".into(), default.clone());
            }
            if let ParamType::Enum(values) = &param.kind {
                spec.insert("enum".into(), Value::from(values.clone()));
            }
            out.insert(param.name.clone(), Value::Object(spec));
        }
        Value::Object(out)
    }

    /// Look up a parameter by name
    pub fn parameter(&self, name: &str) -> Option<&ParameterDescriptor> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Validate and coerce raw arguments against this descriptor.
    ///
    /// Missing optional parameters are filled from their defaults; `null`
    /// counts as absent.
    pub fn validate(&self, raw: &Map<String, Value>) -> Result<Arguments> {
        if let Some(unexpected) = raw.keys().find(|k| self.parameter(k).is_none()) {
            return Err(AgentError::InvalidArguments(format!(
                "unexpected parameter '{unexpected}' for tool '{}'",
                self.name
            )));
        }

        let mut coerced = Map::new();
        for param in &self.parameters {
            match raw.get(&param.name).filter(|v| !v.is_null()) {
                Some(value) => {
                    let value = param.kind.coerce(value).map_err(|e| {
                        AgentError::InvalidArguments(format!("parameter '{}': {e}", param.name))
                    })?;
                    coerced.insert(param.name.clone(), value);
                }
                None if param.required => {
                    return Err(AgentError::InvalidArguments(format!(
                        "missing required parameter '{}' for tool '{}'",
                        param.name, self.name
                    )));
                }
                None => {
                    if let Some(default) = &param.default {
                        coerced.insert(param.name.clone(), default.clone());
                    }
                }
            }
        }

        Ok(Arguments(coerced))
    }
}

// ============================================================================
// Arguments
// ============================================================================

/// Validated tool arguments with typed accessors for tool bodies
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Arguments(Map<String, Value>);

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn str(&self, name: &str) -> anyhow::Result<&str> {
        self.get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("argument '{name}' is not a string"))
    }

    pub fn integer(&self, name: &str) -> anyhow::Result<i64> {
        self.get(name)
            .and_then(Value::as_i64)
            .ok_or_else(|| anyhow::anyhow!("argument '{name}' is not an integer"))
    }

    pub fn float(&self, name: &str) -> anyhow::Result<f64> {
        self.get(name)
            .and_then(Value::as_f64)
            .ok_or_else(|| anyhow::anyhow!("argument '{name}' is not a number"))
    }

    pub fn boolean(&self, name: &str) -> anyhow::Result<bool> {
        self.get(name)
            .and_then(Value::as_bool)
            .ok_or_else(|| anyhow::anyhow!("argument '{name}' is not a boolean"))
    }

    pub fn optional_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn optional_integer(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }
}

impl From<Map<String, Value>> for Arguments {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn add_schema() -> ToolSchema {
        ToolSchema::new("add", "Add two integers")
            .param(ParameterSchema::required("a", "int", "first"))
            .param(ParameterSchema::required("b", "int", "second"))
            .returns("int")
    }

    fn raw(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_descriptor_from_schema() {
        let desc = ToolDescriptor::from_schema(&add_schema()).unwrap();
        assert_eq!(desc.parameters.len(), 2);
        assert_eq!(desc.parameters[0].kind, ParamType::Integer);
        assert_eq!(desc.return_type, ReturnType::Number);
    }

    #[test]
    fn test_unsupported_parameter_type() {
        let schema = ToolSchema::new("upload", "Upload bytes")
            .param(ParameterSchema::required("payload", "bytes", "raw data"));
        let err = ToolDescriptor::from_schema(&schema).unwrap_err();
        assert!(matches!(
            err,
            AgentError::UnsupportedParameterType { ref parameter, ref type_name, .. }
                if parameter == "payload" && type_name == "bytes"
        ));
    }

    #[test]
    fn test_enum_requires_string_values() {
        let ok = ParameterSchema::optional("format", "string", "fmt", None).with_enum(["iso", "unix"]);
        let schema = ToolSchema::new("clock", "Time").param(ok);
        let desc = ToolDescriptor::from_schema(&schema).unwrap();
        assert_eq!(
            desc.parameters[0].kind,
            ParamType::Enum(vec!["iso".into(), "unix".into()])
        );

        let bad = ParameterSchema {
            enum_values: Some(vec![json!(1), json!(2)]),
            ..ParameterSchema::required("level", "enum", "level")
        };
        let schema = ToolSchema::new("levels", "Levels").param(bad);
        assert!(ToolDescriptor::from_schema(&schema).is_err());
    }

    #[test]
    fn test_validate_missing_required() {
        let desc = ToolDescriptor::from_schema(&add_schema()).unwrap();
        let err = desc.validate(&raw(json!({"a": 1}))).unwrap_err();
        assert!(matches!(err, AgentError::InvalidArguments(ref m) if m.contains("'b'")));
    }

    #[test]
    fn test_validate_coerces_values() {
        let desc = ToolDescriptor::from_schema(&add_schema()).unwrap();
        let args = desc.validate(&raw(json!({"a": "3", "b": 5.0}))).unwrap();
        assert_eq!(args.integer("a").unwrap(), 3);
        assert_eq!(args.integer("b").unwrap(), 5);

        let err = desc.validate(&raw(json!({"a": 1.5, "b": 2}))).unwrap_err();
        assert!(matches!(err, AgentError::InvalidArguments(_)));
    }

    #[test]
    fn test_validate_rejects_unexpected_and_fills_defaults() {
        let schema = ToolSchema::new("forecast", "Forecast")
            .param(ParameterSchema::required("city", "string", "city"))
            .param(ParameterSchema::optional("days", "integer", "days", Some(json!(3))));
        let desc = ToolDescriptor::from_schema(&schema).unwrap();

        let args = desc.validate(&raw(json!({"city": "Tokyo", "days": null}))).unwrap();
        assert_eq!(args.integer("days").unwrap(), 3);

        let err = desc.validate(&raw(json!({"city": "Tokyo", "hours": 4}))).unwrap_err();
        assert!(matches!(err, AgentError::InvalidArguments(ref m) if m.contains("hours")));
    }

    #[test]
    fn test_wire_schema_preserves_order_and_types() {
        let schema = ToolSchema::new("forecast", "Forecast")
            .param(ParameterSchema::required("city", "string", "city"))
            .param(ParameterSchema::optional("days", "integer", "days", Some(json!(3))));
        let desc = ToolDescriptor::from_schema(&schema).unwrap();

        let wire = desc.parameter_schema();
        let keys: Vec<_> = wire.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["city", "days"]);

        let rebuilt = ToolDescriptor::from_wire("forecast", "Forecast", &wire, Some("string")).unwrap();
        assert_eq!(rebuilt, desc);
    }

    #[test]
    fn test_defaults_are_coerced_when_declared() {
        let schema = ToolSchema::new("forecast", "Forecast")
            .param(ParameterSchema::optional("days", "integer", "days", Some(json!("3"))));
        let desc = ToolDescriptor::from_schema(&schema).unwrap();
        assert_eq!(desc.parameters[0].default, Some(json!(3)));

        let args = desc.validate(&Map::new()).unwrap();
        assert_eq!(args.integer("days").unwrap(), 3);
    }

    #[test]
    fn test_uncoercible_default_is_rejected() {
        let schema = ToolSchema::new("forecast", "Forecast")
            .param(ParameterSchema::optional("days", "integer", "days", Some(json!("abc"))));
        let err = ToolDescriptor::from_schema(&schema).unwrap_err();
        assert!(matches!(err, AgentError::Config(ref m) if m.contains("'days'")));

        let wire = json!({
            "format": {"type": "string", "enum": ["iso", "unix"], "default": "human"}
        });
        let err = ToolDescriptor::from_wire("clock", "Time", &wire, None).unwrap_err();
        assert!(matches!(err, AgentError::Config(ref m) if m.contains("'format'")));
    }

    #[test]
    fn test_wire_schema_must_be_object() {
        let err = ToolDescriptor::from_wire("x", "x", &json!([1, 2]), None).unwrap_err();
        assert!(matches!(err, AgentError::ProtocolDecodeError(_)));
    }
}
