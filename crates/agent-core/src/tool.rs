//! Tool System
//!
//! Extensible tool framework for agent capabilities.
//! Tools are registered at runtime and invoked by the reasoning loop.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AgentError, Result, ToolErrorKind};
use crate::schema::{Arguments, ToolDescriptor, ToolSchema};

/// Tool call request from the model
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool identifier
    #[serde(alias = "tool")]
    pub name: String,

    /// Raw arguments as key-value pairs (validated before dispatch)
    #[serde(default)]
    pub arguments: Map<String, Value>,

    /// Call ID for correlating results; assigned by the loop when absent
    #[serde(default)]
    pub id: Option<String>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: Map::new(),
            id: None,
        }
    }

    pub fn arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Either a value or a classified error. Never both.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOutcome {
    Ok(Value),
    Error {
        kind: ToolErrorKind,
        message: String,
    },
}

impl ToolOutcome {
    pub fn error(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            kind,
            message: message.into(),
        }
    }

    /// Classify an agent error as an observation. Errors without a tool-level
    /// kind are reported as execution failures.
    pub fn from_error(err: &AgentError) -> Self {
        let kind = err.kind().unwrap_or(ToolErrorKind::ToolExecutionFailed);
        Self::error(kind, err.to_string())
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }
}

/// Result from tool execution
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Call ID of the request this answers
    pub call_id: String,

    /// Tool that was called
    pub name: String,

    #[serde(flatten)]
    pub outcome: ToolOutcome,
}

impl ToolResult {
    pub fn new(call_id: impl Into<String>, name: impl Into<String>, outcome: ToolOutcome) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            outcome,
        }
    }

    pub fn success(call_id: impl Into<String>, name: impl Into<String>, value: Value) -> Self {
        Self::new(call_id, name, ToolOutcome::Ok(value))
    }

    pub fn failure(
        call_id: impl Into<String>,
        name: impl Into<String>,
        kind: ToolErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self::new(call_id, name, ToolOutcome::error(kind, message))
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn value(&self) -> Option<&Value> {
        match &self.outcome {
            ToolOutcome::Ok(v) => Some(v),
            ToolOutcome::Error { .. } => None,
        }
    }

    pub fn error_kind(&self) -> Option<ToolErrorKind> {
        match &self.outcome {
            ToolOutcome::Ok(_) => None,
            ToolOutcome::Error { kind, .. } => Some(*kind),
        }
    }
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Declared schema; validated into a [`ToolDescriptor`] on registration
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with validated arguments
    async fn execute(&self, args: &Arguments) -> anyhow::Result<Value>;
}

/// A plain function registered as a tool
pub struct FnTool<F> {
    schema: ToolSchema,
    func: F,
}

impl<F> FnTool<F>
where
    F: Fn(&Arguments) -> anyhow::Result<Value> + Send + Sync,
{
    pub fn new(schema: ToolSchema, func: F) -> Self {
        Self { schema, func }
    }
}

#[async_trait]
impl<F> Tool for FnTool<F>
where
    F: Fn(&Arguments) -> anyhow::Result<Value> + Send + Sync,
{
    fn schema(&self) -> ToolSchema {
        self.schema.clone()
    }

    async fn execute(&self, args: &Arguments) -> anyhow::Result<Value> {
        (self.func)(args)
    }
}

/// A registered local tool
#[derive(Clone)]
pub struct RegisteredTool {
    pub descriptor: ToolDescriptor,
    pub tool: Arc<dyn Tool>,
}

/// Registry for local tools. Registration order is preserved.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<ToolDescriptor> {
        self.register_arc(Arc::new(tool))
    }

    /// Register a shared tool
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<ToolDescriptor> {
        let descriptor = ToolDescriptor::from_schema(&tool.schema())?;

        if self.index.contains_key(&descriptor.name) {
            return Err(AgentError::DuplicateToolName(descriptor.name));
        }

        tracing::debug!(tool = %descriptor.name, "Registered tool");
        self.index.insert(descriptor.name.clone(), self.tools.len());
        self.tools.push(RegisteredTool {
            descriptor: descriptor.clone(),
            tool,
        });
        Ok(descriptor)
    }

    /// Register a function with an explicit schema
    pub fn register_fn<F>(&mut self, schema: ToolSchema, func: F) -> Result<ToolDescriptor>
    where
        F: Fn(&Arguments) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.register(FnTool::new(schema, func))
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// Descriptors in registration order
    pub fn list(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.iter().map(|t| &t.descriptor)
    }

    /// Get tool names
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.descriptor.name.as_str()).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub(crate) fn into_tools(self) -> Vec<RegisteredTool> {
        self.tools
    }
}
