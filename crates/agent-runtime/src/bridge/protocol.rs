//! Wire protocol between the bridge and a tool provider.
//!
//! Each frame is one JSON object tagged by `type`. Every response except
//! `hello-ack` carries the `requestId` of the request it answers.

use agent_core::{ToolDescriptor, ToolErrorKind, ToolOutcome};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Protocol revision spoken by this crate
pub const PROTOCOL_VERSION: u32 = 1;

/// Identity exchanged during the handshake
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub name: String,
    pub version: String,
    pub protocol: u32,
}

impl Capabilities {
    /// Capabilities for `name` at this crate's version
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            protocol: PROTOCOL_VERSION,
        }
    }
}

/// A tool as listed by a provider
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameter_schema: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
}

impl WireTool {
    pub fn from_descriptor(descriptor: &ToolDescriptor) -> Self {
        Self {
            name: descriptor.name.clone(),
            description: descriptor.description.clone(),
            parameter_schema: descriptor.parameter_schema(),
            return_type: Some(descriptor.return_type.type_name().to_string()),
        }
    }

    /// Validate into a descriptor; unsupported types are rejected here
    pub fn to_descriptor(&self) -> agent_core::Result<ToolDescriptor> {
        ToolDescriptor::from_wire(
            &self.name,
            &self.description,
            &self.parameter_schema,
            self.return_type.as_deref(),
        )
    }
}

/// One protocol frame
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum Frame {
    Hello {
        client_capabilities: Capabilities,
    },
    HelloAck {
        server_capabilities: Capabilities,
    },
    ListTools {
        request_id: u64,
    },
    Tools {
        request_id: u64,
        tools: Vec<WireTool>,
    },
    Call {
        request_id: u64,
        tool_name: String,
        #[serde(default)]
        arguments: Map<String, Value>,
    },
    #[serde(rename = "result")]
    CallResult {
        request_id: u64,
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        /// Classification of a failed call, when the provider knows it
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_kind: Option<ToolErrorKind>,
    },
    Shutdown,
}

impl Frame {
    /// Build a `result` frame from an invocation outcome
    pub fn call_result(request_id: u64, outcome: ToolOutcome) -> Self {
        match outcome {
            ToolOutcome::Ok(value) => Frame::CallResult {
                request_id,
                ok: true,
                value: Some(value),
                error: None,
                error_kind: None,
            },
            ToolOutcome::Error { kind, message } => Frame::CallResult {
                request_id,
                ok: false,
                value: None,
                error: Some(message),
                error_kind: Some(kind),
            },
        }
    }

    /// Correlation key of a request or response frame
    pub fn request_id(&self) -> Option<u64> {
        match self {
            Frame::ListTools { request_id }
            | Frame::Tools { request_id, .. }
            | Frame::Call { request_id, .. }
            | Frame::CallResult { request_id, .. } => Some(*request_id),
            Frame::Hello { .. } | Frame::HelloAck { .. } | Frame::Shutdown => None,
        }
    }

    /// Wire name of this frame, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Frame::Hello { .. } => "hello",
            Frame::HelloAck { .. } => "hello-ack",
            Frame::ListTools { .. } => "list-tools",
            Frame::Tools { .. } => "tools",
            Frame::Call { .. } => "call",
            Frame::CallResult { .. } => "result",
            Frame::Shutdown => "shutdown",
        }
    }
}
