//! Error Types

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transcript::Transcript;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// A tool with this name is already registered in the registry or catalog
    #[error("Duplicate tool name: {0}")]
    DuplicateToolName(String),

    /// A declared parameter (or return) type is outside the supported set
    #[error("Unsupported parameter type '{type_name}' for '{parameter}' in tool '{tool}'")]
    UnsupportedParameterType {
        tool: String,
        parameter: String,
        type_name: String,
    },

    /// Arguments did not match the tool's parameter schema
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Tool not found in the catalog
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// The tool body itself failed
    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    /// The tool-provider executable could not be launched
    #[error("Failed to spawn tool provider: {0}")]
    ProcessSpawnFailed(String),

    /// The tool provider did not complete the handshake
    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),

    /// A frame from the tool provider could not be decoded
    #[error("Protocol decode error: {0}")]
    ProtocolDecodeError(String),

    /// No correlated response arrived in time
    #[error("Protocol timeout: {0}")]
    ProtocolTimeout(String),

    /// The bridge session is failed or closed
    #[error("Bridge unavailable: {0}")]
    BridgeUnavailable(String),

    /// The reasoning loop ran out of tool turns
    #[error("Tool turn limit ({limit}) exceeded")]
    TurnLimitExceeded {
        limit: usize,
        transcript: Box<Transcript>,
    },

    /// Model backend error
    #[error("Model error: {0}")]
    Model(String),

    /// Model backend unavailable or not responding
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

/// Serialisable error classification carried inside a [`ToolResult`](crate::tool::ToolResult).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    InvalidArguments,
    UnknownTool,
    ToolExecutionFailed,
    ProcessSpawnFailed,
    HandshakeFailed,
    ProtocolDecodeError,
    ProtocolTimeout,
    BridgeUnavailable,
}

impl std::fmt::Display for ToolErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::InvalidArguments => "invalid_arguments",
            Self::UnknownTool => "unknown_tool",
            Self::ToolExecutionFailed => "tool_execution_failed",
            Self::ProcessSpawnFailed => "process_spawn_failed",
            Self::HandshakeFailed => "handshake_failed",
            Self::ProtocolDecodeError => "protocol_decode_error",
            Self::ProtocolTimeout => "protocol_timeout",
            Self::BridgeUnavailable => "bridge_unavailable",
        };
        f.write_str(s)
    }
}

impl AgentError {
    /// Classification of this error as a tool-level observation, if it is one.
    ///
    /// Registration-time and loop-level errors return `None`.
    pub fn kind(&self) -> Option<ToolErrorKind> {
        match self {
            Self::InvalidArguments(_) => Some(ToolErrorKind::InvalidArguments),
            Self::UnknownTool(_) => Some(ToolErrorKind::UnknownTool),
            Self::ToolExecutionFailed(_) => Some(ToolErrorKind::ToolExecutionFailed),
            Self::ProcessSpawnFailed(_) => Some(ToolErrorKind::ProcessSpawnFailed),
            Self::HandshakeFailed(_) => Some(ToolErrorKind::HandshakeFailed),
            Self::ProtocolDecodeError(_) => Some(ToolErrorKind::ProtocolDecodeError),
            Self::ProtocolTimeout(_) => Some(ToolErrorKind::ProtocolTimeout),
            Self::BridgeUnavailable(_) => Some(ToolErrorKind::BridgeUnavailable),
            _ => None,
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AgentError::ModelUnavailable(_) | AgentError::ProtocolTimeout(_) | AgentError::Io(_)
        )
    }

    /// Partial transcript attached to a turn-limit failure
    pub fn transcript(&self) -> Option<&Transcript> {
        match self {
            AgentError::TurnLimitExceeded { transcript, .. } => Some(transcript),
            _ => None,
        }
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AgentError::Model(msg) => format!("The AI service encountered an error: {msg}"),
            AgentError::ModelUnavailable(_) => {
                "The AI service is currently unavailable. Please try again.".into()
            }
            AgentError::DuplicateToolName(name) => {
                format!("Two tool sources both provide a tool named '{name}'.")
            }
            AgentError::ProcessSpawnFailed(msg) | AgentError::HandshakeFailed(msg) => {
                format!("A tool server could not be started: {msg}")
            }
            AgentError::TurnLimitExceeded { .. } => {
                "The request needed too many tool calls. Please try a simpler query.".into()
            }
            AgentError::Config(msg) => format!("Configuration problem: {msg}"),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Other(err.to_string())
    }
}
