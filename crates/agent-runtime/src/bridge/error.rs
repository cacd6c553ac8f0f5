//! Bridge error types

use std::time::Duration;

use agent_core::{AgentError, ToolErrorKind};
use thiserror::Error;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors raised while talking to an external tool provider
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Could not decode frame: {0}")]
    Decode(String),

    #[error("Could not encode frame: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("No response to request {request_id} within {timeout:?}")]
    Timeout { request_id: u64, timeout: Duration },

    #[error("Bridge unavailable: {0}")]
    Unavailable(String),

    /// The provider answered with `ok: false`
    #[error("{message}")]
    Remote {
        kind: ToolErrorKind,
        message: String,
    },

    #[error("Transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Classification used in tool results
    pub fn kind(&self) -> ToolErrorKind {
        match self {
            BridgeError::Spawn { .. } => ToolErrorKind::ProcessSpawnFailed,
            BridgeError::Handshake(_) => ToolErrorKind::HandshakeFailed,
            BridgeError::Decode(_) | BridgeError::Encode(_) => ToolErrorKind::ProtocolDecodeError,
            BridgeError::Timeout { .. } => ToolErrorKind::ProtocolTimeout,
            BridgeError::Unavailable(_) | BridgeError::Io(_) => ToolErrorKind::BridgeUnavailable,
            BridgeError::Remote { kind, .. } => *kind,
        }
    }
}

impl From<BridgeError> for AgentError {
    fn from(err: BridgeError) -> Self {
        let message = err.to_string();
        match err.kind() {
            ToolErrorKind::ProcessSpawnFailed => AgentError::ProcessSpawnFailed(message),
            ToolErrorKind::HandshakeFailed => AgentError::HandshakeFailed(message),
            ToolErrorKind::ProtocolDecodeError => AgentError::ProtocolDecodeError(message),
            ToolErrorKind::ProtocolTimeout => AgentError::ProtocolTimeout(message),
            ToolErrorKind::BridgeUnavailable => AgentError::BridgeUnavailable(message),
            ToolErrorKind::InvalidArguments => AgentError::InvalidArguments(message),
            ToolErrorKind::UnknownTool => AgentError::UnknownTool(message),
            ToolErrorKind::ToolExecutionFailed => AgentError::ToolExecutionFailed(message),
        }
    }
}
