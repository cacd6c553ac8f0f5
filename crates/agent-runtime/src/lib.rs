//! # agent-runtime
//!
//! Runtime integrations for the tool orchestration core.
//!
//! - [`bridge`]: stdio transport to external tool-provider processes, and
//!   the provider-side [`ToolServer`](bridge::ToolServer)
//! - **Ollama** (default feature): local LLM inference via Ollama
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::bridge::{BridgeConfig, TransportBridge};
//! use agent_runtime::ollama::OllamaProvider;
//!
//! let weather = TransportBridge::start(
//!     BridgeConfig::new("weather", "tool-agent").arg("serve-tools"),
//! ).await?;
//!
//! let backend = PromptedBackend::with_defaults(Arc::new(OllamaProvider::from_env()));
//! let agent = AgentBuilder::new()
//!     .backend(Arc::new(backend))
//!     .remote(Arc::new(weather))
//!     .build()
//!     .await?;
//! ```

pub mod bridge;

#[cfg(feature = "ollama")]
pub mod ollama;

pub use bridge::{BridgeConfig, BridgeError, BridgeState, ToolServer, TransportBridge};

#[cfg(feature = "ollama")]
pub use ollama::{OllamaConfig, OllamaProvider};

// Re-export core types for convenience
pub use agent_core::{
    Agent, AgentBuilder, AgentError, LlmProvider, Message, RemoteTools, Result, Role, Tool,
    ToolRegistry,
};
