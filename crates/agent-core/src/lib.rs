//! # agent-core
//!
//! Tool orchestration core: typed tool descriptors, a merged local/remote
//! tool catalog, and the reasoning loop that alternates model turns with
//! tool turns.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                             Agent                                │
//! │  ┌─────────────┐   ┌──────────────┐   ┌───────────────────────┐  │
//! │  │  Reasoning  │──▶│   Catalog    │──▶│ Local tools           │  │
//! │  │    Loop     │   │  (Invoker)   │   │ RemoteTools (bridge)  │  │
//! │  └──────┬──────┘   └──────────────┘   └───────────────────────┘  │
//! │         ▼                                                        │
//! │  ┌─────────────┐   ┌──────────────┐                              │
//! │  │ModelBackend │──▶│ LlmProvider  │                              │
//! │  └─────────────┘   └──────────────┘                              │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `ModelBackend` is the loop's only view of a model. `PromptedBackend`
//! adapts any `LlmProvider` (Ollama, ...) into one. `RemoteTools` is the
//! seam a transport bridge plugs into.

pub mod backend;
pub mod catalog;
pub mod error;
pub mod invoker;
pub mod message;
pub mod provider;
pub mod reasoning;
pub mod schema;
pub mod tool;
pub mod transcript;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{ModelBackend, ModelDecision, PromptedBackend, PromptedBackendConfig};
pub use catalog::{Catalog, RemoteTools, Resolver};
pub use error::{AgentError, Result, ToolErrorKind};
pub use invoker::ToolInvoker;
pub use message::{Message, Role};
pub use provider::{GenerationOptions, LlmProvider};
pub use reasoning::{Agent, AgentBuilder, AgentConfig, FinalAnswer};
pub use schema::{Arguments, ParamType, ParameterSchema, ReturnType, ToolDescriptor, ToolSchema};
pub use tool::{FnTool, Tool, ToolCall, ToolOutcome, ToolRegistry, ToolResult};
pub use transcript::{Transcript, Turn};
