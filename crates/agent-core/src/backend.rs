//! Model Backend
//!
//! The reasoning loop's only view of a language model: given the transcript
//! so far and the tool catalog, return either final text or tool requests.
//!
//! [`PromptedBackend`] implements this on top of any plain chat-completion
//! [`LlmProvider`] by describing the tools in the system prompt and parsing
//! fenced `tool` blocks out of the reply.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::error::Result;
use crate::message::Message;
use crate::provider::{GenerationOptions, LlmProvider};
use crate::schema::{ParamType, ToolDescriptor};
use crate::tool::{ToolCall, ToolOutcome, ToolResult};
use crate::transcript::{Transcript, Turn};

/// What the model decided to do this turn
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ModelDecision {
    /// Final answer; ends the exchange
    FinalText(String),
    /// One or more tool invocations to run before asking again
    ToolCalls(Vec<ToolCall>),
}

/// Strategy trait for the decision-making model
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn decide(
        &self,
        transcript: &Transcript,
        tools: &[ToolDescriptor],
    ) -> Result<ModelDecision>;
}

const TOOL_FENCE: &str = "```tool";
const FENCE_END: &str = "```";

/// Default system prompt used by [`PromptedBackend`]
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a helpful AI assistant.

When you need to use a tool, respond with a JSON block in this exact format:
```tool
{"tool": "tool_name", "arguments": {"arg1": "value1"}}
```

After receiving tool results, synthesize them into a helpful response.
If you can answer directly without tools, do so.
Be concise and accurate."#;

/// Prompted backend configuration
#[derive(Clone, Debug)]
pub struct PromptedBackendConfig {
    /// System prompt template
    pub system_prompt: String,

    /// Generation options
    pub generation: GenerationOptions,

    /// Whether to append tool descriptions to system prompt
    pub inject_tool_descriptions: bool,
}

impl Default for PromptedBackendConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            generation: GenerationOptions::default(),
            inject_tool_descriptions: true,
        }
    }
}

/// Adapts a chat-completion provider into a [`ModelBackend`]
pub struct PromptedBackend {
    provider: Arc<dyn LlmProvider>,
    config: PromptedBackendConfig,
}

impl PromptedBackend {
    pub fn new(provider: Arc<dyn LlmProvider>, config: PromptedBackendConfig) -> Self {
        Self { provider, config }
    }

    pub fn with_defaults(provider: Arc<dyn LlmProvider>) -> Self {
        Self::new(provider, PromptedBackendConfig::default())
    }

    pub fn config(&self) -> &PromptedBackendConfig {
        &self.config
    }

    /// Build the full system prompt including tool descriptions
    pub fn build_system_prompt(&self, tools: &[ToolDescriptor]) -> String {
        let mut prompt = self.config.system_prompt.clone();

        if self.config.inject_tool_descriptions && !tools.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(&tool_prompt_section(tools));
        }

        prompt
    }

    /// Render the transcript as chat messages
    pub fn render_messages(&self, transcript: &Transcript, tools: &[ToolDescriptor]) -> Vec<Message> {
        let mut messages = vec![Message::system(self.build_system_prompt(tools))];

        for turn in transcript.turns() {
            match turn {
                Turn::User(text) => messages.push(Message::user(text)),
                Turn::Model(ModelDecision::FinalText(text)) => {
                    messages.push(Message::assistant(text));
                }
                Turn::Model(ModelDecision::ToolCalls(calls)) => {
                    messages.push(Message::assistant(format_tool_calls(calls)));
                }
                Turn::Tool(results) => {
                    for result in results {
                        messages.push(Message::tool(
                            format_tool_result(result),
                            Some(result.call_id.clone()),
                        ));
                    }
                }
            }
        }

        messages
    }
}

#[async_trait]
impl ModelBackend for PromptedBackend {
    async fn decide(
        &self,
        transcript: &Transcript,
        tools: &[ToolDescriptor],
    ) -> Result<ModelDecision> {
        let messages = self.render_messages(transcript, tools);

        let completion = self
            .provider
            .complete(&messages, &self.config.generation)
            .await?;

        let calls = parse_tool_calls(&completion.content);
        if calls.is_empty() {
            Ok(ModelDecision::FinalText(completion.content.trim().to_string()))
        } else {
            tracing::debug!(count = calls.len(), "Model requested tools");
            Ok(ModelDecision::ToolCalls(calls))
        }
    }
}

/// Generate system prompt section describing available tools
pub fn tool_prompt_section(tools: &[ToolDescriptor]) -> String {
    let mut prompt = String::from("## Available Tools\n\n");
    prompt.push_str("You can use the following tools by responding with a JSON block:\n\n");
    prompt.push_str("```tool\n{\"tool\": \"tool_name\", \"arguments\": {\"arg\": \"value\"}}\n```\n\n");
    prompt.push_str("To call several tools at once, emit one block per call.\n\n");

    for tool in tools {
        let _ = writeln!(prompt, "### {}", tool.name);
        let _ = writeln!(prompt, "{}", tool.description);

        if !tool.parameters.is_empty() {
            prompt.push_str("**Parameters:**\n");
            for param in &tool.parameters {
                let required = if param.required { " (required)" } else { "" };
                let choices = match &param.kind {
                    ParamType::Enum(values) => format!(", one of: {}", values.join(", ")),
                    _ => String::new(),
                };
                let default = param
                    .default
                    .as_ref()
                    .map(|d| format!(" [default: {d}]"))
                    .unwrap_or_default();
                let _ = writeln!(
                    prompt,
                    "- `{}` ({}{}){}{}: {}",
                    param.name,
                    param.kind.type_name(),
                    choices,
                    required,
                    default,
                    param.description
                );
            }
        }
        let _ = writeln!(prompt, "**Returns:** {}\n", tool.return_type.type_name());
    }

    prompt
}

/// Render tool requests the way the model is asked to write them
fn format_tool_calls(calls: &[ToolCall]) -> String {
    calls
        .iter()
        .map(|call| {
            let body = serde_json::json!({"tool": call.name, "arguments": call.arguments});
            format!("{TOOL_FENCE}\n{body}\n{FENCE_END}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format tool result for the conversation
fn format_tool_result(result: &ToolResult) -> String {
    match &result.outcome {
        ToolOutcome::Ok(Value::String(text)) => {
            format!("[Tool '{}' returned]\n{}", result.name, text)
        }
        ToolOutcome::Ok(value) => format!("[Tool '{}' returned]\n{}", result.name, value),
        ToolOutcome::Error { kind, message } => {
            format!("[Tool '{}' failed: {}]\n{}", result.name, kind, message)
        }
    }
}

/// Parse every tool call out of a model reply.
///
/// Looks for fenced `tool` blocks first (each holding one call object or an
/// array of them), then falls back to a single inline JSON object with a
/// `"tool"` key.
pub fn parse_tool_calls(content: &str) -> Vec<ToolCall> {
    let mut calls = Vec::new();
    let mut rest = content;

    while let Some(start_idx) = rest.find(TOOL_FENCE) {
        let after_marker = &rest[start_idx + TOOL_FENCE.len()..];
        let Some(end_idx) = after_marker.find(FENCE_END) else {
            break;
        };
        let json_str = after_marker[..end_idx].trim();

        match serde_json::from_str::<Value>(json_str) {
            Ok(Value::Array(items)) => {
                calls.extend(items.into_iter().filter_map(|v| serde_json::from_value(v).ok()));
            }
            Ok(value) => match serde_json::from_value::<ToolCall>(value) {
                Ok(call) => calls.push(call),
                Err(e) => tracing::debug!("Ignoring malformed tool block: {}", e),
            },
            Err(e) => tracing::debug!("Ignoring non-JSON tool block: {}", e),
        }

        rest = &after_marker[end_idx + FENCE_END.len()..];
    }

    if calls.is_empty() {
        calls.extend(parse_inline_tool_call(content));
    }

    calls
}

/// Try to parse inline JSON tool call
fn parse_inline_tool_call(content: &str) -> Option<ToolCall> {
    if !content.contains(r#""tool""#) {
        return None;
    }

    let start = content.find('{')?;
    let end = content.rfind('}')?;

    if end <= start {
        return None;
    }

    serde_json::from_str::<ToolCall>(&content[start..=end]).ok()
}
