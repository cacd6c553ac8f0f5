//! Ollama LLM Provider
//!
//! Implementation of `LlmProvider` for local Ollama inference.

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    message::{Message, Role},
    provider::{
        Completion, FinishReason, GenerationOptions, LlmProvider, ModelInfo, ProviderInfo,
        TokenUsage,
    },
};
use async_trait::async_trait;
use ollama_rs::{
    Ollama,
    generation::{
        chat::{ChatMessage, ChatMessageResponse, MessageRole, request::ChatMessageRequest},
    },
    models::ModelOptions as OllamaOptions,
};
use serde::{Deserialize, Serialize};

/// Ollama provider configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Ollama host URL
    pub host: String,

    /// Ollama port
    pub port: u16,

    /// Upper bound on one chat completion, in seconds
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost".into(),
            port: 11434,
            timeout_secs: 120,
        }
    }
}

impl OllamaConfig {
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply `OLLAMA_HOST` / `OLLAMA_PORT` on top of these settings
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(host) = std::env::var("OLLAMA_HOST") {
            self.host = host;
        }
        if let Some(port) = std::env::var("OLLAMA_PORT").ok().and_then(|p| p.parse().ok()) {
            self.port = port;
        }
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Ollama LLM provider
pub struct OllamaProvider {
    client: Ollama,
    config: OllamaConfig,
}

impl OllamaProvider {
    /// Create a new Ollama provider with custom host/port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let config = OllamaConfig {
            host: host.into(),
            port,
            ..Default::default()
        };
        
        Self {
            client: Ollama::new(&config.host, config.port),
            config,
        }
    }
    
    /// Create from configuration
    pub fn from_config(config: OllamaConfig) -> Self {
        Self {
            client: Ollama::new(&config.host, config.port),
            config,
        }
    }
    
    /// Create from environment variables
    pub fn from_env() -> Self {
        Self::from_config(OllamaConfig::from_env())
    }
    
    /// Create with default localhost settings
    pub fn localhost() -> Self {
        Self::from_config(OllamaConfig::default())
    }
    
    /// Convert agent messages to Ollama format
    fn convert_messages(messages: &[Message]) -> Vec<ChatMessage> {
        messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::System => MessageRole::System,
                    Role::User => MessageRole::User,
                    Role::Assistant => MessageRole::Assistant,
                    Role::Tool => MessageRole::User, // Tools appear as user context
                };
                ChatMessage::new(role, m.content.clone())
            })
            .collect()
    }
    
    /// Convert Ollama response to agent completion
    fn convert_completion(response: ChatMessageResponse, model: &str) -> Completion {
        Completion {
            content: response.message.content,
            model: model.to_string(),
            usage: response.final_data.as_ref().map(|d| {
                let prompt_tokens = u32::try_from(d.prompt_eval_count).unwrap_or(u32::MAX);
                let completion_tokens = u32::try_from(d.eval_count).unwrap_or(u32::MAX);
                TokenUsage {
                    prompt_tokens,
                    completion_tokens,
                    total_tokens: prompt_tokens.saturating_add(completion_tokens),
                }
            }),
            finish_reason: Some(FinishReason::Stop),
        }
    }
    
    /// Build Ollama generation options
    fn build_options(opts: &GenerationOptions) -> OllamaOptions {
        OllamaOptions::default()
            .temperature(opts.temperature)
            .top_p(opts.top_p)
            .num_predict(i32::try_from(opts.max_tokens).unwrap_or(i32::MAX))
            .stop(opts.stop_sequences.clone())
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn info(&self) -> Result<ProviderInfo> {
        let models = self.list_models().await.unwrap_or_default();
        
        Ok(ProviderInfo {
            name: "Ollama".into(),
            models,
        })
    }
    
    async fn health_check(&self) -> Result<bool> {
        match self.client.list_local_models().await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("Ollama health check failed: {}", e);
                Ok(false)
            }
        }
    }
    
    async fn complete(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let ollama_messages = Self::convert_messages(messages);
        let ollama_options = Self::build_options(options);

        let request = ChatMessageRequest::new(options.model.clone(), ollama_messages)
            .options(ollama_options);

        tracing::debug!(model = %options.model, messages = messages.len(), "Sending chat request");

        let response = tokio::time::timeout(
            self.config.timeout(),
            self.client.send_chat_messages(request),
        )
        .await
        .map_err(|_| {
            AgentError::ModelUnavailable(format!(
                "Ollama did not answer within {}s",
                self.config.timeout_secs
            ))
        })?
        .map_err(|e| AgentError::Model(e.to_string()))?;

        Ok(Self::convert_completion(response, &options.model))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let models = self.client
            .list_local_models()
            .await
            .map_err(|e| AgentError::ModelUnavailable(e.to_string()))?;
        
        Ok(models
            .into_iter()
            .map(|m| ModelInfo {
                id: m.name.clone(),
                name: m.name,
                context_length: None, // Not exposed by Ollama API
            })
            .collect())
    }
    
}
