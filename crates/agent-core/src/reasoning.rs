//! Reasoning Loop
//!
//! Drives one exchange: ask the model, run whatever tools it requests,
//! feed the results back, and repeat until it produces final text or the
//! tool-turn limit is reached.
//!
//! ```text
//!   User ──▶ AwaitingModel ──FinalText──▶ Answering ──▶ FinalAnswer
//!                 ▲    │
//!                 │    └─ToolCalls──▶ AwaitingToolResults
//!                 └────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::{ModelBackend, ModelDecision};
use crate::catalog::{Catalog, RemoteTools};
use crate::error::{AgentError, Result};
use crate::invoker::ToolInvoker;
use crate::schema::{Arguments, ToolSchema};
use crate::tool::{Tool, ToolCall, ToolRegistry, ToolResult};
use crate::transcript::{Transcript, Turn};

/// Agent configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum tool turns in one exchange
    #[serde(default = "default_max_tool_turns")]
    pub max_tool_turns: usize,

    /// Bound on a single tool call, local or remote
    #[serde(default = "default_tool_timeout", with = "duration_secs")]
    pub tool_timeout: Duration,

    /// Run the calls of one tool turn concurrently
    #[serde(default = "default_parallel")]
    pub parallel_tool_calls: bool,
}

fn default_max_tool_turns() -> usize { 10 }
fn default_tool_timeout() -> Duration { Duration::from_secs(30) }
fn default_parallel() -> bool { true }

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_turns: default_max_tool_turns(),
            tool_timeout: default_tool_timeout(),
            parallel_tool_calls: default_parallel(),
        }
    }
}

/// Serialize durations as fractional seconds
pub mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

/// Result of a completed exchange
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FinalAnswer {
    pub text: String,
    pub transcript: Transcript,
}

enum LoopState {
    AwaitingModel,
    AwaitingToolResults(Vec<ToolCall>),
    Answering(String),
}

/// The main Agent struct
pub struct Agent {
    backend: Arc<dyn ModelBackend>,
    catalog: Arc<Catalog>,
    invoker: ToolInvoker,
    config: AgentConfig,
}

impl Agent {
    /// Create a new agent
    pub fn new(backend: Arc<dyn ModelBackend>, catalog: Arc<Catalog>, config: AgentConfig) -> Self {
        Self {
            invoker: ToolInvoker::new(config.tool_timeout),
            backend,
            catalog,
            config,
        }
    }

    /// Create with default configuration
    pub fn with_defaults(backend: Arc<dyn ModelBackend>, catalog: Arc<Catalog>) -> Self {
        Self::new(backend, catalog, AgentConfig::default())
    }

    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    /// Run one exchange for a user utterance
    pub async fn run(&self, utterance: &str) -> Result<FinalAnswer> {
        let mut transcript = Transcript::new();
        transcript.push(Turn::User(utterance.to_string()));

        let mut state = LoopState::AwaitingModel;
        loop {
            state = match state {
                LoopState::AwaitingModel => {
                    let decision = self.backend.decide(&transcript, self.catalog.descriptors()).await?;
                    self.advance(decision, &mut transcript)?
                }
                LoopState::AwaitingToolResults(calls) => {
                    let results = self.execute_tool_turn(&calls).await;
                    transcript.push(Turn::Tool(results));
                    LoopState::AwaitingModel
                }
                LoopState::Answering(text) => {
                    tracing::info!(
                        tool_turns = transcript.tool_turn_count(),
                        "Exchange complete"
                    );
                    return Ok(FinalAnswer { text, transcript });
                }
            };
        }
    }

    /// Convenience wrapper returning only the answer text
    pub async fn ask(&self, question: &str) -> Result<String> {
        Ok(self.run(question).await?.text)
    }

    /// Record a model decision and pick the next state
    fn advance(&self, decision: ModelDecision, transcript: &mut Transcript) -> Result<LoopState> {
        match decision {
            ModelDecision::FinalText(text) => {
                transcript.push(Turn::Model(ModelDecision::FinalText(text.clone())));
                Ok(LoopState::Answering(text))
            }
            ModelDecision::ToolCalls(calls) if calls.is_empty() => {
                Err(AgentError::Model("model requested an empty list of tool calls".into()))
            }
            ModelDecision::ToolCalls(calls) => {
                let calls: Vec<ToolCall> = calls.into_iter().map(assign_call_id).collect();
                tracing::debug!(count = calls.len(), "Model requested tools");
                transcript.push(Turn::Model(ModelDecision::ToolCalls(calls.clone())));

                if transcript.tool_turn_count() >= self.config.max_tool_turns {
                    tracing::warn!(limit = self.config.max_tool_turns, "Tool turn limit reached");
                    return Err(AgentError::TurnLimitExceeded {
                        limit: self.config.max_tool_turns,
                        transcript: Box::new(std::mem::take(transcript)),
                    });
                }

                Ok(LoopState::AwaitingToolResults(calls))
            }
        }
    }

    /// Run every call of one turn; results keep request order
    async fn execute_tool_turn(&self, calls: &[ToolCall]) -> Vec<ToolResult> {
        if self.config.parallel_tool_calls {
            let pending = calls.iter().map(|call| self.invoker.dispatch(&self.catalog, call));
            futures::future::join_all(pending).await
        } else {
            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                results.push(self.invoker.dispatch(&self.catalog, call).await);
            }
            results
        }
    }

    /// Release every remote tool source. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.catalog.close_remotes().await;
    }

    /// Get the merged tool catalog
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Get configuration
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }
}

fn assign_call_id(mut call: ToolCall) -> ToolCall {
    if call.id.is_none() {
        call.id = Some(uuid::Uuid::new_v4().to_string());
    }
    call
}

/// Builder for Agent configuration
pub struct AgentBuilder {
    backend: Option<Arc<dyn ModelBackend>>,
    tools: ToolRegistry,
    remotes: Vec<Arc<dyn RemoteTools>>,
    config: AgentConfig,
    registration_error: Option<AgentError>,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            backend: None,
            tools: ToolRegistry::new(),
            remotes: Vec::new(),
            config: AgentConfig::default(),
            registration_error: None,
        }
    }

    pub fn backend(mut self, backend: Arc<dyn ModelBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Register a local tool. A failed registration is reported by [`build`](Self::build).
    pub fn tool<T: Tool + 'static>(mut self, tool: T) -> Self {
        if let Err(e) = self.tools.register(tool) {
            self.registration_error.get_or_insert(e);
        }
        self
    }

    /// Register a plain function as a local tool
    pub fn function<F>(mut self, schema: ToolSchema, func: F) -> Self
    where
        F: Fn(&Arguments) -> anyhow::Result<serde_json::Value> + Send + Sync + 'static,
    {
        if let Err(e) = self.tools.register_fn(schema, func) {
            self.registration_error.get_or_insert(e);
        }
        self
    }

    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    /// Add a remote tool source (e.g. a started bridge)
    pub fn remote(mut self, remote: Arc<dyn RemoteTools>) -> Self {
        self.remotes.push(remote);
        self
    }

    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_tool_turns(mut self, max: usize) -> Self {
        self.config.max_tool_turns = max;
        self
    }

    pub fn tool_timeout(mut self, timeout: Duration) -> Self {
        self.config.tool_timeout = timeout;
        self
    }

    pub fn parallel_tool_calls(mut self, parallel: bool) -> Self {
        self.config.parallel_tool_calls = parallel;
        self
    }

    /// Merge the catalog and build the agent.
    ///
    /// On failure every remote source handed to the builder is closed.
    pub async fn build(self) -> Result<Agent> {
        let remotes = self.remotes;
        match Self::assemble(self.backend, self.tools, &remotes, self.registration_error).await {
            Ok((backend, catalog)) => Ok(Agent::new(backend, Arc::new(catalog), self.config)),
            Err(e) => {
                for remote in &remotes {
                    remote.close().await;
                }
                Err(e)
            }
        }
    }

    async fn assemble(
        backend: Option<Arc<dyn ModelBackend>>,
        tools: ToolRegistry,
        remotes: &[Arc<dyn RemoteTools>],
        registration_error: Option<AgentError>,
    ) -> Result<(Arc<dyn ModelBackend>, Catalog)> {
        if let Some(e) = registration_error {
            return Err(e);
        }
        let backend = backend.ok_or_else(|| AgentError::Config("Model backend is required".into()))?;
        let catalog = Catalog::build(tools, remotes).await?;

        tracing::info!(tools = catalog.len(), remotes = remotes.len(), "Agent ready");
        Ok((backend, catalog))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolErrorKind;
    use crate::testing::{FakeRemote, ScriptedBackend, add_schema, echo_schema, remote_descriptor};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn tool_calls(calls: Vec<ToolCall>) -> ModelDecision {
        ModelDecision::ToolCalls(calls)
    }

    fn final_text(text: &str) -> ModelDecision {
        ModelDecision::FinalText(text.into())
    }

    fn add_tool(builder: AgentBuilder) -> AgentBuilder {
        builder.function(add_schema(), |args| Ok(json!(args.integer("a")? + args.integer("b")?)))
    }

    fn only_tool_turn(transcript: &Transcript) -> &[ToolResult] {
        let turns: Vec<_> = transcript.tool_turns().collect();
        assert_eq!(turns.len(), 1);
        turns[0]
    }

    #[tokio::test]
    async fn test_add_numbers_exchange() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            tool_calls(vec![ToolCall::new("add_numbers").arg("a", 3).arg("b", 5)]),
            final_text("8"),
        ]));

        let agent = add_tool(Agent::builder().backend(backend.clone())).build().await.unwrap();
        let answer = agent.run("What is 3 plus 5?").await.unwrap();

        assert_eq!(answer.text, "8");
        let results = only_tool_turn(&answer.transcript);
        assert_eq!(results[0].value(), Some(&json!(8)));
        assert!(!results[0].call_id.is_empty());
        assert_eq!(backend.call_count(), 2);
        assert!(matches!(answer.transcript.turns()[0], Turn::User(ref u) if u == "What is 3 plus 5?"));
    }

    #[tokio::test]
    async fn test_missing_required_parameter_skips_tool() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&invocations);

        let backend = Arc::new(ScriptedBackend::new(vec![
            tool_calls(vec![ToolCall::new("add_numbers").arg("a", 3)]),
            final_text("I need both numbers."),
        ]));
        let agent = Agent::builder()
            .backend(backend)
            .function(add_schema(), move |args| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(json!(args.integer("a")? + args.integer("b")?))
            })
            .build()
            .await
            .unwrap();

        let answer = agent.run("add 3").await.unwrap();
        let results = only_tool_turn(&answer.transcript);
        assert_eq!(results[0].error_kind(), Some(ToolErrorKind::InvalidArguments));
        assert_eq!(invocations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failing_tool_is_observed_and_loop_completes() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            tool_calls(vec![ToolCall::new("flaky").arg("x", 1)]),
            final_text("The tool failed."),
        ]));
        let agent = Agent::builder()
            .backend(backend)
            .function(echo_schema("flaky"), |_| anyhow::bail!("service unavailable"))
            .build()
            .await
            .unwrap();

        let answer = agent.run("try it").await.unwrap();
        assert_eq!(answer.text, "The tool failed.");
        let results = only_tool_turn(&answer.transcript);
        assert_eq!(results[0].error_kind(), Some(ToolErrorKind::ToolExecutionFailed));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_observed() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            tool_calls(vec![ToolCall::new("teleport")]),
            final_text("I can't do that."),
        ]));
        let agent = add_tool(Agent::builder().backend(backend.clone())).build().await.unwrap();

        let answer = agent.run("beam me up").await.unwrap();
        let results = only_tool_turn(&answer.transcript);
        assert_eq!(results[0].error_kind(), Some(ToolErrorKind::UnknownTool));

        // The second decision saw the failed observation
        let seen = backend.last_transcript().unwrap();
        assert!(matches!(seen.last(), Some(Turn::Tool(_))));
    }

    #[tokio::test]
    async fn test_turn_limit_exceeded() {
        let backend = Arc::new(ScriptedBackend::repeating(tool_calls(vec![
            ToolCall::new("add_numbers").arg("a", 1).arg("b", 1),
        ])));
        let agent = add_tool(Agent::builder().backend(backend.clone()).max_tool_turns(3))
            .build()
            .await
            .unwrap();

        let err = agent.run("loop forever").await.unwrap_err();
        match err {
            AgentError::TurnLimitExceeded { limit, transcript } => {
                assert_eq!(limit, 3);
                assert_eq!(transcript.tool_turn_count(), 3);
                // The fourth request is recorded but never executed
                assert_eq!(transcript.model_turn_count(), 4);
                assert!(matches!(transcript.last(), Some(Turn::Model(ModelDecision::ToolCalls(_)))));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(backend.call_count(), 4);
    }

    #[tokio::test]
    async fn test_final_text_on_last_allowed_turn() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            tool_calls(vec![ToolCall::new("add_numbers").arg("a", 1).arg("b", 1)]),
            tool_calls(vec![ToolCall::new("add_numbers").arg("a", 2).arg("b", 2)]),
            final_text("done"),
        ]));
        let agent = add_tool(Agent::builder().backend(backend).max_tool_turns(2))
            .build()
            .await
            .unwrap();

        let answer = agent.run("twice").await.unwrap();
        assert_eq!(answer.transcript.tool_turn_count(), 2);
    }

    #[tokio::test]
    async fn test_parallel_results_keep_request_order() {
        struct Sleepy {
            name: &'static str,
            delay_ms: u64,
        }

        #[async_trait::async_trait]
        impl Tool for Sleepy {
            fn schema(&self) -> ToolSchema {
                ToolSchema::new(self.name, "Sleeps then reports its name")
            }

            async fn execute(&self, _args: &Arguments) -> anyhow::Result<serde_json::Value> {
                tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
                Ok(json!(self.name))
            }
        }

        let backend = Arc::new(ScriptedBackend::new(vec![
            tool_calls(vec![
                ToolCall::new("slow"),
                ToolCall::new("fast"),
                ToolCall::new("medium"),
            ]),
            final_text("ok"),
        ]));
        let agent = Agent::builder()
            .backend(backend)
            .tool(Sleepy { name: "slow", delay_ms: 60 })
            .tool(Sleepy { name: "fast", delay_ms: 1 })
            .tool(Sleepy { name: "medium", delay_ms: 20 })
            .build()
            .await
            .unwrap();

        let answer = agent.run("go").await.unwrap();
        let names: Vec<_> = only_tool_turn(&answer.transcript)
            .iter()
            .map(|r| r.value().cloned().unwrap())
            .collect();
        assert_eq!(names, vec![json!("slow"), json!("fast"), json!("medium")]);
    }

    #[tokio::test]
    async fn test_empty_tool_call_list_is_a_model_error() {
        let backend = Arc::new(ScriptedBackend::new(vec![tool_calls(Vec::new())]));
        let agent = Agent::builder().backend(backend).build().await.unwrap();

        let err = agent.run("hi").await.unwrap_err();
        assert!(matches!(err, AgentError::Model(_)));
    }

    #[tokio::test]
    async fn test_remote_tool_used_in_exchange() {
        let remote = Arc::new(
            FakeRemote::new("weather", vec![remote_descriptor("get_weather")])
                .respond_with(|_, args| crate::tool::ToolOutcome::Ok(json!(format!("Sunny in {}", args.str("city").unwrap_or("?"))))),
        );
        let backend = Arc::new(ScriptedBackend::new(vec![
            tool_calls(vec![ToolCall::new("get_weather").arg("city", "Tokyo")]),
            final_text("It is sunny in Tokyo."),
        ]));

        let agent = Agent::builder()
            .backend(backend)
            .remote(remote.clone())
            .build()
            .await
            .unwrap();

        let answer = agent.run("weather in Tokyo?").await.unwrap();
        let results = only_tool_turn(&answer.transcript);
        assert_eq!(results[0].value(), Some(&json!("Sunny in Tokyo")));

        agent.shutdown().await;
        assert_eq!(remote.close_count(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_across_sources_closes_remotes() {
        let remote = Arc::new(FakeRemote::new("math", vec![remote_descriptor("add_numbers")]));
        let backend = Arc::new(ScriptedBackend::new(Vec::new()));

        let err = add_tool(Agent::builder().backend(backend).remote(remote.clone()))
            .build()
            .await
            .err()
            .unwrap();

        assert!(matches!(err, AgentError::DuplicateToolName(ref n) if n == "add_numbers"));
        assert_eq!(remote.close_count(), 1);
    }

    #[tokio::test]
    async fn test_builder_requires_backend() {
        let err = AgentBuilder::new().build().await.err().unwrap();
        assert!(matches!(err, AgentError::Config(_)));
    }

    #[test]
    fn test_config_deserializes_seconds() {
        let config: AgentConfig = serde_json::from_str(r#"{"tool_timeout": 2.5}"#).unwrap();
        assert_eq!(config.tool_timeout, Duration::from_millis(2500));
        assert_eq!(config.max_tool_turns, 10);
        assert!(config.parallel_tool_calls);
    }
}
