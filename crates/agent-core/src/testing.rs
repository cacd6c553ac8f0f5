//! Shared test doubles

use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::backend::{ModelBackend, ModelDecision};
use crate::catalog::RemoteTools;
use crate::error::{AgentError, Result};
use crate::schema::{Arguments, ParameterSchema, ToolDescriptor, ToolSchema};
use crate::tool::ToolOutcome;
use crate::transcript::Transcript;

pub(crate) fn echo_schema(name: &str) -> ToolSchema {
    ToolSchema::new(name, "Echo the input")
        .param(ParameterSchema::required("x", "integer", "value"))
        .returns("integer")
}

pub(crate) fn add_schema() -> ToolSchema {
    ToolSchema::new("add_numbers", "Add two integers")
        .param(ParameterSchema::required("a", "integer", "first"))
        .param(ParameterSchema::required("b", "integer", "second"))
        .returns("integer")
}

pub(crate) fn remote_descriptor(name: &str) -> ToolDescriptor {
    ToolDescriptor::from_wire(
        name,
        "Remote lookup",
        &json!({"city": {"type": "string", "required": true, "description": "City name"}}),
        Some("string"),
    )
    .unwrap()
}

type Responder = Box<dyn Fn(&str, &Arguments) -> ToolOutcome + Send + Sync>;

/// In-memory remote tool source
pub(crate) struct FakeRemote {
    name: String,
    tools: Vec<ToolDescriptor>,
    listing_error: Mutex<Option<AgentError>>,
    responder: Responder,
    calls: AtomicUsize,
    closes: AtomicUsize,
}

impl FakeRemote {
    pub(crate) fn new(name: &str, tools: Vec<ToolDescriptor>) -> Self {
        Self {
            name: name.to_string(),
            tools,
            listing_error: Mutex::new(None),
            responder: Box::new(|_, _| ToolOutcome::Ok(json!("ok"))),
            calls: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing(name: &str, error: AgentError) -> Self {
        let remote = Self::new(name, Vec::new());
        *remote.listing_error.lock().unwrap() = Some(error);
        remote
    }

    pub(crate) fn respond_with<F>(mut self, responder: F) -> Self
    where
        F: Fn(&str, &Arguments) -> ToolOutcome + Send + Sync + 'static,
    {
        self.responder = Box::new(responder);
        self
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteTools for FakeRemote {
    fn source_name(&self) -> &str {
        &self.name
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        if let Some(err) = self.listing_error.lock().unwrap().take() {
            return Err(err);
        }
        Ok(self.tools.clone())
    }

    async fn call(&self, tool_name: &str, arguments: &Arguments, _timeout: Duration) -> ToolOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.responder)(tool_name, arguments)
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Backend that replays a fixed script of decisions
pub(crate) struct ScriptedBackend {
    script: Mutex<VecDeque<ModelDecision>>,
    fallback: Option<ModelDecision>,
    calls: AtomicUsize,
    last_transcript: Mutex<Option<Transcript>>,
}

impl ScriptedBackend {
    pub(crate) fn new(script: Vec<ModelDecision>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: None,
            calls: AtomicUsize::new(0),
            last_transcript: Mutex::new(None),
        }
    }

    /// Always answer with `decision`
    pub(crate) fn repeating(decision: ModelDecision) -> Self {
        Self {
            fallback: Some(decision),
            ..Self::new(Vec::new())
        }
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_transcript(&self) -> Option<Transcript> {
        self.last_transcript.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    async fn decide(&self, transcript: &Transcript, _tools: &[ToolDescriptor]) -> Result<ModelDecision> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_transcript.lock().unwrap() = Some(transcript.clone());

        let next = self.script.lock().unwrap().pop_front();
        next.or_else(|| self.fallback.clone())
            .ok_or_else(|| AgentError::Model("script exhausted".into()))
    }
}
