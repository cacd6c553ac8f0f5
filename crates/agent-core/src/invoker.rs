//! Tool Invocation
//!
//! Validates raw arguments against a descriptor and dispatches to the
//! entry's resolver. Every failure comes back as an error [`ToolOutcome`],
//! never as a Rust error, so the reasoning loop always gets an observation.

use futures::FutureExt;
use serde_json::{Map, Value};
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use crate::catalog::{Catalog, Resolver};
use crate::error::ToolErrorKind;
use crate::schema::{Arguments, ToolDescriptor};
use crate::tool::{Tool, ToolCall, ToolOutcome, ToolResult};

/// Executes single tool calls against a catalog
#[derive(Clone, Debug)]
pub struct ToolInvoker {
    timeout: Duration,
}

impl Default for ToolInvoker {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl ToolInvoker {
    /// `timeout` bounds every call, local or remote
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolve `call` by name and invoke it.
    ///
    /// The call must already carry an id; a missing one is recorded as empty.
    pub async fn dispatch(&self, catalog: &Catalog, call: &ToolCall) -> ToolResult {
        let call_id = call.id.clone().unwrap_or_default();

        match catalog.get(&call.name) {
            Some((descriptor, resolver)) => {
                self.invoke(descriptor, resolver, &call_id, &call.arguments).await
            }
            None => {
                tracing::warn!(tool = %call.name, call_id = %call_id, "Unknown tool requested");
                ToolResult::failure(
                    call_id,
                    &call.name,
                    ToolErrorKind::UnknownTool,
                    format!("Unknown tool: {}", call.name),
                )
            }
        }
    }

    /// Validate then execute one call
    pub async fn invoke(
        &self,
        descriptor: &ToolDescriptor,
        resolver: &Resolver,
        call_id: &str,
        raw: &Map<String, Value>,
    ) -> ToolResult {
        let args = match descriptor.validate(raw) {
            Ok(args) => args,
            Err(e) => {
                tracing::warn!(tool = %descriptor.name, call_id, error = %e, "Rejected tool arguments");
                return ToolResult::new(call_id, &descriptor.name, ToolOutcome::from_error(&e));
            }
        };

        tracing::info!(tool = %descriptor.name, call_id, "Executing tool");

        let outcome = match resolver {
            Resolver::Local(tool) => self.run_local(tool.as_ref(), &args).await,
            Resolver::Remote(remote) => remote.call(&descriptor.name, &args, self.timeout).await,
        };

        match &outcome {
            ToolOutcome::Ok(_) => tracing::debug!(tool = %descriptor.name, call_id, "Tool succeeded"),
            ToolOutcome::Error { kind, message } => {
                tracing::warn!(tool = %descriptor.name, call_id, %kind, %message, "Tool failed");
            }
        }

        ToolResult::new(call_id, &descriptor.name, outcome)
    }

    async fn run_local(&self, tool: &dyn Tool, args: &Arguments) -> ToolOutcome {
        let guarded = AssertUnwindSafe(tool.execute(args)).catch_unwind();

        match tokio::time::timeout(self.timeout, guarded).await {
            Ok(Ok(Ok(value))) => ToolOutcome::Ok(value),
            Ok(Ok(Err(e))) => ToolOutcome::error(ToolErrorKind::ToolExecutionFailed, format!("{e:#}")),
            Ok(Err(panic)) => ToolOutcome::error(
                ToolErrorKind::ToolExecutionFailed,
                format!("tool panicked: {}", panic_message(panic.as_ref())),
            ),
            Err(_) => ToolOutcome::error(
                ToolErrorKind::ToolExecutionFailed,
                format!("tool did not finish within {}s", self.timeout.as_secs_f64()),
            ),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
