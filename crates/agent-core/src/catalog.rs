//! Tool Catalog
//!
//! The merged, immutable dispatch table for one agent: local tools from a
//! [`ToolRegistry`] plus every tool listed by each remote source. Built once
//! by [`Catalog::build`]; read-only afterwards.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AgentError, Result};
use crate::schema::{Arguments, ToolDescriptor};
use crate::tool::{Tool, ToolOutcome, ToolRegistry};

/// A source of tools living outside this process (e.g. a transport bridge)
#[async_trait]
pub trait RemoteTools: Send + Sync {
    /// Name of this source, for diagnostics
    fn source_name(&self) -> &str;

    /// Fetch the source's tool descriptors
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>>;

    /// Invoke a tool. Transport failures are reported as error outcomes.
    async fn call(&self, tool_name: &str, arguments: &Arguments, timeout: Duration) -> ToolOutcome;

    /// Release the source. Must be idempotent.
    async fn close(&self);
}

/// How a catalog entry is executed
#[derive(Clone)]
pub enum Resolver {
    Local(Arc<dyn Tool>),
    Remote(Arc<dyn RemoteTools>),
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolver::Local(_) => f.write_str("Local"),
            Resolver::Remote(remote) => write!(f, "Remote({})", remote.source_name()),
        }
    }
}

const LOCAL_SOURCE: &str = "local";

/// Merged dispatch table
#[derive(Default)]
pub struct Catalog {
    descriptors: Vec<ToolDescriptor>,
    resolvers: Vec<Resolver>,
    origins: Vec<String>,
    index: HashMap<String, usize>,
    remotes: Vec<Arc<dyn RemoteTools>>,
}

impl Catalog {
    /// Catalog of local tools only
    pub fn from_registry(registry: ToolRegistry) -> Self {
        let mut catalog = Self::default();
        for registered in registry.into_tools() {
            // Registry names are already unique
            let _ = catalog.insert(
                registered.descriptor,
                Resolver::Local(registered.tool),
                LOCAL_SOURCE,
            );
        }
        catalog
    }

    /// Union local tools with every remote source's listing.
    ///
    /// Any name collision is a hard error; nothing is overridden.
    pub async fn build(registry: ToolRegistry, remotes: &[Arc<dyn RemoteTools>]) -> Result<Self> {
        let mut catalog = Self::from_registry(registry);

        for remote in remotes {
            let tools = remote.list_tools().await?;
            tracing::info!(
                source = remote.source_name(),
                count = tools.len(),
                "Fetched remote tool catalog"
            );

            for descriptor in tools {
                catalog.insert(
                    descriptor,
                    Resolver::Remote(Arc::clone(remote)),
                    remote.source_name(),
                )?;
            }
            catalog.remotes.push(Arc::clone(remote));
        }

        Ok(catalog)
    }

    fn insert(&mut self, descriptor: ToolDescriptor, resolver: Resolver, origin: &str) -> Result<()> {
        if let Some(&existing) = self.index.get(&descriptor.name) {
            tracing::error!(
                tool = %descriptor.name,
                first = %self.origins[existing],
                second = origin,
                "Tool name collision"
            );
            return Err(AgentError::DuplicateToolName(descriptor.name));
        }

        self.index.insert(descriptor.name.clone(), self.descriptors.len());
        self.descriptors.push(descriptor);
        self.resolvers.push(resolver);
        self.origins.push(origin.to_string());
        Ok(())
    }

    /// Look up a tool by name
    pub fn get(&self, name: &str) -> Option<(&ToolDescriptor, &Resolver)> {
        self.index
            .get(name)
            .map(|&i| (&self.descriptors[i], &self.resolvers[i]))
    }

    /// Name of the source that provides `name`
    pub fn origin(&self, name: &str) -> Option<&str> {
        self.index.get(name).map(|&i| self.origins[i].as_str())
    }

    /// All descriptors: local first, then each remote source in order
    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    pub fn names(&self) -> Vec<&str> {
        self.descriptors.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Remote sources merged into this catalog
    pub fn remotes(&self) -> &[Arc<dyn RemoteTools>] {
        &self.remotes
    }

    /// Close every remote source
    pub async fn close_remotes(&self) {
        for remote in &self.remotes {
            remote.close().await;
        }
    }
}
