//! Provider side of the bridge protocol.
//!
//! [`ToolServer`] serves a [`ToolRegistry`] over any duplex byte stream,
//! typically the process's own stdin/stdout. Calls run concurrently and
//! their results are written as they finish, so responses can overtake
//! each other.

use std::sync::Arc;
use std::time::Duration;

use agent_core::{Catalog, ToolCall, ToolInvoker, ToolRegistry};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::codec::{FrameReader, FrameWriter};
use super::error::Result;
use super::protocol::{Capabilities, Frame, PROTOCOL_VERSION, WireTool};

pub struct ToolServer {
    catalog: Arc<Catalog>,
    invoker: ToolInvoker,
    capabilities: Capabilities,
}

impl ToolServer {
    pub fn new(registry: ToolRegistry, capabilities: Capabilities) -> Self {
        Self {
            catalog: Arc::new(Catalog::from_registry(registry)),
            invoker: ToolInvoker::default(),
            capabilities,
        }
    }

    /// Bound on a single tool call
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.invoker = ToolInvoker::new(timeout);
        self
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Serve until `shutdown` or end of input, then wait for in-flight calls
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let mut frames = FrameReader::new(reader);
        let writer = Arc::new(Mutex::new(FrameWriter::new(writer)));
        let mut in_flight = JoinSet::new();

        info!(server = %self.capabilities.name, tools = self.catalog.len(), "Serving tools");

        loop {
            let frame = match frames.next_frame().await {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    debug!("Client closed the stream");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Skipping undecodable frame");
                    continue;
                }
            };

            match frame {
                Frame::Hello {
                    client_capabilities,
                } => {
                    if client_capabilities.protocol != PROTOCOL_VERSION {
                        warn!(client = %client_capabilities.name, protocol = client_capabilities.protocol, "Client speaks a different protocol");
                    }
                    info!(client = %client_capabilities.name, version = %client_capabilities.version, "Client connected");
                    let ack = Frame::HelloAck {
                        server_capabilities: self.capabilities.clone(),
                    };
                    writer.lock().await.send(&ack).await?;
                }
                Frame::ListTools { request_id } => {
                    let tools = self
                        .catalog
                        .descriptors()
                        .iter()
                        .map(WireTool::from_descriptor)
                        .collect();
                    writer
                        .lock()
                        .await
                        .send(&Frame::Tools { request_id, tools })
                        .await?;
                }
                Frame::Call {
                    request_id,
                    tool_name,
                    arguments,
                } => {
                    let catalog = Arc::clone(&self.catalog);
                    let invoker = self.invoker.clone();
                    let writer = Arc::clone(&writer);

                    in_flight.spawn(async move {
                        let call = ToolCall {
                            name: tool_name,
                            arguments,
                            id: Some(request_id.to_string()),
                        };
                        let result = invoker.dispatch(&catalog, &call).await;
                        let frame = Frame::call_result(request_id, result.outcome);
                        if let Err(e) = writer.lock().await.send(&frame).await {
                            warn!(request_id, error = %e, "Could not write result");
                        }
                    });
                }
                Frame::Shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                other => {
                    warn!(frame = other.type_name(), "Ignoring unexpected frame");
                }
            }
        }

        while in_flight.join_next().await.is_some() {}
        Ok(())
    }
}
