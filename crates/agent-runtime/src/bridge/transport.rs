//! Transport bridge: one external tool-provider process and its session.

use std::process::Stdio;
use std::time::Duration;

use agent_core::{AgentError, Arguments, RemoteTools, ToolDescriptor, ToolOutcome};
use async_trait::async_trait;
use serde_json::Value;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::BridgeConfig;
use super::error::{BridgeError, Result};
use super::protocol::Capabilities;
use super::session::{BridgeSession, BridgeState};

/// Owns a spawned tool provider for its whole lifetime.
///
/// The child is spawned with `kill_on_drop`, so dropping the bridge on any
/// path (including a failed start) terminates the process.
pub struct TransportBridge {
    config: BridgeConfig,
    session: BridgeSession,
    child: Mutex<Child>,
}

impl TransportBridge {
    /// Spawn the provider and complete the handshake
    pub async fn start(config: BridgeConfig) -> Result<Self> {
        debug!(bridge = %config.name, command = %config.command, args = ?config.args, "Spawning tool provider");

        let mut child = Command::new(&config.command)
            .args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| BridgeError::Spawn {
                command: config.command.clone(),
                source,
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(BridgeError::Spawn {
                command: config.command.clone(),
                source: std::io::Error::other("child stdio was not captured"),
            });
        };
        info!(bridge = %config.name, pid = ?child.id(), "Spawned tool provider");

        let session = match BridgeSession::connect(
            config.name.clone(),
            stdout,
            stdin,
            Capabilities::new(config.client_name.clone()),
            config.handshake_timeout,
        )
        .await
        {
            Ok(session) => session,
            Err(e) => {
                warn!(bridge = %config.name, error = %e, "Tool provider did not start");
                let _ = child.kill().await;
                return Err(e);
            }
        };

        Ok(Self {
            config,
            session,
            child: Mutex::new(child),
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn state(&self) -> BridgeState {
        self.session.state()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn server_capabilities(&self) -> &Capabilities {
        self.session.server_capabilities()
    }

    /// List the provider's tools using the configured request timeout
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        self.session.list_tools(self.config.request_timeout).await
    }

    /// Invoke a remote tool
    pub async fn call(&self, tool_name: &str, arguments: &Arguments, timeout: Duration) -> Result<Value> {
        self.session
            .call(tool_name, arguments.as_map().clone(), timeout)
            .await
    }

    /// Ask the provider to exit, kill it after the grace period, and mark
    /// the bridge closed. A provider that has stopped reading its input is
    /// killed too. Calling this again is a no-op.
    pub async fn close(&self) {
        let grace = self.config.shutdown_grace;
        if !self.session.begin_close(grace).await {
            return;
        }

        let mut child = self.child.lock().await;
        match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => info!(bridge = %self.config.name, %status, "Tool provider exited"),
            Ok(Err(e)) => warn!(bridge = %self.config.name, error = %e, "Could not wait for tool provider"),
            Err(_) => {
                warn!(bridge = %self.config.name, ?grace, "Tool provider ignored shutdown, killing");
                if let Err(e) = child.kill().await {
                    warn!(bridge = %self.config.name, error = %e, "Could not kill tool provider");
                }
            }
        }

        self.session.finish_close();
    }
}

#[async_trait]
impl RemoteTools for TransportBridge {
    fn source_name(&self) -> &str {
        &self.config.name
    }

    async fn list_tools(&self) -> agent_core::Result<Vec<ToolDescriptor>> {
        TransportBridge::list_tools(self).await.map_err(AgentError::from)
    }

    async fn call(&self, tool_name: &str, arguments: &Arguments, timeout: Duration) -> ToolOutcome {
        match TransportBridge::call(self, tool_name, arguments, timeout).await {
            Ok(value) => ToolOutcome::Ok(value),
            Err(e) => ToolOutcome::error(e.kind(), e.to_string()),
        }
    }

    async fn close(&self) {
        TransportBridge::close(self).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::ToolErrorKind;

    #[tokio::test]
    async fn test_missing_executable_is_spawn_failure() {
        let config = BridgeConfig::new("ghost", "/nonexistent/tool-provider-binary");
        let err = TransportBridge::start(config).await.err().unwrap();

        assert!(matches!(err, BridgeError::Spawn { .. }));
        assert_eq!(err.kind(), ToolErrorKind::ProcessSpawnFailed);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_provider_that_exits_fails_handshake() {
        let config = BridgeConfig::new("mute", "sh").arg("-c").arg("exit 0");
        let err = TransportBridge::start(config).await.err().unwrap();
        assert_eq!(err.kind(), ToolErrorKind::HandshakeFailed);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_provider_that_prints_garbage_fails_handshake() {
        let config = BridgeConfig::new("noisy", "sh").arg("-c").arg("echo hello; sleep 5");
        let err = TransportBridge::start(config).await.err().unwrap();
        assert!(matches!(err, BridgeError::Handshake(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_close_kills_provider_that_stops_reading() {
        let script = r#"read hello; echo '{"type":"hello-ack","serverCapabilities":{"name":"stuck","version":"0","protocol":1}}'; exec sleep 30"#;
        let mut config = BridgeConfig::new("stuck", "sh").arg("-c").arg(script);
        config.shutdown_grace = Duration::from_millis(200);

        let bridge = TransportBridge::start(config).await.unwrap();
        assert_eq!(bridge.state(), BridgeState::Ready);

        // Larger than a pipe buffer, so the write cannot complete
        let args = Arguments::new().with("blob", "x".repeat(1 << 20));
        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            RemoteTools::call(&bridge, "echo", &args, Duration::from_millis(200)),
        )
        .await
        .expect("call ignored its timeout");
        assert!(matches!(
            outcome,
            ToolOutcome::Error {
                kind: ToolErrorKind::ProtocolTimeout,
                ..
            }
        ));
        assert_eq!(bridge.state(), BridgeState::Failed);

        tokio::time::timeout(Duration::from_secs(5), bridge.close())
            .await
            .expect("close hung on a stalled provider");
        assert_eq!(bridge.state(), BridgeState::Closed);
    }
}
