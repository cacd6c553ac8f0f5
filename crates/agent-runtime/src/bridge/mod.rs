//! Transport bridge to external tool-provider processes.
//!
//! ```text
//!   TransportBridge ── spawns ──▶ provider process
//!        │                          ▲      │
//!        ▼                    stdin │      │ stdout
//!   BridgeSession ── FrameWriter ───┘      └─── FrameReader ──▶ reader loop
//!        ▲                                                       │
//!        └──────────── pending[requestId] ◀──────────────────────┘
//! ```
//!
//! Frames are newline-delimited JSON (see [`protocol`]). A `TransportBridge`
//! implements [`agent_core::RemoteTools`], so it plugs directly into the
//! catalog. [`ToolServer`] is the other end of the same protocol.

mod codec;
pub mod error;
pub mod protocol;
pub mod server;
pub mod session;
pub mod transport;

use std::collections::BTreeMap;
use std::time::Duration;

use agent_core::reasoning::duration_secs;
use serde::{Deserialize, Serialize};

pub use codec::{FrameReader, FrameWriter};
pub use error::BridgeError;
pub use protocol::{Capabilities, Frame, PROTOCOL_VERSION, WireTool};
pub use server::ToolServer;
pub use session::{BridgeSession, BridgeState};
pub use transport::TransportBridge;

/// How to launch and talk to one tool provider
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Source name used in logs and collision errors
    pub name: String,

    /// Executable to launch
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Extra environment for the child
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default = "default_handshake_timeout", with = "duration_secs")]
    pub handshake_timeout: Duration,

    /// Timeout for `list-tools`
    #[serde(default = "default_request_timeout", with = "duration_secs")]
    pub request_timeout: Duration,

    /// How long the provider gets to exit after `shutdown`
    #[serde(default = "default_shutdown_grace", with = "duration_secs")]
    pub shutdown_grace: Duration,

    /// Name announced in the handshake
    #[serde(default = "default_client_name")]
    pub client_name: String,
}

fn default_handshake_timeout() -> Duration { Duration::from_secs(10) }
fn default_request_timeout() -> Duration { Duration::from_secs(30) }
fn default_shutdown_grace() -> Duration { Duration::from_secs(3) }
fn default_client_name() -> String { "tool-agent".into() }

impl BridgeConfig {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            handshake_timeout: default_handshake_timeout(),
            request_timeout: default_request_timeout(),
            shutdown_grace: default_shutdown_grace(),
            client_name: default_client_name(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }
}
