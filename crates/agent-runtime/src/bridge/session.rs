//! Bridge session: correlated request/response over one duplex stream.
//!
//! A single background task owns the read half and resolves pending
//! requests by `requestId`, so any number of callers can have requests
//! in flight and responses may arrive in any order. Writes are serialized
//! through a mutex-guarded writer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use agent_core::ToolDescriptor;
use serde_json::{Map, Value};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex as AsyncMutex, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::codec::{FrameReader, FrameWriter};
use super::error::{BridgeError, Result};
use super::protocol::{Capabilities, Frame, PROTOCOL_VERSION};
use agent_core::ToolErrorKind;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

const DEFAULT_CLOSE_GRACE: Duration = Duration::from_secs(3);

/// Lifecycle of a bridge session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BridgeState {
    Starting,
    Ready,
    Closing,
    Closed,
    Failed,
}

impl std::fmt::Display for BridgeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BridgeState::Starting => "starting",
            BridgeState::Ready => "ready",
            BridgeState::Closing => "closing",
            BridgeState::Closed => "closed",
            BridgeState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// State and pending slots share one lock so a request can never be
/// registered after the reader has drained the table.
struct Shared {
    state: BridgeState,
    pending: HashMap<u64, oneshot::Sender<Frame>>,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(|e| e.into_inner())
}

/// Removes a pending slot when the waiting caller gives up
struct PendingGuard<'a> {
    shared: &'a Mutex<Shared>,
    request_id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        lock(self.shared).pending.remove(&self.request_id);
    }
}

/// A connected, handshaken session with a tool provider
pub struct BridgeSession {
    name: String,
    server: Capabilities,
    shared: Arc<Mutex<Shared>>,
    writer: AsyncMutex<FrameWriter<BoxedWriter>>,
    next_request_id: AtomicU64,
    reader_handle: Mutex<Option<JoinHandle<()>>>,
}

impl BridgeSession {
    /// Perform the handshake over `reader`/`writer` and start the reader loop.
    pub async fn connect<R, W>(
        name: impl Into<String>,
        reader: R,
        writer: W,
        client: Capabilities,
        handshake_timeout: Duration,
    ) -> Result<Self>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let name = name.into();
        let mut frames = FrameReader::new(reader);
        let mut writer = FrameWriter::new(Box::new(writer) as BoxedWriter);
        debug!(bridge = %name, state = %BridgeState::Starting, "Starting handshake");

        writer
            .send(&Frame::Hello {
                client_capabilities: client,
            })
            .await
            .map_err(|e| BridgeError::Handshake(format!("could not send hello: {e}")))?;

        let server = match tokio::time::timeout(handshake_timeout, frames.next_frame()).await {
            Ok(Ok(Some(Frame::HelloAck {
                server_capabilities,
            }))) => server_capabilities,
            Ok(Ok(Some(other))) => {
                return Err(BridgeError::Handshake(format!(
                    "expected hello-ack, got {}",
                    other.type_name()
                )));
            }
            Ok(Ok(None)) => {
                return Err(BridgeError::Handshake(
                    "provider closed the stream before hello-ack".into(),
                ));
            }
            Ok(Err(e)) => return Err(BridgeError::Handshake(e.to_string())),
            Err(_) => {
                return Err(BridgeError::Handshake(format!(
                    "no hello-ack within {handshake_timeout:?}"
                )));
            }
        };

        if server.protocol != PROTOCOL_VERSION {
            return Err(BridgeError::Handshake(format!(
                "provider speaks protocol {}, expected {PROTOCOL_VERSION}",
                server.protocol
            )));
        }

        info!(
            bridge = %name,
            server = %server.name,
            version = %server.version,
            "Tool provider ready"
        );

        let shared = Arc::new(Mutex::new(Shared {
            state: BridgeState::Ready,
            pending: HashMap::new(),
        }));
        let reader_handle = tokio::spawn(reader_loop(name.clone(), frames, Arc::clone(&shared)));

        Ok(Self {
            name,
            server,
            shared,
            writer: AsyncMutex::new(writer),
            next_request_id: AtomicU64::new(1),
            reader_handle: Mutex::new(Some(reader_handle)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> BridgeState {
        lock(&self.shared).state
    }

    /// Capabilities announced by the provider
    pub fn server_capabilities(&self) -> &Capabilities {
        &self.server
    }

    /// Number of requests awaiting a response
    pub fn pending_count(&self) -> usize {
        lock(&self.shared).pending.len()
    }

    /// Fetch the provider's tool list
    pub async fn list_tools(&self, timeout: Duration) -> Result<Vec<ToolDescriptor>> {
        match self.request(|request_id| Frame::ListTools { request_id }, timeout).await? {
            Frame::Tools { tools, .. } => tools
                .iter()
                .map(|tool| {
                    tool.to_descriptor()
                        .map_err(|e| BridgeError::Decode(format!("tool '{}': {e}", tool.name)))
                })
                .collect(),
            other => Err(unexpected_response("tools", &other)),
        }
    }

    /// Invoke a remote tool
    pub async fn call(
        &self,
        tool_name: &str,
        arguments: Map<String, Value>,
        timeout: Duration,
    ) -> Result<Value> {
        let frame = self
            .request(
                |request_id| Frame::Call {
                    request_id,
                    tool_name: tool_name.to_string(),
                    arguments,
                },
                timeout,
            )
            .await?;

        match frame {
            Frame::CallResult {
                ok: true, value, ..
            } => Ok(value.unwrap_or(Value::Null)),
            Frame::CallResult {
                error, error_kind, ..
            } => Err(BridgeError::Remote {
                kind: error_kind.unwrap_or(ToolErrorKind::ToolExecutionFailed),
                message: error.unwrap_or_else(|| format!("tool '{tool_name}' failed")),
            }),
            other => Err(unexpected_response("result", &other)),
        }
    }

    /// Send a request and wait for the frame carrying the same `requestId`
    async fn request(
        &self,
        build: impl FnOnce(u64) -> Frame,
        timeout: Duration,
    ) -> Result<Frame> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();

        {
            let mut shared = lock(&self.shared);
            if shared.state != BridgeState::Ready {
                return Err(BridgeError::Unavailable(format!(
                    "bridge '{}' is {}",
                    self.name, shared.state
                )));
            }
            shared.pending.insert(request_id, tx);
        }
        let _guard = PendingGuard {
            shared: self.shared.as_ref(),
            request_id,
        };

        let frame = build(request_id);
        debug!(bridge = %self.name, request_id, frame = frame.type_name(), "Sending request");

        // Sending counts against the same deadline as the response
        let deadline = Instant::now() + timeout;
        let sent = tokio::time::timeout_at(deadline, async {
            self.writer.lock().await.send(&frame).await
        })
        .await;
        match sent {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.fail(&e.to_string());
                return Err(BridgeError::Unavailable(format!("write failed: {e}")));
            }
            Err(_) => {
                // A half-written frame leaves the stream unusable
                self.fail("provider stopped reading its input");
                return Err(BridgeError::Timeout {
                    request_id,
                    timeout,
                });
            }
        }

        match tokio::time::timeout_at(deadline, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(BridgeError::Unavailable(format!(
                "bridge '{}' ended before request {request_id} was answered",
                self.name
            ))),
            Err(_) => {
                warn!(bridge = %self.name, request_id, "Request timed out");
                Err(BridgeError::Timeout {
                    request_id,
                    timeout,
                })
            }
        }
    }

    fn fail(&self, reason: &str) {
        let mut shared = lock(&self.shared);
        if matches!(shared.state, BridgeState::Starting | BridgeState::Ready) {
            warn!(bridge = %self.name, reason, "Bridge failed");
            shared.state = BridgeState::Failed;
            shared.pending.clear();
        }
    }

    /// First half of close: move to `Closing` and ask the provider to exit.
    /// Writing the shutdown frame is bounded by `grace`.
    ///
    /// Returns `false` when the session is already closing or closed.
    pub(crate) async fn begin_close(&self, grace: Duration) -> bool {
        let was_ready = {
            let mut shared = lock(&self.shared);
            match shared.state {
                BridgeState::Closing | BridgeState::Closed => return false,
                state => {
                    shared.state = BridgeState::Closing;
                    state == BridgeState::Ready
                }
            }
        };
        debug!(bridge = %self.name, "Closing bridge");

        let farewell = tokio::time::timeout(grace, async {
            let mut writer = self.writer.lock().await;
            if was_ready && let Err(e) = writer.send(&Frame::Shutdown).await {
                debug!(bridge = %self.name, error = %e, "Could not send shutdown");
            }
            // EOF on stdin tells well-behaved providers to exit too
            let _ = writer.shutdown().await;
        })
        .await;
        if farewell.is_err() {
            warn!(bridge = %self.name, ?grace, "Tool provider is not reading; skipping shutdown frame");
        }
        true
    }

    /// Second half of close: stop the reader and release waiting callers
    pub(crate) fn finish_close(&self) {
        if let Some(handle) = self
            .reader_handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.abort();
        }

        let mut shared = lock(&self.shared);
        shared.state = BridgeState::Closed;
        shared.pending.clear();
        info!(bridge = %self.name, "Bridge closed");
    }

    /// Shut the session down. Calling this again is a no-op.
    pub async fn close(&self) {
        self.close_within(DEFAULT_CLOSE_GRACE).await;
    }

    /// Like [`close`](Self::close), giving the provider at most `grace` to
    /// take the shutdown frame
    pub async fn close_within(&self, grace: Duration) {
        if self.begin_close(grace).await {
            self.finish_close();
        }
    }
}

impl Drop for BridgeSession {
    fn drop(&mut self) {
        if let Some(handle) = self
            .reader_handle
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.abort();
        }
    }
}

fn unexpected_response(expected: &str, got: &Frame) -> BridgeError {
    BridgeError::Decode(format!(
        "expected a {expected} frame, got {}",
        got.type_name()
    ))
}

/// Single owner of the read half. Routes responses to their pending slot
/// until the stream ends or a frame cannot be decoded.
async fn reader_loop<R>(name: String, mut frames: FrameReader<R>, shared: Arc<Mutex<Shared>>)
where
    R: AsyncRead + Unpin,
{
    let reason = loop {
        match frames.next_frame().await {
            Ok(Some(frame)) => {
                let Some(request_id) = frame.request_id() else {
                    warn!(bridge = %name, frame = frame.type_name(), "Ignoring uncorrelated frame");
                    continue;
                };

                let slot = lock(&shared).pending.remove(&request_id);
                match slot {
                    Some(tx) => {
                        // The caller may have given up in the meantime
                        let _ = tx.send(frame);
                    }
                    None => {
                        warn!(
                            bridge = %name,
                            request_id,
                            frame = frame.type_name(),
                            "Dropping response with no pending request"
                        );
                    }
                }
            }
            Ok(None) => break "tool provider closed its output".to_string(),
            Err(e) => break e.to_string(),
        }
    };

    let mut shared = lock(&shared);
    if matches!(shared.state, BridgeState::Closing | BridgeState::Closed) {
        debug!(bridge = %name, reason, "Reader loop finished");
    } else {
        warn!(
            bridge = %name,
            reason,
            in_flight = shared.pending.len(),
            "Bridge failed"
        );
        shared.state = BridgeState::Failed;
    }
    shared.pending.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};

    const SHORT: Duration = Duration::from_millis(200);
    const LONG: Duration = Duration::from_secs(5);

    /// The provider end of a duplex pipe, driven frame by frame from the test
    struct FakeProvider {
        frames: FrameReader<ReadHalf<DuplexStream>>,
        writer: WriteHalf<DuplexStream>,
    }

    impl FakeProvider {
        async fn expect(&mut self) -> Frame {
            self.frames.next_frame().await.unwrap().expect("stream ended")
        }

        async fn send(&mut self, frame: Frame) {
            self.send_raw(&serde_json::to_string(&frame).unwrap()).await;
        }

        async fn send_raw(&mut self, line: &str) {
            self.writer.write_all(line.as_bytes()).await.unwrap();
            self.writer.write_all(b"\n").await.unwrap();
            self.writer.flush().await.unwrap();
        }
    }

    fn ok_result(request_id: u64, value: Value) -> Frame {
        Frame::call_result(request_id, agent_core::ToolOutcome::Ok(value))
    }

    async fn connected() -> (BridgeSession, FakeProvider) {
        connected_with_buffer(64 * 1024).await
    }

    async fn connected_with_buffer(buffer: usize) -> (BridgeSession, FakeProvider) {
        let (client_io, provider_io) = tokio::io::duplex(buffer);
        let (client_read, client_write) = tokio::io::split(client_io);
        let (provider_read, provider_write) = tokio::io::split(provider_io);

        let mut provider = FakeProvider {
            frames: FrameReader::new(provider_read),
            writer: provider_write,
        };

        let provider_side = async {
            assert!(matches!(provider.expect().await, Frame::Hello { .. }));
            provider
                .send(Frame::HelloAck {
                    server_capabilities: Capabilities::new("fake"),
                })
                .await;
        };
        let client_side = BridgeSession::connect(
            "fake",
            client_read,
            client_write,
            Capabilities::new("test-client"),
            LONG,
        );

        let (session, ()) = tokio::join!(client_side, provider_side);
        (session.unwrap(), provider)
    }

    #[tokio::test]
    async fn test_handshake_reaches_ready() {
        let (session, _provider) = connected().await;
        assert_eq!(session.state(), BridgeState::Ready);
        assert_eq!(session.server_capabilities().name, "fake");
    }

    #[tokio::test]
    async fn test_handshake_rejects_wrong_protocol() {
        let (client_io, provider_io) = tokio::io::duplex(4096);
        let (client_read, client_write) = tokio::io::split(client_io);
        let (provider_read, provider_write) = tokio::io::split(provider_io);
        let mut frames = FrameReader::new(provider_read);
        let mut writer = FrameWriter::new(provider_write);

        let provider_side = async {
            frames.next_frame().await.unwrap();
            let mut caps = Capabilities::new("future");
            caps.protocol = 99;
            writer.send(&Frame::HelloAck { server_capabilities: caps }).await.unwrap();
        };
        let client_side = BridgeSession::connect("v99", client_read, client_write, Capabilities::new("t"), LONG);

        let (result, ()) = tokio::join!(client_side, provider_side);
        assert!(matches!(result, Err(BridgeError::Handshake(ref m)) if m.contains("99")));
    }

    #[tokio::test]
    async fn test_handshake_times_out_on_silent_provider() {
        let (client_io, _provider_io) = tokio::io::duplex(4096);
        let (client_read, client_write) = tokio::io::split(client_io);

        let result = BridgeSession::connect("silent", client_read, client_write, Capabilities::new("t"), SHORT).await;
        assert!(matches!(result, Err(BridgeError::Handshake(_))));
    }

    #[tokio::test]
    async fn test_out_of_order_responses_reach_their_callers() {
        let (session, mut provider) = connected().await;

        let echo = session.call("echo", json!({"x": 5}).as_object().cloned().unwrap(), LONG);
        let clock = session.call("clock", Map::new(), LONG);

        let provider_side = async {
            let first = provider.expect().await;
            let second = provider.expect().await;
            let (mut echo_id, mut clock_id) = (0, 0);
            for frame in [first, second] {
                match frame {
                    Frame::Call { request_id, ref tool_name, .. } if tool_name == "echo" => echo_id = request_id,
                    Frame::Call { request_id, .. } => clock_id = request_id,
                    other => panic!("unexpected frame {other:?}"),
                }
            }
            // Answer the second request first
            provider.send(ok_result(clock_id, json!("12:00"))).await;
            provider.send(ok_result(echo_id, json!(5))).await;
        };

        let (echo, clock, ()) = tokio::join!(echo, clock, provider_side);
        assert_eq!(echo.unwrap(), json!(5));
        assert_eq!(clock.unwrap(), json!("12:00"));
        assert_eq!(session.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_request_ids_start_at_one() {
        let (session, mut provider) = connected().await;

        let listing = session.list_tools(LONG);
        let provider_side = async {
            let frame = provider.expect().await;
            assert_eq!(frame, Frame::ListTools { request_id: 1 });
            provider
                .send(Frame::Tools {
                    request_id: 1,
                    tools: vec![serde_json::from_value(json!({
                        "name": "echo",
                        "description": "Echo",
                        "parameterSchema": {"x": {"type": "integer", "required": true}}
                    }))
                    .unwrap()],
                })
                .await;
        };

        let (tools, ()) = tokio::join!(listing, provider_side);
        let tools = tools.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "echo");
    }

    #[tokio::test]
    async fn test_timeout_releases_slot_and_late_response_is_dropped() {
        let (session, mut provider) = connected().await;

        let result = session.call("slow", Map::new(), SHORT).await;
        assert!(matches!(result, Err(BridgeError::Timeout { request_id: 1, .. })));
        assert_eq!(session.pending_count(), 0);

        // The late answer finds no slot and must not disturb the session
        let Frame::Call { request_id, .. } = provider.expect().await else { panic!("expected call") };
        provider.send(ok_result(request_id, json!("late"))).await;

        let next = session.call("fast", Map::new(), LONG);
        let provider_side = async {
            let Frame::Call { request_id, .. } = provider.expect().await else { panic!("expected call") };
            provider.send(ok_result(request_id, json!("on time"))).await;
        };
        let (next, ()) = tokio::join!(next, provider_side);
        assert_eq!(next.unwrap(), json!("on time"));
        assert_eq!(session.state(), BridgeState::Ready);
    }

    #[tokio::test]
    async fn test_remote_failure_maps_to_execution_failed() {
        let (session, mut provider) = connected().await;

        let call = session.call("get_weather", Map::new(), LONG);
        let provider_side = async {
            let Frame::Call { request_id, .. } = provider.expect().await else { panic!("expected call") };
            provider.send_raw(&format!(
                r#"{{"type":"result","requestId":{request_id},"ok":false,"error":"city not found"}}"#
            )).await;
        };

        let (result, ()) = tokio::join!(call, provider_side);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ToolErrorKind::ToolExecutionFailed);
        assert_eq!(err.to_string(), "city not found");
    }

    #[tokio::test]
    async fn test_provider_exit_fails_in_flight_calls() {
        let (session, mut provider) = connected().await;

        let call = session.call("echo", Map::new(), LONG);
        let provider_side = async move {
            provider.expect().await;
            drop(provider);
        };

        let (result, ()) = tokio::join!(call, provider_side);
        assert_eq!(result.unwrap_err().kind(), ToolErrorKind::BridgeUnavailable);
        assert_eq!(session.state(), BridgeState::Failed);

        // Fails fast from now on
        let again = session.call("echo", Map::new(), LONG).await;
        assert!(matches!(again, Err(BridgeError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_garbage_frame_fails_session() {
        let (session, mut provider) = connected().await;

        let call = session.call("echo", Map::new(), LONG);
        let provider_side = async {
            provider.expect().await;
            provider.send_raw("{this is not json").await;
        };

        let (result, ()) = tokio::join!(call, provider_side);
        assert_eq!(result.unwrap_err().kind(), ToolErrorKind::BridgeUnavailable);
        assert_eq!(session.state(), BridgeState::Failed);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_sends_shutdown() {
        let (session, mut provider) = connected().await;

        session.close().await;
        assert_eq!(session.state(), BridgeState::Closed);
        assert_eq!(provider.expect().await, Frame::Shutdown);
        assert_eq!(provider.frames.next_frame().await.unwrap(), None);

        session.close().await;
        assert_eq!(session.state(), BridgeState::Closed);

        let after = session.call("echo", Map::new(), LONG).await;
        assert!(matches!(after, Err(BridgeError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_call_times_out_when_provider_stops_reading() {
        let (session, _provider) = connected_with_buffer(256).await;

        let mut args = Map::new();
        args.insert("blob".into(), json!("x".repeat(10_000)));

        let started = std::time::Instant::now();
        let err = tokio::time::timeout(LONG, session.call("echo", args, SHORT))
            .await
            .expect("call ignored its timeout")
            .unwrap_err();

        assert!(matches!(err, BridgeError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(session.state(), BridgeState::Failed);
        assert_eq!(session.pending_count(), 0);

        let again = session.call("echo", Map::new(), SHORT).await.unwrap_err();
        assert!(matches!(again, BridgeError::Unavailable(_)));

        tokio::time::timeout(LONG, session.close_within(SHORT))
            .await
            .expect("close hung on a stalled provider");
        assert_eq!(session.state(), BridgeState::Closed);
    }
}
