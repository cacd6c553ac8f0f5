//! Newline-delimited JSON framing

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};

use super::error::{BridgeError, Result};
use super::protocol::Frame;

/// Longest frame echoed back in a decode error
const MAX_ECHO: usize = 200;

/// Reads one [`Frame`] per line
pub struct FrameReader<R> {
    inner: BufReader<R>,
    line: String,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            inner: BufReader::new(reader),
            line: String::new(),
        }
    }

    /// Next frame, or `None` at end of stream. Blank lines are skipped.
    pub async fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            self.line.clear();
            if self.inner.read_line(&mut self.line).await? == 0 {
                return Ok(None);
            }

            let raw = self.line.trim();
            if raw.is_empty() {
                continue;
            }
            tracing::trace!(frame = raw, "Received frame");

            return serde_json::from_str(raw).map(Some).map_err(|e| {
                let echo: String = raw.chars().take(MAX_ECHO).collect();
                BridgeError::Decode(format!("{e} in {echo}"))
            });
        }
    }
}

/// Writes one [`Frame`] per line, flushing after each
pub struct FrameWriter<W> {
    inner: BufWriter<W>,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            inner: BufWriter::new(writer),
        }
    }

    pub async fn send(&mut self, frame: &Frame) -> Result<()> {
        let mut line = serde_json::to_vec(frame)?;
        line.push(b'\n');
        self.inner.write_all(&line).await?;
        self.inner.flush().await?;
        tracing::trace!(frame = frame.type_name(), "Sent frame");
        Ok(())
    }

    /// Flush and close the underlying stream
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}
