//! Fixed-width frames
//!
//! Every message on the wire is a UTF-8 string right-padded with spaces to
//! exactly `width` bytes. Reads and writes always move whole frames, so a
//! frame boundary never depends on how the stream happens to be chunked.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use oblivq_core::constants::PADDING_BYTE;

use crate::error::{ClientError, Result};
use crate::protocol::Token;

/// Pads and trims frames of one fixed width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCodec {
    width: usize,
}

impl FrameCodec {
    pub fn new(width: usize) -> Self {
        Self { width }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Encode `message` as one padded frame.
    ///
    /// Fails instead of truncating when the message is wider than a frame.
    pub fn pad(&self, message: &str) -> Result<Vec<u8>> {
        let bytes = message.as_bytes();
        if bytes.len() > self.width {
            return Err(ClientError::Encoding(format!(
                "message of {} bytes exceeds frame width {}",
                bytes.len(),
                self.width
            )));
        }
        let mut frame = Vec::with_capacity(self.width);
        frame.extend_from_slice(bytes);
        frame.resize(self.width, PADDING_BYTE);
        Ok(frame)
    }

    /// Decode one frame, dropping trailing padding.
    ///
    /// Only the right side is trimmed: padding is only ever appended, and a
    /// content chunk may legitimately start with a space. A peer that pads
    /// on the left sends tokens and indices that will not parse.
    pub fn decode(&self, frame: &[u8]) -> Result<String> {
        let text = std::str::from_utf8(frame)
            .map_err(|e| ClientError::ProtocolViolation(format!("frame is not UTF-8: {}", e)))?;
        Ok(text.trim_end_matches(PADDING_BYTE as char).to_string())
    }

    /// Split text that may exceed one frame into frame-sized pieces.
    ///
    /// Pieces end on character boundaries and never end in the padding byte,
    /// so concatenating the decoded frames restores the text. Trailing
    /// padding bytes of the whole text are not preserved.
    pub fn chunk<'a>(&self, text: &'a str) -> Result<Vec<&'a str>> {
        let mut chunks = Vec::new();
        let mut rest = text.trim_end_matches(PADDING_BYTE as char);

        while !rest.is_empty() {
            let mut end = rest.len().min(self.width);
            while !rest.is_char_boundary(end) {
                end -= 1;
            }
            while end > 0 && rest.as_bytes()[end - 1] == PADDING_BYTE {
                end -= 1;
            }
            if end == 0 {
                return Err(ClientError::Encoding(format!(
                    "cannot split text into {}-byte frames without losing padding bytes",
                    self.width
                )));
            }
            chunks.push(&rest[..end]);
            rest = &rest[end..];
        }

        Ok(chunks)
    }
}

/// One connection speaking whole frames.
///
/// Owns the stream; dropping the channel closes the connection, so every
/// exit path releases it. `close` additionally flushes and shuts the write
/// side down cleanly.
pub struct FrameChannel<S> {
    stream: S,
    codec: FrameCodec,
}

impl<S> FrameChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, codec: FrameCodec) -> Self {
        Self { stream, codec }
    }

    pub fn codec(&self) -> FrameCodec {
        self.codec
    }

    pub async fn send(&mut self, message: &str) -> Result<()> {
        let frame = self.codec.pad(message)?;
        self.stream.write_all(&frame).await?;
        tracing::trace!(frame = message, "Sent frame");
        Ok(())
    }

    pub async fn send_token(&mut self, token: Token) -> Result<()> {
        self.send(token.as_str()).await
    }

    /// Send text of any length as consecutive frames
    pub async fn send_chunked(&mut self, text: &str) -> Result<()> {
        for chunk in self.codec.chunk(text)? {
            self.send(chunk).await?;
        }
        Ok(())
    }

    /// Read exactly one frame
    pub async fn recv(&mut self) -> Result<String> {
        let mut frame = vec![0u8; self.codec.width()];
        self.stream.read_exact(&mut frame).await?;
        let message = self.codec.decode(&frame)?;
        tracing::trace!(frame = %message, "Received frame");
        Ok(message)
    }

    /// Block until the peer sends the disconnect marker.
    ///
    /// Other frames are skipped without interpretation, sleeping `poll`
    /// between reads. There is no upper bound on the wait.
    pub async fn wait_for_disconnect(&mut self, poll: Duration) -> Result<()> {
        loop {
            let message = self.recv().await?;
            if Token::parse(&message) == Some(Token::Disconnect) {
                return Ok(());
            }
            tracing::debug!(frame = %message, "Skipping frame while waiting for disconnect");
            tokio::time::sleep(poll).await;
        }
    }

    /// Flush pending frames and shut the connection down.
    ///
    /// A peer that already hung up after its last frame is not an error.
    pub async fn close(mut self) -> Result<()> {
        self.stream.flush().await?;
        match self.stream.shutdown().await {
            Ok(()) => Ok(()),
            Err(e) if peer_gone(&e) => {
                tracing::debug!(error = %e, "Peer closed first");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn peer_gone(e: &std::io::Error) -> bool {
    use std::io::ErrorKind;
    matches!(
        e.kind(),
        ErrorKind::NotConnected | ErrorKind::BrokenPipe | ErrorKind::ConnectionReset
    )
}
