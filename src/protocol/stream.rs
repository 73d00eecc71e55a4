//! Stream adapters for the RESP codec.
//!
//! [`RespReader`] binds the incremental parser to an async byte source and
//! yields one value per call. TCP is a stream protocol, so a single read may
//! carry half a message or several of them; the reader keeps the leftover
//! bytes in a `BytesMut` between calls.
//!
//! The `write_*` helpers encode a single reply straight onto an async sink.

use crate::protocol::parser::{FrameScanner, ParseError, RespParser};
use crate::protocol::types::{EncodeError, RespValue};
use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Default cap on the encoded length of a single message (8 MB)
pub const DEFAULT_MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

/// Errors returned by [`RespReader::read_value`].
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Parse(#[from] ParseError),

    /// The peer closed the stream in the middle of a value.
    #[error("unexpected end of stream with {buffered} bytes buffered")]
    UnexpectedEof { buffered: usize },

    /// A single message is longer than the configured cap.
    #[error("frame exceeds {max} bytes")]
    FrameTooLarge { max: usize },
}

/// Decoder bound to one input stream.
///
/// Completeness is tracked by a [`FrameScanner`] that resumes where the last
/// read left off; values are only built once a whole message is buffered.
#[derive(Debug)]
pub struct RespReader<R> {
    inner: R,
    buffer: BytesMut,
    scanner: FrameScanner,
    parser: RespParser,
    max_frame_bytes: usize,
}

impl<R: AsyncRead + Unpin> RespReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_max_frame_bytes(inner, DEFAULT_MAX_FRAME_BYTES)
    }

    /// Messages longer than `max_frame_bytes` in total fail with
    /// [`DecodeError::FrameTooLarge`].
    pub fn with_max_frame_bytes(inner: R, max_frame_bytes: usize) -> Self {
        Self {
            inner,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            scanner: FrameScanner::new(max_frame_bytes),
            parser: RespParser::new().with_max_bulk_len(max_frame_bytes),
            max_frame_bytes,
        }
    }

    /// Reads the next complete value.
    ///
    /// Returns `Ok(None)` when the peer closed the stream between messages.
    pub async fn read_value(&mut self) -> Result<Option<RespValue>, DecodeError> {
        Ok(self.read_value_counted().await?.map(|(value, _)| value))
    }

    /// Same as [`RespReader::read_value`], also reporting how many bytes were
    /// read from the underlying stream during this call.
    pub async fn read_value_counted(
        &mut self,
    ) -> Result<Option<(RespValue, usize)>, DecodeError> {
        let mut read_total = 0;
        loop {
            let frame_len = match self.scanner.scan(&self.buffer) {
                Ok(frame_len) => frame_len,
                Err(ParseError::MessageTooLarge { .. }) => {
                    return Err(DecodeError::FrameTooLarge {
                        max: self.max_frame_bytes,
                    })
                }
                Err(e) => return Err(e.into()),
            };

            if let Some(frame_len) = frame_len {
                let Some((value, consumed)) = self.parser.parse(&self.buffer[..frame_len])? else {
                    return Err(DecodeError::UnexpectedEof {
                        buffered: frame_len,
                    });
                };
                self.buffer.advance(consumed);
                trace!(consumed, remaining = self.buffer.len(), "Decoded value");
                return Ok(Some((value, read_total)));
            }

            if self.buffer.capacity() - self.buffer.len() < 1024 {
                self.buffer.reserve(INITIAL_BUFFER_SIZE);
            }

            let n = self.inner.read_buf(&mut self.buffer).await?;
            if n == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                return Err(DecodeError::UnexpectedEof {
                    buffered: self.buffer.len(),
                });
            }
            read_total += n;
            trace!(bytes = n, "Read data");
        }
    }

    /// Bytes received but not yet decoded.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

/// Writes `+<text>\r\n`.
pub async fn write_simple_string<W>(out: &mut W, text: &str) -> Result<usize, EncodeError>
where
    W: AsyncWrite + Unpin,
{
    write_value(out, &RespValue::simple_string(text)).await
}

/// Writes `-<text>\r\n`.
pub async fn write_error<W>(out: &mut W, text: &str) -> Result<usize, EncodeError>
where
    W: AsyncWrite + Unpin,
{
    write_value(out, &RespValue::error(text)).await
}

/// Writes `:<n>\r\n`.
pub async fn write_integer<W>(out: &mut W, n: i64) -> Result<usize, EncodeError>
where
    W: AsyncWrite + Unpin,
{
    write_value(out, &RespValue::integer(n)).await
}

/// Writes a bulk string, or the null bulk string for `None`.
pub async fn write_bulk_string<W>(out: &mut W, text: Option<&str>) -> Result<usize, EncodeError>
where
    W: AsyncWrite + Unpin,
{
    write_value(out, &RespValue::BulkString(text.map(str::to_string))).await
}

/// Encodes `value` completely before writing, so a failed encoding never
/// leaves a partial value on the stream. Returns the bytes written.
pub async fn write_value<W>(out: &mut W, value: &RespValue) -> Result<usize, EncodeError>
where
    W: AsyncWrite + Unpin,
{
    let bytes = value.serialize()?;
    out.write_all(&bytes).await?;
    Ok(bytes.len())
}
