//! Bounded line framing over an async byte stream
//!
//! `LineReader` splits a stream into `\n`-terminated lines without ever
//! buffering more than the configured limit. It retains whatever arrived
//! past the current line, so a connection can be classified on its first
//! line and the reader (buffer included) handed on to whichever handler
//! owns the rest of the stream.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{EventError, Result};

/// Default cap on a single line
pub const DEFAULT_MAX_LINE: usize = 64 * 1024;

/// Initial read buffer capacity
const READ_CHUNK: usize = 8 * 1024;

/// Line-oriented reader with a hard per-line size limit
#[derive(Debug)]
pub struct LineReader<R> {
    inner: R,
    buf: BytesMut,
    max_line: usize,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    /// Wrap a stream with the default line limit
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK),
            max_line: DEFAULT_MAX_LINE,
        }
    }

    /// Rebuild a reader from a stream plus previously buffered bytes
    pub fn from_parts(inner: R, buf: BytesMut) -> Self {
        Self {
            inner,
            buf,
            max_line: DEFAULT_MAX_LINE,
        }
    }

    /// Set the per-line size limit
    pub fn with_max_line(mut self, max_line: usize) -> Self {
        self.max_line = max_line;
        self
    }

    /// Give back the stream and any bytes read past the last line
    pub fn into_parts(self) -> (R, BytesMut) {
        (self.inner, self.buf)
    }

    /// Read the next line, without its terminator
    ///
    /// Returns `Ok(None)` on clean EOF. A final unterminated line is
    /// returned as a line. Exceeding the limit before a `\n` arrives is
    /// [`EventError::LineTooLong`]; the stream is unusable afterwards.
    pub async fn read_line(&mut self) -> Result<Option<Bytes>> {
        loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
                if pos > self.max_line {
                    return Err(EventError::LineTooLong {
                        limit: self.max_line,
                    });
                }
                let mut line = self.buf.split_to(pos + 1);
                line.truncate(pos);
                return Ok(Some(line.freeze()));
            }

            if self.buf.len() > self.max_line {
                return Err(EventError::LineTooLong {
                    limit: self.max_line,
                });
            }

            let n = self.inner.read_buf(&mut self.buf).await?;
            if n == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(self.buf.split().freeze()));
            }
        }
    }

    /// Read exactly `len` raw bytes, draining the line buffer first
    ///
    /// Used for length-delimited payloads that follow a header section.
    pub async fn read_exact(&mut self, len: usize) -> Result<Bytes> {
        while self.buf.len() < len {
            let n = self.inner.read_buf(&mut self.buf).await?;
            if n == 0 {
                return Err(EventError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "stream ended mid-payload",
                )));
            }
        }
        Ok(self.buf.split_to(len).freeze())
    }
}

#[cfg(test)]
#[path = "lines_test.rs"]
mod tests;
