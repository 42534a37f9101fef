//! Byte stream abstraction.
//!
//! [`ByteStream`] is the seam between the Atom codec and any concrete
//! transport: a TCP connection, an in-memory buffer, a pipe, a test
//! double. It carries no logic of its own: three operations, blocking
//! semantics, `Ok(0)` for EOF.

use crate::error::{ProtocolError, Result};

/// Minimal duplex byte channel.
///
/// `read` and `write` block until at least one byte moves, the peer
/// closes (`Ok(0)`), or the transport fails (`Err`). A graceful close is
/// an EOF, never an error.
pub trait ByteStream: Send {
    /// Read up to `buf.len()` bytes. `Ok(0)` signals EOF.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write up to `buf.len()` bytes, returning how many were accepted.
    /// `Ok(0)` signals the stream no longer accepts data.
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Close the stream. Further reads and writes fail or report EOF.
    fn close(&mut self);
}

/// Growable in-memory [`ByteStream`].
///
/// Writes append to an internal buffer; reads consume from the front via
/// a cursor. Used as the codec test double and as the replay buffer for
/// encoded channel messages.
#[derive(Debug, Default)]
pub struct MemoryStream {
    buf: Vec<u8>,
    pos: usize,
    closed: bool,
    write_limit: Option<usize>,
}

impl MemoryStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `data` already buffered and the cursor at the front.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        MemoryStream {
            buf: data.into(),
            ..Self::default()
        }
    }

    /// Stop accepting writes after `limit` total buffered bytes. Further
    /// writes report `Ok(0)`, which encoders treat as a short write.
    pub fn with_write_limit(mut self, limit: usize) -> Self {
        self.write_limit = Some(limit);
        self
    }

    /// Everything written so far, including bytes already read back.
    pub fn data(&self) -> &[u8] {
        &self.buf
    }

    /// Bytes not yet consumed by `read`.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Move the read cursor back to the front.
    pub fn rewind(&mut self) {
        self.pos = 0;
    }
}

impl ByteStream for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.closed {
            return Err(ProtocolError::StreamClosed);
        }
        let n = buf.len().min(self.buf.len() - self.pos);
        buf[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if self.closed {
            return Err(ProtocolError::StreamClosed);
        }
        let n = match self.write_limit {
            Some(limit) => buf.len().min(limit.saturating_sub(self.buf.len())),
            None => buf.len(),
        };
        self.buf.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read_back() {
        let mut stream = MemoryStream::new();
        assert_eq!(stream.write(b"hello").unwrap(), 5);
        let mut buf = [0u8; 3];
        assert_eq!(stream.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"hel");
        let mut rest = [0u8; 8];
        assert_eq!(stream.read(&mut rest).unwrap(), 2);
        assert_eq!(&rest[..2], b"lo");
        // Drained: EOF, not an error.
        assert_eq!(stream.read(&mut rest).unwrap(), 0);
    }

    #[test]
    fn test_write_limit_reports_eof() {
        let mut stream = MemoryStream::new().with_write_limit(4);
        assert_eq!(stream.write(b"abc").unwrap(), 3);
        assert_eq!(stream.write(b"def").unwrap(), 1);
        assert_eq!(stream.write(b"ghi").unwrap(), 0);
        assert_eq!(stream.data(), b"abcd");
    }

    #[test]
    fn test_closed_stream_errors() {
        let mut stream = MemoryStream::from_bytes(b"data".to_vec());
        stream.close();
        let mut buf = [0u8; 4];
        assert!(stream.read(&mut buf).is_err());
        assert!(stream.write(b"x").is_err());
    }
}
