//! Peek at the start of a body stream without losing it.
//!
//! [`PeekableBody`] buffers up to a fixed number of leading bytes for
//! inspection, then hands back a stream that replays those bytes before
//! continuing with the rest of the inner stream.

use bytes::{Bytes, BytesMut};
use futures_util::{stream, StreamExt};

use crate::relay::transport::{BodyStream, TransportError};

/// A body stream with an inspectable prefix.
pub struct PeekableBody {
    inner: BodyStream,
    buf: BytesMut,
    /// Bytes pulled from `inner` beyond the peek limit.
    overflow: Option<Bytes>,
    max_len: usize,
    exhausted: bool,
}

impl PeekableBody {
    pub fn new(inner: BodyStream, max_len: usize) -> Self {
        Self {
            inner,
            buf: BytesMut::new(),
            overflow: None,
            max_len,
            exhausted: false,
        }
    }

    /// Buffer from the inner stream until `max_len` bytes are held or the
    /// stream ends. Returns the buffered prefix.
    pub async fn fill(&mut self) -> Result<&[u8], TransportError> {
        while self.buf.len() < self.max_len && !self.exhausted {
            match self.inner.next().await {
                Some(chunk) => {
                    let mut chunk = chunk?;
                    let room = self.max_len - self.buf.len();
                    if chunk.len() > room {
                        let rest = chunk.split_off(room);
                        self.overflow = Some(rest);
                    }
                    self.buf.extend_from_slice(&chunk);
                }
                None => self.exhausted = true,
            }
        }
        Ok(self.buffer())
    }

    /// The bytes buffered so far.
    pub fn buffer(&self) -> &[u8] {
        &self.buf[..]
    }

    /// Whether the whole body fits in the buffer.
    pub fn is_complete(&self) -> bool {
        self.exhausted && self.overflow.is_none()
    }

    /// Stream of the full body: buffered prefix, overflow, then the rest.
    pub fn into_stream(self) -> BodyStream {
        let prefix = [Some(self.buf.freeze()), self.overflow]
            .into_iter()
            .flatten()
            .filter(|b| !b.is_empty())
            .map(Ok);
        let head = stream::iter(prefix);
        if self.exhausted {
            Box::pin(head)
        } else {
            Box::pin(head.chain(self.inner))
        }
    }
}
