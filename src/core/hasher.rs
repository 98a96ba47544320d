//! Content hashing with BLAKE3.
//!
//! Hashes are computed while content is streamed to the engine so that
//! audit events can identify what was scanned without a second pass.

use crate::core::types::ContentHash;

use pin_project_lite::pin_project;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

/// Computes the BLAKE3 hash of an in-memory buffer.
pub fn hash_bytes(data: &[u8]) -> ContentHash {
    ContentHash(blake3::hash(data).to_hex().to_string())
}

pin_project! {
    /// An `AsyncRead` adapter that hashes and counts every byte read through it.
    pub struct HashingReader<R> {
        #[pin]
        inner: R,
        hasher: blake3::Hasher,
        bytes_read: u64,
    }
}

impl<R> HashingReader<R> {
    /// Wraps the given reader.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: blake3::Hasher::new(),
            bytes_read: 0,
        }
    }

    /// Number of bytes read so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Hash of the bytes read so far.
    pub fn hash(&self) -> ContentHash {
        ContentHash(self.hasher.finalize().to_hex().to_string())
    }
}

impl<R: AsyncRead> AsyncRead for HashingReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.project();
        let before = buf.filled().len();
        match this.inner.poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                let fresh = &buf.filled()[before..];
                this.hasher.update(fresh);
                *this.bytes_read += fresh.len() as u64;
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}
