//! Stream-shaped content sources.
//!
//! Content handed to the proxy is either an in-memory buffer (`&[u8]` /
//! `Vec<u8>`) or a [`ContentStream`]. A stream is tagged with whether it
//! can seek, since only seekable streams can be scanned and then handed on
//! unchanged.

use std::fmt;
use std::io::{self, Cursor};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek};

/// A readable, seekable async byte source.
pub trait SeekableReader: AsyncRead + AsyncSeek + Send + Unpin {}

impl<T: AsyncRead + AsyncSeek + Send + Unpin + ?Sized> SeekableReader for T {}

/// A readable async byte source that cannot seek (pipe, socket...).
pub type SequentialReader = dyn AsyncRead + Send + Unpin;

/// A readable byte stream supplied to or returned from a storage operation.
///
/// # Examples
///
/// ```rust
/// use scanproxy::core::ContentStream;
///
/// let stream = ContentStream::from_bytes(b"hello".to_vec());
/// assert!(stream.is_seekable());
///
/// let (reader, _writer) = tokio::io::duplex(64);
/// let stream = ContentStream::sequential(reader);
/// assert!(!stream.is_seekable());
/// ```
pub enum ContentStream {
    /// A stream that supports absolute seeks.
    Seekable(Box<dyn SeekableReader>),

    /// A forward-only stream.
    Sequential(Box<SequentialReader>),
}

impl ContentStream {
    /// Wraps a seekable reader, such as a `tokio::fs::File`.
    pub fn seekable(reader: impl AsyncRead + AsyncSeek + Send + Unpin + 'static) -> Self {
        Self::Seekable(Box::new(reader))
    }

    /// Wraps a forward-only reader.
    pub fn sequential(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self::Sequential(Box::new(reader))
    }

    /// Creates a seekable stream over in-memory bytes.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self::seekable(Cursor::new(data.into()))
    }

    /// Returns `true` if the stream supports seeking.
    pub fn is_seekable(&self) -> bool {
        matches!(self, Self::Seekable(_))
    }

    /// Returns the stream as a plain reader.
    pub fn as_reader(&mut self) -> &mut SequentialReader {
        match self {
            Self::Seekable(reader) => reader,
            Self::Sequential(reader) => reader,
        }
    }

    /// Reads the remainder of the stream into memory.
    pub async fn read_to_end(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.as_reader().read_to_end(&mut buf).await?;
        Ok(buf)
    }
}

impl fmt::Debug for ContentStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seekable(_) => f.debug_tuple("Seekable").finish_non_exhaustive(),
            Self::Sequential(_) => f.debug_tuple("Sequential").finish_non_exhaustive(),
        }
    }
}

impl From<Vec<u8>> for ContentStream {
    fn from(data: Vec<u8>) -> Self {
        Self::from_bytes(data)
    }
}

impl From<tokio::fs::File> for ContentStream {
    fn from(file: tokio::fs::File) -> Self {
        Self::seekable(file)
    }
}
