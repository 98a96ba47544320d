//! Making streams scannable without consuming them.
//!
//! A stream handed to the proxy is read twice: once by the engine and once
//! by the storage backend (or the caller, on reads). Seekable streams are
//! rewound to where they started. Forward-only streams are first copied
//! into a seekable buffer that takes their place; small ones stay in
//! memory, larger ones spill to an anonymous temporary file that is removed
//! when the buffer is dropped.

use crate::core::{ContentStream, SeekableReader, SequentialReader};

use std::io::{self, Cursor, SeekFrom};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

/// Ensures `stream` is seekable and returns its reader.
///
/// A sequential stream is drained into a spool buffer which replaces it in
/// place, so the caller keeps working with the same `ContentStream` value.
/// The original reader is dropped once copied.
pub async fn make_seekable(
    stream: &mut ContentStream,
    spool_threshold: usize,
) -> io::Result<&mut Box<dyn SeekableReader>> {
    if let ContentStream::Sequential(reader) = stream {
        let spooled = spool(&mut **reader, spool_threshold).await?;
        *stream = ContentStream::Seekable(spooled);
    }

    match stream {
        ContentStream::Seekable(reader) => Ok(reader),
        ContentStream::Sequential(_) => Err(io::Error::new(
            io::ErrorKind::Other,
            "stream could not be made seekable",
        )),
    }
}

/// Copies a forward-only reader into a seekable buffer positioned at its
/// start.
///
/// Up to `threshold` bytes are kept in memory. Past that the content is
/// written to an anonymous temporary file.
pub async fn spool(
    reader: &mut SequentialReader,
    threshold: usize,
) -> io::Result<Box<dyn SeekableReader>> {
    let mut head = Vec::new();
    (&mut *reader)
        .take((threshold as u64).saturating_add(1))
        .read_to_end(&mut head)
        .await?;

    if head.len() <= threshold {
        tracing::debug!(bytes = head.len(), "Spooled stream in memory");
        return Ok(Box::new(Cursor::new(head)));
    }

    let file = tokio::task::spawn_blocking(tempfile::tempfile)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))??;
    let mut file = tokio::fs::File::from_std(file);

    file.write_all(&head).await?;
    let rest = tokio::io::copy(reader, &mut file).await?;
    file.flush().await?;
    file.seek(SeekFrom::Start(0)).await?;

    tracing::debug!(
        bytes = head.len() as u64 + rest,
        threshold,
        "Spooled stream to temporary file"
    );

    Ok(Box::new(file))
}

/// Records the current position of `reader`.
pub async fn mark(reader: &mut Box<dyn SeekableReader>) -> io::Result<u64> {
    reader.stream_position().await
}

/// Moves `reader` back to a position captured with [`mark`].
pub async fn rewind(reader: &mut Box<dyn SeekableReader>, position: u64) -> io::Result<()> {
    reader.seek(SeekFrom::Start(position)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn piped(data: &'static [u8]) -> ContentStream {
        let (reader, mut writer) = tokio::io::duplex(data.len().max(1));
        tokio::spawn(async move {
            writer.write_all(data).await.unwrap();
        });
        ContentStream::sequential(reader)
    }

    #[tokio::test]
    async fn test_seekable_stream_is_left_alone() {
        let mut stream = ContentStream::from_bytes(b"hello".to_vec());
        let reader = make_seekable(&mut stream, 1024).await.unwrap();

        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"hello");
    }

    #[tokio::test]
    async fn test_sequential_stream_spools_in_memory() {
        let mut stream = piped(b"ok").await;
        assert!(!stream.is_seekable());

        make_seekable(&mut stream, 1024).await.unwrap();
        assert!(stream.is_seekable());
        assert_eq!(stream.read_to_end().await.unwrap(), b"ok");
    }

    #[tokio::test]
    async fn test_large_stream_spills_to_file() {
        let data: &'static [u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
        let mut stream = piped(data).await;

        make_seekable(&mut stream, 8).await.unwrap();
        assert_eq!(stream.read_to_end().await.unwrap(), data);
    }

    #[tokio::test]
    async fn test_stream_at_exact_threshold_stays_in_memory() {
        let (mut reader, mut writer) = tokio::io::duplex(16);
        writer.write_all(b"12345678").await.unwrap();
        drop(writer);

        let mut spooled = spool(&mut reader, 8).await.unwrap();
        let mut buf = Vec::new();
        spooled.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"12345678");
    }

    #[tokio::test]
    async fn test_unbounded_threshold_keeps_stream_in_memory() {
        let mut stream = piped(b"no limit").await;

        make_seekable(&mut stream, usize::MAX).await.unwrap();
        assert_eq!(stream.read_to_end().await.unwrap(), b"no limit");
    }

    #[tokio::test]
    async fn test_mark_and_rewind_restore_position() {
        let mut stream = ContentStream::from_bytes(b"header:body".to_vec());
        let reader = make_seekable(&mut stream, 1024).await.unwrap();

        let mut header = [0u8; 7];
        reader.read_exact(&mut header).await.unwrap();
        let position = mark(reader).await.unwrap();
        assert_eq!(position, 7);

        let mut body = Vec::new();
        reader.read_to_end(&mut body).await.unwrap();
        assert_eq!(body, b"body");

        rewind(reader, position).await.unwrap();
        assert_eq!(stream.read_to_end().await.unwrap(), b"body");
    }
}
