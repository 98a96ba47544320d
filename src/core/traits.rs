//! Core traits for the scanproxy library.
//!
//! This module defines the `ScanEngine` trait that scan engine clients
//! implement. The proxy owns exactly one engine and serializes every call
//! to it, so implementations may keep a single stateful connection.

use crate::core::error::ScanResult;
use crate::core::input::SequentialReader;
use crate::core::result::EngineReport;

use async_trait::async_trait;
use std::fmt::Debug;

/// A client for an external malware scanning engine.
///
/// # Implementation Notes
///
/// - Calls are never issued concurrently on one instance; the proxy holds a
///   lock around every call. `&mut self` receivers reflect that.
/// - `start_session` must be idempotent.
/// - Transport-level failures are returned as `ScanError`; a scan that
///   completes always yields an `EngineReport`, whatever its status.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use scanproxy::core::{EngineReport, RawVerdict, ScanEngine, ScanResult};
/// use scanproxy::core::hasher::hash_bytes;
/// use async_trait::async_trait;
///
/// #[derive(Debug)]
/// struct AllowAll;
///
/// #[async_trait]
/// impl ScanEngine for AllowAll {
///     fn name(&self) -> &str {
///         "allow-all"
///     }
///
///     async fn scan_bytes(&mut self, data: &[u8]) -> ScanResult<EngineReport> {
///         Ok(EngineReport::new(RawVerdict::ok(), data.len() as u64, hash_bytes(data)))
///     }
///
///     // ...
/// }
/// ```
#[async_trait]
pub trait ScanEngine: Send + Sync + Debug {
    /// Returns the name of this engine, e.g. "clamd".
    fn name(&self) -> &str;

    /// Opens the long-lived session. Calling it on an open session is a no-op.
    async fn start_session(&mut self) -> ScanResult<()>;

    /// Scans an in-memory buffer.
    async fn scan_bytes(&mut self, data: &[u8]) -> ScanResult<EngineReport>;

    /// Scans a stream from its current position to its end.
    ///
    /// The stream is left at its end; rewinding is the caller's concern.
    async fn scan_stream(
        &mut self,
        stream: &mut SequentialReader,
    ) -> ScanResult<EngineReport>;

    /// Checks that the engine answers.
    async fn ping(&mut self) -> ScanResult<()>;

    /// Closes the session. Further calls may reopen it or fail, depending
    /// on the implementation.
    async fn end_session(&mut self) -> ScanResult<()>;
}

/// A boxed engine for type-erased storage.
pub type BoxedEngine = Box<dyn ScanEngine>;

#[async_trait]
impl<E: ScanEngine + ?Sized> ScanEngine for Box<E> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn start_session(&mut self) -> ScanResult<()> {
        (**self).start_session().await
    }

    async fn scan_bytes(&mut self, data: &[u8]) -> ScanResult<EngineReport> {
        (**self).scan_bytes(data).await
    }

    async fn scan_stream(
        &mut self,
        stream: &mut SequentialReader,
    ) -> ScanResult<EngineReport> {
        (**self).scan_stream(stream).await
    }

    async fn ping(&mut self) -> ScanResult<()> {
        (**self).ping().await
    }

    async fn end_session(&mut self) -> ScanResult<()> {
        (**self).end_session().await
    }
}
