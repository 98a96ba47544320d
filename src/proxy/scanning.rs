//! The scanning proxy.

use crate::audit;
use crate::core::{
    ContentStream, EngineReport, ScanEngine, ScanError, ScanOperation, ScanRecord, ScanVerdict,
    StorageError, StorageResult,
};
use crate::proxy::config::ProxyConfig;
use crate::proxy::rewind;
use crate::proxy::verdict::interpret;
use crate::storage::{
    FileAttributes, ReadResponse, StorageBackend, StreamResponse, Visibility, WriteOptions,
};

use async_trait::async_trait;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// A storage backend wrapper that scans content on its way in and out.
///
/// Every write and update is scanned before it reaches the wrapped backend,
/// and every read is scanned before its content is returned. Infected
/// content fails with [`StorageError::ThreatDetected`]; the wrapped backend
/// is never touched for a rejected write, and a rejected read returns
/// nothing. Metadata and structural operations pass straight through.
///
/// The engine is owned by the proxy and guarded by a lock, so scans issued
/// through one proxy run one at a time over a single engine session.
///
/// # Example
///
/// ```rust
/// use scanproxy::prelude::*;
///
/// # async fn run() -> Result<(), StorageError> {
/// let proxy = ScanningProxy::new(
///     MemoryStorage::new(),
///     MockEngine::new_clean(),
///     ProxyConfig::default(),
/// )
/// .await?;
///
/// proxy.write("a.txt", b"hello", &WriteOptions::default()).await?;
/// let response = proxy.read("a.txt").await?;
/// assert_eq!(response.map(|r| r.contents), Some(b"hello".to_vec()));
/// # Ok(())
/// # }
/// ```
pub struct ScanningProxy<B: StorageBackend, E: ScanEngine> {
    /// The wrapped backend.
    backend: B,
    /// The engine, one scan at a time.
    engine: Mutex<E>,
    /// Engine name, cached for records and logs.
    engine_name: String,
    /// Configuration.
    config: ProxyConfig,
}

impl<B: StorageBackend, E: ScanEngine> ScanningProxy<B, E> {
    /// Creates a proxy and opens the engine session.
    ///
    /// Fails with [`StorageError::Configuration`] on an invalid
    /// configuration. If the session cannot be opened the call fails with
    /// [`StorageError::ScanEngineUnavailable`], unless fail-silently mode is
    /// on, in which case the engine is retried lazily on the first scan.
    pub async fn new(backend: B, mut engine: E, config: ProxyConfig) -> StorageResult<Self> {
        config.validate()?;

        if let Err(error) = engine.start_session().await {
            if !config.fail_silently {
                return Err(StorageError::session_unavailable(error));
            }
            tracing::warn!(
                engine = %engine.name(),
                error = %error,
                "Engine session could not be opened, continuing in fail-silently mode"
            );
        }

        let engine_name = engine.name().to_string();
        tracing::debug!(
            engine = %engine_name,
            scan_on_copy = config.scan_on_copy,
            fail_silently = config.fail_silently,
            "Scanning proxy ready"
        );

        Ok(Self {
            backend,
            engine: Mutex::new(engine),
            engine_name,
            config,
        })
    }

    /// Returns the wrapped backend.
    pub fn backing_backend(&self) -> &B {
        &self.backend
    }

    /// Returns the engine, behind the lock that serializes scans.
    pub fn engine(&self) -> &Mutex<E> {
        &self.engine
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Checks that the engine answers.
    pub async fn check_engine(&self) -> StorageResult<()> {
        self.engine
            .lock()
            .await
            .ping()
            .await
            .map_err(StorageError::session_unavailable)
    }

    /// Ends the engine session and hands back the wrapped backend.
    pub async fn shutdown(self) -> StorageResult<B> {
        let mut engine = self.engine.into_inner();
        engine
            .end_session()
            .await
            .map_err(StorageError::session_unavailable)?;
        tracing::debug!(engine = %self.engine_name, "Scanning proxy shut down");
        Ok(self.backend)
    }

    async fn scan_bytes(
        &self,
        path: &str,
        operation: ScanOperation,
        data: &[u8],
    ) -> StorageResult<()> {
        let started = Instant::now();
        let result = self.engine.lock().await.scan_bytes(data).await;
        self.settle(path, operation, result, started.elapsed())
    }

    async fn scan_stream(
        &self,
        path: &str,
        operation: ScanOperation,
        stream: &mut ContentStream,
    ) -> StorageResult<()> {
        let reader = rewind::make_seekable(stream, self.config.spool_threshold).await?;
        let position = rewind::mark(reader).await?;

        let started = Instant::now();
        let result = self.engine.lock().await.scan_stream(&mut *reader).await;
        let elapsed = started.elapsed();

        rewind::rewind(reader, position).await?;
        self.settle(path, operation, result, elapsed)
    }

    fn settle(
        &self,
        path: &str,
        operation: ScanOperation,
        result: Result<EngineReport, ScanError>,
        duration: Duration,
    ) -> StorageResult<()> {
        match result {
            Ok(report) => {
                let verdict = interpret(&report.raw);
                let record = ScanRecord::new(&self.engine_name, verdict, &report, duration);
                audit::emit_scan_completed(&record, path, operation);

                match record.verdict {
                    ScanVerdict::Clean => Ok(()),
                    ScanVerdict::Infected { reason } => {
                        audit::emit_threat_detected(path, &reason, operation);
                        Err(StorageError::threat_detected(path, reason))
                    }
                }
            }
            Err(ScanError::Io(error)) => Err(StorageError::Io(error)),
            Err(error) if self.config.fail_silently => {
                tracing::warn!(
                    path = %path,
                    engine = %self.engine_name,
                    operation = %operation,
                    error = %error,
                    "Scan engine unavailable, passing content unscanned"
                );
                audit::emit_scan_bypassed(path, operation, &error);
                Ok(())
            }
            Err(error) => {
                audit::emit_engine_unavailable(path, operation, &error);
                Err(StorageError::engine_unavailable(path, error))
            }
        }
    }

    async fn scanned_read_stream(
        &self,
        path: &str,
        operation: ScanOperation,
    ) -> StorageResult<Option<StreamResponse>> {
        let Some(mut response) = self.backend.read_stream(path).await? else {
            return Ok(None);
        };
        self.scan_stream(path, operation, &mut response.stream).await?;
        Ok(Some(response))
    }
}

#[cfg(feature = "clamav")]
impl<B: StorageBackend> ScanningProxy<B, crate::engine::ClamdEngine> {
    /// Creates a proxy backed by clamd at `uri` (`unix:///path` or
    /// `tcp://host:port`), using the proxy's timeouts for the connection.
    pub async fn connect_clamd(
        backend: B,
        uri: &str,
        config: ProxyConfig,
    ) -> StorageResult<Self> {
        let clamd = crate::engine::ClamdConfig::from_uri(uri)
            .and_then(|c| crate::engine::ClamdEngine::new(c.with_timeouts_from(&config)))
            .map_err(|e| StorageError::configuration(e.to_string()))?;
        Self::new(backend, clamd, config).await
    }
}

impl<B: StorageBackend, E: ScanEngine> fmt::Debug for ScanningProxy<B, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanningProxy")
            .field("backend", &self.backend)
            .field("engine", &self.engine_name)
            .field("config", &self.config)
            .finish()
    }
}

#[async_trait]
impl<B: StorageBackend, E: ScanEngine> StorageBackend for ScanningProxy<B, E> {
    async fn exists(&self, path: &str) -> StorageResult<bool> {
        self.backend.exists(path).await
    }

    async fn read(&self, path: &str) -> StorageResult<Option<ReadResponse>> {
        let Some(response) = self.backend.read(path).await? else {
            return Ok(None);
        };
        self.scan_bytes(path, ScanOperation::Read, &response.contents)
            .await?;
        Ok(Some(response))
    }

    async fn read_stream(&self, path: &str) -> StorageResult<Option<StreamResponse>> {
        self.scanned_read_stream(path, ScanOperation::ReadStream).await
    }

    async fn list_contents(
        &self,
        directory: &str,
        recursive: bool,
    ) -> StorageResult<Vec<FileAttributes>> {
        self.backend.list_contents(directory, recursive).await
    }

    async fn get_metadata(&self, path: &str) -> StorageResult<Option<FileAttributes>> {
        self.backend.get_metadata(path).await
    }

    async fn get_size(&self, path: &str) -> StorageResult<Option<u64>> {
        self.backend.get_size(path).await
    }

    async fn get_mimetype(&self, path: &str) -> StorageResult<Option<String>> {
        self.backend.get_mimetype(path).await
    }

    async fn get_timestamp(&self, path: &str) -> StorageResult<Option<i64>> {
        self.backend.get_timestamp(path).await
    }

    async fn get_visibility(&self, path: &str) -> StorageResult<Option<Visibility>> {
        self.backend.get_visibility(path).await
    }

    async fn write(
        &self,
        path: &str,
        contents: &[u8],
        options: &WriteOptions,
    ) -> StorageResult<FileAttributes> {
        self.scan_bytes(path, ScanOperation::Write, contents).await?;
        self.backend.write(path, contents, options).await
    }

    async fn write_stream(
        &self,
        path: &str,
        stream: &mut ContentStream,
        options: &WriteOptions,
    ) -> StorageResult<FileAttributes> {
        self.scan_stream(path, ScanOperation::WriteStream, stream)
            .await?;
        self.backend.write_stream(path, stream, options).await
    }

    async fn update(
        &self,
        path: &str,
        contents: &[u8],
        options: &WriteOptions,
    ) -> StorageResult<FileAttributes> {
        self.scan_bytes(path, ScanOperation::Update, contents).await?;
        self.backend.update(path, contents, options).await
    }

    async fn update_stream(
        &self,
        path: &str,
        stream: &mut ContentStream,
        options: &WriteOptions,
    ) -> StorageResult<FileAttributes> {
        self.scan_stream(path, ScanOperation::UpdateStream, stream)
            .await?;
        self.backend.update_stream(path, stream, options).await
    }

    async fn rename(&self, path: &str, new_path: &str) -> StorageResult<()> {
        self.backend.rename(path, new_path).await
    }

    async fn copy(&self, path: &str, new_path: &str) -> StorageResult<()> {
        if self.config.scan_on_copy {
            // A missing source is left for the backend's copy to report.
            drop(self.scanned_read_stream(path, ScanOperation::Copy).await?);
        }
        self.backend.copy(path, new_path).await
    }

    async fn delete(&self, path: &str) -> StorageResult<()> {
        self.backend.delete(path).await
    }

    async fn delete_dir(&self, dirname: &str) -> StorageResult<()> {
        self.backend.delete_dir(dirname).await
    }

    async fn create_dir(
        &self,
        dirname: &str,
        options: &WriteOptions,
    ) -> StorageResult<FileAttributes> {
        self.backend.create_dir(dirname, options).await
    }

    async fn set_visibility(
        &self,
        path: &str,
        visibility: Visibility,
    ) -> StorageResult<FileAttributes> {
        self.backend.set_visibility(path, visibility).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BoxedEngine, RawVerdict};
    use crate::engine::MockEngine;
    use crate::storage::MemoryStorage;
    use tokio::io::AsyncWriteExt;

    async fn proxy_with(
        engine: MockEngine,
        config: ProxyConfig,
    ) -> ScanningProxy<MemoryStorage, MockEngine> {
        ScanningProxy::new(MemoryStorage::new(), engine, config)
            .await
            .unwrap()
    }

    fn evil_engine() -> MockEngine {
        MockEngine::new().with_response(b"evil", RawVerdict::found("Eicar-Signature"))
    }

    #[tokio::test]
    async fn test_clean_write_reaches_backend() {
        let proxy = proxy_with(MockEngine::new_clean(), ProxyConfig::default()).await;

        proxy
            .write("a.txt", b"hello", &WriteOptions::default())
            .await
            .unwrap();

        assert_eq!(proxy.backing_backend().contents("a.txt"), Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn test_infected_write_is_rejected() {
        let proxy = proxy_with(evil_engine(), ProxyConfig::default()).await;

        let err = proxy
            .write("a.txt", b"evil", &WriteOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "found Eicar-Signature when scanning a.txt");
        assert!(!proxy.backing_backend().exists("a.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_infected_read_returns_nothing() {
        let backend = MemoryStorage::new().with_file("a.txt", b"evil");
        let proxy = ScanningProxy::new(backend, evil_engine(), ProxyConfig::default())
            .await
            .unwrap();

        let err = proxy.read("a.txt").await.unwrap_err();
        assert_eq!(err.threat_reason(), Some("Eicar-Signature"));
    }

    #[tokio::test]
    async fn test_missing_file_read_is_not_scanned() {
        let engine = MockEngine::new_clean();
        let proxy = proxy_with(engine.clone(), ProxyConfig::default()).await;

        assert!(proxy.read("missing.txt").await.unwrap().is_none());
        assert!(proxy.read_stream("missing.txt").await.unwrap().is_none());
        assert_eq!(engine.scan_count(), 0);
    }

    #[tokio::test]
    async fn test_write_stream_from_pipe_is_scanned_and_stored_whole() {
        let engine = MockEngine::new_clean();
        let proxy = proxy_with(engine.clone(), ProxyConfig::default()).await;

        let (reader, mut writer) = tokio::io::duplex(64);
        writer.write_all(b"ok").await.unwrap();
        drop(writer);
        let mut stream = ContentStream::sequential(reader);

        proxy
            .write_stream("a.txt", &mut stream, &WriteOptions::default())
            .await
            .unwrap();

        assert_eq!(engine.scanned_payloads(), vec![b"ok".to_vec()]);
        assert_eq!(proxy.backing_backend().contents("a.txt"), Some(b"ok".to_vec()));
    }

    #[tokio::test]
    async fn test_read_stream_is_rewound_after_scan() {
        let backend = MemoryStorage::new().with_file("report.pdf", b"%PDF-1.7");
        let proxy = ScanningProxy::new(backend, MockEngine::new_clean(), ProxyConfig::default())
            .await
            .unwrap();

        let mut response = proxy.read_stream("report.pdf").await.unwrap().unwrap();
        assert_eq!(response.stream.read_to_end().await.unwrap(), b"%PDF-1.7");
    }

    #[tokio::test]
    async fn test_engine_unavailable_fails_closed() {
        let engine = MockEngine::new_clean();
        let proxy = proxy_with(engine.clone(), ProxyConfig::default()).await;
        engine.make_unavailable();

        let err = proxy
            .write("a.txt", b"hello", &WriteOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::ScanEngineUnavailable { .. }));
        assert_eq!(proxy.backing_backend().file_count(), 0);
    }

    #[tokio::test]
    async fn test_fail_silently_passes_content() {
        let engine = MockEngine::new_unavailable();
        let config = ProxyConfig::default().with_fail_silently(true);
        let proxy = proxy_with(engine, config).await;

        proxy
            .write("a.txt", b"hello", &WriteOptions::default())
            .await
            .unwrap();
        assert!(proxy.backing_backend().exists("a.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_new_fails_when_session_cannot_start() {
        let result = ScanningProxy::new(
            MemoryStorage::new(),
            MockEngine::new_unavailable(),
            ProxyConfig::default(),
        )
        .await;

        assert!(matches!(
            result,
            Err(StorageError::ScanEngineUnavailable { path: None, .. })
        ));
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_config() {
        let result = ScanningProxy::new(
            MemoryStorage::new(),
            MockEngine::new_clean(),
            ProxyConfig::default().with_spool_threshold(0),
        )
        .await;

        assert!(matches!(result, Err(StorageError::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_copy_scans_only_when_enabled() {
        let engine = MockEngine::new_clean();
        let backend = MemoryStorage::new().with_file("a.txt", b"hello");
        let proxy = ScanningProxy::new(backend, engine.clone(), ProxyConfig::default())
            .await
            .unwrap();

        proxy.copy("a.txt", "b.txt").await.unwrap();
        assert_eq!(engine.scan_count(), 0);

        let engine = evil_engine();
        let backend = MemoryStorage::new().with_file("a.txt", b"evil");
        let config = ProxyConfig::default().with_scan_on_copy(true);
        let proxy = ScanningProxy::new(backend, engine, config).await.unwrap();

        let err = proxy.copy("a.txt", "b.txt").await.unwrap_err();
        assert!(err.is_threat());
        assert!(!proxy.backing_backend().exists("b.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_boxed_engine() {
        let engine: BoxedEngine = Box::new(evil_engine());
        let proxy = ScanningProxy::new(MemoryStorage::new(), engine, ProxyConfig::default())
            .await
            .unwrap();

        let mut stream = ContentStream::from_bytes(b"evil".to_vec());
        let err = proxy
            .write_stream("a.txt", &mut stream, &WriteOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_threat());
    }

    #[tokio::test]
    async fn test_shutdown_ends_session() {
        let engine = MockEngine::new_clean();
        let proxy = proxy_with(engine.clone(), ProxyConfig::default()).await;
        proxy.check_engine().await.unwrap();

        let backend = proxy.shutdown().await.unwrap();
        assert_eq!(backend.file_count(), 0);
        assert_eq!(engine.sessions_started(), 1);
        assert_eq!(engine.sessions_ended(), 1);
    }
}
