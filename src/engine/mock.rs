//! Mock engine for testing.
//!
//! This module provides a configurable mock engine that can be used in
//! tests to simulate verdicts and outages without a running daemon.

use crate::core::hasher::hash_bytes;
use crate::core::{EngineReport, RawVerdict, ScanEngine, ScanError, ScanResult, SequentialReader};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::io::AsyncReadExt;

const MOCK_NAME: &str = "mock";

/// A mock engine for testing purposes.
///
/// Clones share state, so a test can keep a clone to inspect counters
/// after handing the engine to a proxy.
///
/// # Examples
///
/// ```rust
/// use scanproxy::engine::MockEngine;
/// use scanproxy::core::RawVerdict;
///
/// // Reports everything as clean
/// let engine = MockEngine::new_clean();
///
/// // Reports everything as infected
/// let engine = MockEngine::new_infected("Eicar-Signature");
///
/// // Infected only for one payload
/// let engine = MockEngine::new().with_response(b"evil", RawVerdict::found("Eicar-Signature"));
/// ```
#[derive(Debug, Clone)]
pub struct MockEngine {
    state: Arc<MockState>,
}

#[derive(Debug, Default)]
struct MockState {
    /// Responses keyed by content hash (BLAKE3).
    responses: RwLock<HashMap<String, RawVerdict>>,
    /// Verdict for content not in the response map.
    default_verdict: RwLock<Option<RawVerdict>>,
    /// Simulated latency for scans.
    latency: RwLock<Option<Duration>>,
    unavailable: AtomicBool,
    scan_count: AtomicU64,
    sessions_started: AtomicU64,
    sessions_ended: AtomicU64,
    in_flight: AtomicU64,
    max_in_flight: AtomicU64,
    scanned: RwLock<Vec<Vec<u8>>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

impl MockEngine {
    /// Creates a new mock engine that reports clean by default.
    pub fn new() -> Self {
        Self {
            state: Arc::new(MockState::default()),
        }
    }

    /// Creates a mock engine that always reports clean.
    pub fn new_clean() -> Self {
        Self::new()
    }

    /// Creates a mock engine that reports every payload as infected.
    pub fn new_infected(reason: impl Into<String>) -> Self {
        Self::new().with_default_verdict(RawVerdict::found(reason))
    }

    /// Creates a mock engine whose transport always fails.
    pub fn new_unavailable() -> Self {
        let engine = Self::new();
        engine.make_unavailable();
        engine
    }

    /// Sets the verdict for content not in the response map.
    pub fn with_default_verdict(self, verdict: RawVerdict) -> Self {
        *write(&self.state.default_verdict) = Some(verdict);
        self
    }

    /// Adds a verdict for one specific payload.
    pub fn with_response(self, content: &[u8], verdict: RawVerdict) -> Self {
        self.add_response(content, verdict);
        self
    }

    /// Sets the simulated latency for scans.
    pub fn with_latency(self, latency: Duration) -> Self {
        *write(&self.state.latency) = Some(latency);
        self
    }

    /// Adds a verdict for one specific payload (shared-state version).
    pub fn add_response(&self, content: &[u8], verdict: RawVerdict) {
        write(&self.state.responses).insert(hash_bytes(content).0, verdict);
    }

    /// Makes every call fail with a connection error.
    pub fn make_unavailable(&self) {
        self.state.unavailable.store(true, Ordering::SeqCst);
    }

    /// Makes the engine reachable again.
    pub fn make_available(&self) {
        self.state.unavailable.store(false, Ordering::SeqCst);
    }

    /// Returns the number of scans performed.
    pub fn scan_count(&self) -> u64 {
        self.state.scan_count.load(Ordering::SeqCst)
    }

    /// Returns how many times a session was started.
    pub fn sessions_started(&self) -> u64 {
        self.state.sessions_started.load(Ordering::SeqCst)
    }

    /// Returns how many times a session was ended.
    pub fn sessions_ended(&self) -> u64 {
        self.state.sessions_ended.load(Ordering::SeqCst)
    }

    /// Highest number of scans observed running at the same time.
    pub fn max_concurrent_scans(&self) -> u64 {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    /// Payloads scanned so far, in order.
    pub fn scanned_payloads(&self) -> Vec<Vec<u8>> {
        read(&self.state.scanned).clone()
    }

    fn check_available(&self) -> ScanResult<()> {
        if self.state.unavailable.load(Ordering::SeqCst) {
            return Err(ScanError::connection_failed(MOCK_NAME, "simulated connection failure"));
        }
        Ok(())
    }

    async fn scan_payload(&self, data: Vec<u8>) -> ScanResult<EngineReport> {
        self.check_available()?;

        let running = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_in_flight.fetch_max(running, Ordering::SeqCst);

        let latency = *read(&self.state.latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        self.state.scan_count.fetch_add(1, Ordering::SeqCst);
        let hash = hash_bytes(&data);
        let raw = read(&self.state.responses)
            .get(hash.as_str())
            .cloned()
            .or_else(|| read(&self.state.default_verdict).clone())
            .unwrap_or_else(RawVerdict::ok);

        let report = EngineReport::new(raw, data.len() as u64, hash);
        write(&self.state.scanned).push(data);
        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);

        Ok(report)
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScanEngine for MockEngine {
    fn name(&self) -> &str {
        MOCK_NAME
    }

    async fn start_session(&mut self) -> ScanResult<()> {
        self.check_available()?;
        self.state.sessions_started.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn scan_bytes(&mut self, data: &[u8]) -> ScanResult<EngineReport> {
        self.scan_payload(data.to_vec()).await
    }

    async fn scan_stream(
        &mut self,
        stream: &mut SequentialReader,
    ) -> ScanResult<EngineReport> {
        self.check_available()?;
        let mut data = Vec::new();
        stream.read_to_end(&mut data).await?;
        self.scan_payload(data).await
    }

    async fn ping(&mut self) -> ScanResult<()> {
        self.check_available()
    }

    async fn end_session(&mut self) -> ScanResult<()> {
        self.state.sessions_ended.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::EngineStatus;

    #[tokio::test]
    async fn test_mock_engine_clean() {
        let mut engine = MockEngine::new_clean();
        let report = engine.scan_bytes(b"test data").await.unwrap();
        assert_eq!(report.raw.status, EngineStatus::Ok);
        assert_eq!(report.bytes_scanned, 9);
        assert_eq!(engine.scan_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_engine_infected() {
        let mut engine = MockEngine::new_infected("Test.Malware");
        let report = engine.scan_bytes(b"malicious data").await.unwrap();
        assert_eq!(report.raw, RawVerdict::found("Test.Malware"));
    }

    #[tokio::test]
    async fn test_mock_engine_custom_response() {
        let mut engine =
            MockEngine::new().with_response(b"evil", RawVerdict::found("Known.Malware"));

        let clean = engine.scan_bytes(b"unknown file").await.unwrap();
        assert_eq!(clean.raw.status, EngineStatus::Ok);

        let mut stream: &[u8] = b"evil";
        let infected = engine.scan_stream(&mut stream).await.unwrap();
        assert_eq!(infected.raw.status, EngineStatus::Found);
        assert_eq!(engine.scanned_payloads(), vec![b"unknown file".to_vec(), b"evil".to_vec()]);
    }

    #[tokio::test]
    async fn test_mock_engine_availability() {
        let mut engine = MockEngine::new();
        let observer = engine.clone();

        assert!(engine.ping().await.is_ok());

        observer.make_unavailable();
        let err = engine.scan_bytes(b"data").await.unwrap_err();
        assert!(err.is_unavailable());
        assert_eq!(observer.scan_count(), 0);

        observer.make_available();
        assert!(engine.ping().await.is_ok());
    }
}
