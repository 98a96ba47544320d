//! Audit event types and emission functions.

use crate::core::{ScanError, ScanOperation, ScanRecord};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Base trait for audit events.
pub trait AuditEvent: Serialize {
    /// Returns the event type name.
    fn event_type(&self) -> &'static str;

    /// Returns the timestamp of the event.
    fn timestamp(&self) -> DateTime<Utc>;
}

/// Audit event for a completed scan, whatever its verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanAuditEvent {
    /// Timestamp of the event.
    pub timestamp: DateTime<Utc>,

    /// Unique scan ID.
    pub scan_id: String,

    /// Path of the file the content belongs to.
    pub path: String,

    /// Storage operation that triggered the scan.
    pub operation: ScanOperation,

    /// Content hash (BLAKE3).
    pub content_hash_blake3: String,

    /// Verdict, `clean` or `infected`.
    pub verdict: String,

    /// Engine that performed the scan.
    pub engine: String,

    /// Bytes sent to the engine.
    pub bytes_scanned: u64,

    /// Scan duration in milliseconds.
    pub duration_ms: u64,
}

impl ScanAuditEvent {
    /// Builds the event from a scan record.
    pub fn new(record: &ScanRecord, path: &str, operation: ScanOperation) -> Self {
        Self {
            timestamp: record.completed_at,
            scan_id: record.id.clone(),
            path: path.to_string(),
            operation,
            content_hash_blake3: record.content_hash.as_str().to_string(),
            verdict: if record.is_clean() { "clean" } else { "infected" }.to_string(),
            engine: record.engine.clone(),
            bytes_scanned: record.bytes_scanned,
            duration_ms: record.duration.as_millis() as u64,
        }
    }
}

impl AuditEvent for ScanAuditEvent {
    fn event_type(&self) -> &'static str {
        "scan_completed"
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Audit event for content rejected as infected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatAuditEvent {
    /// Timestamp of the event.
    pub timestamp: DateTime<Utc>,

    /// Path of the rejected file.
    pub path: String,

    /// Storage operation that was refused.
    pub operation: ScanOperation,

    /// Engine-provided reason.
    pub reason: String,
}

impl ThreatAuditEvent {
    /// Creates a new event stamped now.
    pub fn new(path: &str, reason: &str, operation: ScanOperation) -> Self {
        Self {
            timestamp: Utc::now(),
            path: path.to_string(),
            operation,
            reason: reason.to_string(),
        }
    }
}

impl AuditEvent for ThreatAuditEvent {
    fn event_type(&self) -> &'static str {
        "threat_detected"
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Audit event for a scan that could not run because the engine failed.
///
/// Used both when content was let through unscanned (fail-silently mode)
/// and when the operation was refused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineFailureAuditEvent {
    /// Timestamp of the event.
    pub timestamp: DateTime<Utc>,

    /// Path of the file being processed.
    pub path: String,

    /// Storage operation being processed.
    pub operation: ScanOperation,

    /// Engine name, when known.
    pub engine: Option<String>,

    /// Description of the failure.
    pub error: String,

    /// Whether the content was let through unscanned.
    pub bypassed: bool,
}

impl EngineFailureAuditEvent {
    /// Creates a new event stamped now.
    pub fn new(path: &str, operation: ScanOperation, error: &ScanError, bypassed: bool) -> Self {
        Self {
            timestamp: Utc::now(),
            path: path.to_string(),
            operation,
            engine: error.engine().map(str::to_string),
            error: error.to_string(),
            bypassed,
        }
    }
}

impl AuditEvent for EngineFailureAuditEvent {
    fn event_type(&self) -> &'static str {
        if self.bypassed {
            "scan_bypassed"
        } else {
            "engine_unavailable"
        }
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Emits an audit event for a completed scan.
pub fn emit_scan_completed(record: &ScanRecord, path: &str, operation: ScanOperation) {
    let event = ScanAuditEvent::new(record, path, operation);

    tracing::info!(
        target: "scanproxy::audit",
        event_type = event.event_type(),
        scan_id = %event.scan_id,
        path = %event.path,
        operation = %event.operation,
        content_hash_blake3 = %event.content_hash_blake3,
        verdict = %event.verdict,
        engine = %event.engine,
        bytes = event.bytes_scanned,
        duration_ms = event.duration_ms,
        "Scan completed"
    );
}

/// Emits an audit event for rejected content.
pub fn emit_threat_detected(path: &str, reason: &str, operation: ScanOperation) {
    let event = ThreatAuditEvent::new(path, reason, operation);

    tracing::warn!(
        target: "scanproxy::audit",
        event_type = event.event_type(),
        path = %event.path,
        operation = %event.operation,
        reason = %event.reason,
        "Threat detected, operation refused"
    );
}

/// Emits an audit event for content passed through unscanned.
pub fn emit_scan_bypassed(path: &str, operation: ScanOperation, error: &ScanError) {
    let event = EngineFailureAuditEvent::new(path, operation, error, true);

    tracing::warn!(
        target: "scanproxy::audit",
        event_type = event.event_type(),
        path = %event.path,
        operation = %event.operation,
        engine = ?event.engine,
        error = %event.error,
        "Scan bypassed, engine unavailable"
    );
}

/// Emits an audit event for an operation refused because the engine failed.
pub fn emit_engine_unavailable(path: &str, operation: ScanOperation, error: &ScanError) {
    let event = EngineFailureAuditEvent::new(path, operation, error, false);

    tracing::error!(
        target: "scanproxy::audit",
        event_type = event.event_type(),
        path = %event.path,
        operation = %event.operation,
        engine = ?event.engine,
        error = %event.error,
        "Scan engine unavailable, operation refused"
    );
}
