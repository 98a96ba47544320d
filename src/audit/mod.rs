//! Structured audit logging for scanned storage operations.
//!
//! Every scan verdict, rejected operation and engine failure is emitted as
//! a `tracing` event with target `scanproxy::audit`. The crate never
//! installs a subscriber; route the target to a JSON file, OpenTelemetry or
//! any other sink from the host application.

mod events;

pub use events::{
    emit_engine_unavailable, emit_scan_bypassed, emit_scan_completed, emit_threat_detected,
    AuditEvent, EngineFailureAuditEvent, ScanAuditEvent, ThreatAuditEvent,
};
