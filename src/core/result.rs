//! Scan result structures.
//!
//! [`EngineReport`] is what an engine client hands back for one scan;
//! [`ScanRecord`] is the interpreted, timestamped record the proxy logs.

use crate::core::types::{ContentHash, RawVerdict, ScanVerdict};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The engine's answer for one scan call, plus what was sent to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineReport {
    /// Uninterpreted status and reason.
    pub raw: RawVerdict,
    /// Number of bytes streamed to the engine.
    pub bytes_scanned: u64,
    /// Hash of the bytes streamed to the engine.
    pub content_hash: ContentHash,
}

impl EngineReport {
    /// Creates a new report.
    pub fn new(raw: RawVerdict, bytes_scanned: u64, content_hash: ContentHash) -> Self {
        Self {
            raw,
            bytes_scanned,
            content_hash,
        }
    }
}

/// A completed, interpreted scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRecord {
    /// Unique identifier for this scan.
    pub id: String,

    /// Name of the engine that performed the scan.
    pub engine: String,

    /// The interpreted verdict.
    pub verdict: ScanVerdict,

    /// Number of bytes scanned.
    pub bytes_scanned: u64,

    /// Hash of the scanned content.
    pub content_hash: ContentHash,

    /// When the scan completed.
    pub completed_at: DateTime<Utc>,

    /// How long the scan took.
    #[serde(with = "duration_serde")]
    pub duration: Duration,
}

impl ScanRecord {
    /// Creates a record for a scan that just completed.
    pub fn new(
        engine: impl Into<String>,
        verdict: ScanVerdict,
        report: &EngineReport,
        duration: Duration,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            engine: engine.into(),
            verdict,
            bytes_scanned: report.bytes_scanned,
            content_hash: report.content_hash.clone(),
            completed_at: Utc::now(),
            duration,
        }
    }

    /// Returns `true` if the verdict is clean.
    pub fn is_clean(&self) -> bool {
        self.verdict.is_clean()
    }
}

/// Serde helper for Duration serialization.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
