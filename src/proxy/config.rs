//! Scanning proxy configuration.

use crate::core::{StorageError, StorageResult};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default size up to which a non-seekable stream is buffered in memory.
pub const DEFAULT_SPOOL_THRESHOLD: usize = 8 * 1024 * 1024;

/// Configuration for a [`ScanningProxy`](crate::proxy::ScanningProxy).
///
/// Deserializable from any serde format. Timeouts are given in whole
/// seconds and unknown keys are rejected:
///
/// ```rust
/// use scanproxy::proxy::ProxyConfig;
/// use std::time::Duration;
///
/// let config = ProxyConfig::new()
///     .with_scan_on_copy(true)
///     .with_read_timeout(Duration::from_secs(60));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProxyConfig {
    /// Scan the source of a copy before delegating it.
    pub scan_on_copy: bool,

    /// Timeout for establishing the engine connection.
    #[serde(with = "secs")]
    pub connect_timeout: Duration,

    /// Timeout for each read from the engine.
    #[serde(with = "secs")]
    pub read_timeout: Duration,

    /// Treat an unavailable engine as a clean verdict.
    pub fail_silently: bool,

    /// Bytes of a non-seekable stream kept in memory before spilling to a
    /// temporary file.
    pub spool_threshold: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            scan_on_copy: false,
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(30),
            fail_silently: false,
            spool_threshold: DEFAULT_SPOOL_THRESHOLD,
        }
    }
}

impl ProxyConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables scanning on copy.
    pub fn with_scan_on_copy(mut self, enabled: bool) -> Self {
        self.scan_on_copy = enabled;
        self
    }

    /// Sets the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the read timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Enables or disables fail-silently mode.
    pub fn with_fail_silently(mut self, enabled: bool) -> Self {
        self.fail_silently = enabled;
        self
    }

    /// Sets the in-memory spool threshold.
    pub fn with_spool_threshold(mut self, bytes: usize) -> Self {
        self.spool_threshold = bytes;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> StorageResult<()> {
        if self.connect_timeout.is_zero() {
            return Err(StorageError::configuration(
                "connect_timeout must be greater than zero",
            ));
        }
        if self.read_timeout.is_zero() {
            return Err(StorageError::configuration(
                "read_timeout must be greater than zero",
            ));
        }
        if self.spool_threshold == 0 {
            return Err(StorageError::configuration(
                "spool_threshold must be greater than zero",
            ));
        }
        Ok(())
    }
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
