//! Error types for the scanproxy library.
//!
//! Two families of errors exist:
//!
//! - [`ScanError`] describes failures talking to the scanning engine.
//! - [`StorageError`] is the single error type of the storage contract.
//!   Because the scanning proxy implements that same contract, threat
//!   detection and engine unavailability are surfaced through it as well.
//!
//! The library never panics; all errors are returned as `Result` values.

use std::time::Duration;
use thiserror::Error;

/// Errors raised by a scan engine client.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Failed to connect to the scanning engine.
    #[error("connection to engine '{engine}' failed: {message}")]
    ConnectionFailed {
        /// Name of the engine.
        engine: String,
        /// Error message describing the failure.
        message: String,
    },

    /// A connect, write or read on the engine transport timed out.
    #[error("engine '{engine}' timed out after {elapsed:?}")]
    Timeout {
        /// Name of the engine that timed out.
        engine: String,
        /// The timeout that was exceeded.
        elapsed: Duration,
    },

    /// The engine sent something that does not follow its protocol.
    #[error("protocol error from engine '{engine}': {details}")]
    Protocol {
        /// Name of the engine.
        engine: String,
        /// What was wrong with the exchange.
        details: String,
    },

    /// The session was explicitly ended and may not be used again.
    #[error("session with engine '{engine}' has been closed")]
    SessionClosed {
        /// Name of the engine.
        engine: String,
    },

    /// An I/O error occurred while reading the content to scan.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },
}

impl ScanError {
    /// Returns `true` if the engine could not be reached or stopped
    /// answering at the transport level.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. }
                | Self::Timeout { .. }
                | Self::Protocol { .. }
                | Self::SessionClosed { .. }
        )
    }

    /// Returns the engine name if this error is associated with one.
    pub fn engine(&self) -> Option<&str> {
        match self {
            Self::ConnectionFailed { engine, .. }
            | Self::Timeout { engine, .. }
            | Self::Protocol { engine, .. }
            | Self::SessionClosed { engine } => Some(engine),
            _ => None,
        }
    }

    /// Creates a `ConnectionFailed` error.
    pub fn connection_failed(engine: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            engine: engine.into(),
            message: message.into(),
        }
    }

    /// Creates a `Timeout` error.
    pub fn timeout(engine: impl Into<String>, elapsed: Duration) -> Self {
        Self::Timeout {
            engine: engine.into(),
            elapsed,
        }
    }

    /// Creates a `Protocol` error.
    pub fn protocol(engine: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Protocol {
            engine: engine.into(),
            details: details.into(),
        }
    }

    /// Creates a `Configuration` error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// Errors raised by storage operations, scanned or not.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A scan reported the content as infected.
    #[error("found {reason} when scanning {path}")]
    ThreatDetected {
        /// Path of the file whose content was rejected.
        path: String,
        /// Reason reported by the engine (usually the signature name).
        reason: String,
    },

    /// The scanning engine could not be used.
    #[error("scan engine unavailable: {source}")]
    ScanEngineUnavailable {
        /// Path being processed when the engine failed, if any.
        path: Option<String>,
        /// The underlying engine failure.
        #[source]
        source: ScanError,
    },

    /// The storage backend failed.
    #[error("backend failure on '{path}': {message}")]
    Backend {
        /// Path the operation targeted.
        path: String,
        /// Backend-provided description.
        message: String,
    },

    /// The target of a write or copy already exists.
    #[error("file already exists: {path}")]
    AlreadyExists {
        /// Existing path.
        path: String,
    },

    /// A directory operation targeted something that is not a directory.
    #[error("not a directory: {path}")]
    NotADirectory {
        /// Offending path.
        path: String,
    },

    /// An I/O error occurred while buffering or rewinding content.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },
}

impl StorageError {
    /// Creates a `ThreatDetected` error.
    pub fn threat_detected(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ThreatDetected {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `ScanEngineUnavailable` error for an operation on `path`.
    pub fn engine_unavailable(path: impl Into<String>, source: ScanError) -> Self {
        Self::ScanEngineUnavailable {
            path: Some(path.into()),
            source,
        }
    }

    /// Creates a `ScanEngineUnavailable` error not tied to a path.
    pub fn session_unavailable(source: ScanError) -> Self {
        Self::ScanEngineUnavailable { path: None, source }
    }

    /// Creates a `Backend` error.
    pub fn backend(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a `Configuration` error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns `true` if this error is a threat detection.
    pub fn is_threat(&self) -> bool {
        matches!(self, Self::ThreatDetected { .. })
    }

    /// Returns the engine-supplied reason if this is a threat detection.
    pub fn threat_reason(&self) -> Option<&str> {
        match self {
            Self::ThreatDetected { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// Returns the path this error refers to, if any.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::ThreatDetected { path, .. }
            | Self::Backend { path, .. }
            | Self::AlreadyExists { path }
            | Self::NotADirectory { path } => Some(path),
            Self::ScanEngineUnavailable { path, .. } => path.as_deref(),
            _ => None,
        }
    }
}

/// A specialized `Result` type for engine operations.
pub type ScanResult<T> = Result<T, ScanError>;

/// A specialized `Result` type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
