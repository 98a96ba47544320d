//! Core types used throughout the scanproxy library.
//!
//! This module defines the engine's raw answer ([`RawVerdict`]), the
//! interpreted [`ScanVerdict`], and the content hash type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The interpreted outcome of one scan.
///
/// Produced once per scan call and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScanVerdict {
    /// No threat was found.
    Clean,

    /// The content must not pass through.
    Infected {
        /// Engine-provided reason, usually the signature name.
        reason: String,
    },
}

impl ScanVerdict {
    /// Creates an `Infected` verdict.
    pub fn infected(reason: impl Into<String>) -> Self {
        Self::Infected {
            reason: reason.into(),
        }
    }

    /// Returns `true` if the verdict is clean.
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Clean)
    }

    /// Returns `true` if the verdict is infected.
    pub fn is_infected(&self) -> bool {
        matches!(self, Self::Infected { .. })
    }

    /// Returns the reason of an infected verdict.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Infected { reason } => Some(reason),
            Self::Clean => None,
        }
    }
}

impl fmt::Display for ScanVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clean => write!(f, "clean"),
            Self::Infected { reason } => write!(f, "infected ({})", reason),
        }
    }
}

/// Status code reported by the engine for a single scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    /// The engine reported the content as clean.
    Ok,
    /// The engine found a signature match.
    Found,
    /// The engine could not scan the content (size limit, parse error...).
    Error,
    /// A status this library does not recognise.
    Unknown(String),
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Found => write!(f, "FOUND"),
            Self::Error => write!(f, "ERROR"),
            Self::Unknown(raw) => write!(f, "{}", raw),
        }
    }
}

/// The engine's uninterpreted answer: a status plus an optional reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawVerdict {
    /// Status code.
    pub status: EngineStatus,
    /// Reason text, if the engine sent one.
    pub reason: Option<String>,
}

impl RawVerdict {
    /// Creates a clean raw verdict.
    pub fn ok() -> Self {
        Self {
            status: EngineStatus::Ok,
            reason: None,
        }
    }

    /// Creates a raw verdict for a signature match.
    pub fn found(reason: impl Into<String>) -> Self {
        Self {
            status: EngineStatus::Found,
            reason: Some(reason.into()),
        }
    }

    /// Creates a raw verdict for an engine-side scan error.
    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            status: EngineStatus::Error,
            reason: Some(reason.into()),
        }
    }

    /// Creates a raw verdict with an arbitrary status.
    pub fn new(status: EngineStatus, reason: Option<String>) -> Self {
        Self { status, reason }
    }
}

/// The storage operation that triggered a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanOperation {
    /// Buffered read.
    Read,
    /// Streamed read.
    ReadStream,
    /// Buffered write.
    Write,
    /// Streamed write.
    WriteStream,
    /// Buffered update.
    Update,
    /// Streamed update.
    UpdateStream,
    /// Validating read before a copy.
    Copy,
}

impl ScanOperation {
    /// Returns the operation name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::ReadStream => "read_stream",
            Self::Write => "write",
            Self::WriteStream => "write_stream",
            Self::Update => "update",
            Self::UpdateStream => "update_stream",
            Self::Copy => "copy",
        }
    }
}

impl fmt::Display for ScanOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// BLAKE3 digest of scanned content, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
    /// Returns the hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "blake3:{}", self.0)
    }
}
