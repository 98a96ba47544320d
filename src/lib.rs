//! # Scanproxy
//!
//! A storage backend wrapper that runs every byte through a malware scanner
//! on its way in and out, with compliance-ready audit logging.
//!
//! ## Overview
//!
//! [`ScanningProxy`] wraps any [`StorageBackend`] and implements that same
//! trait, so callers can use it anywhere the wrapped backend was used:
//!
//! - Writes and updates are scanned before they reach the backend
//! - Reads are scanned before their content is returned
//! - Copies can optionally scan their source first
//! - Metadata and structural operations pass straight through
//!
//! Infected content fails with [`StorageError::ThreatDetected`]. An
//! unreachable engine fails with [`StorageError::ScanEngineUnavailable`],
//! or is logged and ignored in fail-silently mode.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scanproxy::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let proxy = ScanningProxy::connect_clamd(
//!         MemoryStorage::new(),
//!         "unix:///var/run/clamav/clamd.ctl",
//!         ProxyConfig::default(),
//!     )
//!     .await?;
//!
//!     match proxy.write("upload.bin", b"file content", &WriteOptions::default()).await {
//!         Ok(_) => println!("stored"),
//!         Err(e) if e.is_threat() => println!("rejected: {}", e),
//!         Err(e) => return Err(e.into()),
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `default` - Includes the ClamAV engine
//! - `clamav` - ClamAV daemon client over a Unix or TCP socket
//!
//! ## Architecture
//!
//! - **Core**: Verdicts, the engine trait, content streams and errors
//! - **Engine**: Scan engine clients (clamd and a scriptable mock)
//! - **Storage**: The storage contract and an in-memory backend
//! - **Proxy**: The scanning proxy and its configuration
//! - **Audit**: Structured logging for compliance

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod audit;
pub mod core;
pub mod engine;
pub mod proxy;
pub mod storage;

// Re-export commonly used types at the crate root
pub use crate::core::{
    ContentStream, RawVerdict, ScanEngine, ScanError, ScanOperation, ScanRecord, ScanVerdict,
    StorageError, StorageResult,
};

pub use crate::engine::MockEngine;
#[cfg(feature = "clamav")]
pub use crate::engine::{ClamdConfig, ClamdEngine};
pub use crate::proxy::{ProxyConfig, ScanningProxy};
pub use crate::storage::{FileAttributes, MemoryStorage, StorageBackend, Visibility, WriteOptions};

/// Prelude module for convenient imports.
///
/// ```rust
/// use scanproxy::prelude::*;
/// ```
pub mod prelude {
    pub use crate::core::{
        ContentStream, RawVerdict, ScanEngine, ScanError, ScanResult, ScanVerdict, StorageError,
        StorageResult,
    };
    pub use crate::engine::MockEngine;
    #[cfg(feature = "clamav")]
    pub use crate::engine::{ClamdConfig, ClamdEngine};
    pub use crate::proxy::{ProxyConfig, ScanningProxy};
    pub use crate::storage::{
        FileAttributes, MemoryStorage, ReadResponse, StorageBackend, StreamResponse, Visibility,
        WriteOptions,
    };
}
