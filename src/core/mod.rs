//! Core types and traits for the scanproxy library.
//!
//! - [`types`] - Verdicts and the engine's raw status
//! - [`traits`] - The `ScanEngine` trait
//! - [`error`] - Structured error types
//! - [`input`] - Stream-shaped content sources
//! - [`hasher`] - BLAKE3 content hashing
//! - [`result`] - Engine reports and scan records

pub mod error;
pub mod hasher;
pub mod input;
pub mod result;
pub mod traits;
pub mod types;

pub use error::{ScanError, ScanResult, StorageError, StorageResult};
pub use hasher::HashingReader;
pub use input::{ContentStream, SeekableReader, SequentialReader};
pub use result::{EngineReport, ScanRecord};
pub use traits::{BoxedEngine, ScanEngine};
pub use types::{ContentHash, EngineStatus, RawVerdict, ScanOperation, ScanVerdict};
