//! The scanning proxy and its supporting pieces.
//!
//! - [`scanning`] - `ScanningProxy`, a `StorageBackend` that scans content
//! - [`config`] - Proxy configuration
//! - [`rewind`] - Making streams readable twice
//! - [`verdict`] - Mapping raw engine answers to verdicts

pub mod config;
pub mod rewind;
pub mod scanning;
pub mod verdict;

pub use config::ProxyConfig;
pub use scanning::ScanningProxy;
pub use verdict::interpret;
