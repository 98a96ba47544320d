//! The storage contract the proxy consumes and provides.
//!
//! - [`traits`] - The `StorageBackend` trait
//! - [`types`] - Attributes, options and read responses
//! - [`memory`] - An in-memory backend

pub mod memory;
pub mod traits;
pub mod types;

pub use memory::MemoryStorage;
pub use traits::StorageBackend;
pub use types::{
    EntryKind, FileAttributes, ReadResponse, StreamResponse, Visibility, WriteOptions,
};
