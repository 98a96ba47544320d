//! Scan engine client implementations.
//!
//! This module contains implementations of the `ScanEngine` trait.
//!
//! ## Available Engines
//!
//! - [`mock`] - A scriptable engine for tests
//! - [`clamav`] - ClamAV via its socket protocol (requires `clamav` feature)

pub mod mock;

#[cfg(feature = "clamav")]
pub mod clamav;

pub use mock::MockEngine;

#[cfg(feature = "clamav")]
pub use clamav::{ClamdAddress, ClamdConfig, ClamdEngine};
