//! # statekeep testkit
//!
//! Test utilities for statekeep.
//!
//! This crate provides:
//! - Sample records and managers over fresh in-memory backends
//! - Backend wrappers that inject failures on demand
//! - Property-based test generators using proptest
//! - Test log setup
//!
//! ## Usage
//!
//! ```rust
//! use statekeep_testkit::prelude::*;
//!
//! let mut test = FaultyManager::new();
//! test.cache.faults().fail_times(FaultPoint::Set, 1);
//!
//! test.stage(&User::fixture(), "insert").unwrap();
//! assert!(test.commit().is_err());
//! assert!(test.commit().is_err()); // the database already holds the row
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faulty;
pub mod fixtures;
pub mod generators;
mod logging;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::faulty::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::init_tracing;
}

pub use faulty::*;
pub use fixtures::*;
pub use generators::*;
pub use logging::init_tracing;
