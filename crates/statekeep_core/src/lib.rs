//! # statekeep core
//!
//! Staged-change transaction engine over a database and/or a cache.
//!
//! This crate provides:
//! - [`Manager`] for reads, staging, commits and rollbacks
//! - [`Change`], the lifecycle of one staged mutation
//! - [`Config`] for manager construction
//! - [`CoreError`] with the [`ErrorKind`] classification shared with adapters
//!
//! ## Example
//!
//! ```rust
//! use serde::{Deserialize, Serialize};
//! use statekeep_core::{Manager, Operation};
//! use statekeep_storage::{update_from, Database, InMemoryDatabase, Record, Schema, StoreResult};
//! use std::sync::Arc;
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct User {
//!     id: String,
//!     name: String,
//! }
//!
//! impl Record for User {
//!     fn schema(&self) -> Schema {
//!         Schema::new("users", "id")
//!     }
//!     fn id(&self) -> String {
//!         self.id.clone()
//!     }
//!     fn update(&mut self, other: &dyn Record) -> StoreResult<()> {
//!         update_from(self, other)
//!     }
//! }
//!
//! let db = Arc::new(InMemoryDatabase::new());
//! db.create_schema(&[Schema::new("users", "id")], false).unwrap();
//! let mut manager = Manager::new(Some(db), None).unwrap();
//!
//! let user = User { id: "1".into(), name: "Franco".into() };
//! manager.stage(&user, Operation::Insert).unwrap();
//! manager.commit().unwrap();
//!
//! let mut found = User::default();
//! manager.get(&mut found, "1").unwrap();
//! assert_eq!(found.name, "Franco");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod transaction;
mod types;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use statekeep_storage::ErrorKind;
pub use transaction::{BackendKind, Change, ChangeStatus, Manager, Operation};
pub use types::ChangeId;
