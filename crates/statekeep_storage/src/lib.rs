//! # statekeep storage
//!
//! The record contract and backend capability traits that the statekeep
//! engine orchestrates, plus in-memory reference adapters.
//!
//! ## Design Principles
//!
//! - Records are plain serde types; adapters see them through [`Record`]
//! - Backends are `Send + Sync` and synchronize internally
//! - Every error classifies into an [`ErrorKind`]
//! - No knowledge of staging, commits or rollbacks
//!
//! ## Available Adapters
//!
//! - [`InMemoryDatabase`] - row store with a small predicate language
//! - [`InMemoryCache`] - key-value store with per-entry expiry
//!
//! ## Example
//!
//! ```rust
//! use serde::{Deserialize, Serialize};
//! use statekeep_storage::{update_from, Cache, InMemoryCache, Record, Schema, StoreResult};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct Session {
//!     token: String,
//! }
//!
//! impl Record for Session {
//!     fn schema(&self) -> Schema {
//!         Schema::new("sessions", "token")
//!     }
//!     fn id(&self) -> String {
//!         self.token.clone()
//!     }
//!     fn update(&mut self, other: &dyn Record) -> StoreResult<()> {
//!         update_from(self, other)
//!     }
//! }
//!
//! let cache = InMemoryCache::new();
//! cache.set(&Session { token: "abc".into() }, cache.ttl()).unwrap();
//!
//! let mut session = Session::default();
//! cache.get(&mut session, "abc").unwrap();
//! assert_eq!(session.token, "abc");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod memory;
pub mod predicate;
mod query;
mod record;

pub use backend::{Cache, Database};
pub use error::{ErrorKind, StoreError, StoreResult};
pub use memory::{InMemoryCache, InMemoryDatabase};
pub use predicate::Filter;
pub use query::Query;
pub use record::{update_from, Document, Record, RecordObject, Schema};
