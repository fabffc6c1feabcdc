//! Backend capability traits.

use crate::error::StoreResult;
use crate::query::Query;
use crate::record::{Record, Schema};
use std::time::Duration;

/// A persistent record store.
///
/// Adapters map records to rows of the collection named by
/// [`Record::schema`], keyed by [`Record::id`]. The engine only ever holds a
/// database as `Arc<dyn Database>`, so implementations synchronize
/// internally.
///
/// # Implementors
///
/// - [`super::InMemoryDatabase`] - reference adapter for tests and embedding
pub trait Database: Send + Sync {
    /// Loads the record whose primary key is `id` into `record`.
    ///
    /// `record` only needs to carry the right type; its fields are replaced.
    ///
    /// # Errors
    ///
    /// Returns a `NotFound` error if no row has that key, or an `Internal`
    /// error if the collection does not exist or the backend fails.
    fn get(&self, record: &mut dyn Record, id: &str) -> StoreResult<()>;

    /// Loads the single record satisfying `predicate` into `record`.
    ///
    /// # Errors
    ///
    /// Returns a `NotFound` error on zero matches, a `Conflict` error on
    /// more than one, and an `Invalid` error for a malformed predicate.
    fn query_one(&self, record: &mut dyn Record, predicate: &str) -> StoreResult<()>;

    /// Returns every record of `template`'s type satisfying `query`.
    ///
    /// Results are fresh records of the template's concrete type, in the
    /// backend's natural order unless the predicate orders them.
    ///
    /// # Errors
    ///
    /// Returns a `NotFound` error if the query window is empty.
    fn query(&self, template: &dyn Record, query: &Query) -> StoreResult<Vec<Box<dyn Record>>>;

    /// Inserts a new record.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is taken or the collection is missing.
    fn insert(&self, record: &dyn Record) -> StoreResult<()>;

    /// Replaces an existing record.
    ///
    /// # Errors
    ///
    /// Returns a `NotFound` error if no row has the record's key.
    fn update(&self, record: &dyn Record) -> StoreResult<()>;

    /// Deletes an existing record.
    ///
    /// # Errors
    ///
    /// Returns a `NotFound` error if no row has the record's key.
    fn delete(&self, record: &dyn Record) -> StoreResult<()>;

    /// Creates a collection for each schema, dropping existing ones first
    /// when `drop_existing` is set. Creating an existing collection is not
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot create a collection.
    fn create_schema(&self, schemas: &[Schema], drop_existing: bool) -> StoreResult<()>;
}

/// A fast key-value store holding whole records.
///
/// Entries are keyed by [`Schema::cache_key`]. A TTL of [`Duration::ZERO`]
/// means entries never expire.
///
/// # Implementors
///
/// - [`super::InMemoryCache`] - process-local cache
pub trait Cache: Send + Sync {
    /// Loads the cached record with primary key `key` into `record`.
    ///
    /// # Errors
    ///
    /// Returns a `NotFound` error on a miss (including expired entries).
    fn get(&self, record: &mut dyn Record, key: &str) -> StoreResult<()>;

    /// Stores `record` for `ttl`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the write.
    fn set(&self, record: &dyn Record, ttl: Duration) -> StoreResult<()>;

    /// Removes `record`. Removing an absent entry succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn delete(&self, record: &dyn Record) -> StoreResult<()>;

    /// Returns the TTL applied by the engine to every write.
    fn ttl(&self) -> Duration;

    /// Changes the TTL applied to subsequent writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot honour the TTL.
    fn set_ttl(&self, ttl: Duration) -> StoreResult<()>;

    /// Removes every entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn purge(&self) -> StoreResult<()>;
}
