//! Test fixtures and manager helpers.
//!
//! Provides the sample records used across the test suites and managers
//! wired to fresh in-memory backends.

use serde::{Deserialize, Serialize};
use statekeep_core::{CoreResult, Manager, Operation};
use statekeep_storage::{
    update_from, Cache, Database, InMemoryCache, InMemoryDatabase, Record, Schema, StoreResult,
};
use std::sync::Arc;

/// Schema of [`User`] records.
pub const USERS: Schema = Schema::new("users", "id");

/// Schema of [`Book`] records. Test databases never create this
/// collection, so database writes of books fail.
pub const BOOKS: Schema = Schema::new("books", "id");

/// A user account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Primary key.
    pub id: String,
    /// Email address.
    pub email: String,
    /// Display name.
    pub name: String,
}

impl User {
    /// Creates a user.
    pub fn new(id: impl Into<String>, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            name: name.into(),
        }
    }

    /// Returns the canonical sample user.
    #[must_use]
    pub fn fixture() -> Self {
        Self::new("1", "Mock", "mock@gmail.com")
    }
}

impl Record for User {
    fn schema(&self) -> Schema {
        USERS
    }

    fn id(&self) -> String {
        self.id.clone()
    }

    fn update(&mut self, other: &dyn Record) -> StoreResult<()> {
        update_from(self, other)
    }
}

/// A book, stored in a collection test databases lack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    /// Primary key.
    pub id: String,
    /// Title.
    pub name: String,
    /// Author name.
    pub author: String,
}

impl Book {
    /// Creates a book.
    pub fn new(id: impl Into<String>, name: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            author: author.into(),
        }
    }
}

impl Record for Book {
    fn schema(&self) -> Schema {
        BOOKS
    }

    fn id(&self) -> String {
        self.id.clone()
    }

    fn update(&mut self, other: &dyn Record) -> StoreResult<()> {
        update_from(self, other)
    }
}

/// Creates a database with a fresh `users` collection.
#[must_use]
pub fn test_database() -> Arc<InMemoryDatabase> {
    let db = InMemoryDatabase::new();
    db.create_schema(&[USERS], true)
        .expect("Failed to create test schema");
    Arc::new(db)
}

/// Creates an empty cache whose entries never expire.
#[must_use]
pub fn test_cache() -> Arc<InMemoryCache> {
    Arc::new(InMemoryCache::new())
}

/// A manager together with handles to its concrete backends.
pub struct TestManager {
    /// The manager under test.
    pub manager: Manager,
    /// The database, if the manager has one.
    pub database: Option<Arc<InMemoryDatabase>>,
    /// The cache, if the manager has one.
    pub cache: Option<Arc<InMemoryCache>>,
}

impl TestManager {
    /// Creates a manager over a fresh database and cache.
    #[must_use]
    pub fn full() -> Self {
        Self::build(Some(test_database()), Some(test_cache()))
    }

    /// Creates a manager over a fresh database only.
    #[must_use]
    pub fn database_only() -> Self {
        Self::build(Some(test_database()), None)
    }

    /// Creates a manager over a fresh cache only.
    #[must_use]
    pub fn cache_only() -> Self {
        Self::build(None, Some(test_cache()))
    }

    fn build(database: Option<Arc<InMemoryDatabase>>, cache: Option<Arc<InMemoryCache>>) -> Self {
        let manager = Manager::new(
            database.clone().map(|db| db as Arc<dyn Database>),
            cache.clone().map(|cache| cache as Arc<dyn Cache>),
        )
        .expect("Failed to create test manager");
        Self {
            manager,
            database,
            cache,
        }
    }

    /// Returns the database handle.
    ///
    /// # Panics
    ///
    /// Panics if the manager was built without a database.
    #[must_use]
    pub fn db(&self) -> &InMemoryDatabase {
        self.database.as_deref().expect("Test manager has no database")
    }

    /// Returns the cache handle.
    ///
    /// # Panics
    ///
    /// Panics if the manager was built without a cache.
    #[must_use]
    pub fn kv(&self) -> &InMemoryCache {
        self.cache.as_deref().expect("Test manager has no cache")
    }
}

impl std::ops::Deref for TestManager {
    type Target = Manager;

    fn deref(&self) -> &Self::Target {
        &self.manager
    }
}

impl std::ops::DerefMut for TestManager {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.manager
    }
}

/// Runs a test with a manager over a fresh database and cache.
///
/// # Example
///
/// ```rust
/// use statekeep_testkit::{with_manager, User};
///
/// with_manager(|manager| {
///     manager.stage(&User::fixture(), "insert").unwrap();
///     manager.commit().unwrap();
/// });
/// ```
pub fn with_manager<F, R>(f: F) -> R
where
    F: FnOnce(&mut Manager) -> R,
{
    let mut test = TestManager::full();
    f(&mut test.manager)
}

/// Stages an insert of every record and commits the batch.
///
/// # Errors
///
/// Returns the staging or commit error.
pub fn seed<R: Record>(manager: &mut Manager, records: &[R]) -> CoreResult<()> {
    for record in records {
        manager.stage(record, Operation::Insert)?;
    }
    manager.commit()
}

/// The three users the query scenarios are built on: two named Franco
/// whose emails sort in reverse of their ids, and one other.
#[must_use]
pub fn query_users() -> [User; 3] {
    [
        User::new("1", "Franco", "email@francovalencia.com"),
        User::new("2", "Franco", "franco@gmail.com"),
        User::new("3", "Vanclief", "vanclief@vanclief.com"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixtures_are_distinct_collections() {
        assert_ne!(User::fixture().schema(), Book::default().schema());
        assert_eq!(User::fixture().schema().cache_key("1"), "users-1");
    }

    #[test]
    fn test_manager_variants() {
        let full = TestManager::full();
        assert!(full.database().is_some() && full.cache().is_some());
        assert_eq!(full.db().collections(), vec!["users"]);

        let db_only = TestManager::database_only();
        assert!(db_only.cache().is_none());

        let cache_only = TestManager::cache_only();
        assert!(cache_only.database().is_none());
        assert!(cache_only.kv().is_empty());
    }

    #[test]
    fn seed_commits_records() {
        let mut test = TestManager::full();
        seed(&mut test, &query_users()).unwrap();
        assert_eq!(test.db().row_count("users"), Some(3));
        assert_eq!(test.kv().len(), 3);
        assert_eq!(test.applied().len(), 3);
    }
}
