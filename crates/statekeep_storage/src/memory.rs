//! In-memory reference adapters.

use crate::backend::{Cache, Database};
use crate::error::{StoreError, StoreResult};
use crate::predicate::Filter;
use crate::query::Query;
use crate::record::{Document, Record, Schema};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// An in-memory [`Database`].
///
/// Collections must be created with [`Database::create_schema`] before they
/// accept writes. Rows keep insertion order, which is the natural order
/// returned by unordered queries. Predicates use the language described in
/// [`crate::predicate`].
///
/// # Example
///
/// ```rust
/// use serde::{Deserialize, Serialize};
/// use statekeep_storage::{update_from, Database, InMemoryDatabase, Record, Schema, StoreResult};
///
/// #[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// struct User {
///     id: String,
///     name: String,
/// }
///
/// impl Record for User {
///     fn schema(&self) -> Schema {
///         Schema::new("users", "id")
///     }
///     fn id(&self) -> String {
///         self.id.clone()
///     }
///     fn update(&mut self, other: &dyn Record) -> StoreResult<()> {
///         update_from(self, other)
///     }
/// }
///
/// let db = InMemoryDatabase::new();
/// db.create_schema(&[Schema::new("users", "id")], false).unwrap();
/// db.insert(&User { id: "1".into(), name: "Franco".into() }).unwrap();
///
/// let mut user = User::default();
/// db.query_one(&mut user, "name = 'Franco'").unwrap();
/// assert_eq!(user.id, "1");
/// ```
#[derive(Debug, Default)]
pub struct InMemoryDatabase {
    collections: RwLock<HashMap<String, Collection>>,
}

#[derive(Debug, Default)]
struct Collection {
    rows: Vec<Row>,
}

#[derive(Debug)]
struct Row {
    key: String,
    document: Document,
}

impl Collection {
    fn position(&self, key: &str) -> Option<usize> {
        self.rows.iter().position(|row| row.key == key)
    }

    fn select<'a>(&'a self, filter: &Filter) -> Vec<&'a Document> {
        let mut matched: Vec<&Document> = self
            .rows
            .iter()
            .map(|row| &row.document)
            .filter(|document| filter.matches(document))
            .collect();
        filter.sort(&mut matched);
        matched
    }
}

impl InMemoryDatabase {
    /// Creates a database with no collections.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a database with the given collections already created.
    #[must_use]
    pub fn with_schemas(schemas: &[Schema]) -> Self {
        let collections = schemas
            .iter()
            .map(|schema| (schema.name().to_string(), Collection::default()))
            .collect();
        Self {
            collections: RwLock::new(collections),
        }
    }

    /// Returns the names of all collections, sorted.
    #[must_use]
    pub fn collections(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the number of rows in `collection`, or `None` if it does not
    /// exist.
    #[must_use]
    pub fn row_count(&self, collection: &str) -> Option<usize> {
        self.collections
            .read()
            .get(collection)
            .map(|table| table.rows.len())
    }

    /// Returns true if `collection` holds a row with primary key `key`.
    #[must_use]
    pub fn contains(&self, collection: &str, key: &str) -> bool {
        self.collections
            .read()
            .get(collection)
            .is_some_and(|table| table.position(key).is_some())
    }
}

fn missing(schema: Schema) -> StoreError {
    StoreError::collection_not_found(schema.name())
}

impl Database for InMemoryDatabase {
    fn get(&self, record: &mut dyn Record, id: &str) -> StoreResult<()> {
        let schema = record.schema();
        let document = {
            let collections = self.collections.read();
            let table = collections.get(schema.name()).ok_or_else(|| missing(schema))?;
            let index = table
                .position(id)
                .ok_or_else(|| StoreError::not_found(schema.name(), id))?;
            table.rows[index].document.clone()
        };
        record.load_document(document)
    }

    fn query_one(&self, record: &mut dyn Record, predicate: &str) -> StoreResult<()> {
        let schema = record.schema();
        let filter = Filter::parse(predicate)?;
        let document = {
            let collections = self.collections.read();
            let table = collections.get(schema.name()).ok_or_else(|| missing(schema))?;
            let matched = table.select(&filter);
            match matched.as_slice() {
                [] => {
                    return Err(StoreError::NoMatch {
                        collection: schema.name().to_string(),
                        predicate: predicate.to_string(),
                    })
                }
                [document] => (*document).clone(),
                many => {
                    return Err(StoreError::MultipleMatches {
                        collection: schema.name().to_string(),
                        predicate: predicate.to_string(),
                        count: many.len(),
                    })
                }
            }
        };
        record.load_document(document)
    }

    fn query(&self, template: &dyn Record, query: &Query) -> StoreResult<Vec<Box<dyn Record>>> {
        let schema = template.schema();
        let filter = Filter::parse(query.predicate())?;
        let documents: Vec<Document> = {
            let collections = self.collections.read();
            let table = collections.get(schema.name()).ok_or_else(|| missing(schema))?;
            let window = query.window(table.select(&filter));
            window.into_iter().cloned().collect()
        };

        if documents.is_empty() {
            return Err(StoreError::NoMatch {
                collection: schema.name().to_string(),
                predicate: query.to_string(),
            });
        }

        documents
            .into_iter()
            .map(|document| {
                let mut record = template.boxed_clone();
                record.load_document(document)?;
                Ok(record)
            })
            .collect()
    }

    fn insert(&self, record: &dyn Record) -> StoreResult<()> {
        let schema = record.schema();
        let key = record.id();
        let document = record.to_document()?;

        let mut collections = self.collections.write();
        let table = collections
            .get_mut(schema.name())
            .ok_or_else(|| missing(schema))?;
        if table.position(&key).is_some() {
            return Err(StoreError::DuplicateKey {
                collection: schema.name().to_string(),
                key,
            });
        }
        table.rows.push(Row { key, document });
        Ok(())
    }

    fn update(&self, record: &dyn Record) -> StoreResult<()> {
        let schema = record.schema();
        let key = record.id();
        let document = record.to_document()?;

        let mut collections = self.collections.write();
        let table = collections
            .get_mut(schema.name())
            .ok_or_else(|| missing(schema))?;
        let index = table
            .position(&key)
            .ok_or_else(|| StoreError::not_found(schema.name(), key.as_str()))?;
        table.rows[index].document = document;
        Ok(())
    }

    fn delete(&self, record: &dyn Record) -> StoreResult<()> {
        let schema = record.schema();
        let key = record.id();

        let mut collections = self.collections.write();
        let table = collections
            .get_mut(schema.name())
            .ok_or_else(|| missing(schema))?;
        let index = table
            .position(&key)
            .ok_or_else(|| StoreError::not_found(schema.name(), key.as_str()))?;
        table.rows.remove(index);
        Ok(())
    }

    fn create_schema(&self, schemas: &[Schema], drop_existing: bool) -> StoreResult<()> {
        let mut collections = self.collections.write();
        for schema in schemas {
            if drop_existing && collections.remove(schema.name()).is_some() {
                debug!("Dropped collection {}", schema.name());
            }
            collections.entry(schema.name().to_string()).or_default();
            debug!("Created collection {}", schema);
        }
        Ok(())
    }
}

/// An in-memory [`Cache`] with per-entry expiry.
///
/// Entries hold clones of the cached records. Expired entries read as
/// misses and are dropped when read or by [`InMemoryCache::evict_expired`].
/// A TTL too large to represent as an [`Instant`] never expires.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
    ttl: RwLock<Duration>,
}

#[derive(Debug)]
struct Entry {
    record: Box<dyn Record>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

impl InMemoryCache {
    /// Creates an empty cache whose entries never expire.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty cache applying `ttl` to every write.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: RwLock::default(),
            ttl: RwLock::new(ttl),
        }
    }

    /// Returns the number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .values()
            .filter(|entry| entry.is_live(now))
            .count()
    }

    /// Returns true if the cache holds no live entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if a live entry exists for `id` in `schema`'s collection.
    #[must_use]
    pub fn contains(&self, schema: Schema, id: &str) -> bool {
        self.entries
            .read()
            .get(&schema.cache_key(id))
            .is_some_and(|entry| entry.is_live(Instant::now()))
    }

    /// Drops every expired entry.
    pub fn evict_expired(&self) {
        let now = Instant::now();
        self.entries.write().retain(|_, entry| entry.is_live(now));
    }
}

impl Cache for InMemoryCache {
    fn get(&self, record: &mut dyn Record, key: &str) -> StoreResult<()> {
        let schema = record.schema();
        let cache_key = schema.cache_key(key);
        let now = Instant::now();
        {
            let entries = self.entries.read();
            match entries.get(&cache_key) {
                Some(entry) if entry.is_live(now) => return record.update(entry.record.as_ref()),
                None => return Err(StoreError::not_found(schema.name(), cache_key)),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write();
        if entries.get(&cache_key).is_some_and(|entry| !entry.is_live(now)) {
            entries.remove(&cache_key);
        }
        Err(StoreError::not_found(schema.name(), cache_key))
    }

    fn set(&self, record: &dyn Record, ttl: Duration) -> StoreResult<()> {
        let expires_at = if ttl.is_zero() {
            None
        } else {
            Instant::now().checked_add(ttl)
        };
        self.entries.write().insert(
            record.schema().cache_key(&record.id()),
            Entry {
                record: record.boxed_clone(),
                expires_at,
            },
        );
        Ok(())
    }

    fn delete(&self, record: &dyn Record) -> StoreResult<()> {
        self.entries
            .write()
            .remove(&record.schema().cache_key(&record.id()));
        Ok(())
    }

    fn ttl(&self) -> Duration {
        *self.ttl.read()
    }

    fn set_ttl(&self, ttl: Duration) -> StoreResult<()> {
        *self.ttl.write() = ttl;
        Ok(())
    }

    fn purge(&self) -> StoreResult<()> {
        let mut entries = self.entries.write();
        debug!("Purging {} cache entries", entries.len());
        entries.clear();
        Ok(())
    }
}
