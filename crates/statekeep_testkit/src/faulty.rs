//! Fault-injecting backend wrappers.
//!
//! [`FaultyDatabase`] and [`FaultyCache`] delegate to an inner backend
//! unless a fault is armed for the call, in which case they return a
//! [`StoreError::Backend`] without touching the inner backend.

use crate::fixtures::USERS;
use parking_lot::Mutex;
use statekeep_core::Manager;
use statekeep_storage::{
    Cache, Database, InMemoryCache, InMemoryDatabase, Query, Record, Schema, StoreError,
    StoreResult,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A backend call that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    /// `get` on either backend.
    Get,
    /// `Database::query_one`.
    QueryOne,
    /// `Database::query`.
    Query,
    /// `Database::insert`.
    Insert,
    /// `Database::update`.
    Update,
    /// `delete` on either backend.
    Delete,
    /// `Database::create_schema`.
    CreateSchema,
    /// `Cache::set`.
    Set,
    /// `Cache::set_ttl`.
    SetTtl,
    /// `Cache::purge`.
    Purge,
}

impl fmt::Display for FaultPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Get => "get",
            Self::QueryOne => "query_one",
            Self::Query => "query",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::CreateSchema => "create_schema",
            Self::Set => "set",
            Self::SetTtl => "set_ttl",
            Self::Purge => "purge",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy)]
enum Remaining {
    Times(usize),
    Always,
}

/// Armed faults and call counters shared by the wrappers.
#[derive(Debug, Default)]
pub struct FaultPlan {
    armed: Mutex<HashMap<FaultPoint, Remaining>>,
    calls: Mutex<HashMap<FaultPoint, usize>>,
    offline: AtomicBool,
}

impl FaultPlan {
    /// Makes every call at `point` fail until healed.
    pub fn fail_always(&self, point: FaultPoint) {
        self.armed.lock().insert(point, Remaining::Always);
    }

    /// Makes the next `times` calls at `point` fail.
    pub fn fail_times(&self, point: FaultPoint, times: usize) {
        if times == 0 {
            self.heal(point);
        } else {
            self.armed.lock().insert(point, Remaining::Times(times));
        }
    }

    /// Disarms the fault at `point`.
    pub fn heal(&self, point: FaultPoint) {
        self.armed.lock().remove(&point);
    }

    /// Disarms every fault and brings the backend back online.
    pub fn heal_all(&self) {
        self.armed.lock().clear();
        self.offline.store(false, Ordering::SeqCst);
    }

    /// Makes every call fail while `offline` is set.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Returns how many calls reached `point`, failed or not.
    #[must_use]
    pub fn calls(&self, point: FaultPoint) -> usize {
        self.calls.lock().get(&point).copied().unwrap_or(0)
    }

    fn check(&self, point: FaultPoint) -> StoreResult<()> {
        *self.calls.lock().entry(point).or_insert(0) += 1;

        if self.offline.load(Ordering::SeqCst) {
            debug!(%point, "Backend offline");
            return Err(StoreError::backend(format!("backend offline during {point}")));
        }

        let mut armed = self.armed.lock();
        match armed.get(&point).copied() {
            None => return Ok(()),
            Some(Remaining::Always) => {}
            Some(Remaining::Times(n)) => {
                if n <= 1 {
                    armed.remove(&point);
                } else {
                    armed.insert(point, Remaining::Times(n - 1));
                }
            }
        }
        debug!(%point, "Injecting fault");
        Err(injected(point))
    }
}

fn injected(point: FaultPoint) -> StoreError {
    StoreError::backend(format!("injected {point} failure"))
}

/// A [`Database`] that fails on demand.
#[derive(Debug, Default)]
pub struct FaultyDatabase<D = InMemoryDatabase> {
    inner: D,
    faults: FaultPlan,
}

impl<D: Database> FaultyDatabase<D> {
    /// Wraps `inner` with no faults armed.
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            faults: FaultPlan::default(),
        }
    }

    /// Returns the wrapped database.
    #[must_use]
    pub fn inner(&self) -> &D {
        &self.inner
    }

    /// Returns the fault plan.
    #[must_use]
    pub fn faults(&self) -> &FaultPlan {
        &self.faults
    }
}

impl<D: Database> Database for FaultyDatabase<D> {
    fn get(&self, record: &mut dyn Record, id: &str) -> StoreResult<()> {
        self.faults.check(FaultPoint::Get)?;
        self.inner.get(record, id)
    }

    fn query_one(&self, record: &mut dyn Record, predicate: &str) -> StoreResult<()> {
        self.faults.check(FaultPoint::QueryOne)?;
        self.inner.query_one(record, predicate)
    }

    fn query(&self, template: &dyn Record, query: &Query) -> StoreResult<Vec<Box<dyn Record>>> {
        self.faults.check(FaultPoint::Query)?;
        self.inner.query(template, query)
    }

    fn insert(&self, record: &dyn Record) -> StoreResult<()> {
        self.faults.check(FaultPoint::Insert)?;
        self.inner.insert(record)
    }

    fn update(&self, record: &dyn Record) -> StoreResult<()> {
        self.faults.check(FaultPoint::Update)?;
        self.inner.update(record)
    }

    fn delete(&self, record: &dyn Record) -> StoreResult<()> {
        self.faults.check(FaultPoint::Delete)?;
        self.inner.delete(record)
    }

    fn create_schema(&self, schemas: &[Schema], drop_existing: bool) -> StoreResult<()> {
        self.faults.check(FaultPoint::CreateSchema)?;
        self.inner.create_schema(schemas, drop_existing)
    }
}

/// A [`Cache`] that fails on demand. `ttl` never fails.
#[derive(Debug, Default)]
pub struct FaultyCache<C = InMemoryCache> {
    inner: C,
    faults: FaultPlan,
}

impl<C: Cache> FaultyCache<C> {
    /// Wraps `inner` with no faults armed.
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            faults: FaultPlan::default(),
        }
    }

    /// Returns the wrapped cache.
    #[must_use]
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Returns the fault plan.
    #[must_use]
    pub fn faults(&self) -> &FaultPlan {
        &self.faults
    }
}

impl<C: Cache> Cache for FaultyCache<C> {
    fn get(&self, record: &mut dyn Record, key: &str) -> StoreResult<()> {
        self.faults.check(FaultPoint::Get)?;
        self.inner.get(record, key)
    }

    fn set(&self, record: &dyn Record, ttl: Duration) -> StoreResult<()> {
        self.faults.check(FaultPoint::Set)?;
        self.inner.set(record, ttl)
    }

    fn delete(&self, record: &dyn Record) -> StoreResult<()> {
        self.faults.check(FaultPoint::Delete)?;
        self.inner.delete(record)
    }

    fn ttl(&self) -> Duration {
        self.inner.ttl()
    }

    fn set_ttl(&self, ttl: Duration) -> StoreResult<()> {
        self.faults.check(FaultPoint::SetTtl)?;
        self.inner.set_ttl(ttl)
    }

    fn purge(&self) -> StoreResult<()> {
        self.faults.check(FaultPoint::Purge)?;
        self.inner.purge()
    }
}

/// A manager over fault-injecting wrappers of fresh in-memory backends.
pub struct FaultyManager {
    /// The manager under test.
    pub manager: Manager,
    /// The database wrapper, with a `users` collection.
    pub database: Arc<FaultyDatabase>,
    /// The cache wrapper.
    pub cache: Arc<FaultyCache>,
}

impl FaultyManager {
    /// Creates a manager with no faults armed.
    #[must_use]
    pub fn new() -> Self {
        let database = Arc::new(FaultyDatabase::new(InMemoryDatabase::with_schemas(&[USERS])));
        let cache = Arc::new(FaultyCache::new(InMemoryCache::new()));
        let manager = Manager::new(
            Some(database.clone() as Arc<dyn Database>),
            Some(cache.clone() as Arc<dyn Cache>),
        )
        .expect("Failed to create faulty manager");
        Self {
            manager,
            database,
            cache,
        }
    }
}

impl Default for FaultyManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for FaultyManager {
    type Target = Manager;

    fn deref(&self) -> &Self::Target {
        &self.manager
    }
}

impl std::ops::DerefMut for FaultyManager {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.manager
    }
}
