//! Records and backends shared by the unit tests.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use statekeep_storage::{
    update_from, Cache, InMemoryCache, Record, Schema, StoreError, StoreResult,
};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
}

impl Record for User {
    fn schema(&self) -> Schema {
        Schema::new("users", "id")
    }

    fn id(&self) -> String {
        self.id.clone()
    }

    fn update(&mut self, other: &dyn Record) -> StoreResult<()> {
        update_from(self, other)
    }
}

pub fn user(id: &str, name: &str) -> User {
    User {
        id: id.into(),
        name: name.into(),
    }
}

/// Cache whose first `n` sets or deletes fail.
#[derive(Debug, Default)]
pub struct FlakyCache {
    inner: InMemoryCache,
    failing_sets: Mutex<usize>,
    failing_deletes: Mutex<usize>,
}

impl FlakyCache {
    pub fn failing_sets(n: usize) -> Self {
        Self {
            failing_sets: Mutex::new(n),
            ..Self::default()
        }
    }

    pub fn failing_deletes(n: usize) -> Self {
        Self {
            failing_deletes: Mutex::new(n),
            ..Self::default()
        }
    }

    fn trip(counter: &Mutex<usize>) -> StoreResult<()> {
        let mut remaining = counter.lock();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(StoreError::backend("cache unavailable"));
        }
        Ok(())
    }
}

impl Cache for FlakyCache {
    fn get(&self, record: &mut dyn Record, key: &str) -> StoreResult<()> {
        self.inner.get(record, key)
    }

    fn set(&self, record: &dyn Record, ttl: Duration) -> StoreResult<()> {
        Self::trip(&self.failing_sets)?;
        self.inner.set(record, ttl)
    }

    fn delete(&self, record: &dyn Record) -> StoreResult<()> {
        Self::trip(&self.failing_deletes)?;
        self.inner.delete(record)
    }

    fn ttl(&self) -> Duration {
        self.inner.ttl()
    }

    fn set_ttl(&self, ttl: Duration) -> StoreResult<()> {
        self.inner.set_ttl(ttl)
    }

    fn purge(&self) -> StoreResult<()> {
        self.inner.purge()
    }
}
