//! Staged-change manager.

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::transaction::change::{Change, ChangeStatus};
use crate::types::ChangeId;
use statekeep_storage::{Cache, Database, Query, Record};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Stages record changes and applies them to a database and/or cache.
///
/// The manager provides:
/// - Reads that bypass staging (`get`, `query_one`, `query`)
/// - FIFO staging of inserts, updates and deletes
/// - Best-effort commits: every staged change is attempted, failures are
///   recorded per change
/// - Rollback of the inserts applied by the most recent commit
///
/// ## Batch Semantics
///
/// A commit is not atomic across backends. When a batch fails, the
/// successful changes stay applied and listed in [`Manager::applied`], the
/// staged list is kept, and a later `commit` retries only the changes that
/// have not succeeded yet.
pub struct Manager {
    /// Persistent store.
    database: Option<Arc<dyn Database>>,
    /// Fast cache.
    cache: Option<Arc<dyn Cache>>,
    /// Settings given at construction.
    config: Config,
    /// Every change still referenced by `staged` or `applied`.
    changes: HashMap<ChangeId, Change>,
    /// Pending batch, in commit order.
    staged: Vec<ChangeId>,
    /// Changes applied by the most recent commit.
    applied: Vec<ChangeId>,
    /// Next change ID.
    next_id: ChangeId,
}

impl Manager {
    /// Creates a manager over a database, a cache, or both.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MissingBackend`] if neither is given.
    pub fn new(
        database: Option<Arc<dyn Database>>,
        cache: Option<Arc<dyn Cache>>,
    ) -> CoreResult<Self> {
        Self::with_config(database, cache, Config::default())
    }

    /// Creates a manager and applies `config` to its backends.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MissingBackend`] if neither backend is given, or
    /// the cache's error if it rejects the configured TTL.
    pub fn with_config(
        database: Option<Arc<dyn Database>>,
        cache: Option<Arc<dyn Cache>>,
        config: Config,
    ) -> CoreResult<Self> {
        if database.is_none() && cache.is_none() {
            return Err(CoreError::MissingBackend);
        }

        if let (Some(cache), Some(ttl)) = (&cache, config.cache_ttl) {
            cache
                .set_ttl(ttl)
                .map_err(|source| CoreError::store("configure", source))?;
        }

        Ok(Self {
            database,
            cache,
            config,
            changes: HashMap::new(),
            staged: Vec::new(),
            applied: Vec::new(),
            next_id: ChangeId::new(1),
        })
    }

    /// Returns the database, if configured.
    #[must_use]
    pub fn database(&self) -> Option<&Arc<dyn Database>> {
        self.database.as_ref()
    }

    /// Returns the cache, if configured.
    #[must_use]
    pub fn cache(&self) -> Option<&Arc<dyn Cache>> {
        self.cache.as_ref()
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Loads the record with primary key `key` into `record`.
    ///
    /// The cache is tried first; the database is consulted only if the cache
    /// is absent or its lookup failed for any reason. A database hit does not
    /// populate the cache.
    ///
    /// # Errors
    ///
    /// Returns the last backend's error, keeping its kind.
    pub fn get(&self, record: &mut dyn Record, key: &str) -> CoreResult<()> {
        let mut last_error = None;

        if let Some(cache) = &self.cache {
            match cache.get(record, key) {
                Ok(()) => return Ok(()),
                Err(err) => {
                    debug!(key, error = %err, "Cache lookup failed");
                    last_error = Some(err);
                }
            }
        }

        if let Some(database) = &self.database {
            match database.get(record, key) {
                Ok(()) => return Ok(()),
                Err(err) => last_error = Some(err),
            }
        }

        match last_error {
            Some(source) => Err(CoreError::store("get", source)),
            None => Err(CoreError::MissingBackend),
        }
    }

    /// Loads the single record satisfying `predicate` into `record`.
    ///
    /// # Errors
    ///
    /// Returns a `NotFound` error on no match, a `Conflict` error on several,
    /// and [`CoreError::NoDatabase`] without a database.
    pub fn query_one(&self, record: &mut dyn Record, predicate: &str) -> CoreResult<()> {
        self.require_database("query_one")?
            .query_one(record, predicate)
            .map_err(|source| CoreError::store("query_one", source))
    }

    /// Replaces `results` with every record of `template`'s type matching
    /// the query.
    ///
    /// `parts` is `[predicate]`, `[predicate, limit]` or
    /// `[predicate, limit, offset]`. `results` is left untouched on error.
    ///
    /// # Errors
    ///
    /// Returns an `Invalid` error for malformed parts, a `NotFound` error if
    /// the window is empty, and [`CoreError::NoDatabase`] without a database.
    pub fn query<T, S>(&self, results: &mut Vec<T>, template: &T, parts: &[S]) -> CoreResult<()>
    where
        T: Record,
        S: AsRef<str>,
    {
        let database = self.require_database("query")?;
        let query = Query::from_parts(parts).map_err(|source| CoreError::store("query", source))?;
        let rows = database
            .query(template, &query)
            .map_err(|source| CoreError::store("query", source))?;

        let typed = rows
            .into_iter()
            .map(|row| {
                let found = row.type_name();
                row.into_any()
                    .downcast::<T>()
                    .map(|record| *record)
                    .map_err(|_| CoreError::ResultType {
                        expected: std::any::type_name::<T>(),
                        found,
                    })
            })
            .collect::<CoreResult<Vec<T>>>()?;

        *results = typed;
        Ok(())
    }

    /// Stages a change of `record`. Nothing touches a backend until
    /// [`Manager::commit`].
    ///
    /// `operation` is `insert`, `update` or `delete` in any case, or an
    /// [`crate::Operation`]. The change snapshots the record as it is now.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnsupportedOperation`] for any other name;
    /// nothing is staged.
    pub fn stage(&mut self, record: &dyn Record, operation: impl AsRef<str>) -> CoreResult<ChangeId> {
        let id = self.next_id;
        let change = Change::new(id, record, operation)?;
        debug!(change = %id, operation = %change.operation(), record = %record.id(), "Staged change");

        self.next_id = id.next();
        self.changes.insert(id, change);
        self.staged.push(id);
        Ok(id)
    }

    /// Applies every staged change in staging order.
    ///
    /// The previous applied list is replaced by the changes that end up
    /// successful. On full success the staged list is cleared.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CommitConflict`] after the whole batch ran if any
    /// change failed; the staged list is kept for a retry.
    pub fn commit(&mut self) -> CoreResult<()> {
        self.applied.clear();

        let database = self.database.as_deref();
        let cache = self.cache.as_deref();
        let mut failed = 0;

        for id in &self.staged {
            let Some(change) = self.changes.get_mut(id) else {
                continue;
            };
            if let Err(err) = change.apply(database, cache) {
                failed += 1;
                debug!(change = %id, error = %err, "Change failed");
            }
            if change.status() == ChangeStatus::Success {
                self.applied.push(*id);
            }
        }

        let total = self.staged.len();
        if failed > 0 {
            warn!(failed, total, "Commit finished with failed changes");
            if self.config.log_failed_batches {
                self.log_status();
            }
            self.prune();
            return Err(CoreError::CommitConflict { failed, total });
        }

        info!(total, "Committed changes");
        self.staged.clear();
        self.prune();
        Ok(())
    }

    /// Reverts the changes applied by the most recent commit.
    ///
    /// Changes that are not reverted afterwards (a failed revert, or an
    /// update or delete, which cannot be reverted) remain in the applied
    /// list. The staged list is never touched.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::RollbackConflict`] if any revert failed.
    pub fn rollback(&mut self) -> CoreResult<()> {
        let database = self.database.as_deref();
        let cache = self.cache.as_deref();
        let previous = std::mem::take(&mut self.applied);
        let mut failed = 0;

        for id in previous {
            let Some(change) = self.changes.get_mut(&id) else {
                continue;
            };
            if let Err(err) = change.revert(database, cache) {
                failed += 1;
                debug!(change = %id, error = %err, "Revert failed");
            }
            if change.status() != ChangeStatus::Reverted {
                self.applied.push(id);
            }
        }

        self.prune();
        if failed > 0 {
            warn!(failed, "Rollback finished with failed reverts");
            return Err(CoreError::RollbackConflict { failed });
        }

        info!(remaining = self.applied.len(), "Rolled back changes");
        Ok(())
    }

    /// Discards every staged change.
    pub fn clear(&mut self) {
        self.staged.clear();
        self.prune();
    }

    /// Returns the staged changes in commit order.
    #[must_use]
    pub fn status(&self) -> Vec<&Change> {
        self.resolve(&self.staged)
    }

    /// Returns the changes applied by the most recent commit.
    #[must_use]
    pub fn applied(&self) -> Vec<&Change> {
        self.resolve(&self.applied)
    }

    /// Returns a change that is still staged or applied.
    #[must_use]
    pub fn change(&self, id: ChangeId) -> Option<&Change> {
        self.changes.get(&id)
    }

    /// Logs every staged change at info level.
    pub fn log_status(&self) {
        for change in self.status() {
            info!(
                change = %change.id(),
                record = ?change.record(),
                operation = %change.operation(),
                status = %change.status(),
                error = ?change.last_error(),
                "Staged change"
            );
        }
    }

    fn require_database(&self, op: &'static str) -> CoreResult<&dyn Database> {
        self.database
            .as_deref()
            .ok_or(CoreError::NoDatabase { op })
    }

    fn resolve(&self, ids: &[ChangeId]) -> Vec<&Change> {
        ids.iter().filter_map(|id| self.changes.get(id)).collect()
    }

    // Drops changes neither list refers to.
    fn prune(&mut self) {
        let live: HashSet<ChangeId> = self.staged.iter().chain(&self.applied).copied().collect();
        self.changes.retain(|id, _| live.contains(id));
    }
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("database", &self.database.is_some())
            .field("cache", &self.cache.is_some())
            .field("config", &self.config)
            .field("staged", &self.staged)
            .field("applied", &self.applied)
            .finish_non_exhaustive()
    }
}
