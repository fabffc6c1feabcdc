//! A single staged mutation and its lifecycle.

use crate::error::{CoreError, CoreResult};
use crate::types::ChangeId;
use statekeep_storage::{Cache, Database, ErrorKind, Record, StoreError, StoreResult};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Kind of mutation a change performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Create a new record.
    Insert,
    /// Replace an existing record.
    Update,
    /// Remove an existing record.
    Delete,
}

impl Operation {
    /// Every operation, in declaration order.
    pub const ALL: [Self; 3] = [Self::Insert, Self::Update, Self::Delete];

    /// Returns the lowercase operation name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl FromStr for Operation {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| CoreError::unsupported_operation(s))
    }
}

impl AsRef<str> for Operation {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeStatus {
    /// Staged, not yet applied.
    Pending,
    /// Accepted by every configured backend.
    Success,
    /// Rejected by at least one backend.
    Failure,
    /// Undone by a rollback.
    Reverted,
}

impl ChangeStatus {
    /// Returns the lowercase status name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Reverted => "reverted",
        }
    }

    /// Returns true once applying the change is a no-op.
    #[must_use]
    pub const fn is_resolved(self) -> bool {
        matches!(self, Self::Success | Self::Reverted)
    }
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend a change is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// The persistent store.
    Database,
    /// The key-value cache.
    Cache,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Database => "database",
            Self::Cache => "cache",
        })
    }
}

/// One staged mutation of a record.
///
/// The change owns a snapshot of the record taken when it was staged.
/// Its operation is fixed; only the status and last error move.
#[derive(Debug, Clone)]
pub struct Change {
    id: ChangeId,
    record: Box<dyn Record>,
    operation: Operation,
    status: ChangeStatus,
    last_error: Option<StoreError>,
}

impl Change {
    /// Creates a pending change from an operation name (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnsupportedOperation`] unless `operation` names
    /// insert, update or delete.
    pub fn new(id: ChangeId, record: &dyn Record, operation: impl AsRef<str>) -> CoreResult<Self> {
        let operation = operation.as_ref().parse()?;
        Ok(Self {
            id,
            record: record.boxed_clone(),
            operation,
            status: ChangeStatus::Pending,
            last_error: None,
        })
    }

    /// Returns the change ID.
    #[must_use]
    pub fn id(&self) -> ChangeId {
        self.id
    }

    /// Returns the record snapshot.
    #[must_use]
    pub fn record(&self) -> &dyn Record {
        self.record.as_ref()
    }

    /// Returns the operation.
    #[must_use]
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> ChangeStatus {
        self.status
    }

    /// Returns the most recent backend error, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<&StoreError> {
        self.last_error.as_ref()
    }

    /// Returns true if [`Change::revert`] can undo this change.
    ///
    /// Only inserts are reversible; no pre-image is kept for updates or
    /// deletes.
    #[must_use]
    pub fn is_reversible(&self) -> bool {
        self.operation == Operation::Insert
    }

    /// Applies the change to each configured backend, database first.
    ///
    /// A no-op once the change succeeded or was reverted. Every configured
    /// backend is attempted even after one fails; the change ends
    /// [`ChangeStatus::Success`] only if all of them accepted it. A failure
    /// records [`Change::last_error`]; a later successful apply clears it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Apply`] for the last backend that failed.
    pub fn apply(
        &mut self,
        database: Option<&dyn Database>,
        cache: Option<&dyn Cache>,
    ) -> CoreResult<()> {
        if self.status.is_resolved() {
            return Ok(());
        }

        let mut failure = None;

        if let Some(database) = database {
            let record = self.record.as_ref();
            let result = match self.operation {
                Operation::Insert => database.insert(record),
                Operation::Update => database.update(record),
                Operation::Delete => database.delete(record),
            };
            if let Err(source) = result {
                failure = Some(self.apply_failed(BackendKind::Database, source));
            }
        }

        if let Some(cache) = cache {
            let record = self.record.as_ref();
            let result = match self.operation {
                Operation::Insert | Operation::Update => cache.set(record, cache.ttl()),
                Operation::Delete => cache.delete(record),
            };
            if let Err(source) = result {
                failure = Some(self.apply_failed(BackendKind::Cache, source));
            }
        }

        match failure {
            Some(err) => {
                self.status = ChangeStatus::Failure;
                Err(err)
            }
            None => {
                debug!(change = %self.id, operation = %self.operation, "Applied change");
                self.status = ChangeStatus::Success;
                self.last_error = None;
                Ok(())
            }
        }
    }

    /// Undoes a successful insert by deleting the record from each
    /// configured backend.
    ///
    /// A no-op unless the change succeeded. Updates and deletes are left
    /// applied with a warning. A backend that no longer holds the record
    /// counts as reverted, so a partially reverted change can be retried.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Revert`] if a backend fails; the change stays
    /// [`ChangeStatus::Success`].
    pub fn revert(
        &mut self,
        database: Option<&dyn Database>,
        cache: Option<&dyn Cache>,
    ) -> CoreResult<()> {
        if self.status != ChangeStatus::Success {
            return Ok(());
        }
        if !self.is_reversible() {
            warn!(
                change = %self.id,
                operation = %self.operation,
                "Revert is only supported for inserts; leaving change applied"
            );
            return Ok(());
        }

        let mut failure = None;

        if let Some(database) = database {
            let result = tolerate_missing(database.delete(self.record.as_ref()));
            if let Err(source) = result {
                failure = Some(self.revert_failed(BackendKind::Database, source));
            }
        }

        if let Some(cache) = cache {
            let result = tolerate_missing(cache.delete(self.record.as_ref()));
            if let Err(source) = result {
                failure = Some(self.revert_failed(BackendKind::Cache, source));
            }
        }

        match failure {
            Some(err) => Err(err),
            None => {
                debug!(change = %self.id, "Reverted change");
                self.status = ChangeStatus::Reverted;
                Ok(())
            }
        }
    }

    fn apply_failed(&mut self, backend: BackendKind, source: StoreError) -> CoreError {
        warn!(
            change = %self.id,
            %backend,
            operation = %self.operation,
            error = %source,
            "Backend rejected change"
        );
        self.last_error = Some(source.clone());
        CoreError::Apply {
            backend,
            operation: self.operation,
            source,
        }
    }

    fn revert_failed(&mut self, backend: BackendKind, source: StoreError) -> CoreError {
        warn!(
            change = %self.id,
            %backend,
            error = %source,
            "Backend failed to revert change"
        );
        self.last_error = Some(source.clone());
        CoreError::Revert {
            backend,
            operation: self.operation,
            source,
        }
    }
}

fn tolerate_missing(result: StoreResult<()>) -> StoreResult<()> {
    match result {
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let schema = self.record.schema();
        write!(
            f,
            "{} {} {}/{} [{}]",
            self.id,
            self.operation,
            schema.name(),
            self.record.id(),
            self.status
        )?;
        if let Some(err) = &self.last_error {
            write!(f, " last error: {err}")?;
        }
        Ok(())
    }
}
