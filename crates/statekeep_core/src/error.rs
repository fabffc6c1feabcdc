//! Error types for the statekeep engine.

use crate::transaction::{BackendKind, Operation};
use statekeep_storage::{ErrorKind, StoreError};
use thiserror::Error;

/// Result type for engine operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in engine operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CoreError {
    /// A manager was built without any backend.
    #[error("a manager needs a database, a cache, or both")]
    MissingBackend,

    /// An operation name other than insert, update or delete.
    #[error("unsupported operation {name:?}: expected insert, update or delete")]
    UnsupportedOperation {
        /// The rejected name.
        name: String,
    },

    /// A database-only read on a manager without a database.
    #[error("{op} requires a database")]
    NoDatabase {
        /// Manager operation that was called.
        op: &'static str,
    },

    /// A backend call made on behalf of a manager operation failed.
    #[error("{op}: {source}")]
    Store {
        /// Manager operation that issued the call.
        op: &'static str,
        /// The adapter error.
        source: StoreError,
    },

    /// A backend rejected a change while it was being applied.
    #[error("{backend} failed to {operation}: {source}")]
    Apply {
        /// Backend that failed.
        backend: BackendKind,
        /// Operation of the change.
        operation: Operation,
        /// The adapter error.
        source: StoreError,
    },

    /// A backend failed while a change was being reverted.
    #[error("{backend} failed to revert {operation}: {source}")]
    Revert {
        /// Backend that failed.
        backend: BackendKind,
        /// Operation of the change.
        operation: Operation,
        /// The adapter error.
        source: StoreError,
    },

    /// At least one staged change ended in failure.
    #[error("one or more changes could not be committed ({failed} of {total} failed)")]
    CommitConflict {
        /// Number of failed changes.
        failed: usize,
        /// Number of staged changes.
        total: usize,
    },

    /// At least one applied change could not be reverted.
    #[error("one or more changes could not be rolled back ({failed} failed)")]
    RollbackConflict {
        /// Number of failed reverts.
        failed: usize,
    },

    /// A query returned records of a different type than requested.
    #[error("query returned {found}, expected {expected}")]
    ResultType {
        /// Requested record type.
        expected: &'static str,
        /// Type the backend produced.
        found: &'static str,
    },
}

impl CoreError {
    /// Creates an unsupported operation error.
    pub fn unsupported_operation(name: impl Into<String>) -> Self {
        Self::UnsupportedOperation { name: name.into() }
    }

    /// Wraps an adapter error with the manager operation that caused it.
    pub fn store(op: &'static str, source: StoreError) -> Self {
        Self::Store { op, source }
    }

    /// Returns the domain-level kind of this error.
    ///
    /// Wrapped adapter errors from reads keep the adapter's kind.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingBackend | Self::UnsupportedOperation { .. } | Self::NoDatabase { .. } => {
                ErrorKind::Invalid
            }
            Self::Store { source, .. } => source.kind(),
            Self::Apply { .. } | Self::Revert { .. } | Self::ResultType { .. } => {
                ErrorKind::Internal
            }
            Self::CommitConflict { .. } | Self::RollbackConflict { .. } => ErrorKind::Conflict,
        }
    }

    /// Returns the adapter error behind this error, if any.
    #[must_use]
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Store { source, .. } | Self::Apply { source, .. } | Self::Revert { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }
}
