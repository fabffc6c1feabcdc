//! Error types for storage operations.

use std::fmt;
use thiserror::Error;

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Domain-level classification shared by every error in the workspace.
///
/// Adapters and the engine report many concrete errors, but callers only
/// branch on these four kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request itself is malformed (bad operation name, bad query,
    /// wrong record type, missing backends).
    Invalid,
    /// No record matched the key or predicate.
    NotFound,
    /// More than one record matched, a key is already taken, or a batch
    /// finished with failing changes.
    Conflict,
    /// Any backend failure not otherwise classified.
    Internal,
}

impl ErrorKind {
    /// Returns the lowercase name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Invalid => "invalid",
            Self::NotFound => "not found",
            Self::Conflict => "conflict",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors reported by `Database` and `Cache` adapters.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    /// No record with the given key exists in the collection.
    #[error("no {collection} record with key {key}")]
    NotFound {
        /// Collection that was searched.
        collection: String,
        /// Primary key or cache key that was looked up.
        key: String,
    },

    /// A predicate query matched nothing.
    #[error("no {collection} record satisfies query {predicate}")]
    NoMatch {
        /// Collection that was searched.
        collection: String,
        /// The predicate as given by the caller.
        predicate: String,
    },

    /// A single-row query matched more than one record.
    #[error("{count} {collection} records satisfy single-row query {predicate}")]
    MultipleMatches {
        /// Collection that was searched.
        collection: String,
        /// The predicate as given by the caller.
        predicate: String,
        /// Number of matching records.
        count: usize,
    },

    /// An insert collided with an existing primary key.
    #[error("{collection} record with key {key} already exists")]
    DuplicateKey {
        /// Collection written to.
        collection: String,
        /// The colliding primary key.
        key: String,
    },

    /// The collection was never created in the backend schema.
    #[error("collection {collection} does not exist")]
    CollectionNotFound {
        /// Name of the missing collection.
        collection: String,
    },

    /// A record update was given a value of another concrete type.
    #[error("type mismatch: expected {expected}, got {found}")]
    TypeMismatch {
        /// Type of the receiving record.
        expected: &'static str,
        /// Type of the value that was supplied.
        found: &'static str,
    },

    /// A predicate or query window could not be parsed.
    #[error("invalid query: {message}")]
    InvalidQuery {
        /// What was wrong with the query.
        message: String,
    },

    /// A record could not be converted to or from its document form.
    #[error("invalid document for {collection}: {message}")]
    InvalidDocument {
        /// Collection of the record.
        collection: String,
        /// Serializer message.
        message: String,
    },

    /// Generic adapter failure (connection lost, driver error, ...).
    #[error("backend error: {message}")]
    Backend {
        /// Adapter-provided description.
        message: String,
    },
}

impl StoreError {
    /// Creates a not-found error.
    pub fn not_found(collection: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            collection: collection.into(),
            key: key.into(),
        }
    }

    /// Creates a collection-not-found error.
    pub fn collection_not_found(collection: impl Into<String>) -> Self {
        Self::CollectionNotFound {
            collection: collection.into(),
        }
    }

    /// Creates an invalid query error.
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }

    /// Creates an invalid document error.
    pub fn invalid_document(collection: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidDocument {
            collection: collection.into(),
            message: message.to_string(),
        }
    }

    /// Creates a generic backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Returns the domain-level kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } | Self::NoMatch { .. } => ErrorKind::NotFound,
            Self::MultipleMatches { .. } | Self::DuplicateKey { .. } => ErrorKind::Conflict,
            Self::TypeMismatch { .. } | Self::InvalidQuery { .. } => ErrorKind::Invalid,
            Self::CollectionNotFound { .. }
            | Self::InvalidDocument { .. }
            | Self::Backend { .. } => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_classified() {
        assert_eq!(StoreError::not_found("users", "1").kind(), ErrorKind::NotFound);
        assert_eq!(
            StoreError::MultipleMatches {
                collection: "users".into(),
                predicate: "name = 'a'".into(),
                count: 2,
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(StoreError::invalid_query("eof").kind(), ErrorKind::Invalid);
        assert_eq!(
            StoreError::collection_not_found("books").kind(),
            ErrorKind::Internal
        );
        assert_eq!(StoreError::backend("down").kind(), ErrorKind::Internal);
    }

    #[test]
    fn error_display() {
        let err = StoreError::not_found("users", "31231");
        assert_eq!(err.to_string(), "no users record with key 31231");

        let err = StoreError::collection_not_found("books");
        assert_eq!(err.to_string(), "collection books does not exist");

        assert_eq!(ErrorKind::NotFound.to_string(), "not found");
    }
}
