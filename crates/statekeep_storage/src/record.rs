//! The record contract every storable entity implements.

use crate::error::{StoreError, StoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::fmt;

/// Document form of a record, as handed to and stored by adapters.
pub type Document = serde_json::Value;

/// Storage schema of a record type: its collection and primary-key field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Schema {
    name: &'static str,
    primary_key: &'static str,
}

impl Schema {
    /// Creates a schema for the collection `name` keyed by `primary_key`.
    #[must_use]
    pub const fn new(name: &'static str, primary_key: &'static str) -> Self {
        Self { name, primary_key }
    }

    /// Returns the collection name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the primary-key field name.
    #[must_use]
    pub const fn primary_key(&self) -> &'static str {
        self.primary_key
    }

    /// Returns the cache key for a record of this schema with the given id.
    ///
    /// Keys are scoped by collection so equal ids in different collections
    /// never collide.
    #[must_use]
    pub fn cache_key(&self, id: &str) -> String {
        format!("{}-{}", self.name, id)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.primary_key)
    }
}

/// A domain entity that can be staged and stored.
///
/// Implementors provide the three storage-facing capabilities; the
/// type-erased plumbing adapters need comes from [`RecordObject`], which is
/// implemented automatically for every `Clone + Serialize + DeserializeOwned`
/// record.
///
/// # Example
///
/// ```rust
/// use serde::{Deserialize, Serialize};
/// use statekeep_storage::{update_from, Record, Schema, StoreResult};
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
///
///     fn id(&self) -> String {
///         self.id.clone()
///     }
///
///     fn update(&mut self, other: &dyn Record) -> StoreResult<()> {
///         update_from(self, other)
///     }
/// }
/// ```
pub trait Record: RecordObject + Any + Send + Sync + fmt::Debug {
    /// Returns the storage schema of this record type.
    fn schema(&self) -> Schema;

    /// Returns the primary-key value. Must be stable for the entity's lifetime.
    fn id(&self) -> String;

    /// Overwrites this record's fields with those of `other`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TypeMismatch`] if `other` is not the same
    /// concrete type as `self`.
    fn update(&mut self, other: &dyn Record) -> StoreResult<()>;
}

/// Type-erased helpers adapters use to move records in and out of storage.
///
/// Blanket-implemented; record types never implement this by hand.
pub trait RecordObject {
    /// Borrows the record as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Converts a boxed record into `Box<dyn Any>` for downcasting by value.
    fn into_any(self: Box<Self>) -> Box<dyn Any>;

    /// Clones the record behind a fresh box.
    fn boxed_clone(&self) -> Box<dyn Record>;

    /// Returns the concrete type name, for error messages.
    fn type_name(&self) -> &'static str;

    /// Serializes the record to its document form.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidDocument`] if serialization fails.
    fn to_document(&self) -> StoreResult<Document>;

    /// Replaces the record's fields with those decoded from `document`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidDocument`] if the document does not
    /// decode into this record type.
    fn load_document(&mut self, document: Document) -> StoreResult<()>;
}

impl<T> RecordObject for T
where
    T: Record + Clone + Serialize + DeserializeOwned + Send + Sync + fmt::Debug + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn boxed_clone(&self) -> Box<dyn Record> {
        Box::new(self.clone())
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn to_document(&self) -> StoreResult<Document> {
        serde_json::to_value(self)
            .map_err(|e| StoreError::invalid_document(self.schema().name(), e))
    }

    fn load_document(&mut self, document: Document) -> StoreResult<()> {
        *self = serde_json::from_value(document)
            .map_err(|e| StoreError::invalid_document(self.schema().name(), e))?;
        Ok(())
    }
}

impl Clone for Box<dyn Record> {
    fn clone(&self) -> Self {
        (**self).boxed_clone()
    }
}

/// Implements [`Record::update`] by checked downcast and clone.
///
/// # Errors
///
/// Returns [`StoreError::TypeMismatch`] if `other` is not a `T`.
pub fn update_from<T>(target: &mut T, other: &dyn Record) -> StoreResult<()>
where
    T: Record + Clone,
{
    match other.as_any().downcast_ref::<T>() {
        Some(value) => {
            *target = value.clone();
            Ok(())
        }
        None => Err(StoreError::TypeMismatch {
            expected: std::any::type_name::<T>(),
            found: other.type_name(),
        }),
    }
}
