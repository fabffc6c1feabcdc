//! Staged changes and the manager that commits and rolls them back.
//!
//! Changes are applied best-effort:
//! - **Ordering**: staged changes run in staging order, database before cache
//! - **Isolation per change**: one failing change never stops the batch
//! - **Retry**: resolved changes are skipped when a batch is committed again
//! - **Rollback**: only inserts are undone

mod change;
mod manager;

pub use change::{BackendKind, Change, ChangeStatus, Operation};
pub use manager::Manager;
