//! Optimistic concurrency control for tansu
//!
//! This crate implements snapshot-isolated transactions:
//! - TransactionContext: pinned snapshot, buffered writes, read set
//! - Validation: first-committer-wins on the read set
//! - TransactionManager: version allocation, single active transaction,
//!   log-then-apply commit sequence

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod manager;
pub mod transaction;
pub mod validation;

pub use manager::TransactionManager;
pub use transaction::{CommitError, PendingOperations, TransactionContext, TransactionStatus};
pub use validation::{validate_read_set, ConflictType, ValidationResult};
