//! Storage layer for tansu
//!
//! This crate holds the records of an open store in memory:
//! - Backend: hash (`FxHashMap`) or tree (`BTreeMap`) keyed by primary key
//! - IndexSet: lexical and decimal secondary indices per column
//! - StoreState: records + indices + weight, mutated only in whole batches
//! - RecordStore: `RwLock<Arc<StoreState>>` with copy-on-write batches
//! - StoreSnapshot: immutable pinned view used by queries and transactions

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod index;
pub mod snapshot;
pub mod state;
pub mod store;

pub use backend::{Backend, StoredRecord};
pub use index::{ColumnIndex, DecimalKey, IndexLookup, IndexSet};
pub use snapshot::{SnapshotIter, StoreSnapshot};
pub use state::{normalize_column, ApplyResult, StoreState};
pub use store::RecordStore;
