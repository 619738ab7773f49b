//! RecordStore: the in-memory record and index holder
//!
//! The current [`StoreState`] sits behind `RwLock<Arc<_>>`. Readers clone the
//! `Arc` and release the lock immediately; [`RecordStore::apply_batch`] takes
//! the write lock for the whole batch and mutates through `Arc::make_mut`,
//! which copies the state only while a snapshot still pins the old one.
//! No reader can observe a partially applied batch.

use std::sync::Arc;

use parking_lot::RwLock;
use tansu_core::{Mutation, StoreKind, Value};
use tracing::debug;

use crate::snapshot::StoreSnapshot;
use crate::state::{ApplyResult, StoreState};

/// Records and indices of one open store
#[derive(Debug)]
pub struct RecordStore {
    kind: StoreKind,
    bucket_count: u64,
    state: RwLock<Arc<StoreState>>,
}

impl RecordStore {
    /// Empty store of the given shape
    pub fn new(kind: StoreKind, bucket_count: u64) -> Self {
        Self {
            kind,
            bucket_count,
            state: RwLock::new(Arc::new(StoreState::new(kind, bucket_count))),
        }
    }

    /// Backend shape
    pub fn kind(&self) -> StoreKind {
        self.kind
    }

    /// Pin the current state
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot::new(Arc::clone(&self.state.read()))
    }

    /// Value under `key`
    pub fn get(&self, key: &str) -> Option<Value> {
        self.state.read().get(key).map(|r| r.value.clone())
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.state.read().len()
    }

    /// True if empty
    pub fn is_empty(&self) -> bool {
        self.state.read().is_empty()
    }

    /// Version of the last applied batch
    pub fn current_version(&self) -> u64 {
        self.state.read().version()
    }

    /// Apply a batch atomically
    ///
    /// All mutations, including index maintenance, happen under a single
    /// write lock acquisition.
    pub fn apply_batch(&self, ops: &[Mutation], version: u64) -> ApplyResult {
        let mut guard = self.state.write();
        let state = Arc::make_mut(&mut guard);
        let result = state.apply(ops, version);
        debug!(
            target: "tansu::storage",
            version,
            puts = result.puts,
            deletes = result.deletes,
            "Applied batch"
        );
        result
    }

    /// Address of the current state allocation
    ///
    /// Stays the same across batches unless a pinned snapshot forced a copy.
    pub fn state_addr(&self) -> usize {
        Arc::as_ptr(&*self.state.read()) as usize
    }

    /// Drop everything including index definitions
    pub fn reset(&self) {
        *self.state.write() = Arc::new(StoreState::new(self.kind, self.bucket_count));
    }
}
