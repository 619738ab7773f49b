//! Transaction context: snapshot reads, buffered writes, OCC read set
//!
//! A [`TransactionContext`] reads from the snapshot pinned at begin, layered
//! under its own buffered writes (read-your-writes). Nothing reaches the
//! store until [`crate::TransactionManager::commit`] validates the read set
//! and applies the buffered mutations as one batch.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;
use tansu_core::{Error, Mutation, Result, TransactionError, Value};
use tansu_storage::{RecordStore, StoreSnapshot};
use thiserror::Error as ThisError;

use crate::validation::{validate_read_set, ValidationResult};

/// Error type for commit failures
#[derive(Debug, ThisError)]
pub enum CommitError {
    /// Read set no longer matches the store
    #[error("commit failed: {} conflict(s)", .0.conflict_count())]
    ValidationFailed(ValidationResult),

    /// Transaction was not in a state that allows commit
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Appending the commit to the log failed
    #[error("log write failed: {0}")]
    LogError(#[source] Error),
}

impl From<CommitError> for Error {
    fn from(e: CommitError) -> Self {
        match e {
            CommitError::ValidationFailed(result) => Error::Transaction(TransactionError::Conflict {
                conflicts: result.conflict_count(),
            }),
            CommitError::InvalidState(_) => Error::Transaction(TransactionError::NotActive),
            CommitError::LogError(inner) => inner,
        }
    }
}

/// Summary of buffered operations that an abort would discard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingOperations {
    /// Buffered puts
    pub puts: usize,
    /// Buffered deletes
    pub deletes: usize,
    /// Buffered clears
    pub clears: usize,
}

impl PendingOperations {
    /// Total number of buffered operations
    pub fn total(&self) -> usize {
        self.puts + self.deletes + self.clears
    }

    /// True if nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Status of a transaction in its lifecycle
///
/// - `Active` → `Validating` → `Committed`
/// - `Validating` → `Aborted` (conflict detected)
/// - `Active` → `Aborted` (user abort or error)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Executing; reads and writes allowed
    Active,
    /// Read set being checked
    Validating,
    /// Applied to the store
    Committed,
    /// Discarded
    Aborted {
        /// Why the transaction ended
        reason: String,
    },
}

/// State of one transaction
#[derive(Debug)]
pub struct TransactionContext {
    /// Transaction id, unique per manager
    pub txn_id: u64,
    /// released once the transaction stops reading
    snapshot: Option<StoreSnapshot>,
    start_version: u64,
    /// key → version observed when first read from the snapshot
    read_set: FxHashMap<String, u64>,
    /// key → buffered value (`None` = deleted in this transaction)
    overlay: BTreeMap<String, Option<Value>>,
    /// snapshot contents are hidden after a buffered clear
    cleared: bool,
    ops: Vec<Mutation>,
    status: TransactionStatus,
    started: Instant,
}

impl TransactionContext {
    /// Start a transaction reading from `snapshot`
    pub fn new(txn_id: u64, snapshot: StoreSnapshot) -> Self {
        Self {
            txn_id,
            start_version: snapshot.version(),
            snapshot: Some(snapshot),
            read_set: FxHashMap::default(),
            overlay: BTreeMap::new(),
            cleared: false,
            ops: Vec::new(),
            status: TransactionStatus::Active,
            started: Instant::now(),
        }
    }

    /// Version of the snapshot this transaction reads from
    pub fn start_version(&self) -> u64 {
        self.start_version
    }

    /// Current status
    pub fn status(&self) -> &TransactionStatus {
        &self.status
    }

    /// Error unless the transaction is still active
    pub fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(Error::Transaction(TransactionError::NotActive))
        }
    }

    /// Read a key: own writes first, then the snapshot
    ///
    /// Snapshot reads are recorded in the read set for validation.
    pub fn get(&mut self, key: &str) -> Result<Option<Value>> {
        self.ensure_active()?;
        if let Some(buffered) = self.overlay.get(key) {
            return Ok(buffered.clone());
        }
        if self.cleared {
            return Ok(None);
        }
        let found = self
            .snapshot
            .as_ref()
            .and_then(|snapshot| snapshot.get_versioned(key));
        let version = found.as_ref().map(|(_, v)| *v).unwrap_or(0);
        self.read_set.entry(key.to_string()).or_insert(version);
        Ok(found.map(|(value, _)| value))
    }

    /// Buffer a put
    pub fn put(&mut self, key: String, value: Value) -> Result<()> {
        self.ensure_active()?;
        self.overlay.insert(key.clone(), Some(value.clone()));
        self.ops.push(Mutation::Put { key, value });
        Ok(())
    }

    /// Buffer a delete, returning the value visible before it
    pub fn delete(&mut self, key: &str) -> Result<Option<Value>> {
        let previous = self.get(key)?;
        if previous.is_some() {
            self.overlay.insert(key.to_string(), None);
            self.ops.push(Mutation::Delete {
                key: key.to_string(),
            });
        }
        Ok(previous)
    }

    /// Buffer removal of every record
    pub fn clear(&mut self) -> Result<()> {
        self.ensure_active()?;
        self.overlay.clear();
        self.cleared = true;
        self.ops.push(Mutation::Clear);
        Ok(())
    }

    /// Buffered mutations in order
    pub fn mutations(&self) -> &[Mutation] {
        &self.ops
    }

    /// Keys read from the snapshot
    pub fn read_count(&self) -> usize {
        self.read_set.len()
    }

    /// Counts of buffered operations
    pub fn pending_operations(&self) -> PendingOperations {
        let mut pending = PendingOperations::default();
        for op in &self.ops {
            match op {
                Mutation::Put { .. } => pending.puts += 1,
                Mutation::Delete { .. } => pending.deletes += 1,
                Mutation::Clear => pending.clears += 1,
                Mutation::SetIndex { .. } | Mutation::DropIndex { .. } => {}
            }
        }
        pending
    }

    /// True if nothing was written
    pub fn is_read_only(&self) -> bool {
        self.ops.is_empty()
    }

    /// True while reads and writes are allowed
    pub fn is_active(&self) -> bool {
        matches!(self.status, TransactionStatus::Active)
    }

    /// True after a successful commit
    pub fn is_committed(&self) -> bool {
        matches!(self.status, TransactionStatus::Committed)
    }

    /// True after an abort or failed commit
    pub fn is_aborted(&self) -> bool {
        matches!(self.status, TransactionStatus::Aborted { .. })
    }

    /// Reason recorded at abort
    pub fn abort_reason(&self) -> Option<&str> {
        match &self.status {
            TransactionStatus::Aborted { reason } => Some(reason),
            _ => None,
        }
    }

    /// Time since begin
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Validate the read set and move to `Committed`
    ///
    /// On conflict the transaction is aborted and its buffer discarded.
    /// The caller applies [`TransactionContext::mutations`] afterwards.
    pub fn validate(&mut self, store: &RecordStore) -> std::result::Result<(), CommitError> {
        if !self.is_active() {
            return Err(CommitError::InvalidState(format!("{:?}", self.status)));
        }
        self.status = TransactionStatus::Validating;
        // the begin state must not be pinned when the batch is applied
        self.snapshot = None;

        let result = validate_read_set(&self.read_set, &store.snapshot());
        if !result.is_valid() {
            self.discard(format!(
                "validation failed: {} conflict(s)",
                result.conflict_count()
            ));
            return Err(CommitError::ValidationFailed(result));
        }
        self.status = TransactionStatus::Committed;
        Ok(())
    }

    /// Discard buffered work and mark aborted
    pub fn mark_aborted(&mut self, reason: impl Into<String>) -> Result<()> {
        match self.status {
            TransactionStatus::Committed | TransactionStatus::Aborted { .. } => {
                Err(Error::Transaction(TransactionError::NotActive))
            }
            TransactionStatus::Active | TransactionStatus::Validating => {
                self.discard(reason.into());
                Ok(())
            }
        }
    }

    pub(crate) fn discard(&mut self, reason: String) {
        self.ops.clear();
        self.overlay.clear();
        self.read_set.clear();
        self.cleared = false;
        self.snapshot = None;
        self.status = TransactionStatus::Aborted { reason };
    }
}
