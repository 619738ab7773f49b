//! Transaction manager for coordinating commits
//!
//! Every change to a store, transactional or not, goes through this
//! manager so that it gets a unique commit version and reaches the log
//! before it becomes visible.
//!
//! ## Commit Sequence
//!
//! ```text
//! 1. validate() - Active → Validating → Committed (or Aborted on conflict)
//! 2. allocate_version()
//! 3. append Commit entry to the log (durability point)
//! 4. apply_batch() to the record store (visibility point)
//! ```
//!
//! Callers hold the store's writer lock across the whole sequence, so no
//! other batch can slip in between validation and application.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tansu_core::{Error, Mutation, Result, TransactionError};
use tansu_durability::{LogEntry, StoreFile};
use tansu_storage::{ApplyResult, RecordStore};
use tracing::{debug, error};

use crate::transaction::{CommitError, TransactionContext};

/// Issues versions and transaction ids and tracks the active transaction
#[derive(Debug)]
pub struct TransactionManager {
    /// Monotonic; one increment per applied batch
    version: AtomicU64,
    next_txn_id: AtomicU64,
    /// At most one transaction per store
    active: Mutex<Option<u64>>,
}

impl TransactionManager {
    /// Create a new transaction manager
    ///
    /// `initial_version` is the highest version recovered from the log.
    pub fn new(initial_version: u64) -> Self {
        Self {
            version: AtomicU64::new(initial_version),
            next_txn_id: AtomicU64::new(1),
            active: Mutex::new(None),
        }
    }

    /// Current global version
    pub fn current_version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Allocate the next commit version
    pub fn allocate_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Id of the active transaction, if any
    pub fn active_txn(&self) -> Option<u64> {
        *self.active.lock()
    }

    /// Start a transaction reading from the store's current state
    ///
    /// Fails with `AlreadyActive` while another transaction is open.
    pub fn begin(&self, store: &RecordStore) -> Result<TransactionContext> {
        let mut active = self.active.lock();
        if active.is_some() {
            return Err(Error::Transaction(TransactionError::AlreadyActive));
        }
        let txn_id = self.next_txn_id.fetch_add(1, Ordering::SeqCst);
        *active = Some(txn_id);
        let txn = TransactionContext::new(txn_id, store.snapshot());
        debug!(target: "tansu::txn", txn_id, start_version = txn.start_version(), "Transaction started");
        Ok(txn)
    }

    fn release(&self, txn_id: u64) {
        let mut active = self.active.lock();
        if *active == Some(txn_id) {
            *active = None;
        }
    }

    /// Log and apply one batch outside any transaction
    pub fn apply(
        &self,
        ops: Vec<Mutation>,
        store: &RecordStore,
        file: Option<&mut StoreFile>,
    ) -> Result<ApplyResult> {
        if ops.is_empty() {
            return Ok(ApplyResult::default());
        }
        let version = self.allocate_version();
        let entry = LogEntry::Commit { version, ops };
        if let Some(file) = file {
            file.append(&entry)?;
        }
        let LogEntry::Commit { ops, .. } = &entry;
        Ok(store.apply_batch(ops, version))
    }

    /// Commit a transaction atomically
    ///
    /// On success returns the commit version and the apply summary. A
    /// validation failure or log error leaves the store untouched and the
    /// transaction aborted; either way the store is free for a new one.
    pub fn commit(
        &self,
        txn: &mut TransactionContext,
        store: &RecordStore,
        file: Option<&mut StoreFile>,
    ) -> std::result::Result<(u64, ApplyResult), CommitError> {
        let txn_id = txn.txn_id;
        let outcome = self.commit_inner(txn, store, file);
        self.release(txn_id);
        if let Err(e) = &outcome {
            debug!(target: "tansu::txn", txn_id, error = %e, "Transaction commit failed");
        }
        outcome
    }

    fn commit_inner(
        &self,
        txn: &mut TransactionContext,
        store: &RecordStore,
        file: Option<&mut StoreFile>,
    ) -> std::result::Result<(u64, ApplyResult), CommitError> {
        txn.validate(store)?;

        if txn.is_read_only() {
            return Ok((self.current_version(), ApplyResult::default()));
        }

        let version = self.allocate_version();
        let entry = LogEntry::Commit {
            version,
            ops: txn.mutations().to_vec(),
        };
        if let Some(file) = file {
            if let Err(e) = file.append(&entry) {
                error!(
                    target: "tansu::txn",
                    txn_id = txn.txn_id,
                    version,
                    error = %e,
                    "Log append failed, transaction discarded"
                );
                txn.discard(format!("log write failed: {}", e));
                return Err(CommitError::LogError(e));
            }
        }

        let result = store.apply_batch(txn.mutations(), version);
        debug!(
            target: "tansu::txn",
            txn_id = txn.txn_id,
            version,
            puts = result.puts,
            deletes = result.deletes,
            "Transaction committed"
        );
        Ok((version, result))
    }

    /// Abort a transaction, discarding its buffered writes
    pub fn abort(&self, txn: &mut TransactionContext, reason: impl Into<String>) -> Result<()> {
        let outcome = txn.mark_aborted(reason);
        self.release(txn.txn_id);
        if outcome.is_ok() {
            debug!(target: "tansu::txn", txn_id = txn.txn_id, "Transaction aborted");
        }
        outcome
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tansu_core::{StoreConfig, StoreKind, Value};
    use tempfile::TempDir;

    fn put(key: &str, v: &str) -> Mutation {
        Mutation::Put {
            key: key.into(),
            value: Value::from(v),
        }
    }

    #[test]
    fn test_single_active_transaction() {
        let manager = TransactionManager::new(0);
        let store = RecordStore::new(StoreKind::Hash, 16);
        let mut txn = manager.begin(&store).unwrap();
        assert!(matches!(
            manager.begin(&store),
            Err(Error::Transaction(TransactionError::AlreadyActive))
        ));
        manager.abort(&mut txn, "done").unwrap();
        assert!(manager.begin(&store).is_ok());
    }

    #[test]
    fn test_commit_applies_and_bumps_version() {
        let manager = TransactionManager::new(0);
        let store = RecordStore::new(StoreKind::Tree, 0);
        let mut txn = manager.begin(&store).unwrap();
        txn.put("a".into(), Value::from("1")).unwrap();
        txn.put("b".into(), Value::from("2")).unwrap();
        let (version, result) = manager.commit(&mut txn, &store, None).unwrap();
        assert_eq!(version, 1);
        assert_eq!(result.puts, 2);
        assert_eq!(store.len(), 2);
        assert!(manager.active_txn().is_none());
    }

    #[test]
    fn test_commit_applies_in_place() {
        let manager = TransactionManager::new(0);
        let store = RecordStore::new(StoreKind::Hash, 16);
        manager.apply(vec![put("seed", "0")], &store, None).unwrap();
        let before = store.state_addr();

        for i in 0..5 {
            let mut txn = manager.begin(&store).unwrap();
            txn.get("seed").unwrap();
            txn.put(format!("k{}", i), Value::from("v")).unwrap();
            manager.commit(&mut txn, &store, None).unwrap();
            assert_eq!(store.state_addr(), before);
        }
        assert_eq!(store.len(), 6);
    }

    #[test]
    fn test_conflicting_commit_leaves_store_untouched() {
        let manager = TransactionManager::new(0);
        let store = RecordStore::new(StoreKind::Hash, 16);
        manager.apply(vec![put("k", "0")], &store, None).unwrap();

        let mut txn = manager.begin(&store).unwrap();
        txn.get("k").unwrap();
        txn.put("k".into(), Value::from("txn")).unwrap();
        manager.apply(vec![put("k", "outside")], &store, None).unwrap();

        let err = manager.commit(&mut txn, &store, None).unwrap_err();
        assert!(matches!(err, CommitError::ValidationFailed(_)));
        assert_eq!(store.get("k"), Some(Value::from("outside")));
        assert!(manager.active_txn().is_none());
    }

    #[test]
    fn test_commit_is_logged_as_one_entry() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("s.tns");
        let config = StoreConfig::hash();
        let manager = TransactionManager::new(0);
        let store = RecordStore::new(StoreKind::Hash, 16);
        {
            let (mut file, _) = StoreFile::open(&path, &config).unwrap();
            let mut txn = manager.begin(&store).unwrap();
            txn.put("a".into(), Value::from("1")).unwrap();
            txn.delete("a").unwrap();
            txn.put("b".into(), Value::from("2")).unwrap();
            manager.commit(&mut txn, &store, Some(&mut file)).unwrap();
        }
        let (_file, outcome) = StoreFile::open(&path, &config).unwrap();
        assert_eq!(outcome.entries.len(), 1);
        let LogEntry::Commit { ops, version } = &outcome.entries[0];
        assert_eq!(*version, 1);
        assert_eq!(ops.len(), 3);
    }

    #[test]
    fn test_empty_apply_is_noop() {
        let manager = TransactionManager::new(3);
        let store = RecordStore::new(StoreKind::Hash, 16);
        manager.apply(Vec::new(), &store, None).unwrap();
        assert_eq!(manager.current_version(), 3);
    }
}
