//! Transaction validation for OCC
//!
//! Rules:
//! - First-committer-wins based on the read set, not the write set
//! - Blind writes (write without read) do not conflict
//! - A key absent at read time is recorded at version 0
//! - Write skew is allowed

use rustc_hash::FxHashMap;
use tansu_storage::StoreSnapshot;

/// Types of conflicts that can occur during transaction validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictType {
    /// Key was read at one version but the store now holds another
    ReadWriteConflict {
        /// The key that has a conflict
        key: String,
        /// Version recorded in the read set
        read_version: u64,
        /// Version in the store at validation time
        current_version: u64,
    },
}

/// Result of transaction validation
///
/// A transaction commits only if [`ValidationResult::is_valid`] is true.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// All conflicts detected during validation
    pub conflicts: Vec<ConflictType>,
}

impl ValidationResult {
    /// Successful validation result
    pub fn ok() -> Self {
        Self::default()
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Merge another validation result into this one
    pub fn merge(&mut self, other: ValidationResult) {
        self.conflicts.extend(other.conflicts);
    }

    /// Number of conflicts
    pub fn conflict_count(&self) -> usize {
        self.conflicts.len()
    }
}

/// Check every read against the latest committed state
pub fn validate_read_set(read_set: &FxHashMap<String, u64>, current: &StoreSnapshot) -> ValidationResult {
    let mut result = ValidationResult::ok();
    for (key, read_version) in read_set {
        let current_version = current.version_of(key);
        if current_version != *read_version {
            result.conflicts.push(ConflictType::ReadWriteConflict {
                key: key.clone(),
                read_version: *read_version,
                current_version,
            });
        }
    }
    result
}
