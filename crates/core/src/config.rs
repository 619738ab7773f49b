//! Store configuration
//!
//! Tuning is fixed when a store is opened. The engine crate loads a
//! [`StoreConfig`] from TOML or from the `path#key=value` suffix syntax; this
//! module only defines the shape, the defaults and validation.

use crate::error::{Error, Result};
use crate::types::StoreKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default bucket count for hash stores
pub const DEFAULT_BUCKET_COUNT: u64 = 131_071;
/// Default record alignment power (16 bytes)
pub const DEFAULT_ALIGNMENT_POWER: u8 = 4;
/// Default free pool power (1024 superseded entries before auto-defrag)
pub const DEFAULT_FREE_POOL_POWER: u8 = 10;
/// Default leaf node cache size
pub const DEFAULT_CACHE_LEAF_NODES: u64 = 2048;
/// Default non-leaf node cache size
pub const DEFAULT_CACHE_NON_LEAF_NODES: u64 = 512;
/// Default extra mapped memory (64 MiB)
pub const DEFAULT_EXTRA_MAPPED_MEMORY: u64 = 67_108_864;

/// Largest accepted alignment power
pub const MAX_ALIGNMENT_POWER: u8 = 16;
/// Largest accepted free pool power
pub const MAX_FREE_POOL_POWER: u8 = 30;

/// Open mode flags
///
/// Parsed from and rendered as the classic character set: `r`ead, `w`rite,
/// `c`reate, `t`runcate. The default is `wc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OpenMode {
    /// Open for reading
    pub read: bool,
    /// Open for writing
    pub write: bool,
    /// Create the file if missing
    pub create: bool,
    /// Discard existing contents
    pub truncate: bool,
}

impl OpenMode {
    /// Read-only
    pub fn read_only() -> Self {
        Self {
            read: true,
            write: false,
            create: false,
            truncate: false,
        }
    }

    /// Read/write, creating the file if needed
    pub fn read_write() -> Self {
        Self {
            read: true,
            write: true,
            create: true,
            truncate: false,
        }
    }

    /// Read/write, discarding any existing contents
    pub fn truncate() -> Self {
        Self {
            truncate: true,
            ..Self::read_write()
        }
    }

    /// Reject flag combinations that make no sense
    pub fn validate(&self) -> Result<()> {
        if !self.read && !self.write {
            return Err(Error::invalid("mode must include read or write"));
        }
        if self.create && !self.write {
            return Err(Error::invalid("mode 'create' requires 'write'"));
        }
        if self.truncate && !self.write {
            return Err(Error::invalid("mode 'truncate' requires 'write'"));
        }
        Ok(())
    }
}

impl Default for OpenMode {
    fn default() -> Self {
        Self {
            read: false,
            write: true,
            create: true,
            truncate: false,
        }
    }
}

impl FromStr for OpenMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut mode = OpenMode {
            read: false,
            write: false,
            create: false,
            truncate: false,
        };
        for c in s.chars() {
            match c {
                'r' => mode.read = true,
                'w' => mode.write = true,
                'c' => mode.create = true,
                't' => mode.truncate = true,
                other => {
                    return Err(Error::invalid(format!("unknown mode flag '{}'", other)));
                }
            }
        }
        Ok(mode)
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.read {
            write!(f, "r")?;
        }
        if self.write {
            write!(f, "w")?;
        }
        if self.create {
            write!(f, "c")?;
        }
        if self.truncate {
            write!(f, "t")?;
        }
        Ok(())
    }
}

impl TryFrom<String> for OpenMode {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<OpenMode> for String {
    fn from(mode: OpenMode) -> Self {
        mode.to_string()
    }
}

/// File locking policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LockMode {
    /// Wait for the lock
    Blocking,
    /// Fail the open if the file is locked
    #[default]
    NonBlocking,
    /// Do not lock
    None,
}

/// When buffered writes reach the disk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurabilityMode {
    /// Writes are buffered; `sync()` and `close()` flush and fsync
    #[default]
    Buffered,
    /// fsync after every commit
    Always,
}

/// Store tuning, fixed at open
///
/// # Example
///
/// ```toml
/// kind = "tree"
/// bucket_count = 100000
/// alignment_power = 4
/// mutex_enabled = true
/// mode = "wc"
/// durability = "always"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Hash or tree backend
    pub kind: StoreKind,
    /// Initial bucket count of the hash backend
    pub bucket_count: u64,
    /// Log entries are padded to `2^alignment_power` bytes
    pub alignment_power: u8,
    /// Auto-defrag on close once superseded entries exceed `2^free_pool_power`
    pub free_pool_power: u8,
    /// Record cache size (accepted for compatibility; the store is memory resident)
    pub cache_records: u64,
    /// Leaf node cache size (accepted for compatibility)
    pub cache_leaf_nodes: u64,
    /// Non-leaf node cache size (accepted for compatibility)
    pub cache_non_leaf_nodes: u64,
    /// Files up to this size are replayed through a memory map; 0 disables mapping
    pub extra_mapped_memory: u64,
    /// Serialize every operation on the handle through one lock
    pub mutex_enabled: bool,
    /// Open mode flags
    pub mode: OpenMode,
    /// File locking policy
    pub lock: LockMode,
    /// Sync policy
    pub durability: DurabilityMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::Hash,
            bucket_count: DEFAULT_BUCKET_COUNT,
            alignment_power: DEFAULT_ALIGNMENT_POWER,
            free_pool_power: DEFAULT_FREE_POOL_POWER,
            cache_records: 0,
            cache_leaf_nodes: DEFAULT_CACHE_LEAF_NODES,
            cache_non_leaf_nodes: DEFAULT_CACHE_NON_LEAF_NODES,
            extra_mapped_memory: DEFAULT_EXTRA_MAPPED_MEMORY,
            mutex_enabled: false,
            mode: OpenMode::default(),
            lock: LockMode::default(),
            durability: DurabilityMode::default(),
        }
    }
}

impl StoreConfig {
    /// Default config for a given backend
    pub fn new(kind: StoreKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    /// Hash backend with defaults
    pub fn hash() -> Self {
        Self::new(StoreKind::Hash)
    }

    /// Tree backend with defaults
    pub fn tree() -> Self {
        Self::new(StoreKind::Tree)
    }

    /// Set the open mode
    pub fn with_mode(mut self, mode: OpenMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the hash bucket count
    pub fn with_bucket_count(mut self, buckets: u64) -> Self {
        self.bucket_count = buckets;
        self
    }

    /// Set the alignment power
    pub fn with_alignment_power(mut self, apow: u8) -> Self {
        self.alignment_power = apow;
        self
    }

    /// Set the free pool power
    pub fn with_free_pool_power(mut self, fpow: u8) -> Self {
        self.free_pool_power = fpow;
        self
    }

    /// Set the cache sizes
    pub fn with_cache(mut self, records: u64, leaf_nodes: u64, non_leaf_nodes: u64) -> Self {
        self.cache_records = records;
        self.cache_leaf_nodes = leaf_nodes;
        self.cache_non_leaf_nodes = non_leaf_nodes;
        self
    }

    /// Set the extra mapped memory size
    pub fn with_extra_mapped_memory(mut self, bytes: u64) -> Self {
        self.extra_mapped_memory = bytes;
        self
    }

    /// Enable or disable the handle-wide mutex
    pub fn with_mutex(mut self, enabled: bool) -> Self {
        self.mutex_enabled = enabled;
        self
    }

    /// Set the locking policy
    pub fn with_lock(mut self, lock: LockMode) -> Self {
        self.lock = lock;
        self
    }

    /// Set the sync policy
    pub fn with_durability(mut self, durability: DurabilityMode) -> Self {
        self.durability = durability;
        self
    }

    /// Alignment in bytes
    pub fn alignment(&self) -> u64 {
        1u64 << self.alignment_power
    }

    /// Superseded-entry count that triggers auto-defrag
    pub fn defrag_threshold(&self) -> u64 {
        1u64 << self.free_pool_power
    }

    /// Check ranges and mode flags
    pub fn validate(&self) -> Result<()> {
        if self.alignment_power > MAX_ALIGNMENT_POWER {
            return Err(Error::invalid(format!(
                "alignment_power {} exceeds {}",
                self.alignment_power, MAX_ALIGNMENT_POWER
            )));
        }
        if self.free_pool_power > MAX_FREE_POOL_POWER {
            return Err(Error::invalid(format!(
                "free_pool_power {} exceeds {}",
                self.free_pool_power, MAX_FREE_POOL_POWER
            )));
        }
        self.mode.validate()
    }
}
