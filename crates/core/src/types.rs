//! Store shapes, index kinds and the mutation unit
//!
//! [`Mutation`] is what the record store applies and what the durability
//! layer logs. A commit is an ordered `Vec<Mutation>` applied atomically.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Column name that designates the primary key
pub const PRIMARY_KEY_COLUMN: &str = "";

/// Alias accepted wherever a column name may designate the primary key
pub const PRIMARY_KEY_ALIAS: &str = ":pk";

/// True if `column` designates the primary key rather than a field
pub fn is_primary_key_column(column: &str) -> bool {
    column == PRIMARY_KEY_COLUMN || column == PRIMARY_KEY_ALIAS
}

/// Backing structure of a store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Hash table; iteration order is unspecified
    #[default]
    Hash,
    /// Ordered tree; keys iterate in sorted order
    Tree,
}

impl StoreKind {
    /// Stable tag used in the file header
    pub fn tag(self) -> u8 {
        match self {
            StoreKind::Hash => 1,
            StoreKind::Tree => 2,
        }
    }

    /// Inverse of [`StoreKind::tag`]
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(StoreKind::Hash),
            2 => Some(StoreKind::Tree),
            _ => None,
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::Hash => write!(f, "hash"),
            StoreKind::Tree => write!(f, "tree"),
        }
    }
}

impl FromStr for StoreKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hash" => Ok(StoreKind::Hash),
            "tree" | "btree" => Ok(StoreKind::Tree),
            other => Err(Error::invalid(format!("unknown store kind '{}'", other))),
        }
    }
}

/// Ordering of a secondary index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// String ordering
    Lexical,
    /// Numeric ordering (values parsed leniently)
    Decimal,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKind::Lexical => write!(f, "lexical"),
            IndexKind::Decimal => write!(f, "decimal"),
        }
    }
}

/// What `set_index` should do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexAction {
    /// Create the index only if the column has none
    Add(IndexKind),
    /// Create the index, rebuilding any existing one
    Replace(IndexKind),
    /// Drop the index
    Remove,
}

/// One atomic unit of change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Mutation {
    /// Insert or overwrite a record
    Put {
        /// Primary key
        key: String,
        /// New value
        value: Value,
    },
    /// Remove a record (no-op if absent)
    Delete {
        /// Primary key
        key: String,
    },
    /// Remove every record and every index entry
    Clear,
    /// Create or rebuild an index
    SetIndex {
        /// Column ("" for the primary key)
        column: String,
        /// Ordering
        kind: IndexKind,
    },
    /// Drop an index
    DropIndex {
        /// Column ("" for the primary key)
        column: String,
    },
}

impl Mutation {
    /// Key touched by this mutation, if it targets a single record
    pub fn key(&self) -> Option<&str> {
        match self {
            Mutation::Put { key, .. } | Mutation::Delete { key } => Some(key),
            _ => None,
        }
    }
}
