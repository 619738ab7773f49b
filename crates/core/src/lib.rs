//! Core types and traits for tansu
//!
//! This crate defines the foundational types used throughout the system:
//! - Value / Record: what a store holds under each primary key
//! - Mutation: the atomic unit applied by the store and logged to disk
//! - StoreKind / IndexKind / IndexAction: store and index shapes
//! - StoreConfig: tuning fixed at open
//! - Error: error taxonomy with native-style codes
//! - HandleState: shared open/closed flag for handles
//! - RecordOps: per-record operations shared by stores and transactions

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod handle;
pub mod traits;
pub mod types;
pub mod value;

pub use config::{DurabilityMode, LockMode, OpenMode, StoreConfig};
pub use error::{Error, ErrorCode, ErrorKind, Result, TransactionError};
pub use handle::HandleState;
pub use traits::RecordOps;
pub use types::{
    is_primary_key_column, IndexAction, IndexKind, Mutation, StoreKind, PRIMARY_KEY_ALIAS,
    PRIMARY_KEY_COLUMN,
};
pub use value::{parse_decimal, Record, Value};
